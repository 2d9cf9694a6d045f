use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    Account, ApiError, ChapterMastery, Command, CommandResult, ErrorCode, Guild, LeaderboardEntry,
    Notification, Portal, PrivateMessage, ReviewQuiz, WeakQuestion, SCHEMA_VERSION_V1,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{EngineApi, PersistedCommandEntry, PersistenceError};

const DEFAULT_PAGE_SIZE: usize = 500;
const MAX_PAGE_SIZE: usize = 5000;
const DEFAULT_WEAK_LIMIT: usize = 10;
const DEFAULT_AUDIT_LIMIT: usize = 100;
const DEFAULT_SQLITE_PATH: &str = "goat_accounts.sqlite";

include!("error.rs");
include!("state.rs");
include!("routes/sessions.rs");
include!("routes/commands.rs");
include!("routes/accounts.rs");
include!("routes/school.rs");
include!("routes/stream.rs");
include!("util.rs");

pub async fn serve(addr: SocketAddr, api: EngineApi) -> Result<(), ServerError> {
    let state = AppState::new(api);
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "account server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/sessions", post(create_session).delete(end_session))
        .route("/api/v1/me", get(get_me))
        .route("/api/v1/commands", post(submit_command).get(get_commands))
        .route("/api/v1/accounts", get(list_accounts))
        .route("/api/v1/accounts/{account_id}", get(get_account))
        .route(
            "/api/v1/accounts/{account_id}/mastery",
            get(get_chapter_mastery),
        )
        .route(
            "/api/v1/accounts/{account_id}/weak_questions",
            get(get_weak_questions),
        )
        .route("/api/v1/accounts/{account_id}/review", get(get_review_quiz))
        .route("/api/v1/leaderboard", get(get_leaderboard))
        .route("/api/v1/guilds", get(list_guilds))
        .route(
            "/api/v1/conversations/{other_id}",
            get(get_conversation),
        )
        .route(
            "/api/v1/conversations/{other_id}/read",
            post(mark_conversation_read),
        )
        .route("/api/v1/stream", get(stream_notifications))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests;
