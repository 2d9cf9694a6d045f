async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<LeaderboardPage>, HttpApiError> {
    let inner = state.inner.lock().await;
    let board = inner.api.engine().leaderboard(usize::MAX);
    let (start, end, next_cursor) = paginate(board.len(), query.cursor, query.page_size)?;

    Ok(Json(LeaderboardPage {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        cursor: start,
        next_cursor,
        entries: board[start..end].to_vec(),
    }))
}

async fn list_guilds(State(state): State<AppState>) -> Json<Vec<Guild>> {
    let inner = state.inner.lock().await;
    Json(inner.api.engine().guilds().iter().cloned().collect())
}

async fn get_conversation(
    Path(other_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PrivateMessage>>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let viewer_id = require_session(&mut inner, &headers)?;
    let thread = inner
        .api
        .engine()
        .conversation(&viewer_id, &other_id)
        .map_err(|err| err.to_api_error())?;
    Ok(Json(thread))
}

async fn mark_conversation_read(
    Path(other_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let viewer_id = require_session(&mut inner, &headers)?;
    let marked = inner.api.mark_conversation_read(&viewer_id, &other_id)?;
    Ok(Json(json!({
        "schema_version": SCHEMA_VERSION_V1,
        "marked": marked,
    })))
}

#[derive(Debug, Serialize)]
struct LeaderboardPage {
    schema_version: String,
    cursor: usize,
    next_cursor: Option<usize>,
    entries: Vec<LeaderboardEntry>,
}
