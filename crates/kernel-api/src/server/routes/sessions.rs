async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, HttpApiError> {
    let (response, messages) = {
        let mut inner = state.inner.lock().await;
        let outcome = inner
            .api
            .authenticate(&request.username, &request.secret, request.portal);
        let account = match outcome {
            Ok(account) => account,
            Err(error) if error.error_code == ErrorCode::Unauthorized => {
                return Err(HttpApiError {
                    status: StatusCode::UNAUTHORIZED,
                    error,
                });
            }
            Err(error) => return Err(HttpApiError::from_api_error(error)),
        };

        let token = inner.issue_token(&account.account_id);
        info!(account_id = %account.account_id, portal = ?request.portal, "session opened");
        let response = LoginResponse {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            token,
            must_change_password: account.credentials.must_rotate,
            account: redact_account(&account),
        };
        (response, collect_delta_messages(&mut inner))
    };

    broadcast_messages(&state, messages);
    Ok(Json(response))
}

async fn end_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, HttpApiError> {
    let Some(token) = bearer_token(&headers) else {
        return Err(HttpApiError::unauthenticated("missing bearer token"));
    };

    let mut inner = state.inner.lock().await;
    match inner.tokens.remove(&token) {
        Some(account_id) => {
            debug!(%account_id, "session closed");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(HttpApiError::unauthenticated("unknown or expired session token")),
    }
}

async fn get_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Account>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let account_id = require_session(&mut inner, &headers)?;
    let account = inner
        .api
        .engine()
        .account(&account_id)
        .map_err(|err| err.to_api_error())?;
    Ok(Json(redact_account(account)))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    secret: String,
    portal: Portal,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    schema_version: String,
    token: String,
    must_change_password: bool,
    account: Account,
}
