async fn list_accounts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<AccountPage>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let viewer_id = require_session(&mut inner, &headers)?;
    let accounts = inner.api.engine().accounts();
    let viewer = accounts.get(&viewer_id).map_err(|err| err.to_api_error())?;
    if !viewer.role.is_staff() {
        return Err(HttpApiError::forbidden(
            "the account directory is reserved to staff",
            None,
        ));
    }

    let (start, end, next_cursor) = paginate(accounts.len(), query.cursor, query.page_size)?;
    let entries = accounts
        .iter()
        .skip(start)
        .take(end - start)
        .map(redact_account)
        .collect();

    Ok(Json(AccountPage {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        cursor: start,
        next_cursor,
        entries,
    }))
}

async fn get_account(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Account>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let viewer_id = require_session(&mut inner, &headers)?;
    let account = require_viewer(&inner, &viewer_id, &account_id)?;
    Ok(Json(redact_account(account)))
}

async fn get_chapter_mastery(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChapterMastery>>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let viewer_id = require_session(&mut inner, &headers)?;
    require_viewer(&inner, &viewer_id, &account_id)?;
    let mastery = inner
        .api
        .engine()
        .chapter_mastery(&account_id)
        .map_err(|err| err.to_api_error())?;
    Ok(Json(mastery))
}

async fn get_weak_questions(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WeakQuery>,
) -> Result<Json<Vec<WeakQuestion>>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let viewer_id = require_session(&mut inner, &headers)?;
    require_viewer(&inner, &viewer_id, &account_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_WEAK_LIMIT).min(MAX_PAGE_SIZE);
    let weak = inner
        .api
        .engine()
        .weak_questions(&account_id, limit)
        .map_err(|err| err.to_api_error())?;
    Ok(Json(weak))
}

async fn get_review_quiz(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReviewQuiz>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let viewer_id = require_session(&mut inner, &headers)?;
    require_viewer(&inner, &viewer_id, &account_id)?;
    let review = inner
        .api
        .engine()
        .review_quiz(&account_id)
        .map_err(|err| err.to_api_error())?;
    Ok(Json(review))
}

#[derive(Debug, Deserialize, Default)]
struct PaginationQuery {
    cursor: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct WeakQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct AccountPage {
    schema_version: String,
    cursor: usize,
    next_cursor: Option<usize>,
    entries: Vec<Account>,
}
