use super::*;
use contracts::{CommandOutcome, CommandPayload, IssuedCredentials};

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header"),
    );
    headers
}

fn seeded_state() -> (AppState, IssuedCredentials, IssuedCredentials) {
    let mut api = EngineApi::default();
    let admin = api.bootstrap().expect("bootstrap").expect("fresh store");
    let result = api.submit(Command::new(
        "seed-student",
        admin.account_id.as_str(),
        CommandPayload::CreateStudent {
            display_name: "Léa Martin".to_string(),
            classe: "4eA".to_string(),
            teacher_id: None,
        },
    ));
    let student = match result.outcome {
        Some(CommandOutcome::Credentials { credentials }) => credentials,
        other => panic!("expected credentials, got {other:?}"),
    };
    api.drain_notifications();
    (AppState::new(api), admin, student)
}

async fn login(state: &AppState, credentials: &IssuedCredentials, portal: Portal) -> String {
    let Json(response) = create_session(
        State(state.clone()),
        Json(LoginRequest {
            username: credentials.username.clone(),
            secret: credentials.secret.clone(),
            portal,
        }),
    )
    .await
    .expect("login succeeds");
    assert!(response.account.credentials.secret_hash.is_empty());
    response.token
}

#[test]
fn pagination_enforces_max_bounds() {
    let (start, end, next_cursor) = paginate(100, Some(10), Some(20)).expect("page should work");
    assert_eq!(start, 10);
    assert_eq!(end, 30);
    assert_eq!(next_cursor, Some(30));

    let (_, end, next_cursor) = paginate(10_000, None, Some(usize::MAX)).expect("clamped page");
    assert_eq!(end, MAX_PAGE_SIZE);
    assert_eq!(next_cursor, Some(MAX_PAGE_SIZE));

    let out_of_range = paginate(5, Some(10), Some(1));
    assert!(out_of_range.is_err());
}

#[test]
fn engine_codes_map_to_http_statuses() {
    assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(status_for(ErrorCode::Unauthorized), StatusCode::FORBIDDEN);
    assert_eq!(
        status_for(ErrorCode::InsufficientFunds),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(status_for(ErrorCode::GuildFull), StatusCode::CONFLICT);
    assert_eq!(
        status_for(ErrorCode::LimitExceeded),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        status_for(ErrorCode::ContractVersionUnsupported),
        StatusCode::BAD_REQUEST
    );
}

#[test]
fn bearer_tokens_are_parsed_strictly() {
    assert_eq!(bearer_token(&bearer("abc")).as_deref(), Some("abc"));
    assert_eq!(bearer_token(&HeaderMap::new()), None);

    let mut basic = HeaderMap::new();
    basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
    assert_eq!(bearer_token(&basic), None);
}

#[test]
fn stream_messages_reach_their_recipient_or_everyone() {
    let targeted = StreamMessage::warning(Some("student:2"), "x".to_string());
    assert!(targeted.is_for("student:2"));
    assert!(!targeted.is_for("student:3"));

    let global = StreamMessage::warning(None, "y".to_string());
    assert!(global.is_for("student:3"));
}

#[tokio::test]
async fn login_issues_a_token_that_resolves_to_the_account() {
    let (state, _admin, student) = seeded_state();
    let token = login(&state, &student, Portal::Student).await;

    let Json(me) = get_me(State(state.clone()), bearer(&token))
        .await
        .expect("me");
    assert_eq!(me.account_id, student.account_id);
    assert!(me.credentials.secret_hash.is_empty());

    let status = end_session(State(state.clone()), bearer(&token))
        .await
        .expect("logout");
    assert_eq!(status, StatusCode::NO_CONTENT);
    let err = get_me(State(state), bearer(&token))
        .await
        .expect_err("token revoked");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_secret_is_unauthorized() {
    let (state, _admin, mut student) = seeded_state();
    student.secret = "not-it".to_string();
    let err = create_session(
        State(state),
        Json(LoginRequest {
            username: student.username,
            secret: student.secret,
            portal: Portal::Student,
        }),
    )
    .await
    .expect_err("refused");
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn commands_run_as_the_session_account() {
    let (state, _admin, student) = seeded_state();
    let token = login(&state, &student, Portal::Student).await;
    let mut rx = state.stream_tx.subscribe();

    let Json(result) = submit_command(
        State(state.clone()),
        bearer(&token),
        Json(SubmitCommandRequest::Session {
            command_id: "c1".to_string(),
            payload: CommandPayload::ConsultChapter {
                chapter_id: "chap1".to_string(),
            },
        }),
    )
    .await
    .expect("submitted");
    assert!(result.accepted);
    match result.outcome {
        Some(CommandOutcome::Account { account }) => {
            assert!(account.credentials.secret_hash.is_empty());
            assert_eq!(account.account_id, student.account_id);
        }
        other => panic!("expected an account, got {other:?}"),
    }

    let first = rx.try_recv().expect("command result broadcast");
    assert_eq!(first.message_type, "command.result");
    assert!(first.is_for(&student.account_id));
}

#[tokio::test]
async fn envelopes_for_another_actor_are_refused() {
    let (state, admin, student) = seeded_state();
    let token = login(&state, &student, Portal::Student).await;

    let err = submit_command(
        State(state),
        bearer(&token),
        Json(SubmitCommandRequest::Raw(Command::new(
            "c1",
            admin.account_id.as_str(),
            CommandPayload::ResetStudentProgress,
        ))),
    )
    .await
    .expect_err("spoofed actor");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.error.error_code, ErrorCode::InvalidCommand);
}

#[tokio::test]
async fn students_cannot_read_other_accounts() {
    let (state, admin, student) = seeded_state();
    let student_token = login(&state, &student, Portal::Student).await;
    let admin_token = login(&state, &admin, Portal::Admin).await;

    let err = get_account(
        Path(admin.account_id.clone()),
        State(state.clone()),
        bearer(&student_token),
    )
    .await
    .expect_err("forbidden");
    assert_eq!(err.status, StatusCode::FORBIDDEN);

    let Json(account) = get_account(
        Path(student.account_id.clone()),
        State(state),
        bearer(&admin_token),
    )
    .await
    .expect("staff may read");
    assert_eq!(account.account_id, student.account_id);
}

#[tokio::test]
async fn deleting_an_account_revokes_its_tokens() {
    let (state, admin, student) = seeded_state();
    let student_token = login(&state, &student, Portal::Student).await;
    let admin_token = login(&state, &admin, Portal::Admin).await;

    let Json(result) = submit_command(
        State(state.clone()),
        bearer(&admin_token),
        Json(SubmitCommandRequest::Session {
            command_id: "delete".to_string(),
            payload: CommandPayload::DeleteAccount {
                account_id: student.account_id.clone(),
            },
        }),
    )
    .await
    .expect("submitted");
    assert!(result.accepted);

    let inner = state.inner.lock().await;
    assert!(!inner.tokens.contains_key(&student_token));
    assert!(inner.tokens.contains_key(&admin_token));
}

#[tokio::test]
async fn leaderboard_pages_rank_students() {
    let (state, _admin, student) = seeded_state();
    let Json(page) = get_leaderboard(
        State(state),
        Query(PaginationQuery {
            cursor: None,
            page_size: Some(10),
        }),
    )
    .await
    .expect("leaderboard");
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].rank, 1);
    assert_eq!(page.entries[0].account_id, student.account_id);
    assert_eq!(page.next_cursor, None);
}

#[tokio::test]
async fn staff_audit_shows_no_secrets() {
    let mut api = EngineApi::default();
    api.attach_store(crate::SqliteKvStore::open_in_memory().expect("open"));
    let admin = api.bootstrap().expect("bootstrap").expect("fresh store");
    let state = AppState::new(api);
    let admin_token = login(&state, &admin, Portal::Admin).await;

    let Json(created) = submit_command(
        State(state.clone()),
        bearer(&admin_token),
        Json(SubmitCommandRequest::Session {
            command_id: "create".to_string(),
            payload: CommandPayload::CreateStudent {
                display_name: "Léa Martin".to_string(),
                classe: "4eA".to_string(),
                teacher_id: None,
            },
        }),
    )
    .await
    .expect("submitted");
    let issued = match created.outcome {
        Some(CommandOutcome::Credentials { credentials }) => credentials,
        other => panic!("expected credentials, got {other:?}"),
    };

    let Json(page) = get_commands(
        State(state),
        bearer(&admin_token),
        Query(AuditQuery { limit: None }),
    )
    .await
    .expect("audit");
    assert_eq!(page.entries.len(), 1);
    let body = serde_json::to_string(&page.entries).expect("serialize");
    assert!(!body.contains(&issued.secret));
    assert!(body.contains(&issued.username));
}
