async fn submit_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SubmitCommandRequest>,
) -> Result<Json<CommandResult>, HttpApiError> {
    let (result, messages) = {
        let mut inner = state.inner.lock().await;
        let actor_id = require_session(&mut inner, &headers)?;
        let command = request.into_command(&actor_id)?;

        let deleted = match &command.payload {
            contracts::CommandPayload::DeleteAccount { account_id } => Some(account_id.clone()),
            _ => None,
        };
        let result = inner.api.submit(command.clone());
        if result.accepted {
            if let Some(account_id) = deleted {
                inner.revoke_account(&account_id);
            }
        }

        let mut messages = vec![StreamMessage::command_result(&command, &result)];
        messages.extend(collect_delta_messages(&mut inner));
        (redact_result(result), messages)
    };

    broadcast_messages(&state, messages);

    Ok(Json(result))
}

async fn get_commands(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> Result<Json<CommandAuditPage>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let viewer_id = require_session(&mut inner, &headers)?;
    let viewer = inner
        .api
        .engine()
        .account(&viewer_id)
        .map_err(|err| err.to_api_error())?;
    if !viewer.role.is_staff() {
        return Err(HttpApiError::forbidden(
            "the command audit is reserved to staff",
            None,
        ));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_PAGE_SIZE);
    let entries = inner
        .api
        .recent_commands(limit)
        .map_err(HttpApiError::from_persistence)?
        .into_iter()
        .map(|entry| PersistedCommandEntry {
            command: entry.command.redacted(),
            result: entry.result.redacted(),
            recorded_at: entry.recorded_at,
        })
        .collect();

    Ok(Json(CommandAuditPage {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        entries,
    }))
}

/// Either a full envelope, whose actor must match the session, or a payload
/// submitted as the session account.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmitCommandRequest {
    Raw(Command),
    Session {
        command_id: String,
        payload: contracts::CommandPayload,
    },
}

impl SubmitCommandRequest {
    fn into_command(self, actor_id: &str) -> Result<Command, HttpApiError> {
        match self {
            Self::Raw(command) => {
                if command.actor_id != actor_id {
                    return Err(HttpApiError::invalid_command(
                        "command.actor_id must match the session account",
                        Some(format!(
                            "session={actor_id} command_actor={}",
                            command.actor_id
                        )),
                    ));
                }
                Ok(command)
            }
            Self::Session {
                command_id,
                payload,
            } => Ok(Command::new(command_id, actor_id, payload)),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct AuditQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CommandAuditPage {
    schema_version: String,
    entries: Vec<PersistedCommandEntry>,
}
