async fn stream_notifications(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, HttpApiError> {
    let (account_id, initial_message) = {
        let mut inner = state.inner.lock().await;
        let account_id = inner.account_for_token(&query.token)?;
        let account = inner
            .api
            .engine()
            .account(&account_id)
            .map_err(|err| err.to_api_error())?;
        let ready = StreamMessage::session_ready(account);
        (account_id, ready)
    };

    Ok(ws.on_upgrade(move |socket| stream_socket(socket, state, account_id, initial_message)))
}

async fn stream_socket(
    mut socket: WebSocket,
    state: AppState,
    account_id: String,
    initial_message: StreamMessage,
) {
    if send_stream_message(&mut socket, &initial_message)
        .await
        .is_err()
    {
        return;
    }

    let mut rx = state.stream_tx.subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        break;
                    }
                    _ => {}
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Ok(message) => {
                        if !message.is_for(&account_id) {
                            continue;
                        }

                        if send_stream_message(&mut socket, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%account_id, skipped, "notification stream lagged");
                        let warning = StreamMessage::warning(
                            Some(&account_id),
                            format!("stream client lagged and skipped {skipped} message(s)"),
                        );

                        if send_stream_message(&mut socket, &warning).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }
}

async fn send_stream_message(
    socket: &mut WebSocket,
    message: &StreamMessage,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload.into())).await
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    token: String,
}

#[derive(Debug, Clone, Serialize)]
struct StreamMessage {
    schema_version: String,
    #[serde(rename = "type")]
    message_type: String,
    /// Recipient; `None` goes to every subscriber.
    account_id: Option<String>,
    payload: Value,
}

impl StreamMessage {
    fn is_for(&self, account_id: &str) -> bool {
        self.account_id
            .as_deref()
            .map_or(true, |recipient| recipient == account_id)
    }

    fn session_ready(account: &Account) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: "session.ready".to_string(),
            account_id: Some(account.account_id.clone()),
            payload: json!({
                "display_name": account.display_name,
                "coins": account.coins,
                "progress": account.progress,
            }),
        }
    }

    fn notification(notification: &Notification) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: "notification".to_string(),
            account_id: Some(notification.account_id.clone()),
            payload: json!(notification),
        }
    }

    fn command_result(command: &Command, result: &CommandResult) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: "command.result".to_string(),
            account_id: Some(command.actor_id.clone()),
            payload: json!({
                "command_id": result.command_id,
                "accepted": result.accepted,
                "error": result.error,
            }),
        }
    }

    fn warning(account_id: Option<&str>, warning: String) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            message_type: "warning".to_string(),
            account_id: account_id.map(str::to_string),
            payload: json!({ "message": warning }),
        }
    }
}
