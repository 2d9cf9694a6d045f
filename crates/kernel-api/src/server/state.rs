#[derive(Clone)]
pub struct AppState {
    inner: std::sync::Arc<Mutex<ServerInner>>,
    stream_tx: broadcast::Sender<StreamMessage>,
}

impl AppState {
    pub fn new(api: EngineApi) -> Self {
        let (stream_tx, _) = broadcast::channel(4096);
        Self {
            inner: std::sync::Arc::new(Mutex::new(ServerInner {
                api,
                tokens: HashMap::new(),
            })),
            stream_tx,
        }
    }
}

#[derive(Debug)]
struct ServerInner {
    api: EngineApi,
    /// Bearer token to account id.
    tokens: HashMap<String, String>,
}

impl ServerInner {
    fn issue_token(&mut self, account_id: &str) -> String {
        let token = hex::encode(rand::random::<[u8; 16]>());
        self.tokens.insert(token.clone(), account_id.to_string());
        token
    }

    /// Resolves a token to a live account. Tokens of deleted accounts are
    /// dropped on first use.
    fn account_for_token(&mut self, token: &str) -> Result<String, HttpApiError> {
        let Some(account_id) = self.tokens.get(token).cloned() else {
            return Err(HttpApiError::unauthenticated("unknown or expired session token"));
        };

        if !self.api.engine().accounts().contains(&account_id) {
            self.tokens.remove(token);
            return Err(HttpApiError::unauthenticated("session account no longer exists"));
        }

        Ok(account_id)
    }

    fn revoke_account(&mut self, account_id: &str) {
        self.tokens.retain(|_, owner| owner != account_id);
    }
}

fn require_session(inner: &mut ServerInner, headers: &HeaderMap) -> Result<String, HttpApiError> {
    let Some(token) = bearer_token(headers) else {
        return Err(HttpApiError::unauthenticated("missing bearer token"));
    };

    inner.account_for_token(&token)
}

/// Owners see their own records; staff see everyone's.
fn require_viewer<'a>(
    inner: &'a ServerInner,
    viewer_id: &str,
    account_id: &str,
) -> Result<&'a Account, HttpApiError> {
    let accounts = inner.api.engine().accounts();
    let viewer = accounts.get(viewer_id).map_err(|err| err.to_api_error())?;
    let target = accounts.get(account_id).map_err(|err| err.to_api_error())?;

    if viewer_id != account_id && !viewer.role.is_staff() {
        return Err(HttpApiError::forbidden(
            "students may only read their own account",
            Some(format!("viewer={viewer_id} account_id={account_id}")),
        ));
    }

    Ok(target)
}

fn collect_delta_messages(inner: &mut ServerInner) -> Vec<StreamMessage> {
    let mut messages = inner
        .api
        .drain_notifications()
        .iter()
        .map(StreamMessage::notification)
        .collect::<Vec<_>>();

    if let Some(last_error) = inner.api.last_persistence_error() {
        messages.push(StreamMessage::warning(None, last_error.to_string()));
    }

    messages
}

fn broadcast_messages(state: &AppState, messages: Vec<StreamMessage>) {
    for message in messages {
        let _ = state.stream_tx.send(message);
    }
}
