//! In-process API facade over the account engine, with session handling and
//! write-through SQLite persistence.

mod persistence;
mod server;

use std::path::Path;

use contracts::{
    Account, ApiError, Catalogs, Command, CommandPayload, CommandResult, EngineSettings, ErrorCode,
    IssuedCredentials, Notification, Portal,
};
use kernel_core::{default_catalogs, AccountEngine, Outbox, SessionView};
pub use persistence::{PersistedCommandEntry, PersistenceError, SqliteKvStore};
pub use server::{default_sqlite_path, router, serve, AppState, ServerError};
use tracing::{info, warn};

#[derive(Debug)]
pub struct EngineApi {
    engine: AccountEngine,
    outbox: Outbox,
    session: SessionView,
    persistence: Option<SqliteKvStore>,
    last_persistence_error: Option<String>,
}

impl EngineApi {
    pub fn new(settings: EngineSettings, catalogs: Catalogs) -> Self {
        Self::from_engine(AccountEngine::new(settings, catalogs))
    }

    /// Wraps a prepared engine. Its notification sink is replaced by the
    /// facade's outbox.
    pub fn from_engine(mut engine: AccountEngine) -> Self {
        let outbox = Outbox::new();
        engine.set_sink(Box::new(outbox.clone()));
        Self {
            engine,
            outbox,
            session: SessionView::default(),
            persistence: None,
            last_persistence_error: None,
        }
    }

    /// Restores the engine from the database at `path` (creating it when
    /// absent) and keeps writing through to it.
    pub fn open_sqlite(
        path: impl AsRef<Path>,
        settings: EngineSettings,
        catalogs: Option<Catalogs>,
    ) -> Result<Self, PersistenceError> {
        let store = SqliteKvStore::open(path.as_ref())?;
        let engine = AccountEngine::restore_from(settings, catalogs, &store)?;
        let mut api = Self::from_engine(engine);
        api.persistence = Some(store);
        info!(path = %path.as_ref().display(), "sqlite store attached");
        Ok(api)
    }

    pub fn attach_store(&mut self, store: SqliteKvStore) {
        self.persistence = Some(store);
    }

    pub fn flush_persistence_checked(&mut self) -> Result<usize, PersistenceError> {
        let Some(store) = self.persistence.as_mut() else {
            return Err(PersistenceError::NotAttached);
        };

        let written = self.engine.flush_to(store)?;
        self.last_persistence_error = None;
        Ok(written)
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    pub fn recent_commands(
        &self,
        limit: usize,
    ) -> Result<Vec<PersistedCommandEntry>, PersistenceError> {
        let Some(store) = self.persistence.as_ref() else {
            return Err(PersistenceError::NotAttached);
        };

        store.recent_commands(limit)
    }

    /// Creates the administrator on an empty store.
    pub fn bootstrap(&mut self) -> Result<Option<IssuedCredentials>, ApiError> {
        let issued = self
            .engine
            .bootstrap()
            .map_err(|err| err.to_api_error())?;
        self.flush_persistence_if_enabled();
        Ok(issued)
    }

    // ---- session ----

    /// Verifies credentials and stamps the login without touching the
    /// in-process session. Used by the server, which keeps its own tokens.
    pub fn authenticate(
        &mut self,
        username: &str,
        secret: &str,
        portal: Portal,
    ) -> Result<Account, ApiError> {
        let account = self
            .engine
            .authenticate(username, secret, portal)
            .map_err(|err| err.to_api_error())?;
        self.flush_persistence_if_enabled();
        Ok(account)
    }

    pub fn login(
        &mut self,
        username: &str,
        secret: &str,
        portal: Portal,
    ) -> Result<Account, ApiError> {
        let account = self.authenticate(username, secret, portal)?;
        self.session = SessionView::signed_in(account.account_id.clone());
        Ok(account)
    }

    pub fn logout(&mut self) {
        self.session.sign_out();
    }

    pub fn session(&self) -> &SessionView {
        &self.session
    }

    pub fn current_account(&self) -> Result<&Account, ApiError> {
        self.session
            .resolve(self.engine.accounts())
            .map_err(|err| err.to_api_error())
    }

    // ---- commands ----

    pub fn submit(&mut self, command: Command) -> CommandResult {
        let result = self.engine.execute(&command);

        if let Some(account_id) = self.session.account_id() {
            if !self.engine.accounts().contains(account_id) {
                info!(%account_id, "session account removed; signing out");
                self.session.sign_out();
            }
        }

        if let Some(store) = self.persistence.as_mut() {
            if let Err(err) = store.record_command(&command, &result, self.engine.now()) {
                warn!(command_id = %command.command_id, "command audit write failed: {err}");
                self.last_persistence_error = Some(err.to_string());
            }
        }
        if result.accepted {
            self.flush_persistence_if_enabled();
        }
        result
    }

    /// Submits `payload` on behalf of the signed-in account.
    pub fn submit_as_session(
        &mut self,
        command_id: impl Into<String>,
        payload: CommandPayload,
    ) -> CommandResult {
        let actor_id = self.session.account_id().map(str::to_string);
        let command = Command::new(command_id, actor_id.clone().unwrap_or_default(), payload);
        match actor_id {
            Some(_) => self.submit(command),
            None => CommandResult::rejected(
                &command,
                ApiError::new(ErrorCode::Unauthorized, "no active session", None),
            ),
        }
    }

    pub fn mark_conversation_read(
        &mut self,
        actor_id: &str,
        other_id: &str,
    ) -> Result<usize, ApiError> {
        let marked = self
            .engine
            .mark_conversation_read(actor_id, other_id)
            .map_err(|err| err.to_api_error())?;
        if marked > 0 {
            self.flush_persistence_if_enabled();
        }
        Ok(marked)
    }

    pub fn drain_notifications(&self) -> Vec<Notification> {
        self.outbox.drain()
    }

    pub fn engine(&self) -> &AccountEngine {
        &self.engine
    }

    fn flush_persistence_if_enabled(&mut self) {
        if self.persistence.is_none() {
            return;
        }

        if let Err(err) = self.flush_persistence_checked() {
            warn!("write-through flush failed: {err}");
            self.last_persistence_error = Some(err.to_string());
        }
    }
}

impl Default for EngineApi {
    fn default() -> Self {
        Self::new(EngineSettings::default(), default_catalogs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CommandOutcome;
    use kernel_core::KeyValueStore;

    fn temp_db_path(name: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();

        std::env::temp_dir().join(format!("goat_api_{name}_{nanos}.sqlite"))
    }

    fn remove_db(path: &Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("sqlite-wal"));
        let _ = std::fs::remove_file(path.with_extension("sqlite-shm"));
    }

    fn create_student(api: &mut EngineApi, admin_id: &str, name: &str) -> IssuedCredentials {
        let result = api.submit(Command::new(
            format!("create-{name}"),
            admin_id,
            CommandPayload::CreateStudent {
                display_name: name.to_string(),
                classe: "6eA".to_string(),
                teacher_id: None,
            },
        ));
        match result.outcome {
            Some(CommandOutcome::Credentials { credentials }) => credentials,
            other => panic!("expected credentials, got {other:?}"),
        }
    }

    #[test]
    fn login_sets_and_logout_clears_the_session() {
        let mut api = EngineApi::default();
        let admin = api.bootstrap().expect("bootstrap").expect("fresh store");

        let wrong = api.login(&admin.username, "nope", Portal::Admin);
        assert_eq!(
            wrong.map(|_| ()).map_err(|err| err.error_code),
            Err(ErrorCode::Unauthorized)
        );
        assert!(api.current_account().is_err());

        api.login(&admin.username, &admin.secret, Portal::Admin)
            .expect("login");
        assert_eq!(
            api.current_account().expect("signed in").account_id,
            admin.account_id
        );

        api.logout();
        assert!(api.current_account().is_err());
    }

    #[test]
    fn session_commands_need_a_login() {
        let mut api = EngineApi::default();
        let result = api.submit_as_session("c1", CommandPayload::MarkWelcomeSeen);
        assert!(!result.accepted);
        assert_eq!(
            result.error.map(|error| error.error_code),
            Some(ErrorCode::Unauthorized)
        );
    }

    #[test]
    fn deleting_the_signed_in_account_ends_the_session() {
        let mut api = EngineApi::default();
        let admin = api.bootstrap().expect("bootstrap").expect("fresh store");
        let student = create_student(&mut api, &admin.account_id, "Inès");

        api.login(&student.username, &student.secret, Portal::Student)
            .expect("login");
        let result = api.submit(Command::new(
            "delete",
            admin.account_id.as_str(),
            CommandPayload::DeleteAccount {
                account_id: student.account_id.clone(),
            },
        ));
        assert!(result.accepted);
        assert_eq!(api.session().account_id(), None);
    }

    #[test]
    fn accepted_commands_write_through_to_sqlite() {
        let db_path = temp_db_path("write_through");
        let saved = {
            let mut api = EngineApi::open_sqlite(&db_path, EngineSettings::default(), None)
                .expect("open sqlite");
            let admin = api.bootstrap().expect("bootstrap").expect("fresh store");
            let student = create_student(&mut api, &admin.account_id, "Noé");
            api.submit(Command::new(
                "bonus",
                admin.account_id.as_str(),
                CommandPayload::AddBonus {
                    account_id: student.account_id.clone(),
                    xp: 40,
                    coins: 15,
                },
            ));
            assert_eq!(api.last_persistence_error(), None);
            assert_eq!(api.flush_persistence_checked().expect("nothing pending"), 0);
            assert_eq!(api.recent_commands(10).expect("audit").len(), 2);
            api.engine()
                .account(&student.account_id)
                .expect("student")
                .clone()
        };

        let mut reopened = EngineApi::open_sqlite(&db_path, EngineSettings::default(), None)
            .expect("reopen sqlite");
        assert_eq!(reopened.bootstrap().expect("bootstrap"), None);
        let restored = reopened
            .engine()
            .account(&saved.account_id)
            .expect("restored");
        assert_eq!(restored, &saved);
        assert!(restored.progress.xp >= 40);
        drop(reopened);
        remove_db(&db_path);
    }

    #[test]
    fn flushing_without_a_store_reports_not_attached() {
        let mut api = EngineApi::default();
        assert!(matches!(
            api.flush_persistence_checked(),
            Err(PersistenceError::NotAttached)
        ));
    }

    #[test]
    fn attached_store_receives_every_collection() {
        let mut api = EngineApi::default();
        api.attach_store(SqliteKvStore::open_in_memory().expect("open"));
        api.bootstrap().expect("bootstrap");
        let store = api.persistence.as_ref().expect("attached");
        assert!(store.load(kernel_core::store::ACCOUNTS_KEY).expect("load").is_some());
        assert_eq!(
            store.keys().expect("keys").len(),
            kernel_core::store::ALL_COLLECTIONS.len()
        );
    }

    #[test]
    fn command_audit_never_keeps_plaintext_secrets() {
        let mut api = EngineApi::default();
        api.attach_store(SqliteKvStore::open_in_memory().expect("open"));
        let admin = api.bootstrap().expect("bootstrap").expect("fresh store");
        let student = create_student(&mut api, &admin.account_id, "Léa");
        assert!(!student.secret.is_empty(), "the creator still receives the secret");

        let rotated = api.submit(Command::new(
            "rotate",
            student.account_id.as_str(),
            CommandPayload::ChangePassword {
                current_secret: student.secret.clone(),
                new_secret: "PlainSecret42".to_string(),
            },
        ));
        assert!(rotated.accepted);
        let reset = api.submit(Command::new(
            "reset",
            admin.account_id.as_str(),
            CommandPayload::ResetPassword {
                account_id: student.account_id.clone(),
            },
        ));
        let reset_secret = match reset.outcome {
            Some(CommandOutcome::Credentials { credentials }) => credentials.secret,
            other => panic!("expected credentials, got {other:?}"),
        };

        let entries = api.recent_commands(10).expect("audit");
        assert_eq!(entries.len(), 3);
        let audit = format!("{entries:?}");
        assert!(!audit.contains("PlainSecret42"));
        assert!(!audit.contains(&student.secret));
        assert!(!audit.contains(&reset_secret));
        assert!(!audit.contains(&admin.secret));
    }

    #[test]
    fn notifications_are_drained_once() {
        let mut api = EngineApi::default();
        let admin = api.bootstrap().expect("bootstrap").expect("fresh store");
        api.login(&admin.username, &admin.secret, Portal::Admin)
            .expect("login");
        assert!(!api.drain_notifications().is_empty());
        assert!(api.drain_notifications().is_empty());
    }
}
