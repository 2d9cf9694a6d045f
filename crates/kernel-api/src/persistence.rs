use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use contracts::{Command, CommandResult};
use kernel_core::{KeyValueStore, StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// One command and its result, secrets redacted, kept for operator audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCommandEntry {
    pub command: Command,
    pub result: CommandResult,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    Store(StoreError),
    NotAttached,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::Store(err) => write!(f, "store error: {err}"),
            Self::NotAttached => write!(f, "sqlite store is not attached"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

impl From<StoreError> for PersistenceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Collections as JSON documents in one `collections` table, plus the command
/// audit trail.
#[derive(Debug)]
pub struct SqliteKvStore {
    conn: Connection,
}

impl SqliteKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    pub fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM collections ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    pub fn record_command(
        &mut self,
        command: &Command,
        result: &CommandResult,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        // Plaintext secrets never reach the audit table.
        let command_json = serde_json::to_string(&command.redacted())?;
        let result_json = serde_json::to_string(&result.redacted())?;
        self.conn.execute(
            "INSERT OR IGNORE INTO commands (
                command_id,
                actor_id,
                accepted,
                command_json,
                result_json,
                recorded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                command.command_id.as_str(),
                command.actor_id.as_str(),
                if result.accepted { 1_i64 } else { 0_i64 },
                command_json,
                result_json,
                recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn recent_commands(
        &self,
        limit: usize,
    ) -> Result<Vec<PersistedCommandEntry>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT command_json, result_json, recorded_at
             FROM commands
             ORDER BY seq DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(
            params![i64::try_from(limit).unwrap_or(i64::MAX)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )?;

        let mut entries = Vec::new();
        for row in rows {
            let (command_json, result_json, recorded_at) = row?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .map(|stamp| stamp.with_timezone(&Utc))
                .map_err(|err| StoreError::Backend(format!("bad audit timestamp: {err}")))?;
            entries.push(PersistedCommandEntry {
                command: serde_json::from_str(&command_json)?,
                result: serde_json::from_str(&result_json)?,
                recorded_at,
            });
        }
        Ok(entries)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS collections (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS commands (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                command_id TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                accepted INTEGER NOT NULL,
                command_json TEXT NOT NULL,
                result_json TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                UNIQUE (actor_id, command_id)
            );

            CREATE INDEX IF NOT EXISTS idx_commands_actor ON commands(actor_id, seq);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at)
             VALUES(1, 'initial_v1', ?1)",
            params![Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }
}

impl KeyValueStore for SqliteKvStore {
    fn load(&self, key: &str) -> StoreResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value_json FROM collections WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)
    }

    fn save(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.conn
            .execute(
                "INSERT INTO collections (key, value_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value_json = excluded.value_json,
                    updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CommandOutcome, CommandPayload};

    #[test]
    fn values_upsert_by_key() {
        let mut store = SqliteKvStore::open_in_memory().expect("open");
        assert_eq!(store.load("accounts").expect("load"), None);

        store.save("accounts", "[]").expect("save");
        store.save("accounts", "[1]").expect("overwrite");
        store.save("guilds", "{}").expect("save");

        assert_eq!(store.load("accounts").expect("load").as_deref(), Some("[1]"));
        assert_eq!(store.keys().expect("keys"), vec!["accounts", "guilds"]);
    }

    fn temp_db_path(name: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();

        std::env::temp_dir().join(format!("goat_kv_{name}_{nanos}.sqlite"))
    }

    #[test]
    fn reopening_a_file_keeps_collections() {
        let path = temp_db_path("reopen");
        {
            let mut store = SqliteKvStore::open(&path).expect("open");
            store.save("sequence", "7").expect("save");
        }
        let store = SqliteKvStore::open(&path).expect("reopen");
        assert_eq!(store.load("sequence").expect("load").as_deref(), Some("7"));
        drop(store);
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("sqlite-wal"));
        let _ = std::fs::remove_file(path.with_extension("sqlite-shm"));
    }

    #[test]
    fn audit_trail_lists_newest_first_and_ignores_replays() {
        let mut store = SqliteKvStore::open_in_memory().expect("open");
        let first = Command::new("c1", "student:1", CommandPayload::MarkWelcomeSeen);
        let second = Command::new("c2", "student:1", CommandPayload::LeaveGuild);
        let now = Utc::now();

        store
            .record_command(&first, &CommandResult::accepted(&first, CommandOutcome::Done), now)
            .expect("record");
        store
            .record_command(&first, &CommandResult::accepted(&first, CommandOutcome::Done), now)
            .expect("replay");
        store
            .record_command(&second, &CommandResult::accepted(&second, CommandOutcome::Done), now)
            .expect("record");

        let entries = store.recent_commands(10).expect("list");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command.command_id, "c2");
        assert_eq!(entries[1].command.command_id, "c1");
        assert_eq!(store.recent_commands(1).expect("list").len(), 1);
    }

    #[test]
    fn audit_rows_hold_no_plaintext_secrets() {
        let mut store = SqliteKvStore::open_in_memory().expect("open");
        let rotate = Command::new(
            "rotate",
            "student:2",
            CommandPayload::ChangePassword {
                current_secret: "Pythagore-1".to_string(),
                new_secret: "Thales-2".to_string(),
            },
        );
        store
            .record_command(&rotate, &CommandResult::accepted(&rotate, CommandOutcome::Done), Utc::now())
            .expect("record");

        let raw: String = store
            .conn
            .query_row("SELECT command_json FROM commands", [], |row| row.get(0))
            .expect("row");
        assert!(!raw.contains("Pythagore-1"));
        assert!(!raw.contains("Thales-2"));
        assert!(raw.contains(contracts::REDACTED_SECRET));
    }
}
