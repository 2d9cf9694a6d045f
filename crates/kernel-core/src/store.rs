//! The Account Store, the session pointer into it, and the durable key-value
//! collaborator state is flushed to.

use std::collections::BTreeMap;

use contracts::Account;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Durable key-value store
// ---------------------------------------------------------------------------

pub const ACCOUNTS_KEY: &str = "accounts";
pub const FRIEND_REQUESTS_KEY: &str = "friend_requests";
pub const DUEL_CHALLENGES_KEY: &str = "duel_challenges";
pub const ACTIVE_DUELS_KEY: &str = "active_duels";
pub const GUILDS_KEY: &str = "guilds";
pub const CONVERSATIONS_KEY: &str = "conversations";
pub const LEDGER_KEY: &str = "ledger";
pub const SETTINGS_KEY: &str = "settings";
pub const CATALOGS_KEY: &str = "catalogs";
pub const SEQUENCE_KEY: &str = "sequence";

pub const ALL_COLLECTIONS: [&str; 10] = [
    ACCOUNTS_KEY,
    FRIEND_REQUESTS_KEY,
    DUEL_CHALLENGES_KEY,
    ACTIVE_DUELS_KEY,
    GUILDS_KEY,
    CONVERSATIONS_KEY,
    LEDGER_KEY,
    SETTINGS_KEY,
    CATALOGS_KEY,
    SEQUENCE_KEY,
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A durable map from logical collection name to a JSON document.
pub trait KeyValueStore {
    fn load(&self, key: &str) -> StoreResult<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> StoreResult<()>;
}

pub fn save_json<S, T>(store: &mut S, key: &str, value: &T) -> StoreResult<()>
where
    S: KeyValueStore + ?Sized,
    T: Serialize,
{
    let encoded = serde_json::to_string(value)?;
    store.save(key, &encoded)
}

pub fn load_json<S, T>(store: &S, key: &str) -> StoreResult<Option<T>>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    match store.load(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls seen so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.writes += 1;
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Account Store
// ---------------------------------------------------------------------------

/// Single source of truth for every account, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountStore {
    accounts: BTreeMap<String, Account>,
}

impl AccountStore {
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|account| (account.account_id.clone(), account))
                .collect(),
        }
    }

    pub fn get(&self, account_id: &str) -> EngineResult<&Account> {
        self.accounts
            .get(account_id)
            .ok_or_else(|| EngineError::not_found("account", account_id))
    }

    pub fn contains(&self, account_id: &str) -> bool {
        self.accounts.contains_key(account_id)
    }

    pub fn find_by_username(&self, username: &str) -> Option<&Account> {
        self.accounts
            .values()
            .find(|account| account.username.eq_ignore_ascii_case(username))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn insert_new(&mut self, account: Account) -> EngineResult<()> {
        if self.accounts.contains_key(&account.account_id) {
            return Err(EngineError::already_exists("account", account.account_id));
        }
        if self.find_by_username(&account.username).is_some() {
            return Err(EngineError::already_exists("username", account.username));
        }
        self.accounts.insert(account.account_id.clone(), account);
        Ok(())
    }

    /// Fails with `Conflict` unless the stored version still equals `expected`.
    pub fn check_version(&self, account_id: &str, expected: u64) -> EngineResult<()> {
        let found = self.get(account_id)?.version;
        if found != expected {
            return Err(EngineError::Conflict {
                account_id: account_id.to_string(),
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Compare-and-swap write: `account.version` must match the stored version.
    /// The stored copy ends up one version ahead.
    pub fn commit(&mut self, mut account: Account) -> EngineResult<u64> {
        self.check_version(&account.account_id, account.version)?;
        account.version += 1;
        let version = account.version;
        self.accounts.insert(account.account_id.clone(), account);
        Ok(version)
    }

    pub fn remove(&mut self, account_id: &str) -> EngineResult<Account> {
        self.accounts
            .remove(account_id)
            .ok_or_else(|| EngineError::not_found("account", account_id))
    }

    pub fn to_vec(&self) -> Vec<Account> {
        self.accounts.values().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Session View
// ---------------------------------------------------------------------------

/// The authenticated account, held as an id and resolved against the store on
/// every read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    account_id: Option<String>,
}

impl SessionView {
    pub fn signed_in(account_id: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
        }
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn sign_out(&mut self) {
        self.account_id = None;
    }

    pub fn resolve<'a>(&self, store: &'a AccountStore) -> EngineResult<&'a Account> {
        let account_id = self
            .account_id
            .as_deref()
            .ok_or_else(|| EngineError::Unauthorized("no active session".to_string()))?;
        store.get(account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::Role;

    fn account(id: &str) -> Account {
        Account::new(id, id, id, Role::Student, "h", Utc::now())
    }

    #[test]
    fn commit_rejects_stale_version() {
        let mut store = AccountStore::default();
        store.insert_new(account("a")).expect("insert");

        let mut first = store.get("a").expect("exists").clone();
        let stale = first.clone();
        first.coins = 10;
        assert_eq!(store.commit(first).expect("fresh commit"), 1);

        let err = store.commit(stale).expect_err("stale commit");
        assert_eq!(
            err,
            EngineError::Conflict {
                account_id: "a".to_string(),
                expected: 0,
                found: 1
            }
        );
        assert_eq!(store.get("a").expect("exists").coins, 10);
    }

    #[test]
    fn usernames_are_unique() {
        let mut store = AccountStore::default();
        store.insert_new(account("a")).expect("insert");
        let mut twin = account("b");
        twin.username = "A".to_string();
        assert!(matches!(
            store.insert_new(twin),
            Err(EngineError::AlreadyExists { entity: "username", .. })
        ));
    }

    #[test]
    fn session_resolves_through_the_store() {
        let mut store = AccountStore::default();
        store.insert_new(account("a")).expect("insert");
        let mut session = SessionView::signed_in("a");
        assert_eq!(session.resolve(&store).expect("resolves").account_id, "a");

        session.sign_out();
        assert!(matches!(
            session.resolve(&store),
            Err(EngineError::Unauthorized(_))
        ));
    }

    #[test]
    fn json_helpers_round_trip_through_memory_store() {
        let mut store = MemoryStore::new();
        save_json(&mut store, ACCOUNTS_KEY, &vec![account("a")]).expect("save");
        let loaded: Vec<Account> = load_json(&store, ACCOUNTS_KEY)
            .expect("load")
            .expect("present");
        assert_eq!(loaded[0].account_id, "a");
        assert_eq!(store.writes(), 1);
        assert!(load_json::<_, Vec<Account>>(&store, GUILDS_KEY)
            .expect("load")
            .is_none());
    }
}
