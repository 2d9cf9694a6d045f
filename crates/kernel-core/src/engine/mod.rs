//! `AccountEngine`: every account operation, executed as one all-or-nothing step.
//!
//! An operation checks out working copies of the accounts it touches into a
//! [`Txn`], validates and mutates those copies, and hands the transaction to
//! [`AccountEngine::commit`]. Commit runs the rule evaluator on each touched
//! student, compare-and-swaps every copy into the store, journals coin moves,
//! and only then delivers notifications. A rejected operation returns before
//! commit and leaves the engine untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use contracts::{
    Account, ActivityEntry, ActivityKind, Catalogs, EngineSettings, IssuedCredentials,
    Notification, Role,
};
use tracing::{debug, info};

use crate::economy::{self, EconomyLedger, LedgerCause};
use crate::error::{EngineError, EngineResult};
use crate::guild::GuildRegistry;
use crate::notify::{NotificationSink, TracingSink};
use crate::progression::{self, ProgressEvent, XpOutcome};
use crate::rules::{self, Unlock};
use crate::social::{DuelBoard, FriendBook, MessageBoard};
use crate::store::{self, AccountStore};
use crate::window::{Clock, SystemClock, Windows};

mod admin;
mod auth;
mod challenge;
mod commands;
mod content;
mod duels;
mod friends;
mod guilds;
mod persist;
mod progress;
mod revision;
mod shop;


pub use auth::hash_secret;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CoinMove {
    account_id: String,
    delta: i64,
    balance_after: u64,
    cause: LedgerCause,
    reference: Option<String>,
}

/// Working copies and side effects of one in-flight operation.
#[derive(Debug)]
pub(crate) struct Txn {
    windows: Windows,
    working: BTreeMap<String, Account>,
    created: BTreeSet<String>,
    removed: BTreeSet<String>,
    notes: Vec<Notification>,
    coin_moves: Vec<CoinMove>,
}

impl Txn {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            windows: Windows::at(now),
            working: BTreeMap::new(),
            created: BTreeSet::new(),
            removed: BTreeSet::new(),
            notes: Vec::new(),
            coin_moves: Vec::new(),
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.windows.now
    }

    fn working_mut(&mut self, account_id: &str) -> EngineResult<&mut Account> {
        self.working
            .get_mut(account_id)
            .ok_or_else(|| EngineError::not_found("account", account_id))
    }

    /// Adds a brand-new account to the transaction.
    fn create(&mut self, account: Account) {
        self.created.insert(account.account_id.clone());
        self.working.insert(account.account_id.clone(), account);
    }

    fn remove(&mut self, account_id: &str) {
        self.working.remove(account_id);
        self.removed.insert(account_id.to_string());
    }

    fn notify(&mut self, account_id: &str, message: impl Into<String>) {
        self.notes.push(Notification {
            account_id: account_id.to_string(),
            message: message.into(),
            at: self.windows.now,
        });
    }

    /// Debits a checked-out account. Fails without side effects when short.
    fn debit(
        &mut self,
        account_id: &str,
        amount: u64,
        cause: LedgerCause,
        reference: Option<&str>,
    ) -> EngineResult<()> {
        let account = self.working_mut(account_id)?;
        economy::debit(account, amount)?;
        let balance_after = account.coins;
        self.record_move(account_id, -(amount as i64), balance_after, cause, reference);
        Ok(())
    }

    /// Debits at most `amount` and returns what was taken.
    fn debit_clamped(
        &mut self,
        account_id: &str,
        amount: u64,
        cause: LedgerCause,
        reference: Option<&str>,
    ) -> EngineResult<u64> {
        let account = self.working_mut(account_id)?;
        let taken = economy::debit_clamped(account, amount);
        let balance_after = account.coins;
        self.record_move(account_id, -(taken as i64), balance_after, cause, reference);
        Ok(taken)
    }

    fn credit(
        &mut self,
        account_id: &str,
        amount: u64,
        cause: LedgerCause,
        reference: Option<&str>,
    ) -> EngineResult<()> {
        let account = self.working_mut(account_id)?;
        economy::grant(account, amount);
        let balance_after = account.coins;
        self.record_move(account_id, amount as i64, balance_after, cause, reference);
        Ok(())
    }

    fn record_move(
        &mut self,
        account_id: &str,
        delta: i64,
        balance_after: u64,
        cause: LedgerCause,
        reference: Option<&str>,
    ) {
        if delta == 0 {
            return;
        }
        self.coin_moves.push(CoinMove {
            account_id: account_id.to_string(),
            delta,
            balance_after,
            cause,
            reference: reference.map(str::to_string),
        });
    }
}

pub(crate) fn push_activity(
    account: &mut Account,
    kind: ActivityKind,
    message: String,
    at: DateTime<Utc>,
    limit: usize,
) {
    account.activity.insert(0, ActivityEntry { kind, message, at });
    account.activity.truncate(limit);
}

fn describe_progress(event: &ProgressEvent, grades: &[contracts::Grade]) -> (ActivityKind, String) {
    match event {
        ProgressEvent::LevelUp { level, grade_index } => {
            let grade = grades
                .get(*grade_index)
                .map(|grade| grade.name.as_str())
                .unwrap_or("?");
            (
                ActivityKind::LevelUp,
                format!("🚀 Niveau {level} atteint ({grade}) !"),
            )
        }
        ProgressEvent::Promotion { grade_name, .. } => (
            ActivityKind::Promotion,
            format!("🎓 Promotion au grade {grade_name} !"),
        ),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AccountEngine {
    settings: EngineSettings,
    catalogs: Catalogs,
    accounts: AccountStore,
    friends: FriendBook,
    duels: DuelBoard,
    guilds: GuildRegistry,
    messages: MessageBoard,
    ledger: EconomyLedger,
    sequence: u64,
    clock: Arc<dyn Clock>,
    sink: Box<dyn NotificationSink>,
    dirty: BTreeSet<&'static str>,
}

impl AccountEngine {
    pub fn new(settings: EngineSettings, catalogs: Catalogs) -> Self {
        Self {
            settings,
            catalogs,
            accounts: AccountStore::default(),
            friends: FriendBook::default(),
            duels: DuelBoard::default(),
            guilds: GuildRegistry::default(),
            messages: MessageBoard::default(),
            ledger: EconomyLedger::default(),
            sequence: 0,
            clock: Arc::new(SystemClock),
            sink: Box::new(TracingSink),
            dirty: store::ALL_COLLECTIONS.into_iter().collect(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn set_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sink = sink;
    }

    // ---- read access ----

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn account(&self, account_id: &str) -> EngineResult<&Account> {
        self.accounts.get(account_id)
    }

    pub fn friend_book(&self) -> &FriendBook {
        &self.friends
    }

    pub fn duel_board(&self) -> &DuelBoard {
        &self.duels
    }

    pub fn guilds(&self) -> &GuildRegistry {
        &self.guilds
    }

    pub fn messages(&self) -> &MessageBoard {
        &self.messages
    }

    pub fn ledger(&self) -> &EconomyLedger {
        &self.ledger
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    // ---- bootstrap ----

    /// Creates the configured administrator when the store holds no account.
    pub fn bootstrap(&mut self) -> EngineResult<Option<IssuedCredentials>> {
        if !self.accounts.is_empty() {
            return Ok(None);
        }
        let account_id = self.next_id("admin");
        let secret = self.settings.bootstrap_admin_secret.clone();
        let username = self.settings.bootstrap_admin_username.clone();
        let mut txn = self.begin();
        let account = Account::new(
            account_id.as_str(),
            username.as_str(),
            "Administrateur",
            Role::Admin,
            hash_secret(&account_id, &secret),
            txn.now(),
        );
        txn.create(account);
        self.commit(txn)?;
        info!(%account_id, %username, "bootstrap administrator created");
        Ok(Some(IssuedCredentials {
            account_id,
            username,
            secret,
        }))
    }

    // ---- transaction plumbing ----

    fn begin(&self) -> Txn {
        Txn::new(self.clock.now())
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        self.dirty.insert(store::SEQUENCE_KEY);
        format!("{prefix}:{}", self.sequence)
    }

    fn mark_dirty(&mut self, key: &'static str) {
        self.dirty.insert(key);
    }

    /// Brings `account_id` into the transaction, cloning the committed copy on
    /// first use.
    fn checkout<'t>(&self, txn: &'t mut Txn, account_id: &str) -> EngineResult<&'t mut Account> {
        if txn.removed.contains(account_id) {
            return Err(EngineError::not_found("account", account_id));
        }
        if !txn.working.contains_key(account_id) {
            let account = self.accounts.get(account_id)?.clone();
            txn.working.insert(account_id.to_string(), account);
        }
        txn.working_mut(account_id)
    }

    fn require_staff(&self, actor_id: &str) -> EngineResult<&Account> {
        let actor = self.accounts.get(actor_id)?;
        if !actor.role.is_staff() {
            return Err(EngineError::Unauthorized(format!(
                "{actor_id} is not a teacher or administrator"
            )));
        }
        Ok(actor)
    }

    fn require_admin(&self, actor_id: &str) -> EngineResult<&Account> {
        let actor = self.accounts.get(actor_id)?;
        if actor.role != Role::Admin {
            return Err(EngineError::Unauthorized(format!(
                "{actor_id} is not an administrator"
            )));
        }
        Ok(actor)
    }

    /// Applies XP through the progression ladder and logs each level-up and
    /// promotion on the account.
    fn award_xp(&self, txn: &mut Txn, account_id: &str, amount: u64) -> EngineResult<XpOutcome> {
        let now = txn.now();
        let limit = self.settings.activity_history_limit;
        let grades = &self.catalogs.grades;
        let account = self.checkout(txn, account_id)?;
        let outcome = progression::apply_xp(account.progress, amount, grades);
        account.progress = outcome.progress;

        let mut messages = Vec::with_capacity(outcome.events.len());
        for event in &outcome.events {
            let (kind, message) = describe_progress(event, grades);
            push_activity(account, kind, message.clone(), now, limit);
            messages.push(message);
        }
        for message in messages {
            txn.notify(account_id, message);
        }
        Ok(outcome)
    }

    /// Writes the transaction back. Rule evaluation runs here on every touched
    /// student so unlocks always see the post-mutation account.
    fn commit(&mut self, txn: Txn) -> EngineResult<()> {
        let Txn {
            windows,
            mut working,
            created,
            removed,
            mut notes,
            mut coin_moves,
        } = txn;
        let limit = self.settings.activity_history_limit;
        let touched = !working.is_empty() || !removed.is_empty();

        for account in working.values_mut() {
            if !account.is_student() {
                continue;
            }
            let evaluation = rules::evaluate(account, &self.catalogs);
            if evaluation.is_empty() {
                continue;
            }
            for event in &evaluation.progress_events {
                let (kind, message) = describe_progress(event, &self.catalogs.grades);
                push_activity(account, kind, message.clone(), windows.now, limit);
                notes.push(Notification {
                    account_id: account.account_id.clone(),
                    message,
                    at: windows.now,
                });
            }
            for unlock in &evaluation.unlocks {
                if let Unlock::Mission {
                    id, reward_coins, ..
                } = unlock
                {
                    if *reward_coins > 0 {
                        coin_moves.push(CoinMove {
                            account_id: account.account_id.clone(),
                            delta: *reward_coins as i64,
                            balance_after: account.coins,
                            cause: LedgerCause::MissionReward,
                            reference: Some(id.clone()),
                        });
                    }
                }
                notes.push(Notification {
                    account_id: account.account_id.clone(),
                    message: unlock.describe(),
                    at: windows.now,
                });
            }
        }

        for (account_id, account) in &working {
            if !created.contains(account_id) {
                self.accounts.check_version(account_id, account.version)?;
            }
        }
        for account_id in &removed {
            if !created.contains(account_id) {
                self.accounts.get(account_id)?;
            }
        }

        for (account_id, account) in working {
            if created.contains(&account_id) {
                self.accounts.insert_new(account)?;
            } else {
                self.accounts.commit(account)?;
            }
        }
        for account_id in &removed {
            self.accounts.remove(account_id)?;
        }
        if touched {
            self.mark_dirty(store::ACCOUNTS_KEY);
        }

        if !coin_moves.is_empty() {
            for coin_move in coin_moves {
                self.ledger.record(
                    &coin_move.account_id,
                    coin_move.delta,
                    coin_move.balance_after,
                    coin_move.cause,
                    coin_move.reference.as_deref(),
                    windows.now,
                );
            }
            self.mark_dirty(store::LEDGER_KEY);
        }

        debug!(notifications = notes.len(), day = %windows.day, "transaction committed");
        for note in notes {
            self.sink.notify(note);
        }
        Ok(())
    }
}
