//! Account-state engine: progression, rule evaluation, economy, social state
//! machines, and adaptive analytics over a versioned Account Store.

pub mod analytics;
pub mod catalog;
pub mod economy;
pub mod engine;
pub mod error;
pub mod guild;
pub mod notify;
pub mod progression;
pub mod rules;
pub mod social;
pub mod store;
pub mod window;

pub use catalog::default_catalogs;
pub use economy::{EconomyLedger, LedgerCause, LedgerEntry};
pub use engine::{hash_secret, AccountEngine};
pub use error::{EngineError, EngineResult};
pub use guild::{GuildRegistry, LeaveOutcome};
pub use notify::{NotificationSink, Outbox, TracingSink};
pub use progression::{apply_xp, ProgressEvent, XpOutcome};
pub use rules::{evaluate, Evaluation, Unlock};
pub use store::{
    AccountStore, KeyValueStore, MemoryStore, SessionView, StoreError, StoreResult,
};
pub use window::{day_id, week_id, Clock, ManualClock, SystemClock, Windows};
