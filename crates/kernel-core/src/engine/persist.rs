//! Flushing engine state to a [`KeyValueStore`] and restoring it.

use contracts::{Account, Catalogs, EngineSettings};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AccountEngine;
use crate::catalog::default_catalogs;
use crate::economy::EconomyLedger;
use crate::guild::GuildRegistry;
use crate::social::{DuelBoard, FriendBook, MessageBoard};
use crate::store::{self, AccountStore, KeyValueStore, StoreResult};

/// Active duels and pending challenges share one board in memory but live in
/// two durable collections.
#[derive(Serialize, Deserialize)]
struct DuelHalves {
    challenges: serde_json::Value,
    active: serde_json::Value,
}

impl AccountEngine {
    /// Writes every collection changed since the last flush. A key is only
    /// marked clean once its write succeeds, so a failed flush is retried in
    /// full on the next call.
    pub fn flush_to(&mut self, target: &mut dyn KeyValueStore) -> StoreResult<usize> {
        let pending = self.dirty.iter().copied().collect::<Vec<_>>();
        let mut written = 0;
        for key in pending {
            self.write_collection(target, key)?;
            self.dirty.remove(key);
            written += 1;
        }
        if written > 0 {
            debug!(collections = written, "engine state flushed");
        }
        Ok(written)
    }

    fn write_collection(&self, target: &mut dyn KeyValueStore, key: &str) -> StoreResult<()> {
        match key {
            store::ACCOUNTS_KEY => store::save_json(target, key, &self.accounts.to_vec()),
            store::FRIEND_REQUESTS_KEY => store::save_json(target, key, &self.friends),
            store::DUEL_CHALLENGES_KEY | store::ACTIVE_DUELS_KEY => {
                let halves = self.duel_halves()?;
                if key == store::DUEL_CHALLENGES_KEY {
                    store::save_json(target, key, &halves.challenges)
                } else {
                    store::save_json(target, key, &halves.active)
                }
            }
            store::GUILDS_KEY => store::save_json(target, key, &self.guilds),
            store::CONVERSATIONS_KEY => store::save_json(target, key, &self.messages),
            store::LEDGER_KEY => store::save_json(target, key, &self.ledger),
            store::SETTINGS_KEY => store::save_json(target, key, &self.settings),
            store::CATALOGS_KEY => store::save_json(target, key, &self.catalogs),
            store::SEQUENCE_KEY => store::save_json(target, key, &self.sequence),
            other => Err(store::StoreError::Backend(format!(
                "unknown collection {other}"
            ))),
        }
    }

    fn duel_halves(&self) -> StoreResult<DuelHalves> {
        let mut board = serde_json::to_value(&self.duels)?;
        Ok(DuelHalves {
            challenges: board
                .get_mut("challenges")
                .map(serde_json::Value::take)
                .unwrap_or_default(),
            active: board
                .get_mut("active")
                .map(serde_json::Value::take)
                .unwrap_or_default(),
        })
    }

    /// Rebuilds an engine from `source`. Missing collections start empty;
    /// missing settings and catalogs fall back to the ones given. A store with
    /// no accounts yields an engine with every collection still dirty.
    pub fn restore_from(
        settings: EngineSettings,
        catalogs: Option<Catalogs>,
        source: &dyn KeyValueStore,
    ) -> StoreResult<Self> {
        let settings = store::load_json(source, store::SETTINGS_KEY)?.unwrap_or(settings);
        let catalogs = match store::load_json(source, store::CATALOGS_KEY)? {
            Some(stored) => stored,
            None => catalogs.unwrap_or_else(default_catalogs),
        };
        let mut engine = Self::new(settings, catalogs);

        let accounts: Option<Vec<Account>> = store::load_json(source, store::ACCOUNTS_KEY)?;
        let fresh = accounts.is_none();
        engine.accounts = AccountStore::from_accounts(accounts.unwrap_or_default());
        engine.friends =
            store::load_json::<_, FriendBook>(source, store::FRIEND_REQUESTS_KEY)?.unwrap_or_default();
        engine.duels = Self::load_duels(source)?;
        engine.guilds =
            store::load_json::<_, GuildRegistry>(source, store::GUILDS_KEY)?.unwrap_or_default();
        engine.messages = store::load_json::<_, MessageBoard>(source, store::CONVERSATIONS_KEY)?
            .unwrap_or_default();
        engine.ledger =
            store::load_json::<_, EconomyLedger>(source, store::LEDGER_KEY)?.unwrap_or_default();
        engine.sequence = store::load_json(source, store::SEQUENCE_KEY)?.unwrap_or(0);
        if !fresh {
            engine.dirty.clear();
        }

        info!(
            accounts = engine.accounts.len(),
            guilds = engine.guilds.len(),
            sequence = engine.sequence,
            "engine state restored"
        );
        Ok(engine)
    }

    fn load_duels(source: &dyn KeyValueStore) -> StoreResult<DuelBoard> {
        let challenges: Option<serde_json::Value> =
            store::load_json(source, store::DUEL_CHALLENGES_KEY)?;
        let active: Option<serde_json::Value> = store::load_json(source, store::ACTIVE_DUELS_KEY)?;
        if challenges.is_none() && active.is_none() {
            return Ok(DuelBoard::default());
        }
        let halves = DuelHalves {
            challenges: challenges.unwrap_or_else(|| serde_json::json!({})),
            active: active.unwrap_or_else(|| serde_json::json!({})),
        };
        Ok(serde_json::from_value(serde_json::to_value(halves)?)?)
    }
}
