//! Coin balance mutations with solvency checks, and the journal of every movement.

use chrono::{DateTime, Utc};
use contracts::{Account, ShopItem};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LedgerCause {
    Purchase,
    Wager,
    WagerRefund,
    DuelPayout,
    PracticeDuel,
    EntryFee,
    GuildCreation,
    MissionReward,
    DailyMission,
    ChapterReward,
    QuizReward,
    ChallengeReward,
    AdminBonus,
    ProgressReset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub entry_id: String,
    pub account_id: String,
    pub delta: i64,
    pub balance_after: u64,
    pub cause: LedgerCause,
    pub reference: Option<String>,
    pub at: DateTime<Utc>,
}

pub fn ensure_funds(account: &Account, cost: u64) -> EngineResult<()> {
    if account.coins < cost {
        return Err(EngineError::InsufficientFunds {
            required: cost,
            available: account.coins,
        });
    }
    Ok(())
}

pub fn debit(account: &mut Account, amount: u64) -> EngineResult<()> {
    ensure_funds(account, amount)?;
    account.coins -= amount;
    Ok(())
}

pub fn credit(account: &mut Account, amount: u64) {
    account.coins = account.coins.saturating_add(amount);
}

/// Debits at most `amount`, never below zero. Returns what was actually taken.
pub fn debit_clamped(account: &mut Account, amount: u64) -> u64 {
    let taken = amount.min(account.coins);
    account.coins -= taken;
    taken
}

/// Buys `item` for `account`. Ownership and price are checked before anything
/// changes; the item is owned but not equipped afterwards.
pub fn purchase(account: &mut Account, item: &ShopItem) -> EngineResult<()> {
    if !item.purchasable {
        return Err(EngineError::InvalidTarget(format!(
            "item {} is not for sale",
            item.id
        )));
    }
    if account.owned_items.contains(&item.id) {
        return Err(EngineError::AlreadyOwned(item.id.clone()));
    }
    debit(account, item.price)?;
    account.owned_items.insert(item.id.clone());
    Ok(())
}

pub fn wager(account: &mut Account, amount: u64) -> EngineResult<()> {
    debit(account, amount)
}

pub fn pay_entry_fee(account: &mut Account, amount: u64) -> EngineResult<()> {
    debit(account, amount)
}

pub fn grant(account: &mut Account, amount: u64) {
    credit(account, amount);
}

/// Append-only journal of committed coin movements.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EconomyLedger {
    pub entries: Vec<LedgerEntry>,
}

impl EconomyLedger {
    pub fn record(
        &mut self,
        account_id: &str,
        delta: i64,
        balance_after: u64,
        cause: LedgerCause,
        reference: Option<&str>,
        at: DateTime<Utc>,
    ) -> String {
        let entry_id = format!("ledger:{}", self.entries.len() + 1);
        self.entries.push(LedgerEntry {
            entry_id: entry_id.clone(),
            account_id: account_id.to_string(),
            delta,
            balance_after,
            cause,
            reference: reference.map(str::to_string),
            at,
        });
        entry_id
    }

    pub fn entries_for<'a>(&'a self, account_id: &'a str) -> impl Iterator<Item = &'a LedgerEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.account_id == account_id)
    }

    pub fn net_for(&self, account_id: &str) -> i64 {
        self.entries_for(account_id).map(|entry| entry.delta).sum()
    }

    pub fn forget_account(&mut self, account_id: &str) {
        self.entries.retain(|entry| entry.account_id != account_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{Role, ShopItemType};

    fn account_with(coins: u64) -> Account {
        let mut account = Account::new("a", "a", "A", Role::Student, "h", Utc::now());
        account.coins = coins;
        account
    }

    fn item(price: u64) -> ShopItem {
        ShopItem {
            id: "item1".to_string(),
            name: "Avatar".to_string(),
            item_type: ShopItemType::Avatar,
            price,
            theme_id: None,
            purchasable: true,
        }
    }

    #[test]
    fn rejects_purchase_without_funds() {
        let mut account = account_with(40);
        let before = account.clone();
        let err = purchase(&mut account, &item(50)).expect_err("should fail");
        assert!(matches!(err, EngineError::InsufficientFunds { required: 50, available: 40 }));
        assert_eq!(account, before);
    }

    #[test]
    fn purchase_records_ownership_without_equipping() {
        let mut account = account_with(120);
        purchase(&mut account, &item(100)).expect("purchase succeeds");
        assert_eq!(account.coins, 20);
        assert!(account.owned_items.contains("item1"));
        assert_eq!(account.equipped.avatar_id, None);

        let err = purchase(&mut account, &item(0)).expect_err("already owned");
        assert_eq!(err, EngineError::AlreadyOwned("item1".to_string()));
    }

    #[test]
    fn clamped_debit_stops_at_zero() {
        let mut account = account_with(15);
        assert_eq!(debit_clamped(&mut account, 20), 15);
        assert_eq!(account.coins, 0);
    }

    #[test]
    fn ledger_nets_per_account() {
        let mut ledger = EconomyLedger::default();
        let now = Utc::now();
        ledger.record("a", -100, 20, LedgerCause::Purchase, Some("item1"), now);
        ledger.record("a", 50, 70, LedgerCause::DuelPayout, None, now);
        ledger.record("b", 10, 10, LedgerCause::QuizReward, None, now);
        assert_eq!(ledger.net_for("a"), -50);
        assert_eq!(ledger.entries_for("b").count(), 1);
    }
}
