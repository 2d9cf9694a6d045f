//! Transient social entities and guild records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relation of account A to account B, seen from A.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FriendRelation {
    None,
    RequestSent,
    RequestReceived,
    Friends,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendRequest {
    pub request_id: String,
    pub from_account_id: String,
    pub to_account_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelChallenge {
    pub challenge_id: String,
    pub from_account_id: String,
    pub to_account_id: String,
    pub wager: u64,
    pub created_at: DateTime<Utc>,
    /// True when the challenger's wager was debited at send time.
    #[serde(default)]
    pub escrowed: bool,
}

/// An accepted challenge waiting for its result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveDuel {
    pub duel_id: String,
    pub challenger_id: String,
    pub opponent_id: String,
    pub wager: u64,
    pub accepted_at: DateTime<Utc>,
    #[serde(default)]
    pub escrowed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Accepted,
    Declined,
    AutoDeclined,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeResolution {
    pub challenge_id: String,
    pub status: ChallengeStatus,
    pub duel: Option<ActiveDuel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelSettlement {
    pub duel_id: String,
    pub winner_id: Option<String>,
    pub loser_id: Option<String>,
    /// Coins actually moved to the winner.
    pub paid: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Guild {
    pub guild_id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub chef_id: String,
    /// Join order; the first entry after the chef inherits leadership.
    pub member_ids: Vec<String>,
    pub max_members: usize,
    pub level: u32,
    pub created_at: DateTime<Utc>,
}

impl Guild {
    pub fn is_full(&self) -> bool {
        self.member_ids.len() >= self.max_members
    }

    pub fn has_member(&self, account_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == account_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrivateMessage {
    pub message_id: String,
    pub from_account_id: String,
    pub to_account_id: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}
