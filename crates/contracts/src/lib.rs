//! v1 cross-boundary contracts for the account engine, API facade, persistence, and CLI.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod account;
pub mod catalog;
pub mod insight;
pub mod social;

pub use account::*;
pub use catalog::*;
pub use insight::*;
pub use social::*;

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Quiz id reserved for the generated adaptive review quiz.
pub const REVIEW_QUIZ_ID: &str = "review_quiz";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuelWagerPolicy {
    /// Balance is checked at send time and again at accept time; nothing is reserved.
    #[default]
    RevalidateAtAccept,
    /// Both wagers are debited up front and paid out on settlement or refunded on decline.
    EscrowAtSend,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeRewardTier {
    pub min_score: u32,
    pub xp: u64,
    pub coins: u64,
}

/// Tunable economy and progression knobs. Every field has a default so a partial
/// TOML file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub schema_version: String,
    pub app_name: String,
    pub starting_coins_student: u64,
    pub quiz_completion_xp: u64,
    pub quiz_completion_coins: u64,
    pub perfect_quiz_bonus_xp: u64,
    pub max_daily_duels: u32,
    pub duel_win_coins: u64,
    pub duel_loss_coins: u64,
    pub duel_wager_policy: DuelWagerPolicy,
    pub guild_creation_cost: u64,
    pub guild_max_members: usize,
    pub challenge_entry_fee: u64,
    pub challenge_question_count: u32,
    /// Ordered from the best tier down; the first tier whose `min_score` is met pays out.
    pub challenge_reward_tiers: Vec<ChallengeRewardTier>,
    pub activity_history_limit: usize,
    pub duel_history_limit: usize,
    pub password_reset_frequency_days: i64,
    pub review_quiz_size: usize,
    pub review_quiz_min_questions: usize,
    pub unseen_question_weight: f64,
    pub bootstrap_admin_username: String,
    pub bootstrap_admin_secret: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            app_name: "GOAT of Maths".to_string(),
            starting_coins_student: 50,
            quiz_completion_xp: 50,
            quiz_completion_coins: 20,
            perfect_quiz_bonus_xp: 50,
            max_daily_duels: 5,
            duel_win_coins: 50,
            duel_loss_coins: 20,
            duel_wager_policy: DuelWagerPolicy::default(),
            guild_creation_cost: 750,
            guild_max_members: 10,
            challenge_entry_fee: 100,
            challenge_question_count: 10,
            challenge_reward_tiers: vec![
                ChallengeRewardTier {
                    min_score: 10,
                    xp: 1000,
                    coins: 500,
                },
                ChallengeRewardTier {
                    min_score: 8,
                    xp: 500,
                    coins: 250,
                },
                ChallengeRewardTier {
                    min_score: 5,
                    xp: 200,
                    coins: 100,
                },
            ],
            activity_history_limit: 5,
            duel_history_limit: 5,
            password_reset_frequency_days: 90,
            review_quiz_size: 10,
            review_quiz_min_questions: 5,
            unseen_question_weight: 0.5,
            bootstrap_admin_username: "admin".to_string(),
            bootstrap_admin_secret: "admin123".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Unauthorized,
    InsufficientFunds,
    AlreadyOwned,
    AlreadyExists,
    AlreadyInGuild,
    DuplicateRequest,
    InvalidTarget,
    GuildFull,
    LimitExceeded,
    VersionConflict,
    InvalidCommand,
    InvalidQuery,
    ContractVersionUnsupported,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.error_code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Portal {
    Student,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerRecord {
    pub question_id: String,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandPayload {
    ApplyXp {
        amount: u64,
    },
    CompleteMission {
        mission_id: String,
    },
    CompleteDailyMission {
        mission_id: String,
    },
    ConsultChapter {
        chapter_id: String,
    },
    CompleteQuiz {
        quiz_id: String,
        answers: Vec<AnswerRecord>,
    },
    RecordAnswer {
        question_id: String,
        correct: bool,
    },
    Purchase {
        item_id: String,
    },
    Equip {
        item_id: String,
    },
    SendFriendRequest {
        to_account_id: String,
    },
    HandleFriendRequest {
        request_id: String,
        accept: bool,
    },
    RemoveFriend {
        friend_id: String,
    },
    SendDuelChallenge {
        to_account_id: String,
        wager: u64,
    },
    HandleDuelChallenge {
        challenge_id: String,
        accept: bool,
    },
    CompleteDuel {
        result: DuelResult,
        my_score: u32,
        opponent_score: u32,
        opponent_name: String,
    },
    SettleDuel {
        duel_id: String,
        challenger_score: u32,
        opponent_score: u32,
    },
    CreateGuild {
        name: String,
        emoji: String,
        description: String,
    },
    JoinGuild {
        guild_id: String,
    },
    LeaveGuild,
    StartWeeklyChallenge,
    CompleteWeeklyChallenge {
        score: u32,
        time_seconds: u32,
    },
    SaveMindMap {
        mind_map: MindMap,
    },
    DeleteMindMap {
        mind_map_id: String,
    },
    SendPrivateMessage {
        to_account_id: String,
        text: String,
    },
    MarkWelcomeSeen,
    ChangePassword {
        current_secret: String,
        new_secret: String,
    },
    ForceChangePassword {
        new_secret: String,
    },
    CreateStudent {
        display_name: String,
        classe: String,
        teacher_id: Option<String>,
    },
    CreateTeacher {
        display_name: String,
    },
    ResetPassword {
        account_id: String,
    },
    UpdateProfile {
        account_id: String,
        display_name: Option<String>,
        classe: Option<String>,
    },
    AddBonus {
        account_id: String,
        xp: u64,
        coins: u64,
    },
    DeleteAccount {
        account_id: String,
    },
    MuteAccount {
        account_id: String,
        hours: u32,
    },
    UnmuteAccount {
        account_id: String,
    },
    DisbandGuild {
        guild_id: String,
    },
    UpdateSettings {
        settings: EngineSettings,
    },
    ResetStudentProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    pub schema_version: String,
    pub command_id: String,
    pub actor_id: String,
    pub payload: CommandPayload,
}

impl Command {
    pub fn new(
        command_id: impl Into<String>,
        actor_id: impl Into<String>,
        payload: CommandPayload,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command_id.into(),
            actor_id: actor_id.into(),
            payload,
        }
    }
}

/// An account created or re-keyed by an administrator, with the one-time plaintext
/// secret to hand to its owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuedCredentials {
    pub account_id: String,
    pub username: String,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutcome {
    Account {
        account: Box<Account>,
    },
    FriendRequest {
        request: FriendRequest,
    },
    DuelChallenge {
        challenge: DuelChallenge,
    },
    DuelChallengeResolved {
        resolution: ChallengeResolution,
    },
    DuelSettled {
        settlement: DuelSettlement,
    },
    Guild {
        guild: Guild,
    },
    Message {
        message: PrivateMessage,
    },
    Credentials {
        credentials: IssuedCredentials,
    },
    Settings {
        settings: EngineSettings,
    },
    Affected {
        count: usize,
    },
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandResult {
    pub schema_version: String,
    pub command_id: String,
    pub accepted: bool,
    pub outcome: Option<CommandOutcome>,
    pub error: Option<ApiError>,
}

impl CommandResult {
    pub fn accepted(command: &Command, outcome: CommandOutcome) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command.command_id.clone(),
            accepted: true,
            outcome: Some(outcome),
            error: None,
        }
    }

    pub fn rejected(command: &Command, error: ApiError) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            command_id: command.command_id.clone(),
            accepted: false,
            outcome: None,
            error: Some(error),
        }
    }
}

/// Written over plaintext secrets in copies meant for storage or display.
pub const REDACTED_SECRET: &str = "[redacted]";

impl CommandPayload {
    /// Copy with every plaintext secret replaced by [`REDACTED_SECRET`].
    pub fn redacted(&self) -> Self {
        let mut payload = self.clone();
        match &mut payload {
            Self::ChangePassword {
                current_secret,
                new_secret,
            } => {
                *current_secret = REDACTED_SECRET.to_string();
                *new_secret = REDACTED_SECRET.to_string();
            }
            Self::ForceChangePassword { new_secret } => {
                *new_secret = REDACTED_SECRET.to_string();
            }
            Self::UpdateSettings { settings } => {
                settings.bootstrap_admin_secret = REDACTED_SECRET.to_string();
            }
            _ => {}
        }
        payload
    }
}

impl Command {
    pub fn redacted(&self) -> Self {
        Self {
            payload: self.payload.redacted(),
            ..self.clone()
        }
    }
}

impl CommandOutcome {
    /// Copy without issued secrets or secret digests.
    pub fn redacted(&self) -> Self {
        let mut outcome = self.clone();
        match &mut outcome {
            Self::Account { account } => account.credentials.secret_hash.clear(),
            Self::Credentials { credentials } => {
                credentials.secret = REDACTED_SECRET.to_string();
            }
            Self::Settings { settings } => {
                settings.bootstrap_admin_secret = REDACTED_SECRET.to_string();
            }
            _ => {}
        }
        outcome
    }
}

impl CommandResult {
    pub fn redacted(&self) -> Self {
        Self {
            outcome: self.outcome.as_ref().map(CommandOutcome::redacted),
            ..self.clone()
        }
    }
}

/// A user-visible toast. Not authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub account_id: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_payload_uses_snake_case_type_tag() {
        let payload = CommandPayload::Purchase {
            item_id: "item1".to_string(),
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["type"], "purchase");
        assert_eq!(value["item_id"], "item1");

        let unit = serde_json::to_value(CommandPayload::LeaveGuild).expect("serialize");
        assert_eq!(unit["type"], "leave_guild");
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{"max_daily_duels": 3}"#).expect("deserialize");
        assert_eq!(settings.max_daily_duels, 3);
        assert_eq!(settings.guild_creation_cost, 750);
        assert_eq!(settings.challenge_reward_tiers.len(), 3);
        assert_eq!(settings.duel_wager_policy, DuelWagerPolicy::RevalidateAtAccept);
    }

    #[test]
    fn redacted_copies_carry_no_secrets() {
        let change = Command::new(
            "c1",
            "student:2",
            CommandPayload::ChangePassword {
                current_secret: "old-one".to_string(),
                new_secret: "new-one".to_string(),
            },
        );
        let text = serde_json::to_string(&change.redacted()).expect("serialize");
        assert!(!text.contains("old-one"));
        assert!(!text.contains("new-one"));
        assert_eq!(change.redacted().command_id, "c1");

        let issued = CommandResult::accepted(
            &change,
            CommandOutcome::Credentials {
                credentials: IssuedCredentials {
                    account_id: "student:3".to_string(),
                    username: "lea.martin".to_string(),
                    secret: "x7Kq-91".to_string(),
                },
            },
        );
        let text = serde_json::to_string(&issued.redacted()).expect("serialize");
        assert!(!text.contains("x7Kq-91"));
        assert!(text.contains("lea.martin"));
    }

    #[test]
    fn error_codes_serialize_screaming_snake_case() {
        let value = serde_json::to_value(ErrorCode::InsufficientFunds).expect("serialize");
        assert_eq!(value, "INSUFFICIENT_FUNDS");
    }
}
