//! Account record and its embedded state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn is_staff(self) -> bool {
        matches!(self, Self::Teacher | Self::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Hex-encoded salted digest; the plaintext secret is never stored.
    pub secret_hash: String,
    pub must_rotate: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    pub xp: u64,
    pub level: u32,
    pub grade_index: usize,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            grade_index: 0,
        }
    }
}

/// A set of ids that only counts within one temporal window (a day id, a week id).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowedSet {
    pub window: String,
    pub ids: BTreeSet<String>,
}

impl WindowedSet {
    pub fn contains(&self, window: &str, id: &str) -> bool {
        self.window == window && self.ids.contains(id)
    }

    /// Inserts `id` for `window`, discarding entries from any earlier window.
    /// Returns false when the id was already present in this window.
    pub fn insert(&mut self, window: &str, id: &str) -> bool {
        if self.window != window {
            self.window = window.to_string();
            self.ids.clear();
        }
        self.ids.insert(id.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowCounter {
    pub window: String,
    pub count: u32,
}

impl WindowCounter {
    pub fn count_in(&self, window: &str) -> u32 {
        if self.window == window {
            self.count
        } else {
            0
        }
    }

    pub fn increment(&mut self, window: &str) -> u32 {
        if self.window != window {
            self.window = window.to_string();
            self.count = 0;
        }
        self.count += 1;
        self.count
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EquippedCosmetics {
    pub avatar_id: Option<String>,
    pub theme_id: Option<String>,
    pub avatar_frame_id: Option<String>,
    pub profile_banner_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DuelResult {
    Win,
    Loss,
    Tie,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelHistoryEntry {
    pub entry_id: String,
    pub result: DuelResult,
    pub opponent_name: String,
    pub my_score: u32,
    pub opponent_score: u32,
    pub coin_change: i64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelRecord {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub daily: WindowCounter,
    /// Newest first, bounded by settings.
    pub history: Vec<DuelHistoryEntry>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerStats {
    pub correct: u32,
    pub incorrect: u32,
}

impl AnswerStats {
    pub fn attempts(&self) -> u32 {
        self.correct + self.incorrect
    }

    pub fn error_rate(&self) -> Option<f64> {
        match self.attempts() {
            0 => None,
            attempts => Some(f64::from(self.incorrect) / f64::from(attempts)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeAttempt {
    pub started_at: DateTime<Utc>,
    pub entry_fee: u64,
    pub score: Option<u32>,
    pub time_seconds: Option<u32>,
}

impl ChallengeAttempt {
    pub fn is_open(&self) -> bool {
        self.score.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MindMapNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub text: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MindMapConnection {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MindMap {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<MindMapNode>,
    #[serde(default)]
    pub connections: Vec<MindMapConnection>,
    #[serde(default)]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    LevelUp,
    Promotion,
    QuizPerfect,
    QuizCompleted,
    DuelWin,
    ItemBought,
    ChapterConsulted,
    WeeklyChallenge,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntry {
    pub kind: ActivityKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Moderation {
    pub muted: bool,
    pub muted_until: Option<DateTime<Utc>>,
}

impl Moderation {
    pub fn is_muted_at(&self, now: DateTime<Utc>) -> bool {
        self.muted && self.muted_until.map_or(true, |until| now < until)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub account_id: String,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub classe: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub teacher_id: Option<String>,
    pub credentials: Credentials,
    pub progress: Progress,
    pub coins: u64,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub consulted_chapters: Vec<String>,
    #[serde(default)]
    pub completed_missions: BTreeSet<String>,
    #[serde(default)]
    pub unlocked_achievements: BTreeSet<String>,
    #[serde(default)]
    pub daily_missions: WindowedSet,
    #[serde(default)]
    pub owned_items: BTreeSet<String>,
    #[serde(default)]
    pub equipped: EquippedCosmetics,
    #[serde(default)]
    pub friend_ids: BTreeSet<String>,
    #[serde(default)]
    pub duels: DuelRecord,
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Best score per quiz id.
    #[serde(default)]
    pub completed_quizzes: BTreeMap<String, u32>,
    #[serde(default)]
    pub quiz_performance: BTreeMap<String, AnswerStats>,
    /// Keyed by ISO week id.
    #[serde(default)]
    pub challenge_attempts: BTreeMap<String, ChallengeAttempt>,
    #[serde(default)]
    pub mind_maps: Vec<MindMap>,
    /// Newest first, bounded by settings.
    #[serde(default)]
    pub activity: Vec<ActivityEntry>,
    #[serde(default)]
    pub moderation: Moderation,
    #[serde(default)]
    pub has_seen_welcome: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub last_password_change: DateTime<Utc>,
    /// Incremented on every committed write.
    #[serde(default)]
    pub version: u64,
}

impl Account {
    pub fn new(
        account_id: impl Into<String>,
        username: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
        secret_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            username: username.into(),
            display_name: display_name.into(),
            classe: None,
            role,
            teacher_id: None,
            credentials: Credentials {
                secret_hash: secret_hash.into(),
                must_rotate: true,
            },
            progress: Progress::default(),
            coins: 0,
            streak: 0,
            consulted_chapters: Vec::new(),
            completed_missions: BTreeSet::new(),
            unlocked_achievements: BTreeSet::new(),
            daily_missions: WindowedSet::default(),
            owned_items: BTreeSet::new(),
            equipped: EquippedCosmetics::default(),
            friend_ids: BTreeSet::new(),
            duels: DuelRecord::default(),
            guild_id: None,
            completed_quizzes: BTreeMap::new(),
            quiz_performance: BTreeMap::new(),
            challenge_attempts: BTreeMap::new(),
            mind_maps: Vec::new(),
            activity: Vec::new(),
            moderation: Moderation::default(),
            has_seen_welcome: false,
            created_at: now,
            last_login: None,
            last_password_change: now,
            version: 0,
        }
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn has_consulted(&self, chapter_id: &str) -> bool {
        self.consulted_chapters.iter().any(|id| id == chapter_id)
    }
}
