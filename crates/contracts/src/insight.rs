//! Read-only projections: revision analytics and rankings.

use serde::{Deserialize, Serialize};

use crate::Quiz;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeakQuestion {
    pub question_id: String,
    pub chapter_id: String,
    pub error_rate: f64,
    /// False when the rate is the neutral placeholder for a never-answered question.
    pub seen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterMastery {
    pub chapter_id: String,
    pub title: String,
    pub correct: u32,
    pub attempts: u32,
    pub mastery_percent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewQuiz {
    Ready { quiz: Quiz, weak: Vec<WeakQuestion> },
    NeedsMoreData { available: usize, required: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub account_id: String,
    pub display_name: String,
    pub grade_index: usize,
    pub level: u32,
    pub xp: u64,
}
