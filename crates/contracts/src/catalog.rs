//! Static content catalogs consumed read-only by the engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Grade {
    pub name: String,
    pub icon: String,
    pub levels_to_complete: u32,
    pub xp_per_level: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShopItemType {
    Avatar,
    Boost,
    Theme,
    ProfileBanner,
    AvatarFrame,
}

/// Declarative unlock condition, interpreted by the rule evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RulePredicate {
    LevelAtLeast { level: u32 },
    GradeAtLeast { grade_index: usize },
    ChaptersConsultedAtLeast { count: usize },
    AllChaptersConsulted,
    QuizzesCompletedAtLeast { count: usize },
    PerfectQuizzesAtLeast { count: usize },
    DuelWinsAtLeast { count: u32 },
    ItemsOwnedAtLeast { count: usize },
    OwnsItemTypeAtLeast { item_type: ShopItemType, count: usize },
    InGuild,
    FriendsAtLeast { count: usize },
    StreakAtLeast { days: u32 },
    AllOf { rules: Vec<RulePredicate> },
    AnyOf { rules: Vec<RulePredicate> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    #[serde(default)]
    pub secret: bool,
    pub rule: RulePredicate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mission {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reward_xp: u64,
    pub reward_coins: u64,
    pub rule: RulePredicate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DailyTrigger {
    Login,
    ChapterConsulted,
    QuizCompleted,
    QuizPerfect,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyMission {
    pub id: String,
    pub title: String,
    pub reward_xp: u64,
    pub reward_coins: u64,
    pub trigger: DailyTrigger,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShopItem {
    pub id: String,
    pub name: String,
    pub item_type: ShopItemType,
    pub price: u64,
    #[serde(default)]
    pub theme_id: Option<String>,
    /// Reward-only items are granted, never sold.
    #[serde(default = "default_purchasable")]
    pub purchasable: bool,
}

fn default_purchasable() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub reward_xp: u64,
    pub reward_coins: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quiz {
    pub id: String,
    pub chapter_id: String,
    pub title: String,
    pub questions: Vec<QuizQuestion>,
}

/// Every static catalog the engine reads. Iteration order of each vector is the
/// evaluation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Catalogs {
    pub grades: Vec<Grade>,
    pub achievements: Vec<Achievement>,
    pub missions: Vec<Mission>,
    pub daily_missions: Vec<DailyMission>,
    pub shop_items: Vec<ShopItem>,
    pub chapters: Vec<Chapter>,
    pub quizzes: Vec<Quiz>,
}

impl Catalogs {
    pub fn grade(&self, index: usize) -> Option<&Grade> {
        self.grades.get(index)
    }

    pub fn shop_item(&self, item_id: &str) -> Option<&ShopItem> {
        self.shop_items.iter().find(|item| item.id == item_id)
    }

    pub fn chapter(&self, chapter_id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|chapter| chapter.id == chapter_id)
    }

    pub fn quiz(&self, quiz_id: &str) -> Option<&Quiz> {
        self.quizzes.iter().find(|quiz| quiz.id == quiz_id)
    }

    pub fn mission(&self, mission_id: &str) -> Option<&Mission> {
        self.missions.iter().find(|mission| mission.id == mission_id)
    }

    pub fn daily_mission(&self, mission_id: &str) -> Option<&DailyMission> {
        self.daily_missions
            .iter()
            .find(|mission| mission.id == mission_id)
    }

    /// All questions paired with the chapter of the quiz they belong to.
    pub fn questions(&self) -> impl Iterator<Item = (&str, &QuizQuestion)> {
        self.quizzes.iter().flat_map(|quiz| {
            quiz.questions
                .iter()
                .map(move |question| (quiz.chapter_id.as_str(), question))
        })
    }
}
