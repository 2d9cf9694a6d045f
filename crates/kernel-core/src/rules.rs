//! Declarative mission and achievement evaluation.
//!
//! Predicates are plain data ([`RulePredicate`]) read against the post-mutation
//! account. Unlocks are only ever added; a second pass over an unchanged account
//! finds nothing to do. The one exception is the admin progress reset
//! (`AccountEngine::reset_student_progress`), which wipes a student back to a
//! fresh account, unlock sets included.

use contracts::{Account, Catalogs, RulePredicate, ShopItemType};
use tracing::debug;

use crate::economy;
use crate::progression::{self, ProgressEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unlock {
    Achievement {
        id: String,
        title: String,
    },
    Mission {
        id: String,
        title: String,
        reward_xp: u64,
        reward_coins: u64,
    },
}

impl Unlock {
    pub fn id(&self) -> &str {
        match self {
            Self::Achievement { id, .. } | Self::Mission { id, .. } => id,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Achievement { title, .. } => format!("🏅 Succès débloqué : {title}"),
            Self::Mission {
                title,
                reward_xp,
                reward_coins,
                ..
            } => format!("🎯 Mission accomplie : {title} (+{reward_xp} XP, +{reward_coins} 🪙)"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub unlocks: Vec<Unlock>,
    pub progress_events: Vec<ProgressEvent>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.unlocks.is_empty()
    }
}

pub fn perfect_quiz_count(account: &Account, catalogs: &Catalogs) -> usize {
    account
        .completed_quizzes
        .iter()
        .filter(|(quiz_id, best)| {
            catalogs
                .quiz(quiz_id)
                .map(|quiz| !quiz.questions.is_empty() && **best as usize == quiz.questions.len())
                .unwrap_or(false)
        })
        .count()
}

fn owned_of_type(account: &Account, catalogs: &Catalogs, item_type: ShopItemType) -> usize {
    account
        .owned_items
        .iter()
        .filter(|item_id| {
            catalogs
                .shop_item(item_id)
                .map(|item| item.item_type == item_type)
                .unwrap_or(false)
        })
        .count()
}

pub fn predicate_holds(rule: &RulePredicate, account: &Account, catalogs: &Catalogs) -> bool {
    match rule {
        RulePredicate::LevelAtLeast { level } => account.progress.level >= *level,
        RulePredicate::GradeAtLeast { grade_index } => account.progress.grade_index >= *grade_index,
        RulePredicate::ChaptersConsultedAtLeast { count } => {
            account.consulted_chapters.len() >= *count
        }
        RulePredicate::AllChaptersConsulted => {
            !catalogs.chapters.is_empty()
                && catalogs
                    .chapters
                    .iter()
                    .all(|chapter| account.has_consulted(&chapter.id))
        }
        RulePredicate::QuizzesCompletedAtLeast { count } => {
            account.completed_quizzes.len() >= *count
        }
        RulePredicate::PerfectQuizzesAtLeast { count } => {
            perfect_quiz_count(account, catalogs) >= *count
        }
        RulePredicate::DuelWinsAtLeast { count } => account.duels.wins >= *count,
        RulePredicate::ItemsOwnedAtLeast { count } => account.owned_items.len() >= *count,
        RulePredicate::OwnsItemTypeAtLeast { item_type, count } => {
            owned_of_type(account, catalogs, *item_type) >= *count
        }
        RulePredicate::InGuild => account.guild_id.is_some(),
        RulePredicate::FriendsAtLeast { count } => account.friend_ids.len() >= *count,
        RulePredicate::StreakAtLeast { days } => account.streak >= *days,
        RulePredicate::AllOf { rules } => rules
            .iter()
            .all(|rule| predicate_holds(rule, account, catalogs)),
        RulePredicate::AnyOf { rules } => rules
            .iter()
            .any(|rule| predicate_holds(rule, account, catalogs)),
    }
}

/// One pass in catalog order: achievements first, then missions. Rewards are not
/// applied here.
pub fn pending_unlocks(account: &Account, catalogs: &Catalogs) -> Vec<Unlock> {
    let achievements = catalogs
        .achievements
        .iter()
        .filter(|achievement| !account.unlocked_achievements.contains(&achievement.id))
        .filter(|achievement| predicate_holds(&achievement.rule, account, catalogs))
        .map(|achievement| Unlock::Achievement {
            id: achievement.id.clone(),
            title: achievement.title.clone(),
        });

    let missions = catalogs
        .missions
        .iter()
        .filter(|mission| !account.completed_missions.contains(&mission.id))
        .filter(|mission| predicate_holds(&mission.rule, account, catalogs))
        .map(|mission| Unlock::Mission {
            id: mission.id.clone(),
            title: mission.title.clone(),
            reward_xp: mission.reward_xp,
            reward_coins: mission.reward_coins,
        });

    achievements.chain(missions).collect()
}

/// Unlocks everything currently satisfied and applies mission rewards, repeating
/// until a pass finds nothing new (a reward can satisfy another predicate).
pub fn evaluate(account: &mut Account, catalogs: &Catalogs) -> Evaluation {
    let mut evaluation = Evaluation::default();

    loop {
        let pending = pending_unlocks(account, catalogs);
        if pending.is_empty() {
            break;
        }

        for unlock in pending {
            match &unlock {
                Unlock::Achievement { id, .. } => {
                    account.unlocked_achievements.insert(id.clone());
                }
                Unlock::Mission {
                    id,
                    reward_xp,
                    reward_coins,
                    ..
                } => {
                    account.completed_missions.insert(id.clone());
                    economy::credit(account, *reward_coins);
                    let outcome =
                        progression::apply_xp(account.progress, *reward_xp, &catalogs.grades);
                    account.progress = outcome.progress;
                    evaluation.progress_events.extend(outcome.events);
                }
            }
            debug!(account_id = %account.account_id, unlock = unlock.id(), "rule satisfied");
            evaluation.unlocks.push(unlock);
        }
    }

    evaluation
}
