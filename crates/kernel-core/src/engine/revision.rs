//! Read-only projections: revision analytics and the class leaderboard.

use contracts::{ChapterMastery, LeaderboardEntry, ReviewQuiz, WeakQuestion};

use super::AccountEngine;
use crate::analytics;
use crate::error::EngineResult;

impl AccountEngine {
    pub fn chapter_mastery(&self, actor_id: &str) -> EngineResult<Vec<ChapterMastery>> {
        let account = self.accounts.get(actor_id)?;
        Ok(analytics::chapter_mastery(account, &self.catalogs))
    }

    pub fn weak_questions(&self, actor_id: &str, limit: usize) -> EngineResult<Vec<WeakQuestion>> {
        let account = self.accounts.get(actor_id)?;
        Ok(analytics::rank_weak_questions(
            account,
            self.catalogs.questions(),
            limit,
            self.settings.unseen_question_weight,
        ))
    }

    pub fn review_quiz(&self, actor_id: &str) -> EngineResult<ReviewQuiz> {
        let account = self.accounts.get(actor_id)?;
        Ok(analytics::build_review_quiz(
            account,
            &self.catalogs,
            &self.settings,
        ))
    }

    /// Students ranked by grade, then level, then XP. Ties fall back to the
    /// display name so the order is stable.
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut students = self
            .accounts
            .iter()
            .filter(|account| account.is_student())
            .collect::<Vec<_>>();
        students.sort_by(|a, b| {
            b.progress
                .grade_index
                .cmp(&a.progress.grade_index)
                .then(b.progress.level.cmp(&a.progress.level))
                .then(b.progress.xp.cmp(&a.progress.xp))
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        students
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, account)| LeaderboardEntry {
                rank: index + 1,
                account_id: account.account_id.clone(),
                display_name: account.display_name.clone(),
                grade_index: account.progress.grade_index,
                level: account.progress.level,
                xp: account.progress.xp,
            })
            .collect()
    }
}
