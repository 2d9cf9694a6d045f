//! XP, missions, daily missions, chapters, and quizzes.

use std::collections::HashSet;

use contracts::{
    Account, ActivityKind, AnswerRecord, DailyMission, DailyTrigger, REVIEW_QUIZ_ID,
};
use tracing::info;

use super::{push_activity, AccountEngine, Txn};
use crate::analytics;
use crate::economy::LedgerCause;
use crate::error::{EngineError, EngineResult};
use crate::rules;

impl AccountEngine {
    pub fn apply_xp(&mut self, actor_id: &str, amount: u64) -> EngineResult<Account> {
        let mut txn = self.begin();
        self.award_xp(&mut txn, actor_id, amount)?;
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }

    /// Claims a mission by hand. The evaluator normally completes missions on
    /// its own; this path exists for clients that surface a "claim" button.
    pub fn complete_mission(&mut self, actor_id: &str, mission_id: &str) -> EngineResult<Account> {
        let mission = self
            .catalogs
            .mission(mission_id)
            .ok_or_else(|| EngineError::not_found("mission", mission_id))?;
        let account = self.accounts.get(actor_id)?;
        if account.completed_missions.contains(mission_id) {
            return Err(EngineError::already_exists("mission completion", mission_id));
        }
        if !rules::predicate_holds(&mission.rule, account, &self.catalogs) {
            return Err(EngineError::InvalidTarget(format!(
                "mission {mission_id} conditions are not met"
            )));
        }

        let (reward_xp, reward_coins, title) =
            (mission.reward_xp, mission.reward_coins, mission.title.clone());
        let mut txn = self.begin();
        self.checkout(&mut txn, actor_id)?
            .completed_missions
            .insert(mission_id.to_string());
        txn.credit(actor_id, reward_coins, LedgerCause::MissionReward, Some(mission_id))?;
        self.award_xp(&mut txn, actor_id, reward_xp)?;
        txn.notify(
            actor_id,
            format!("🎯 Mission accomplie : {title} (+{reward_xp} XP, +{reward_coins} 🪙)"),
        );
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }

    /// Completes a manual daily mission for today.
    pub fn complete_daily_mission(
        &mut self,
        actor_id: &str,
        mission_id: &str,
    ) -> EngineResult<Account> {
        let mission = self
            .catalogs
            .daily_mission(mission_id)
            .ok_or_else(|| EngineError::not_found("daily mission", mission_id))?;
        if mission.trigger != DailyTrigger::Manual {
            return Err(EngineError::InvalidTarget(format!(
                "daily mission {mission_id} completes automatically"
            )));
        }
        let mut txn = self.begin();
        let day = txn.windows.day.clone();
        if self
            .accounts
            .get(actor_id)?
            .daily_missions
            .contains(&day, mission_id)
        {
            return Err(EngineError::already_exists("daily mission completion", mission_id));
        }
        self.grant_daily(&mut txn, actor_id, mission)?;
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }

    pub fn consult_chapter(&mut self, actor_id: &str, chapter_id: &str) -> EngineResult<Account> {
        let chapter = self
            .catalogs
            .chapter(chapter_id)
            .ok_or_else(|| EngineError::not_found("chapter", chapter_id))?;
        if self.accounts.get(actor_id)?.has_consulted(chapter_id) {
            return Err(EngineError::already_exists("chapter consultation", chapter_id));
        }

        let limit = self.settings.activity_history_limit;
        let mut txn = self.begin();
        let now = txn.now();
        let account = self.checkout(&mut txn, actor_id)?;
        account.consulted_chapters.push(chapter_id.to_string());
        push_activity(
            account,
            ActivityKind::ChapterConsulted,
            format!("📖 A consulté le chapitre « {} ».", chapter.title),
            now,
            limit,
        );
        txn.credit(actor_id, chapter.reward_coins, LedgerCause::ChapterReward, Some(chapter_id))?;
        self.award_xp(&mut txn, actor_id, chapter.reward_xp)?;
        txn.notify(
            actor_id,
            format!(
                "📖 Chapitre terminé ! +{} XP, +{} 🪙",
                chapter.reward_xp, chapter.reward_coins
            ),
        );
        self.fire_daily(&mut txn, actor_id, DailyTrigger::ChapterConsulted)?;
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }

    /// Scores a finished quiz: answer history, best score, rewards, and the
    /// quiz daily missions. The generated review quiz updates history and pays
    /// rewards but keeps no completion record.
    pub fn complete_quiz(
        &mut self,
        actor_id: &str,
        quiz_id: &str,
        answers: &[AnswerRecord],
    ) -> EngineResult<Account> {
        if answers.is_empty() {
            return Err(EngineError::InvalidTarget(
                "a quiz needs at least one answer".to_string(),
            ));
        }
        let is_review = quiz_id == REVIEW_QUIZ_ID;
        let (title, total) = if is_review {
            for answer in answers {
                if !self
                    .catalogs
                    .questions()
                    .any(|(_, question)| question.id == answer.question_id)
                {
                    return Err(EngineError::not_found("question", answer.question_id.as_str()));
                }
            }
            ("quiz de révision".to_string(), answers.len() as u32)
        } else {
            let quiz = self
                .catalogs
                .quiz(quiz_id)
                .ok_or_else(|| EngineError::not_found("quiz", quiz_id))?;
            if let Some(stray) = answers
                .iter()
                .find(|answer| !quiz.questions.iter().any(|q| q.id == answer.question_id))
            {
                return Err(EngineError::InvalidTarget(format!(
                    "question {} is not part of quiz {quiz_id}",
                    stray.question_id
                )));
            }
            (quiz.title.clone(), quiz.questions.len() as u32)
        };
        let mut answered = HashSet::new();
        if let Some(repeat) = answers
            .iter()
            .find(|answer| !answered.insert(answer.question_id.as_str()))
        {
            return Err(EngineError::InvalidTarget(format!(
                "question {} is answered twice",
                repeat.question_id
            )));
        }
        self.accounts.get(actor_id)?;

        // Unanswered questions count as misses against the full quiz length.
        let score = answers.iter().filter(|answer| answer.correct).count() as u32;
        let perfect = total > 0 && score == total;
        let limit = self.settings.activity_history_limit;
        let mut xp = self.settings.quiz_completion_xp;
        if perfect {
            xp += self.settings.perfect_quiz_bonus_xp;
        }

        let mut txn = self.begin();
        let now = txn.now();
        let account = self.checkout(&mut txn, actor_id)?;
        for answer in answers {
            analytics::record_answer(account, &answer.question_id, answer.correct);
        }
        let mut new_record = false;
        if !is_review {
            let previous = account.completed_quizzes.get(quiz_id).copied();
            new_record = previous.is_some_and(|best| score > best);
            account
                .completed_quizzes
                .insert(quiz_id.to_string(), previous.map_or(score, |best| best.max(score)));
        }
        let (kind, message) = if perfect {
            (
                ActivityKind::QuizPerfect,
                format!("⭐ A obtenu un score parfait au {title}."),
            )
        } else {
            (
                ActivityKind::QuizCompleted,
                format!("📝 A terminé le {title} avec {score}/{total}."),
            )
        };
        push_activity(account, kind, message, now, limit);

        txn.credit(
            actor_id,
            self.settings.quiz_completion_coins,
            LedgerCause::QuizReward,
            Some(quiz_id),
        )?;
        self.award_xp(&mut txn, actor_id, xp)?;
        txn.notify(
            actor_id,
            format!(
                "Quiz terminé ! +{xp} XP, +{} 🪙",
                self.settings.quiz_completion_coins
            ),
        );
        if new_record {
            txn.notify(actor_id, "Nouveau record personnel pour ce quiz !");
        }

        self.fire_daily(&mut txn, actor_id, DailyTrigger::QuizCompleted)?;
        if perfect {
            self.fire_daily(&mut txn, actor_id, DailyTrigger::QuizPerfect)?;
        }
        self.commit(txn)?;
        info!(account_id = %actor_id, %quiz_id, score, total, "quiz completed");
        self.accounts.get(actor_id).cloned()
    }

    /// Records one answer outside of a quiz run.
    pub fn record_answer(
        &mut self,
        actor_id: &str,
        question_id: &str,
        correct: bool,
    ) -> EngineResult<Account> {
        if !self
            .catalogs
            .questions()
            .any(|(_, question)| question.id == question_id)
        {
            return Err(EngineError::not_found("question", question_id));
        }
        let mut txn = self.begin();
        let account = self.checkout(&mut txn, actor_id)?;
        analytics::record_answer(account, question_id, correct);
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }

    pub fn mark_welcome_seen(&mut self, actor_id: &str) -> EngineResult<Account> {
        let mut txn = self.begin();
        self.checkout(&mut txn, actor_id)?.has_seen_welcome = true;
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }

    // ---- daily missions ----

    /// Completes every daily mission bound to `trigger` that is still open today.
    pub(super) fn fire_daily(
        &self,
        txn: &mut Txn,
        account_id: &str,
        trigger: DailyTrigger,
    ) -> EngineResult<()> {
        for mission in self
            .catalogs
            .daily_missions
            .iter()
            .filter(|mission| mission.trigger == trigger)
        {
            self.grant_daily(txn, account_id, mission)?;
        }
        Ok(())
    }

    /// Returns false when the mission was already done in the current window.
    fn grant_daily(
        &self,
        txn: &mut Txn,
        account_id: &str,
        mission: &DailyMission,
    ) -> EngineResult<bool> {
        let day = txn.windows.day.clone();
        if !self
            .checkout(txn, account_id)?
            .daily_missions
            .insert(&day, &mission.id)
        {
            return Ok(false);
        }
        txn.credit(
            account_id,
            mission.reward_coins,
            LedgerCause::DailyMission,
            Some(&mission.id),
        )?;
        self.award_xp(txn, account_id, mission.reward_xp)?;
        txn.notify(account_id, format!("✅ Mission accomplie : {}", mission.title));
        Ok(true)
    }
}
