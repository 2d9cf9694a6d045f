//! The weekly challenge: one paid attempt per ISO week, tiered rewards.

use contracts::{Account, ActivityKind, ChallengeAttempt, ChallengeRewardTier};
use tracing::info;

use super::{push_activity, AccountEngine};
use crate::economy::{self, LedgerCause};
use crate::error::{EngineError, EngineResult};

/// First tier whose threshold the score meets. Tiers are listed best first.
pub(crate) fn reward_tier(tiers: &[ChallengeRewardTier], score: u32) -> Option<ChallengeRewardTier> {
    tiers.iter().find(|tier| score >= tier.min_score).copied()
}

/// Week id of the most recently started attempt that has no score yet.
fn open_attempt_week(account: &Account) -> Option<String> {
    account
        .challenge_attempts
        .iter()
        .filter(|(_, attempt)| attempt.is_open())
        .max_by_key(|(_, attempt)| attempt.started_at)
        .map(|(week, _)| week.clone())
}

impl AccountEngine {
    pub fn start_weekly_challenge(&mut self, actor_id: &str) -> EngineResult<Account> {
        let fee = self.settings.challenge_entry_fee;
        let mut txn = self.begin();
        let week = txn.windows.week.clone();
        let account = self.accounts.get(actor_id)?;
        if account.challenge_attempts.contains_key(&week) {
            return Err(EngineError::LimitExceeded(format!(
                "weekly challenge already attempted in week {week}"
            )));
        }
        economy::ensure_funds(account, fee)?;

        let started_at = txn.now();
        self.checkout(&mut txn, actor_id)?.challenge_attempts.insert(
            week.clone(),
            ChallengeAttempt {
                started_at,
                entry_fee: fee,
                score: None,
                time_seconds: None,
            },
        );
        txn.debit(actor_id, fee, LedgerCause::EntryFee, Some(&week))?;
        txn.notify(
            actor_id,
            format!("-{fee} 🪙 Frais d'entrée payés. Bonne chance !"),
        );
        self.commit(txn)?;
        info!(account_id = %actor_id, %week, "weekly challenge started");
        self.accounts.get(actor_id).cloned()
    }

    pub fn complete_weekly_challenge(
        &mut self,
        actor_id: &str,
        score: u32,
        time_seconds: u32,
    ) -> EngineResult<Account> {
        let question_count = self.settings.challenge_question_count;
        if score > question_count {
            return Err(EngineError::InvalidTarget(format!(
                "score {score} exceeds the {question_count} challenge questions"
            )));
        }
        let mut txn = self.begin();
        let current_week = txn.windows.week.clone();
        let account = self.accounts.get(actor_id)?;
        // An attempt belongs to the week it was started in, even if that week
        // has rolled over since.
        let week = match open_attempt_week(account) {
            Some(week) => week,
            None if account.challenge_attempts.contains_key(&current_week) => {
                return Err(EngineError::LimitExceeded(format!(
                    "weekly challenge for week {current_week} is already finished"
                )));
            }
            None => {
                return Err(EngineError::not_found(
                    "weekly challenge attempt",
                    current_week.as_str(),
                ))
            }
        };

        let tier = reward_tier(&self.settings.challenge_reward_tiers, score);
        let limit = self.settings.activity_history_limit;
        let now = txn.now();
        let account = self.checkout(&mut txn, actor_id)?;
        if let Some(attempt) = account.challenge_attempts.get_mut(&week) {
            attempt.score = Some(score);
            attempt.time_seconds = Some(time_seconds);
        }
        push_activity(
            account,
            ActivityKind::WeeklyChallenge,
            format!("🐐 A terminé le Défi du GOAT avec un score de {score}/{question_count}."),
            now,
            limit,
        );

        match tier {
            Some(tier) => {
                txn.credit(actor_id, tier.coins, LedgerCause::ChallengeReward, Some(&week))?;
                self.award_xp(&mut txn, actor_id, tier.xp)?;
                txn.notify(
                    actor_id,
                    format!("🏆 Défi terminé ! +{} XP, +{} 🪙", tier.xp, tier.coins),
                );
            }
            None => txn.notify(
                actor_id,
                "Défi terminé. Entraîne-toi pour faire mieux la semaine prochaine !",
            ),
        }
        self.commit(txn)?;
        info!(account_id = %actor_id, %week, score, time_seconds, "weekly challenge completed");
        self.accounts.get(actor_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::EngineSettings;

    #[test]
    fn tiers_pick_the_best_threshold_met() {
        let tiers = EngineSettings::default().challenge_reward_tiers;
        assert_eq!(reward_tier(&tiers, 10).map(|tier| tier.coins), Some(500));
        assert_eq!(reward_tier(&tiers, 9).map(|tier| tier.coins), Some(250));
        assert_eq!(reward_tier(&tiers, 5).map(|tier| tier.xp), Some(200));
        assert_eq!(reward_tier(&tiers, 4), None);
    }
}
