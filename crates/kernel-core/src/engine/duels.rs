//! Practice duels, wagered challenges, and settlement.

use contracts::{
    Account, ActiveDuel, ActivityKind, ChallengeResolution, ChallengeStatus, DuelChallenge,
    DuelHistoryEntry, DuelResult, DuelSettlement, DuelWagerPolicy,
};
use tracing::{info, warn};

use super::{push_activity, AccountEngine, Txn};
use crate::economy::{self, LedgerCause};
use crate::error::{EngineError, EngineResult};
use crate::social::{self, DuelVerdict};
use crate::store;

/// One side of a finished duel, as it is written into that player's record.
struct DuelLine<'a> {
    result: DuelResult,
    my_score: u32,
    opponent_score: u32,
    opponent_name: &'a str,
    coin_change: i64,
}

impl AccountEngine {
    fn ensure_duel_allowance(&self, account_id: &str, day: &str) -> EngineResult<()> {
        let played = self.accounts.get(account_id)?.duels.daily.count_in(day);
        if played >= self.settings.max_daily_duels {
            return Err(EngineError::LimitExceeded(format!(
                "{account_id} already played {played} duels today"
            )));
        }
        Ok(())
    }

    fn record_duel(
        &self,
        txn: &mut Txn,
        account_id: &str,
        entry_id: String,
        line: DuelLine<'_>,
    ) -> EngineResult<()> {
        let now = txn.now();
        let day = txn.windows.day.clone();
        let history_limit = self.settings.duel_history_limit;
        let activity_limit = self.settings.activity_history_limit;
        let account = self.checkout(txn, account_id)?;

        match line.result {
            DuelResult::Win => {
                account.duels.wins += 1;
                push_activity(
                    account,
                    ActivityKind::DuelWin,
                    format!("⚔️ A gagné un duel contre {}.", line.opponent_name),
                    now,
                    activity_limit,
                );
            }
            DuelResult::Loss => account.duels.losses += 1,
            DuelResult::Tie => account.duels.ties += 1,
        }
        account.duels.daily.increment(&day);
        account.duels.history.insert(
            0,
            DuelHistoryEntry {
                entry_id,
                result: line.result,
                opponent_name: line.opponent_name.to_string(),
                my_score: line.my_score,
                opponent_score: line.opponent_score,
                coin_change: line.coin_change,
                at: now,
            },
        );
        account.duels.history.truncate(history_limit);
        Ok(())
    }

    /// Records a practice duel against a bot or an offline opponent. A loss
    /// never takes the balance below zero.
    pub fn complete_duel(
        &mut self,
        actor_id: &str,
        result: DuelResult,
        my_score: u32,
        opponent_score: u32,
        opponent_name: &str,
    ) -> EngineResult<Account> {
        let day = self.begin().windows.day;
        self.ensure_duel_allowance(actor_id, &day)?;
        let entry_id = self.next_id("duel_history");

        let mut txn = self.begin();
        self.checkout(&mut txn, actor_id)?;
        let coin_change = match result {
            DuelResult::Win => {
                let coins = self.settings.duel_win_coins;
                txn.credit(actor_id, coins, LedgerCause::PracticeDuel, None)?;
                txn.notify(actor_id, format!("🏆 Victoire ! +{coins} 🪙"));
                coins as i64
            }
            DuelResult::Loss => {
                let taken = txn.debit_clamped(
                    actor_id,
                    self.settings.duel_loss_coins,
                    LedgerCause::PracticeDuel,
                    None,
                )?;
                txn.notify(actor_id, format!("😢 Défaite... -{taken} 🪙"));
                -(taken as i64)
            }
            DuelResult::Tie => {
                txn.notify(actor_id, "🤝 Égalité !");
                0
            }
        };
        self.record_duel(
            &mut txn,
            actor_id,
            entry_id,
            DuelLine {
                result,
                my_score,
                opponent_score,
                opponent_name,
                coin_change,
            },
        )?;
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }

    pub fn send_duel_challenge(
        &mut self,
        actor_id: &str,
        to_account_id: &str,
        wager: u64,
    ) -> EngineResult<DuelChallenge> {
        let challenger = self.accounts.get(actor_id)?;
        self.duels.validate_send(challenger, to_account_id)?;
        economy::ensure_funds(challenger, wager)?;
        let opponent_name = self.accounts.get(to_account_id)?.display_name.clone();

        let escrowed = self.settings.duel_wager_policy == DuelWagerPolicy::EscrowAtSend;
        let challenge_id = self.next_id("duel_challenge");
        let mut txn = self.begin();
        let created_at = txn.now();
        if escrowed {
            self.checkout(&mut txn, actor_id)?;
            txn.debit(actor_id, wager, LedgerCause::Wager, Some(&challenge_id))?;
        }
        txn.notify(actor_id, format!("Défi de duel envoyé à {opponent_name} !"));
        txn.notify(to_account_id, "⚔️ Nouveau défi de duel reçu !");
        self.commit(txn)?;

        let challenge = DuelChallenge {
            challenge_id,
            from_account_id: actor_id.to_string(),
            to_account_id: to_account_id.to_string(),
            wager,
            created_at,
            escrowed,
        };
        self.duels.insert_challenge(challenge.clone());
        self.mark_dirty(store::DUEL_CHALLENGES_KEY);
        info!(from = %actor_id, to = %to_account_id, wager, escrowed, "duel challenge sent");
        Ok(challenge)
    }

    /// Accepts or declines a challenge addressed to `actor_id`.
    ///
    /// Without escrow the challenger's balance is checked again here; a
    /// challenger who can no longer cover the wager has the challenge
    /// auto-declined. With escrow the opponent's stake is debited on accept and
    /// a declined challenge refunds the challenger.
    pub fn handle_duel_challenge(
        &mut self,
        actor_id: &str,
        challenge_id: &str,
        accept: bool,
    ) -> EngineResult<ChallengeResolution> {
        let challenge = self.duels.challenge(challenge_id)?.clone();
        if challenge.to_account_id != actor_id {
            return Err(EngineError::Unauthorized(format!(
                "{actor_id} is not the recipient of {challenge_id}"
            )));
        }
        let challenger_id = challenge.from_account_id.as_str();
        let mut txn = self.begin();

        if !accept {
            if challenge.escrowed {
                self.checkout(&mut txn, challenger_id)?;
                txn.credit(
                    challenger_id,
                    challenge.wager,
                    LedgerCause::WagerRefund,
                    Some(challenge_id),
                )?;
            }
            txn.notify(actor_id, "Défi refusé.");
            self.commit(txn)?;
            return self.close_challenge(challenge_id, ChallengeStatus::Declined, None);
        }

        let day = txn.windows.day.clone();
        self.ensure_duel_allowance(actor_id, &day)?;
        let challenger = self.accounts.get(challenger_id)?;
        if !challenge.escrowed && challenger.coins < challenge.wager {
            warn!(%challenge_id, challenger = %challenger_id, "challenger can no longer cover the wager");
            txn.notify(
                actor_id,
                format!("Le défi de {} a été annulé (mise insuffisante).", challenger.display_name),
            );
            txn.notify(challenger_id, "Ton défi a été annulé : pas assez de MathCoins.");
            self.commit(txn)?;
            return self.close_challenge(challenge_id, ChallengeStatus::AutoDeclined, None);
        }
        let challenger_name = challenger.display_name.clone();

        self.checkout(&mut txn, actor_id)?;
        if challenge.escrowed {
            txn.debit(actor_id, challenge.wager, LedgerCause::Wager, Some(challenge_id))?;
        } else {
            economy::ensure_funds(self.accounts.get(actor_id)?, challenge.wager)?;
        }
        txn.notify(
            actor_id,
            format!("Duel contre {challenger_name} accepté ! Préparez-vous."),
        );
        self.commit(txn)?;

        let duel = ActiveDuel {
            duel_id: self.next_id("duel"),
            challenger_id: challenger_id.to_string(),
            opponent_id: actor_id.to_string(),
            wager: challenge.wager,
            accepted_at: self.now(),
            escrowed: challenge.escrowed,
        };
        self.duels.insert_duel(duel.clone());
        self.mark_dirty(store::ACTIVE_DUELS_KEY);
        self.close_challenge(challenge_id, ChallengeStatus::Accepted, Some(duel))
    }

    fn close_challenge(
        &mut self,
        challenge_id: &str,
        status: ChallengeStatus,
        duel: Option<ActiveDuel>,
    ) -> EngineResult<ChallengeResolution> {
        self.duels.take_challenge(challenge_id)?;
        self.mark_dirty(store::DUEL_CHALLENGES_KEY);
        info!(%challenge_id, ?status, "duel challenge resolved");
        Ok(ChallengeResolution {
            challenge_id: challenge_id.to_string(),
            status,
            duel,
        })
    }

    /// Settles an accepted duel. The wager goes to the winner; without escrow
    /// the loser pays at most their current balance.
    pub fn settle_duel(
        &mut self,
        actor_id: &str,
        duel_id: &str,
        challenger_score: u32,
        opponent_score: u32,
    ) -> EngineResult<DuelSettlement> {
        let duel = self.duels.duel(duel_id)?.clone();
        if actor_id != duel.challenger_id && actor_id != duel.opponent_id {
            return Err(EngineError::Unauthorized(format!(
                "{actor_id} did not take part in {duel_id}"
            )));
        }
        let challenger_name = self.accounts.get(&duel.challenger_id)?.display_name.clone();
        let opponent_name = self.accounts.get(&duel.opponent_id)?.display_name.clone();
        let verdict = social::judge(&duel, challenger_score, opponent_score);
        let challenger_entry = self.next_id("duel_history");
        let opponent_entry = self.next_id("duel_history");

        let mut txn = self.begin();
        self.checkout(&mut txn, &duel.challenger_id)?;
        self.checkout(&mut txn, &duel.opponent_id)?;

        let (winner_id, loser_id, paid) = match &verdict {
            DuelVerdict::Winner { winner_id, loser_id } => {
                let paid = if duel.escrowed {
                    let pot = duel.wager.saturating_mul(2);
                    txn.credit(winner_id, pot, LedgerCause::DuelPayout, Some(duel_id))?;
                    duel.wager
                } else {
                    let taken =
                        txn.debit_clamped(loser_id, duel.wager, LedgerCause::Wager, Some(duel_id))?;
                    txn.credit(winner_id, taken, LedgerCause::DuelPayout, Some(duel_id))?;
                    taken
                };
                txn.notify(winner_id, format!("🏆 Victoire ! +{paid} 🪙"));
                txn.notify(loser_id, format!("😢 Défaite... -{paid} 🪙"));
                (Some(winner_id.clone()), Some(loser_id.clone()), paid)
            }
            DuelVerdict::Tie => {
                if duel.escrowed {
                    for account_id in [&duel.challenger_id, &duel.opponent_id] {
                        txn.credit(account_id, duel.wager, LedgerCause::WagerRefund, Some(duel_id))?;
                    }
                }
                txn.notify(&duel.challenger_id, "🤝 Égalité !");
                txn.notify(&duel.opponent_id, "🤝 Égalité !");
                (None, None, 0)
            }
        };

        let signed = |account_id: &str| -> i64 {
            match (&winner_id, &loser_id) {
                (Some(winner), _) if winner == account_id => paid as i64,
                (_, Some(loser)) if loser == account_id => -(paid as i64),
                _ => 0,
            }
        };
        let result_for = |account_id: &str| match &winner_id {
            Some(winner) if winner == account_id => DuelResult::Win,
            Some(_) => DuelResult::Loss,
            None => DuelResult::Tie,
        };

        self.record_duel(
            &mut txn,
            &duel.challenger_id,
            challenger_entry,
            DuelLine {
                result: result_for(&duel.challenger_id),
                my_score: challenger_score,
                opponent_score,
                opponent_name: &opponent_name,
                coin_change: signed(&duel.challenger_id),
            },
        )?;
        self.record_duel(
            &mut txn,
            &duel.opponent_id,
            opponent_entry,
            DuelLine {
                result: result_for(&duel.opponent_id),
                my_score: opponent_score,
                opponent_score: challenger_score,
                opponent_name: &challenger_name,
                coin_change: signed(&duel.opponent_id),
            },
        )?;
        self.commit(txn)?;

        self.duels.take_duel(duel_id)?;
        self.mark_dirty(store::ACTIVE_DUELS_KEY);
        info!(%duel_id, winner = ?winner_id, paid, "duel settled");
        Ok(DuelSettlement {
            duel_id: duel_id.to_string(),
            winner_id,
            loser_id,
            paid,
        })
    }
}
