//! Versioned command dispatch onto the engine operations.

use contracts::{Command, CommandOutcome, CommandPayload, CommandResult, SCHEMA_VERSION_V1};
use tracing::{debug, warn};

use super::AccountEngine;
use crate::error::{EngineError, EngineResult};

fn account_outcome(account: contracts::Account) -> CommandOutcome {
    CommandOutcome::Account {
        account: Box::new(account),
    }
}

impl AccountEngine {
    /// Runs one command on behalf of `command.actor_id`.
    pub fn apply(&mut self, command: &Command) -> EngineResult<CommandOutcome> {
        if command.schema_version != SCHEMA_VERSION_V1 {
            return Err(EngineError::UnsupportedVersion(
                command.schema_version.clone(),
            ));
        }
        let actor = command.actor_id.as_str();
        debug!(command_id = %command.command_id, %actor, "applying command");

        let outcome = match &command.payload {
            CommandPayload::ApplyXp { amount } => account_outcome(self.apply_xp(actor, *amount)?),
            CommandPayload::CompleteMission { mission_id } => {
                account_outcome(self.complete_mission(actor, mission_id)?)
            }
            CommandPayload::CompleteDailyMission { mission_id } => {
                account_outcome(self.complete_daily_mission(actor, mission_id)?)
            }
            CommandPayload::ConsultChapter { chapter_id } => {
                account_outcome(self.consult_chapter(actor, chapter_id)?)
            }
            CommandPayload::CompleteQuiz { quiz_id, answers } => {
                account_outcome(self.complete_quiz(actor, quiz_id, answers)?)
            }
            CommandPayload::RecordAnswer {
                question_id,
                correct,
            } => account_outcome(self.record_answer(actor, question_id, *correct)?),
            CommandPayload::Purchase { item_id } => account_outcome(self.purchase(actor, item_id)?),
            CommandPayload::Equip { item_id } => account_outcome(self.equip(actor, item_id)?),
            CommandPayload::SendFriendRequest { to_account_id } => CommandOutcome::FriendRequest {
                request: self.send_friend_request(actor, to_account_id)?,
            },
            CommandPayload::HandleFriendRequest { request_id, accept } => {
                account_outcome(self.handle_friend_request(actor, request_id, *accept)?)
            }
            CommandPayload::RemoveFriend { friend_id } => {
                account_outcome(self.remove_friend(actor, friend_id)?)
            }
            CommandPayload::SendDuelChallenge {
                to_account_id,
                wager,
            } => CommandOutcome::DuelChallenge {
                challenge: self.send_duel_challenge(actor, to_account_id, *wager)?,
            },
            CommandPayload::HandleDuelChallenge {
                challenge_id,
                accept,
            } => CommandOutcome::DuelChallengeResolved {
                resolution: self.handle_duel_challenge(actor, challenge_id, *accept)?,
            },
            CommandPayload::CompleteDuel {
                result,
                my_score,
                opponent_score,
                opponent_name,
            } => account_outcome(self.complete_duel(
                actor,
                *result,
                *my_score,
                *opponent_score,
                opponent_name,
            )?),
            CommandPayload::SettleDuel {
                duel_id,
                challenger_score,
                opponent_score,
            } => CommandOutcome::DuelSettled {
                settlement: self.settle_duel(actor, duel_id, *challenger_score, *opponent_score)?,
            },
            CommandPayload::CreateGuild {
                name,
                emoji,
                description,
            } => CommandOutcome::Guild {
                guild: self.create_guild(actor, name, emoji, description)?,
            },
            CommandPayload::JoinGuild { guild_id } => CommandOutcome::Guild {
                guild: self.join_guild(actor, guild_id)?,
            },
            CommandPayload::LeaveGuild => account_outcome(self.leave_guild(actor)?),
            CommandPayload::StartWeeklyChallenge => {
                account_outcome(self.start_weekly_challenge(actor)?)
            }
            CommandPayload::CompleteWeeklyChallenge {
                score,
                time_seconds,
            } => account_outcome(self.complete_weekly_challenge(actor, *score, *time_seconds)?),
            CommandPayload::SaveMindMap { mind_map } => {
                account_outcome(self.save_mind_map(actor, mind_map.clone())?)
            }
            CommandPayload::DeleteMindMap { mind_map_id } => {
                account_outcome(self.delete_mind_map(actor, mind_map_id)?)
            }
            CommandPayload::SendPrivateMessage {
                to_account_id,
                text,
            } => CommandOutcome::Message {
                message: self.send_private_message(actor, to_account_id, text)?,
            },
            CommandPayload::MarkWelcomeSeen => account_outcome(self.mark_welcome_seen(actor)?),
            CommandPayload::ChangePassword {
                current_secret,
                new_secret,
            } => account_outcome(self.change_password(actor, current_secret, new_secret)?),
            CommandPayload::ForceChangePassword { new_secret } => {
                account_outcome(self.force_change_password(actor, new_secret)?)
            }
            CommandPayload::CreateStudent {
                display_name,
                classe,
                teacher_id,
            } => CommandOutcome::Credentials {
                credentials: self.create_student(
                    actor,
                    display_name,
                    classe,
                    teacher_id.as_deref(),
                )?,
            },
            CommandPayload::CreateTeacher { display_name } => CommandOutcome::Credentials {
                credentials: self.create_teacher(actor, display_name)?,
            },
            CommandPayload::ResetPassword { account_id } => CommandOutcome::Credentials {
                credentials: self.reset_password(actor, account_id)?,
            },
            CommandPayload::UpdateProfile {
                account_id,
                display_name,
                classe,
            } => account_outcome(self.update_profile(
                actor,
                account_id,
                display_name.as_deref(),
                classe.as_deref(),
            )?),
            CommandPayload::AddBonus {
                account_id,
                xp,
                coins,
            } => account_outcome(self.add_bonus(actor, account_id, *xp, *coins)?),
            CommandPayload::DeleteAccount { account_id } => {
                self.delete_account(actor, account_id)?;
                CommandOutcome::Done
            }
            CommandPayload::MuteAccount { account_id, hours } => {
                account_outcome(self.mute_account(actor, account_id, *hours)?)
            }
            CommandPayload::UnmuteAccount { account_id } => {
                account_outcome(self.unmute_account(actor, account_id)?)
            }
            CommandPayload::DisbandGuild { guild_id } => CommandOutcome::Affected {
                count: self.disband_guild(actor, guild_id)?,
            },
            CommandPayload::UpdateSettings { settings } => CommandOutcome::Settings {
                settings: self.update_settings(actor, settings.clone())?,
            },
            CommandPayload::ResetStudentProgress => CommandOutcome::Affected {
                count: self.reset_student_progress(actor)?,
            },
        };
        Ok(outcome)
    }

    /// [`Self::apply`] folded into the wire envelope.
    pub fn execute(&mut self, command: &Command) -> CommandResult {
        match self.apply(command) {
            Ok(outcome) => CommandResult::accepted(command, outcome),
            Err(err) => {
                warn!(
                    command_id = %command.command_id,
                    actor = %command.actor_id,
                    code = ?err.code(),
                    "command rejected: {err}"
                );
                CommandResult::rejected(command, err.to_api_error())
            }
        }
    }
}
