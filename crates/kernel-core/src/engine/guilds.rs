use contracts::{Account, Guild};
use tracing::info;

use super::AccountEngine;
use crate::economy::{self, LedgerCause};
use crate::error::{EngineError, EngineResult};
use crate::guild::LeaveOutcome;
use crate::store;

impl AccountEngine {
    /// Founds a guild with the actor as chef, for the configured fixed cost.
    pub fn create_guild(
        &mut self,
        actor_id: &str,
        name: &str,
        emoji: &str,
        description: &str,
    ) -> EngineResult<Guild> {
        let founder = self.accounts.get(actor_id)?;
        if founder.guild_id.is_some() {
            return Err(EngineError::AlreadyInGuild(actor_id.to_string()));
        }
        self.guilds.validate_name(name)?;
        let cost = self.settings.guild_creation_cost;
        economy::ensure_funds(founder, cost)?;

        let guild_id = self.next_id("guild");
        let mut txn = self.begin();
        let created_at = txn.now();
        self.checkout(&mut txn, actor_id)?.guild_id = Some(guild_id.clone());
        txn.debit(actor_id, cost, LedgerCause::GuildCreation, Some(&guild_id))?;
        txn.notify(actor_id, format!("Guilde créée ! -{cost} 🪙"));
        self.commit(txn)?;

        let guild = Guild {
            guild_id: guild_id.clone(),
            name: name.trim().to_string(),
            emoji: emoji.to_string(),
            description: description.to_string(),
            chef_id: actor_id.to_string(),
            member_ids: vec![actor_id.to_string()],
            max_members: self.settings.guild_max_members,
            level: 1,
            created_at,
        };
        let guild = self.guilds.create(guild)?.clone();
        self.mark_dirty(store::GUILDS_KEY);
        info!(%guild_id, chef = %actor_id, name = %guild.name, "guild created");
        Ok(guild)
    }

    pub fn join_guild(&mut self, actor_id: &str, guild_id: &str) -> EngineResult<Guild> {
        if self.accounts.get(actor_id)?.guild_id.is_some() {
            return Err(EngineError::AlreadyInGuild(actor_id.to_string()));
        }
        self.guilds.validate_join(guild_id)?;

        let mut txn = self.begin();
        self.checkout(&mut txn, actor_id)?.guild_id = Some(guild_id.to_string());
        txn.notify(actor_id, "Vous avez rejoint une guilde !");
        self.commit(txn)?;

        let guild = self.guilds.join(guild_id, actor_id)?.clone();
        self.mark_dirty(store::GUILDS_KEY);
        info!(%guild_id, member = %actor_id, "guild joined");
        Ok(guild)
    }

    /// Leaves the current guild without refund.
    pub fn leave_guild(&mut self, actor_id: &str) -> EngineResult<Account> {
        let guild_id = self
            .accounts
            .get(actor_id)?
            .guild_id
            .clone()
            .ok_or_else(|| EngineError::InvalidTarget(format!("{actor_id} is not in a guild")))?;

        // A dangling guild id is cleared even when no roster lists the member.
        let on_roster = self
            .guilds
            .get(&guild_id)
            .map(|guild| guild.has_member(actor_id))
            .unwrap_or(false);

        let mut txn = self.begin();
        self.checkout(&mut txn, actor_id)?.guild_id = None;
        txn.notify(actor_id, "Vous avez quitté la guilde.");
        self.commit(txn)?;

        let outcome = if on_roster {
            self.mark_dirty(store::GUILDS_KEY);
            Some(self.guilds.leave(&guild_id, actor_id)?)
        } else {
            None
        };

        match outcome {
            Some(LeaveOutcome::Left {
                new_chef: Some(new_chef),
            }) => {
                info!(%guild_id, %new_chef, "guild leadership handed over");
                self.sink_note(&new_chef, "👑 Tu es maintenant chef de ta guilde !");
            }
            Some(LeaveOutcome::Dissolved) => info!(%guild_id, "guild dissolved"),
            _ => {}
        }
        self.accounts.get(actor_id).cloned()
    }

    /// Staff-only: removes a guild and clears every member's guild id.
    pub fn disband_guild(&mut self, actor_id: &str, guild_id: &str) -> EngineResult<usize> {
        self.require_staff(actor_id)?;
        let member_ids = self.guilds.get(guild_id)?.member_ids.clone();

        let mut txn = self.begin();
        for member_id in &member_ids {
            let member = self.checkout(&mut txn, member_id)?;
            if member.guild_id.as_deref() == Some(guild_id) {
                member.guild_id = None;
            }
            txn.notify(member_id, "🗑️ Ta guilde a été dissoute.");
        }
        self.commit(txn)?;

        let guild = self.guilds.disband(guild_id)?;
        self.mark_dirty(store::GUILDS_KEY);
        info!(%guild_id, name = %guild.name, members = member_ids.len(), "guild disbanded");
        Ok(member_ids.len())
    }
}
