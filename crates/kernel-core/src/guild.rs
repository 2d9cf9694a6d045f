//! Guild registry: bounded rosters, unique names, and chef hand-over.
//!
//! The registry owns the roster side of membership. Each account's `guild_id`
//! is written by the engine in the same commit as the roster change.

use std::collections::BTreeMap;

use contracts::Guild;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to a guild when a member left it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The guild lives on. `new_chef` is set when the leaving member was chef.
    Left { new_chef: Option<String> },
    /// The roster emptied and the guild was removed.
    Dissolved,
}

// ---------------------------------------------------------------------------
// GuildRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildRegistry {
    guilds: BTreeMap<String, Guild>,
}

impl GuildRegistry {
    pub fn get(&self, guild_id: &str) -> EngineResult<&Guild> {
        self.guilds
            .get(guild_id)
            .ok_or_else(|| EngineError::not_found("guild", guild_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Guild> {
        self.guilds.values()
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }

    /// Names are compared case-insensitively after trimming.
    pub fn name_taken(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        self.guilds
            .values()
            .any(|guild| guild.name.trim().to_lowercase() == wanted)
    }

    pub fn validate_name(&self, name: &str) -> EngineResult<()> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidTarget(
                "guild name must not be empty".to_string(),
            ));
        }
        if self.name_taken(name) {
            return Err(EngineError::already_exists("guild", name.trim()));
        }
        Ok(())
    }

    pub fn create(&mut self, guild: Guild) -> EngineResult<&Guild> {
        self.validate_name(&guild.name)?;
        let guild_id = guild.guild_id.clone();
        if self.guilds.contains_key(&guild_id) {
            return Err(EngineError::already_exists("guild", guild_id));
        }
        Ok(self.guilds.entry(guild_id).or_insert(guild))
    }

    /// Checks capacity without mutating; the caller commits with [`Self::join`].
    pub fn validate_join(&self, guild_id: &str) -> EngineResult<()> {
        let guild = self.get(guild_id)?;
        if guild.is_full() {
            return Err(EngineError::GuildFull {
                guild_id: guild_id.to_string(),
                capacity: guild.max_members,
            });
        }
        Ok(())
    }

    pub fn join(&mut self, guild_id: &str, account_id: &str) -> EngineResult<&Guild> {
        self.validate_join(guild_id)?;
        let guild = self
            .guilds
            .get_mut(guild_id)
            .ok_or_else(|| EngineError::not_found("guild", guild_id))?;
        if !guild.has_member(account_id) {
            guild.member_ids.push(account_id.to_string());
        }
        Ok(guild)
    }

    /// Removes `account_id` from the roster. Leadership passes to the oldest
    /// remaining member; an empty guild is dissolved.
    pub fn leave(&mut self, guild_id: &str, account_id: &str) -> EngineResult<LeaveOutcome> {
        let guild = self
            .guilds
            .get_mut(guild_id)
            .ok_or_else(|| EngineError::not_found("guild", guild_id))?;
        if !guild.has_member(account_id) {
            return Err(EngineError::InvalidTarget(format!(
                "{account_id} is not a member of {guild_id}"
            )));
        }

        guild.member_ids.retain(|id| id != account_id);
        let Some(oldest) = guild.member_ids.first().cloned() else {
            self.guilds.remove(guild_id);
            return Ok(LeaveOutcome::Dissolved);
        };

        let new_chef = if guild.chef_id == account_id {
            guild.chef_id = oldest.clone();
            Some(oldest)
        } else {
            None
        };
        Ok(LeaveOutcome::Left { new_chef })
    }

    /// Removes the guild and returns it so the caller can clear every member.
    pub fn disband(&mut self, guild_id: &str) -> EngineResult<Guild> {
        self.guilds
            .remove(guild_id)
            .ok_or_else(|| EngineError::not_found("guild", guild_id))
    }

    /// Drops `account_id` from whichever roster holds it.
    pub fn forget_account(&mut self, account_id: &str) -> Option<LeaveOutcome> {
        let guild_id = self
            .guilds
            .values()
            .find(|guild| guild.has_member(account_id))
            .map(|guild| guild.guild_id.clone())?;
        self.leave(&guild_id, account_id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn guild(id: &str, name: &str, chef: &str, max_members: usize) -> Guild {
        Guild {
            guild_id: id.to_string(),
            name: name.to_string(),
            emoji: "🏰".to_string(),
            description: String::new(),
            chef_id: chef.to_string(),
            member_ids: vec![chef.to_string()],
            max_members,
            level: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn names_are_unique_ignoring_case() {
        let mut registry = GuildRegistry::default();
        registry
            .create(guild("guild:1", "Les Pythagoriciens", "a", 10))
            .expect("first guild");
        let err = registry
            .create(guild("guild:2", "les pythagoriciens ", "b", 10))
            .expect_err("duplicate name");
        assert!(matches!(err, EngineError::AlreadyExists { .. }));
    }

    #[test]
    fn full_guild_rejects_join() {
        let mut registry = GuildRegistry::default();
        registry.create(guild("guild:1", "Duo", "a", 2)).expect("create");
        registry.join("guild:1", "b").expect("second member fits");
        let err = registry.join("guild:1", "c").expect_err("full");
        assert_eq!(
            err,
            EngineError::GuildFull {
                guild_id: "guild:1".to_string(),
                capacity: 2
            }
        );
    }

    #[test]
    fn chef_leaving_hands_over_then_dissolves() {
        let mut registry = GuildRegistry::default();
        registry.create(guild("guild:1", "Trio", "a", 3)).expect("create");
        registry.join("guild:1", "b").expect("join b");
        registry.join("guild:1", "c").expect("join c");

        let outcome = registry.leave("guild:1", "a").expect("chef leaves");
        assert_eq!(
            outcome,
            LeaveOutcome::Left {
                new_chef: Some("b".to_string())
            }
        );
        assert_eq!(registry.get("guild:1").expect("exists").chef_id, "b");

        registry.leave("guild:1", "c").expect("c leaves");
        assert_eq!(
            registry.leave("guild:1", "b").expect("last leaves"),
            LeaveOutcome::Dissolved
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn forget_account_finds_the_roster() {
        let mut registry = GuildRegistry::default();
        registry.create(guild("guild:1", "Solo", "a", 3)).expect("create");
        assert_eq!(registry.forget_account("a"), Some(LeaveOutcome::Dissolved));
        assert_eq!(registry.forget_account("a"), None);
    }
}
