//! Authentication, login streaks, and credential rotation.

use chrono::Duration;
use contracts::{Account, DailyTrigger, Portal};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::AccountEngine;
use crate::error::{EngineError, EngineResult};
use crate::window::day_id;

/// Salted digest of a secret. The account id is the salt.
pub fn hash_secret(account_id: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_id.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

impl AccountEngine {
    /// Verifies credentials for `portal`, then stamps the login: streak,
    /// rotation flag, and the login daily mission.
    pub fn authenticate(
        &mut self,
        username: &str,
        secret: &str,
        portal: Portal,
    ) -> EngineResult<Account> {
        let username = normalize_username(username);
        let account = self
            .accounts
            .find_by_username(&username)
            .ok_or_else(|| EngineError::not_found("account", username.as_str()))?;

        if account.credentials.secret_hash != hash_secret(&account.account_id, secret) {
            warn!(%username, "rejected login: wrong secret");
            return Err(EngineError::Unauthorized("incorrect password".to_string()));
        }
        match portal {
            Portal::Student if !account.is_student() => {
                return Err(EngineError::Unauthorized(
                    "not a student account".to_string(),
                ));
            }
            Portal::Admin if account.is_student() => {
                return Err(EngineError::Unauthorized(
                    "students cannot open the administration portal".to_string(),
                ));
            }
            _ => {}
        }

        let account_id = account.account_id.clone();
        let is_student = account.is_student();
        let rotation_days = self.settings.password_reset_frequency_days;
        let mut txn = self.begin();
        let now = txn.now();
        let today = txn.windows.day.clone();
        let yesterday = txn.windows.previous_day();

        let account = self.checkout(&mut txn, &account_id)?;
        let last_day = account.last_login.map(day_id);
        account.streak = match last_day {
            Some(day) if day == today => account.streak.max(1),
            Some(day) if day == yesterday => account.streak + 1,
            _ => 1,
        };
        account.last_login = Some(now);
        if rotation_days > 0 && now - account.last_password_change > Duration::days(rotation_days) {
            account.credentials.must_rotate = true;
        }
        let greeting = format!("👋 Bonjour, {} !", account.display_name);
        txn.notify(&account_id, greeting);

        if is_student {
            self.fire_daily(&mut txn, &account_id, DailyTrigger::Login)?;
        }
        self.commit(txn)?;
        info!(%account_id, ?portal, "login");
        self.accounts.get(&account_id).cloned()
    }

    pub fn change_password(
        &mut self,
        actor_id: &str,
        current_secret: &str,
        new_secret: &str,
    ) -> EngineResult<Account> {
        let actor = self.accounts.get(actor_id)?;
        if actor.credentials.secret_hash != hash_secret(actor_id, current_secret) {
            return Err(EngineError::Unauthorized(
                "current password is incorrect".to_string(),
            ));
        }
        if new_secret == current_secret {
            return Err(EngineError::InvalidTarget(
                "new password must differ from the current one".to_string(),
            ));
        }
        self.set_secret(actor_id, new_secret)
    }

    /// Rotation without the current secret, allowed only while the account
    /// is flagged `must_rotate`.
    pub fn force_change_password(&mut self, actor_id: &str, new_secret: &str) -> EngineResult<Account> {
        if !self.accounts.get(actor_id)?.credentials.must_rotate {
            warn!(account_id = %actor_id, "rejected forced rotation: no rotation pending");
            return Err(EngineError::Unauthorized(
                "no password rotation is pending; the current password is required".to_string(),
            ));
        }
        self.set_secret(actor_id, new_secret)
    }

    fn set_secret(&mut self, actor_id: &str, new_secret: &str) -> EngineResult<Account> {
        if new_secret.trim().is_empty() {
            return Err(EngineError::InvalidTarget(
                "password must not be empty".to_string(),
            ));
        }
        let mut txn = self.begin();
        let now = txn.now();
        let account = self.checkout(&mut txn, actor_id)?;
        account.credentials.secret_hash = hash_secret(actor_id, new_secret);
        account.credentials.must_rotate = false;
        account.last_password_change = now;
        txn.notify(actor_id, "✅ Mot de passe changé avec succès !");
        self.commit(txn)?;
        info!(account_id = %actor_id, "password changed");
        self.accounts.get(actor_id).cloned()
    }
}
