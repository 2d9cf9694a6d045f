//! Staff operations: account lifecycle, bonuses, moderation, and settings.

use chrono::Duration;
use contracts::{Account, EngineSettings, IssuedCredentials, Progress, Role};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{info, warn};

use super::{hash_secret, AccountEngine};
use crate::economy::LedgerCause;
use crate::error::{EngineError, EngineResult};
use crate::store::{self, AccountStore};

const GENERATED_SECRET_LEN: usize = 8;

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// `"Élodie Müller"` becomes `elodie.muller`; a taken name gets a numeric
/// suffix starting at 2.
pub(crate) fn generate_username(display_name: &str, accounts: &AccountStore) -> String {
    let folded = display_name
        .trim()
        .to_lowercase()
        .chars()
        .map(fold_diacritic)
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>();
    let base = folded.split_whitespace().collect::<Vec<_>>().join(".");
    let base = if base.is_empty() {
        "eleve".to_string()
    } else {
        base
    };

    let mut candidate = base.clone();
    let mut counter = 2;
    while accounts.find_by_username(&candidate).is_some() {
        candidate = format!("{base}{counter}");
        counter += 1;
    }
    candidate
}

pub(crate) fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect()
}

impl AccountEngine {
    pub fn create_student(
        &mut self,
        actor_id: &str,
        display_name: &str,
        classe: &str,
        teacher_id: Option<&str>,
    ) -> EngineResult<IssuedCredentials> {
        let actor = self.require_staff(actor_id)?;
        let teacher_id = match teacher_id {
            Some(teacher_id) => {
                let teacher = self.accounts.get(teacher_id)?;
                if teacher.role != Role::Teacher {
                    return Err(EngineError::InvalidTarget(format!(
                        "{teacher_id} is not a teacher"
                    )));
                }
                Some(teacher_id.to_string())
            }
            None if actor.role == Role::Teacher => Some(actor_id.to_string()),
            None => None,
        };
        let starting_coins = self.settings.starting_coins_student;
        self.issue_account(Role::Student, display_name, |account| {
            account.classe = Some(classe.to_string());
            account.teacher_id = teacher_id;
            account.coins = starting_coins;
        })
    }

    pub fn create_teacher(&mut self, actor_id: &str, display_name: &str) -> EngineResult<IssuedCredentials> {
        self.require_admin(actor_id)?;
        self.issue_account(Role::Teacher, display_name, |_| {})
    }

    fn issue_account(
        &mut self,
        role: Role,
        display_name: &str,
        configure: impl FnOnce(&mut Account),
    ) -> EngineResult<IssuedCredentials> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(EngineError::InvalidTarget(
                "display name must not be empty".to_string(),
            ));
        }
        let username = generate_username(display_name, &self.accounts);
        let secret = generate_secret();
        let prefix = match role {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        };
        let account_id = self.next_id(prefix);

        let mut txn = self.begin();
        let mut account = Account::new(
            account_id.as_str(),
            username.as_str(),
            display_name,
            role,
            hash_secret(&account_id, &secret),
            txn.now(),
        );
        configure(&mut account);
        let starting_coins = account.coins;
        txn.create(account);
        txn.record_move(
            &account_id,
            starting_coins as i64,
            starting_coins,
            LedgerCause::AdminBonus,
            Some("starting balance"),
        );
        self.commit(txn)?;
        info!(%account_id, %username, ?role, "account created");
        Ok(IssuedCredentials {
            account_id,
            username,
            secret,
        })
    }

    /// Issues a fresh one-time secret and forces rotation at next login.
    pub fn reset_password(&mut self, actor_id: &str, account_id: &str) -> EngineResult<IssuedCredentials> {
        self.require_staff(actor_id)?;
        let username = self.accounts.get(account_id)?.username.clone();
        let secret = generate_secret();

        let mut txn = self.begin();
        let account = self.checkout(&mut txn, account_id)?;
        account.credentials.secret_hash = hash_secret(account_id, &secret);
        account.credentials.must_rotate = true;
        txn.notify(actor_id, "✅ Mot de passe réinitialisé.");
        self.commit(txn)?;
        info!(%account_id, by = %actor_id, "password reset");
        Ok(IssuedCredentials {
            account_id: account_id.to_string(),
            username,
            secret,
        })
    }

    pub fn update_profile(
        &mut self,
        actor_id: &str,
        account_id: &str,
        display_name: Option<&str>,
        classe: Option<&str>,
    ) -> EngineResult<Account> {
        self.require_staff(actor_id)?;
        if display_name.is_some_and(|name| name.trim().is_empty()) {
            return Err(EngineError::InvalidTarget(
                "display name must not be empty".to_string(),
            ));
        }
        let mut txn = self.begin();
        let account = self.checkout(&mut txn, account_id)?;
        if let Some(name) = display_name {
            account.display_name = name.trim().to_string();
        }
        if let Some(classe) = classe {
            account.classe = Some(classe.to_string());
        }
        let message = format!("✅ Profil de {} mis à jour.", account.display_name);
        txn.notify(actor_id, message);
        self.commit(txn)?;
        self.accounts.get(account_id).cloned()
    }

    /// XP goes through the progression ladder, coins through the ledger.
    pub fn add_bonus(
        &mut self,
        actor_id: &str,
        account_id: &str,
        xp: u64,
        coins: u64,
    ) -> EngineResult<Account> {
        self.require_staff(actor_id)?;
        let mut txn = self.begin();
        self.checkout(&mut txn, account_id)?;
        txn.credit(account_id, coins, LedgerCause::AdminBonus, Some(actor_id))?;
        self.award_xp(&mut txn, account_id, xp)?;
        txn.notify(account_id, format!("🎁 Bonus reçu : +{xp} XP, +{coins} 🪙"));
        self.commit(txn)?;
        info!(%account_id, by = %actor_id, xp, coins, "bonus granted");
        self.accounts.get(account_id).cloned()
    }

    /// Removes an account and every reference to it: friend links, pending
    /// requests and challenges, active duels, guild rosters, teacher links,
    /// ledger lines, and conversations. Escrowed stakes go back to the
    /// surviving party.
    pub fn delete_account(&mut self, actor_id: &str, account_id: &str) -> EngineResult<()> {
        let actor_role = self.require_staff(actor_id)?.role;
        if actor_id == account_id {
            return Err(EngineError::InvalidTarget(
                "cannot delete your own account".to_string(),
            ));
        }
        let target = self.accounts.get(account_id)?;
        if target.role.is_staff() && actor_role != Role::Admin {
            return Err(EngineError::Unauthorized(
                "only an administrator can delete staff accounts".to_string(),
            ));
        }
        let friend_ids = target.friend_ids.iter().cloned().collect::<Vec<_>>();
        let pupil_ids = self
            .accounts
            .iter()
            .filter(|account| account.teacher_id.as_deref() == Some(account_id))
            .map(|account| account.account_id.clone())
            .collect::<Vec<_>>();
        let mut refunds = Vec::new();
        for challenge in self.duels.challenges_for(account_id) {
            if challenge.escrowed && challenge.from_account_id != account_id {
                refunds.push((challenge.from_account_id.clone(), challenge.wager));
            }
        }
        for duel in self.duels.duels_for(account_id) {
            if duel.escrowed {
                let survivor = if duel.challenger_id == account_id {
                    &duel.opponent_id
                } else {
                    &duel.challenger_id
                };
                refunds.push((survivor.clone(), duel.wager));
            }
        }

        let mut txn = self.begin();
        for friend_id in &friend_ids {
            if let Ok(friend) = self.checkout(&mut txn, friend_id) {
                friend.friend_ids.remove(account_id);
            }
        }
        for pupil_id in &pupil_ids {
            self.checkout(&mut txn, pupil_id)?.teacher_id = None;
        }
        for (survivor, wager) in &refunds {
            self.checkout(&mut txn, survivor)?;
            txn.credit(survivor, *wager, LedgerCause::WagerRefund, Some(account_id))?;
        }
        txn.remove(account_id);
        txn.notify(actor_id, "🗑️ Compte supprimé.");
        self.commit(txn)?;

        let requests = self.friends.forget_account(account_id);
        let (challenges, duels) = self.duels.forget_account(account_id);
        if let Some(outcome) = self.guilds.forget_account(account_id) {
            info!(%account_id, ?outcome, "guild roster updated after deletion");
        }
        self.messages.forget_account(account_id);
        self.ledger.forget_account(account_id);
        for key in [
            store::FRIEND_REQUESTS_KEY,
            store::DUEL_CHALLENGES_KEY,
            store::ACTIVE_DUELS_KEY,
            store::GUILDS_KEY,
            store::CONVERSATIONS_KEY,
            store::LEDGER_KEY,
        ] {
            self.mark_dirty(key);
        }
        info!(
            %account_id,
            by = %actor_id,
            requests,
            challenges = challenges.len(),
            duels = duels.len(),
            "account deleted"
        );
        Ok(())
    }

    pub fn mute_account(&mut self, actor_id: &str, account_id: &str, hours: u32) -> EngineResult<Account> {
        self.require_staff(actor_id)?;
        if hours == 0 {
            return Err(EngineError::InvalidTarget(
                "mute duration must be at least one hour".to_string(),
            ));
        }
        let mut txn = self.begin();
        let until = txn.now() + Duration::hours(i64::from(hours));
        let account = self.checkout(&mut txn, account_id)?;
        account.moderation.muted = true;
        account.moderation.muted_until = Some(until);
        let name = account.display_name.clone();
        txn.notify(actor_id, format!("🔇 {name} a été rendu muet pour {hours}h."));
        self.commit(txn)?;
        warn!(%account_id, by = %actor_id, hours, "account muted");
        self.accounts.get(account_id).cloned()
    }

    pub fn unmute_account(&mut self, actor_id: &str, account_id: &str) -> EngineResult<Account> {
        self.require_staff(actor_id)?;
        let mut txn = self.begin();
        let account = self.checkout(&mut txn, account_id)?;
        account.moderation.muted = false;
        account.moderation.muted_until = None;
        let name = account.display_name.clone();
        txn.notify(actor_id, format!("🔊 {name} peut de nouveau parler."));
        self.commit(txn)?;
        self.accounts.get(account_id).cloned()
    }

    pub fn update_settings(&mut self, actor_id: &str, settings: EngineSettings) -> EngineResult<EngineSettings> {
        self.require_admin(actor_id)?;
        if settings.schema_version != contracts::SCHEMA_VERSION_V1 {
            return Err(EngineError::UnsupportedVersion(settings.schema_version));
        }
        self.settings = settings;
        self.mark_dirty(store::SETTINGS_KEY);
        self.sink_note(actor_id, "✅ Paramètres de l'application mis à jour !");
        info!(by = %actor_id, "settings updated");
        Ok(self.settings.clone())
    }

    /// Puts every student back at the start of the ladder with the starting
    /// balance. Friends, guild membership, and credentials are kept. Unlocked
    /// achievements and completed missions are cleared too, so they can be
    /// earned (and paid) again; this is the only path that shrinks them.
    pub fn reset_student_progress(&mut self, actor_id: &str) -> EngineResult<usize> {
        self.require_admin(actor_id)?;
        let student_ids = self
            .accounts
            .iter()
            .filter(|account| account.is_student())
            .map(|account| account.account_id.clone())
            .collect::<Vec<_>>();
        let starting_coins = self.settings.starting_coins_student;

        let mut txn = self.begin();
        for student_id in &student_ids {
            let account = self.checkout(&mut txn, student_id)?;
            let delta = starting_coins as i64 - account.coins as i64;
            account.progress = Progress::default();
            account.coins = starting_coins;
            account.streak = 0;
            account.consulted_chapters.clear();
            account.completed_missions.clear();
            account.unlocked_achievements.clear();
            account.daily_missions = Default::default();
            account.owned_items.clear();
            account.equipped = Default::default();
            account.duels = Default::default();
            account.completed_quizzes.clear();
            account.quiz_performance.clear();
            account.challenge_attempts.clear();
            account.mind_maps.clear();
            account.activity.clear();
            txn.record_move(
                student_id,
                delta,
                starting_coins,
                LedgerCause::ProgressReset,
                None,
            );
        }
        txn.notify(actor_id, "💥 La progression de tous les élèves a été réinitialisée.");
        self.commit(txn)?;
        warn!(by = %actor_id, students = student_ids.len(), "student progress reset");
        Ok(student_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn usernames_fold_accents_and_count_up() {
        let mut accounts = AccountStore::default();
        assert_eq!(generate_username("  Élodie  Müller ", &accounts), "elodie.muller");

        accounts
            .insert_new(Account::new("s1", "elodie.muller", "x", Role::Student, "h", Utc::now()))
            .expect("insert");
        assert_eq!(generate_username("Élodie Müller", &accounts), "elodie.muller2");
    }

    #[test]
    fn generated_secrets_are_alphanumeric() {
        let secret = generate_secret();
        assert_eq!(secret.len(), GENERATED_SECRET_LEN);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
