use contracts::{Account, FriendRelation, FriendRequest};
use tracing::info;

use super::AccountEngine;
use crate::error::{EngineError, EngineResult};
use crate::social;
use crate::store;

impl AccountEngine {
    pub fn friend_relation(&self, actor_id: &str, other_id: &str) -> EngineResult<FriendRelation> {
        let actor = self.accounts.get(actor_id)?;
        Ok(self.friends.relation(actor, other_id))
    }

    pub fn send_friend_request(
        &mut self,
        actor_id: &str,
        to_account_id: &str,
    ) -> EngineResult<FriendRequest> {
        let sender = self.accounts.get(actor_id)?;
        self.friends.validate_send(sender, to_account_id)?;
        self.accounts.get(to_account_id)?;

        let request = FriendRequest {
            request_id: self.next_id("friend_request"),
            from_account_id: actor_id.to_string(),
            to_account_id: to_account_id.to_string(),
            created_at: self.now(),
        };
        self.friends.insert(request.clone());
        self.mark_dirty(store::FRIEND_REQUESTS_KEY);
        self.sink_note(actor_id, "🤝 Demande d'ami envoyée !");
        info!(from = %actor_id, to = %to_account_id, "friend request sent");
        Ok(request)
    }

    /// Accepts or declines a pending request. Only the recipient may resolve it.
    pub fn handle_friend_request(
        &mut self,
        actor_id: &str,
        request_id: &str,
        accept: bool,
    ) -> EngineResult<Account> {
        let request = self
            .friends
            .get(request_id)
            .ok_or_else(|| EngineError::not_found("friend request", request_id))?;
        if request.to_account_id != actor_id {
            return Err(EngineError::Unauthorized(format!(
                "{actor_id} is not the recipient of {request_id}"
            )));
        }
        let from_id = request.from_account_id.clone();

        let mut txn = self.begin();
        if accept {
            let sender_name = self.accounts.get(&from_id)?.display_name.clone();
            let mut sender = self.checkout(&mut txn, &from_id)?.clone();
            let recipient = self.checkout(&mut txn, actor_id)?;
            social::befriend(&mut sender, recipient);
            txn.working.insert(from_id.clone(), sender);
            txn.notify(actor_id, format!("Vous êtes maintenant ami avec {sender_name} !"));
        } else {
            self.checkout(&mut txn, actor_id)?;
            txn.notify(actor_id, "Demande d'ami refusée.");
        }
        self.commit(txn)?;
        self.friends.take(request_id)?;
        self.mark_dirty(store::FRIEND_REQUESTS_KEY);
        self.accounts.get(actor_id).cloned()
    }

    pub fn remove_friend(&mut self, actor_id: &str, friend_id: &str) -> EngineResult<Account> {
        if !self.accounts.get(actor_id)?.friend_ids.contains(friend_id) {
            return Err(EngineError::not_found("friend", friend_id));
        }
        let mut txn = self.begin();
        let mut friend = self.checkout(&mut txn, friend_id)?.clone();
        let actor = self.checkout(&mut txn, actor_id)?;
        social::unfriend(actor, &mut friend);
        txn.working.insert(friend_id.to_string(), friend);
        txn.notify(actor_id, "Ami supprimé.");
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }

    /// Delivers a toast outside of a transaction.
    pub(super) fn sink_note(&mut self, account_id: &str, message: &str) {
        let note = contracts::Notification {
            account_id: account_id.to_string(),
            message: message.to_string(),
            at: self.now(),
        };
        self.sink.notify(note);
    }
}
