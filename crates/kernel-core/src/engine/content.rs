//! Mind maps and private messages.

use contracts::{Account, MindMap, PrivateMessage};
use tracing::{info, warn};

use super::AccountEngine;
use crate::error::{EngineError, EngineResult};
use crate::store;

impl AccountEngine {
    /// Inserts the map, or replaces the one with the same id.
    pub fn save_mind_map(&mut self, actor_id: &str, mind_map: MindMap) -> EngineResult<Account> {
        if mind_map.id.trim().is_empty() {
            return Err(EngineError::InvalidTarget(
                "mind map needs an id".to_string(),
            ));
        }
        let mut txn = self.begin();
        let account = self.checkout(&mut txn, actor_id)?;
        match account.mind_maps.iter_mut().find(|map| map.id == mind_map.id) {
            Some(existing) => *existing = mind_map,
            None => account.mind_maps.push(mind_map),
        }
        txn.notify(actor_id, "💾 Carte mentale sauvegardée !");
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }

    pub fn delete_mind_map(&mut self, actor_id: &str, mind_map_id: &str) -> EngineResult<Account> {
        if !self
            .accounts
            .get(actor_id)?
            .mind_maps
            .iter()
            .any(|map| map.id == mind_map_id)
        {
            return Err(EngineError::not_found("mind map", mind_map_id));
        }
        let mut txn = self.begin();
        self.checkout(&mut txn, actor_id)?
            .mind_maps
            .retain(|map| map.id != mind_map_id);
        txn.notify(actor_id, "🗑️ Carte mentale supprimée.");
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }

    pub fn send_private_message(
        &mut self,
        actor_id: &str,
        to_account_id: &str,
        text: &str,
    ) -> EngineResult<PrivateMessage> {
        let now = self.now();
        let sender = self.accounts.get(actor_id)?;
        if sender.moderation.is_muted_at(now) {
            warn!(account_id = %actor_id, "muted account tried to send a message");
            return Err(EngineError::Unauthorized(format!(
                "{actor_id} is muted"
            )));
        }
        if actor_id == to_account_id {
            return Err(EngineError::InvalidTarget(
                "cannot message yourself".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(EngineError::InvalidTarget(
                "message must not be empty".to_string(),
            ));
        }
        self.accounts.get(to_account_id)?;

        let message = PrivateMessage {
            message_id: self.next_id("message"),
            from_account_id: actor_id.to_string(),
            to_account_id: to_account_id.to_string(),
            text: text.to_string(),
            sent_at: now,
            read: false,
        };
        self.messages.post(message.clone());
        self.mark_dirty(store::CONVERSATIONS_KEY);
        self.sink_note(to_account_id, "✉️ Nouveau message privé");
        info!(from = %actor_id, to = %to_account_id, "private message sent");
        Ok(message)
    }

    pub fn conversation(&self, actor_id: &str, other_id: &str) -> EngineResult<Vec<PrivateMessage>> {
        self.accounts.get(actor_id)?;
        Ok(self.messages.thread(actor_id, other_id).to_vec())
    }

    pub fn mark_conversation_read(&mut self, actor_id: &str, other_id: &str) -> EngineResult<usize> {
        self.accounts.get(actor_id)?;
        let marked = self.messages.mark_read(actor_id, other_id);
        if marked > 0 {
            self.mark_dirty(store::CONVERSATIONS_KEY);
        }
        Ok(marked)
    }
}
