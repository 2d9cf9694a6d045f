use contracts::{Account, ActivityKind, ShopItemType};
use tracing::info;

use super::{push_activity, AccountEngine};
use crate::economy::{self, LedgerCause};
use crate::error::{EngineError, EngineResult};

impl AccountEngine {
    /// Buys an item. The item is owned afterwards but not equipped.
    pub fn purchase(&mut self, actor_id: &str, item_id: &str) -> EngineResult<Account> {
        let item = self
            .catalogs
            .shop_item(item_id)
            .ok_or_else(|| EngineError::not_found("shop item", item_id))?;
        let limit = self.settings.activity_history_limit;

        let mut txn = self.begin();
        let now = txn.now();
        let account = self.checkout(&mut txn, actor_id)?;
        economy::purchase(account, item)?;
        let balance_after = account.coins;
        push_activity(
            account,
            ActivityKind::ItemBought,
            format!("🛍️ A acheté « {} ».", item.name),
            now,
            limit,
        );
        txn.record_move(
            actor_id,
            -(item.price as i64),
            balance_after,
            LedgerCause::Purchase,
            Some(item_id),
        );
        txn.notify(actor_id, "Achat réussi !");
        self.commit(txn)?;
        info!(account_id = %actor_id, %item_id, "item purchased");
        self.accounts.get(actor_id).cloned()
    }

    /// Equips an owned cosmetic into the slot its type selects.
    pub fn equip(&mut self, actor_id: &str, item_id: &str) -> EngineResult<Account> {
        let item = self
            .catalogs
            .shop_item(item_id)
            .ok_or_else(|| EngineError::not_found("shop item", item_id))?;
        if !self.accounts.get(actor_id)?.owned_items.contains(item_id) {
            return Err(EngineError::not_found("owned item", item_id));
        }

        let mut txn = self.begin();
        let equipped = &mut self.checkout(&mut txn, actor_id)?.equipped;
        let message = match item.item_type {
            ShopItemType::Avatar => {
                equipped.avatar_id = Some(item.id.clone());
                "Avatar équipé !"
            }
            ShopItemType::Theme => {
                equipped.theme_id = Some(item.theme_id.clone().unwrap_or_else(|| item.id.clone()));
                "Thème appliqué !"
            }
            ShopItemType::AvatarFrame => {
                equipped.avatar_frame_id = Some(item.id.clone());
                "Cadre d'avatar appliqué !"
            }
            ShopItemType::ProfileBanner => {
                equipped.profile_banner_id = Some(item.id.clone());
                "Bannière de profil appliquée !"
            }
            ShopItemType::Boost => {
                return Err(EngineError::InvalidTarget(format!(
                    "{item_id} cannot be equipped"
                )))
            }
        };
        txn.notify(actor_id, message);
        self.commit(txn)?;
        self.accounts.get(actor_id).cloned()
    }
}
