//! Player entity: a connected session and its wallet-backed account state.
//!
//! The player's `pet_ids` set is a view over the room-global pet map --
//! the room helpers in [`crate::room`] keep the two in sync. Inventory
//! mutations happen in memory and set `inventory_dirty` so the periodic
//! bulk flush knows what to persist.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EntityError;
use crate::ids::{ItemKey, PetId, SessionId};

/// A stack of purchasable items in a player's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Item category (e.g. `food`, `toy`).
    pub item_type: String,
    /// Item identifier within its category.
    pub item_id: String,
    /// Display name from the store catalog.
    pub item_name: String,
    /// Quantity currently held; the map entry is removed at 0.
    pub quantity: u32,
    /// Lifetime purchase counter, never decremented.
    pub total_purchased: u32,
}

/// A connected player and their authoritative account state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Transport session identifier.
    pub session_id: SessionId,
    /// Wallet address the session authenticated with.
    pub wallet_address: String,
    /// Token balance mirror of the durable record; never negative.
    pub tokens: Decimal,
    /// Derived count, equal to `pet_ids.len()`.
    pub total_pets_owned: u32,
    /// Inventory stacks keyed by `{item_type}:{item_id}`.
    pub inventory: BTreeMap<ItemKey, InventoryItem>,
    /// Ids of this player's pets in the room-global pet map.
    pub pet_ids: BTreeSet<PetId>,
    /// When the session joined the room.
    pub joined_at: DateTime<Utc>,
    /// Whether inventory has unpersisted mutations awaiting the bulk flush.
    pub inventory_dirty: bool,
}

impl Player {
    /// Create a player with an empty inventory and no pets.
    pub fn new(
        session_id: SessionId,
        wallet_address: impl Into<String>,
        tokens: Decimal,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            wallet_address: wallet_address.into(),
            tokens,
            total_pets_owned: 0,
            inventory: BTreeMap::new(),
            pet_ids: BTreeSet::new(),
            joined_at,
            inventory_dirty: false,
        }
    }

    /// Mirror a committed durable balance into memory.
    ///
    /// The durable layer is the authority on balances; this only rejects
    /// values the durable layer must never produce.
    pub fn set_tokens(&mut self, balance: Decimal) -> Result<(), EntityError> {
        if balance < Decimal::ZERO {
            return Err(EntityError::NegativeBalance {
                session_id: self.session_id.clone(),
                balance,
            });
        }
        self.tokens = balance;
        Ok(())
    }

    /// Add `quantity` of an item to the inventory, creating the stack on
    /// first purchase. Marks the inventory dirty for the deferred flush.
    pub fn add_item(
        &mut self,
        item_type: &str,
        item_id: &str,
        item_name: &str,
        quantity: u32,
    ) -> Result<(), EntityError> {
        let key = ItemKey::new(item_type, item_id);
        let entry = self.inventory.entry(key.clone()).or_insert_with(|| InventoryItem {
            item_type: item_type.to_owned(),
            item_id: item_id.to_owned(),
            item_name: item_name.to_owned(),
            quantity: 0,
            total_purchased: 0,
        });

        entry.quantity = entry
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| EntityError::QuantityOverflow { key: key.clone() })?;
        entry.total_purchased = entry
            .total_purchased
            .checked_add(quantity)
            .ok_or(EntityError::QuantityOverflow { key })?;

        self.inventory_dirty = true;
        Ok(())
    }

    /// Consume `quantity` of an item. Removes the stack entirely when its
    /// quantity reaches zero. Marks the inventory dirty.
    pub fn use_item(&mut self, key: &ItemKey, quantity: u32) -> Result<(), EntityError> {
        let available = self.inventory.get(key).map_or(0, |item| item.quantity);
        if available < quantity {
            return Err(EntityError::InsufficientQuantity {
                key: key.clone(),
                requested: quantity,
                available,
            });
        }

        let remaining = available.saturating_sub(quantity);
        if remaining == 0 {
            self.inventory.remove(key);
        } else if let Some(item) = self.inventory.get_mut(key) {
            item.quantity = remaining;
        }

        self.inventory_dirty = true;
        Ok(())
    }

    /// Quantity of an item currently held (0 if absent).
    pub fn item_quantity(&self, key: &ItemKey) -> u32 {
        self.inventory.get(key).map_or(0, |item| item.quantity)
    }

    /// Stable, sorted inventory summary for client responses.
    ///
    /// Two consecutive calls with no intervening mutation return identical
    /// results (the backing map is ordered).
    pub fn inventory_summary(&self) -> Vec<InventoryItem> {
        self.inventory.values().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_player() -> Player {
        Player::new(SessionId::new("s1"), "0xabc", Decimal::from(100), Utc::now())
    }

    #[test]
    fn add_item_creates_and_stacks() {
        let mut player = make_player();
        player.add_item("food", "apple", "Apple", 2).unwrap();
        player.add_item("food", "apple", "Apple", 3).unwrap();
        let key = ItemKey::new("food", "apple");
        assert_eq!(player.item_quantity(&key), 5);
        let item = player.inventory.get(&key).unwrap();
        assert_eq!(item.total_purchased, 5);
        assert!(player.inventory_dirty);
    }

    #[test]
    fn use_item_to_zero_removes_entry() {
        let mut player = make_player();
        player.add_item("food", "apple", "Apple", 4).unwrap();
        let key = ItemKey::new("food", "apple");
        player.use_item(&key, 4).unwrap();
        assert!(!player.inventory.contains_key(&key));
        assert_eq!(player.item_quantity(&key), 0);
    }

    #[test]
    fn use_item_partial_keeps_entry() {
        let mut player = make_player();
        player.add_item("food", "apple", "Apple", 4).unwrap();
        let key = ItemKey::new("food", "apple");
        player.use_item(&key, 1).unwrap();
        assert_eq!(player.item_quantity(&key), 3);
        // total_purchased is a lifetime counter and does not decrease
        assert_eq!(player.inventory.get(&key).unwrap().total_purchased, 4);
    }

    #[test]
    fn use_item_insufficient_fails_without_mutation() {
        let mut player = make_player();
        player.add_item("food", "apple", "Apple", 2).unwrap();
        let key = ItemKey::new("food", "apple");
        let result = player.use_item(&key, 3);
        assert!(result.is_err());
        assert_eq!(player.item_quantity(&key), 2);
    }

    #[test]
    fn use_absent_item_fails() {
        let mut player = make_player();
        let key = ItemKey::new("food", "apple");
        assert!(player.use_item(&key, 1).is_err());
    }

    #[test]
    fn inventory_summary_is_idempotent() {
        let mut player = make_player();
        player.add_item("food", "apple", "Apple", 2).unwrap();
        player.add_item("toy", "ball", "Ball", 1).unwrap();
        let first = player.inventory_summary();
        let second = player.inventory_summary();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn negative_balance_rejected() {
        let mut player = make_player();
        let result = player.set_tokens(Decimal::from(-1));
        assert!(result.is_err());
        assert_eq!(player.tokens, Decimal::from(100));
    }
}
