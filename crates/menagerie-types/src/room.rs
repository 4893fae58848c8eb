//! Room state: the authoritative container for one game instance.
//!
//! Pets live in a room-global map keyed by [`PetId`]; each player holds a
//! view of their own pets as an id set. The `attach_pet` / `detach_pet`
//! helpers are the only path that touches both sides, so the derived
//! counters (`player_count`, `total_pets_owned`) cannot drift.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EntityError;
use crate::ids::{PetId, SessionId};
use crate::pet::Pet;
use crate::player::Player;

/// Authoritative state for one room instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    /// Room name, used for logging and bridge subjects.
    pub room_name: String,
    /// Connected players keyed by session.
    pub players: BTreeMap<SessionId, Player>,
    /// Room-global pet map; the single owner of pet data.
    pub pets: BTreeMap<PetId, Pet>,
    /// Derived count, equal to `players.len()`.
    pub player_count: u32,
    /// When the room was created; the tick counters are relative to this.
    pub created_at: DateTime<Utc>,
}

impl RoomState {
    /// Create an empty room.
    pub fn new(room_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            room_name: room_name.into(),
            players: BTreeMap::new(),
            pets: BTreeMap::new(),
            player_count: 0,
            created_at,
        }
    }

    /// Insert a player, maintaining `player_count`.
    pub fn add_player(&mut self, player: Player) -> Result<(), EntityError> {
        if self.players.contains_key(&player.session_id) {
            return Err(EntityError::DuplicateSession(player.session_id.clone()));
        }
        self.players.insert(player.session_id.clone(), player);
        self.player_count = self.player_count.saturating_add(1);
        Ok(())
    }

    /// Remove a player, maintaining `player_count`.
    ///
    /// The player's pets are NOT removed here -- callers drain them first
    /// with [`Self::detach_player_pets`] so leave handling stays explicit.
    pub fn remove_player(&mut self, session_id: &SessionId) -> Option<Player> {
        let removed = self.players.remove(session_id);
        if removed.is_some() {
            self.player_count = self.player_count.saturating_sub(1);
        }
        removed
    }

    /// Borrow a player by session.
    pub fn player(&self, session_id: &SessionId) -> Option<&Player> {
        self.players.get(session_id)
    }

    /// Mutably borrow a player by session.
    pub fn player_mut(&mut self, session_id: &SessionId) -> Option<&mut Player> {
        self.players.get_mut(session_id)
    }

    /// Borrow a pet from the room-global map.
    pub fn pet(&self, pet_id: PetId) -> Option<&Pet> {
        self.pets.get(&pet_id)
    }

    /// Mutably borrow a pet from the room-global map.
    pub fn pet_mut(&mut self, pet_id: PetId) -> Option<&mut Pet> {
        self.pets.get_mut(&pet_id)
    }

    /// Attach a pet to the room and to its owner's view.
    ///
    /// Fails (without mutation) if the owning session is not in the room.
    pub fn attach_pet(&mut self, pet: Pet) -> Result<(), EntityError> {
        let Some(owner) = self.players.get_mut(&pet.owner_id) else {
            return Err(EntityError::OwnerMissing {
                pet_id: pet.id,
                session_id: pet.owner_id.clone(),
            });
        };

        owner.total_pets_owned = owner
            .total_pets_owned
            .checked_add(1)
            .ok_or_else(|| EntityError::PetCountOverflow(pet.owner_id.clone()))?;
        owner.pet_ids.insert(pet.id);
        self.pets.insert(pet.id, pet);
        Ok(())
    }

    /// Detach a pet from the room and from its owner's view.
    pub fn detach_pet(&mut self, pet_id: PetId) -> Option<Pet> {
        let pet = self.pets.remove(&pet_id)?;
        if let Some(owner) = self.players.get_mut(&pet.owner_id) {
            owner.pet_ids.remove(&pet_id);
            owner.total_pets_owned = owner.total_pets_owned.saturating_sub(1);
        }
        Some(pet)
    }

    /// Drain every pet owned by a session from the room-global map.
    ///
    /// Used at leave time. Returns the removed pets so the caller can
    /// persist their final stats before discarding them.
    pub fn detach_player_pets(&mut self, session_id: &SessionId) -> Vec<Pet> {
        let ids: Vec<PetId> = self
            .players
            .get(session_id)
            .map(|p| p.pet_ids.iter().copied().collect())
            .unwrap_or_default();

        ids.into_iter()
            .filter_map(|id| self.detach_pet(id))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn make_room() -> RoomState {
        RoomState::new("pet_room", Utc::now())
    }

    fn join(room: &mut RoomState, session: &str) -> SessionId {
        let id = SessionId::new(session);
        let player = Player::new(id.clone(), format!("0x{session}"), Decimal::from(100), Utc::now());
        room.add_player(player).unwrap();
        id
    }

    fn give_pet(room: &mut RoomState, owner: &SessionId) -> PetId {
        let pet = Pet::new(PetId::new(), owner.clone(), "cat", Utc::now());
        let id = pet.id;
        room.attach_pet(pet).unwrap();
        id
    }

    #[test]
    fn player_count_tracks_players() {
        let mut room = make_room();
        let a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        assert_eq!(room.player_count, 2);
        assert_eq!(usize::try_from(room.player_count).unwrap(), room.players.len());

        room.remove_player(&a);
        assert_eq!(room.player_count, 1);
        assert_eq!(usize::try_from(room.player_count).unwrap(), room.players.len());
    }

    #[test]
    fn duplicate_join_rejected() {
        let mut room = make_room();
        let _ = join(&mut room, "a");
        let dup = Player::new(SessionId::new("a"), "0xa", Decimal::ZERO, Utc::now());
        assert!(room.add_player(dup).is_err());
        assert_eq!(room.player_count, 1);
    }

    #[test]
    fn attach_pet_updates_owner_view_and_count() {
        let mut room = make_room();
        let owner = join(&mut room, "a");
        let pet_id = give_pet(&mut room, &owner);

        let player = room.player(&owner).unwrap();
        assert_eq!(player.total_pets_owned, 1);
        assert!(player.pet_ids.contains(&pet_id));
        assert!(room.pet(pet_id).is_some());
    }

    #[test]
    fn attach_pet_without_owner_fails() {
        let mut room = make_room();
        let pet = Pet::new(PetId::new(), SessionId::new("ghost"), "cat", Utc::now());
        assert!(room.attach_pet(pet).is_err());
        assert!(room.pets.is_empty());
    }

    #[test]
    fn detach_pet_updates_owner_view_and_count() {
        let mut room = make_room();
        let owner = join(&mut room, "a");
        let pet_id = give_pet(&mut room, &owner);

        let pet = room.detach_pet(pet_id);
        assert!(pet.is_some());
        let player = room.player(&owner).unwrap();
        assert_eq!(player.total_pets_owned, 0);
        assert!(player.pet_ids.is_empty());
    }

    #[test]
    fn detach_player_pets_drains_only_that_player() {
        let mut room = make_room();
        let a = join(&mut room, "a");
        let b = join(&mut room, "b");
        let _a1 = give_pet(&mut room, &a);
        let _a2 = give_pet(&mut room, &a);
        let b1 = give_pet(&mut room, &b);

        let drained = room.detach_player_pets(&a);
        assert_eq!(drained.len(), 2);
        assert_eq!(room.pets.len(), 1);
        assert!(room.pet(b1).is_some());
        assert_eq!(room.player(&b).unwrap().total_pets_owned, 1);
    }
}
