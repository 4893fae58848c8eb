//! Action handlers: one function per inbound action.
//!
//! The shared contract: look up the player by session (absent means a
//! structured failure with no mutation); pet-scoped actions resolve the
//! pet through [`owned_pet_mut`] -- the ONE ownership check, applied
//! uniformly before any mutation. A pet owned by another session fails
//! exactly like a missing pet would: structured failure, `room.pets`
//! untouched.
//!
//! # Submodules
//!
//! - [`pets`] -- feed / play / clean / poop / remove.
//! - [`purchase`] -- the transactional purchase template (pets, food,
//!   items, daily reward).
//! - [`queries`] -- idempotent reads.
//! - [`account`] -- settings and tutorial write-through.

pub mod account;
pub mod pets;
pub mod purchase;
pub mod queries;

use chrono::{DateTime, Utc};
use menagerie_types::{Action, Pet, PetId, Player, RoomState, SessionId};

use crate::deps::RoomDeps;
use crate::error::ActionError;

/// What a successful handler hands back to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    /// Human-readable success line.
    pub message: String,
    /// Action-specific response payload.
    pub data: Option<serde_json::Value>,
    /// Whether the client should receive a full pets-state resync push
    /// (set by mutations that change the pet set).
    pub resync: bool,
}

impl HandlerOutcome {
    /// A bare success.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            resync: false,
        }
    }

    /// Attach a response payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Request a pets-state resync push after the response.
    #[must_use]
    pub const fn with_resync(mut self) -> Self {
        self.resync = true;
        self
    }
}

/// Look up the sending player, or fail with `not_found`.
pub fn player(state: &RoomState, session_id: &SessionId) -> Result<Player, ActionError> {
    state
        .player(session_id)
        .cloned()
        .ok_or_else(|| ActionError::NotFound(String::from("player")))
}

/// Mutably look up the sending player, or fail with `not_found`.
pub fn player_mut<'a>(
    state: &'a mut RoomState,
    session_id: &SessionId,
) -> Result<&'a mut Player, ActionError> {
    state
        .player_mut(session_id)
        .ok_or_else(|| ActionError::NotFound(String::from("player")))
}

/// The single ownership gate for pet-scoped actions.
///
/// Resolves the pet in the room-global map and verifies the sender owns
/// it. Every pet handler calls this before mutating anything.
pub fn owned_pet_mut<'a>(
    state: &'a mut RoomState,
    session_id: &SessionId,
    pet_id: PetId,
) -> Result<&'a mut Pet, ActionError> {
    if state.player(session_id).is_none() {
        return Err(ActionError::NotFound(String::from("player")));
    }

    let Some(pet) = state.pet_mut(pet_id) else {
        return Err(ActionError::NotFound(String::from("pet")));
    };

    if pet.owner_id != *session_id {
        return Err(ActionError::Ownership { pet_id });
    }

    Ok(pet)
}

/// Ownership check without holding the borrow (for handlers that need to
/// touch the player before re-borrowing the pet).
pub fn ensure_owned(
    state: &mut RoomState,
    session_id: &SessionId,
    pet_id: PetId,
) -> Result<(), ActionError> {
    owned_pet_mut(state, session_id, pet_id).map(|_| ())
}

/// Route one parsed action to its handler.
///
/// Every arm returns through the same `Result`; the pipeline converts
/// errors to structured failures, so nothing here can crash the room.
pub async fn dispatch(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    action: Action,
    now: DateTime<Utc>,
) -> Result<HandlerOutcome, ActionError> {
    match action {
        Action::BuyPet { pet_type } => {
            purchase::buy_pet(state, deps, session_id, &pet_type, now).await
        }
        Action::RemovePet { pet_id } => {
            pets::remove_pet(state, deps, session_id, pet_id).await
        }
        Action::FeedPet { pet_id } => pets::feed_pet(state, deps, session_id, pet_id, now),
        Action::FeedPetWithFood { pet_id, item_id } => {
            pets::feed_pet_with_food(state, deps, session_id, pet_id, &item_id, now)
        }
        Action::PlayWithPet { pet_id } => {
            pets::play_with_pet(state, deps, session_id, pet_id, now)
        }
        Action::PlayedPet { pet_id } => pets::played_pet(state, deps, session_id, pet_id, now),
        Action::CleanedPet { pet_id } => pets::cleaned_pet(state, deps, session_id, pet_id, now),
        Action::CreatePoop {
            pet_id,
            position_x,
            position_y,
        } => pets::create_poop(state, deps, session_id, pet_id, position_x, position_y),
        Action::FoodConsumed { item_id } => pets::food_consumed(state, session_id, &item_id),
        Action::PurchaseFood { item_id, quantity } => {
            purchase::purchase_item(state, deps, session_id, "food", &item_id, quantity, now).await
        }
        Action::PurchaseItem {
            item_type,
            item_id,
            quantity,
        } => {
            purchase::purchase_item(state, deps, session_id, &item_type, &item_id, quantity, now)
                .await
        }
        Action::ClaimDailyReward => {
            purchase::claim_daily_reward(state, deps, session_id, now).await
        }
        Action::GetCatalog => queries::get_catalog(deps),
        Action::GetInventory => queries::get_inventory(state, session_id),
        Action::RequestGameConfig => queries::request_game_config(deps),
        Action::RequestPlayerState => queries::request_player_state(state, session_id),
        Action::GetProfile => queries::get_profile(state, session_id),
        Action::RequestPetsState => queries::request_pets_state(state, session_id),
        Action::UpdateSettings { settings } => {
            account::update_settings(state, deps, session_id, settings)
        }
        Action::UpdateTutorial { step, completed } => {
            account::update_tutorial(state, deps, session_id, step, completed)
        }
    }
}

/// Serialize a handler payload, folding failures into the error taxonomy.
pub(crate) fn to_data<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ActionError> {
    serde_json::to_value(value).map_err(|e| ActionError::Unexpected(e.to_string()))
}
