//! Pet-scoped handlers: feed, play, clean, poop, remove.
//!
//! Every handler resolves the pet through the ownership gate before
//! mutating; stat writes go through the entity helpers so values stay in
//! range and `last_updated` is refreshed.

use chrono::{DateTime, Utc};
use menagerie_db::{OwnedPetRow, PetStore};
use menagerie_types::{DomainEvent, ItemKey, PetId, RoomState, SessionId};
use rust_decimal::Decimal;

use crate::deps::RoomDeps;
use crate::error::ActionError;

use super::{HandlerOutcome, ensure_owned, owned_pet_mut, player, player_mut, to_data};

/// Basic feed with the catalog default food value.
pub fn feed_pet(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    pet_id: PetId,
    now: DateTime<Utc>,
) -> Result<HandlerOutcome, ActionError> {
    let food_value = deps.catalog.default_info().default_food_value;
    apply_feed(state, deps, session_id, pet_id, food_value, now)
}

/// Feed with a specific inventory food item: consume one, apply its value.
pub fn feed_pet_with_food(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    pet_id: PetId,
    item_id: &str,
    now: DateTime<Utc>,
) -> Result<HandlerOutcome, ActionError> {
    let item = deps
        .catalog
        .find_store_item("food", item_id)
        .ok_or_else(|| ActionError::NotFound(String::from("food item")))?;
    let food_value = item
        .food_value
        .ok_or_else(|| ActionError::Invalid(format!("{item_id} is not edible")))?;

    // Validate ownership before consuming the item, so a bad pet id
    // cannot eat inventory.
    ensure_owned(state, session_id, pet_id)?;

    let key = ItemKey::new("food", item_id);
    player_mut(state, session_id)?.use_item(&key, 1)?;

    apply_feed(state, deps, session_id, pet_id, food_value, now)
}

/// Shared feed mutation + event emission.
fn apply_feed(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    pet_id: PetId,
    food_value: Decimal,
    now: DateTime<Utc>,
) -> Result<HandlerOutcome, ActionError> {
    let pet = owned_pet_mut(state, session_id, pet_id)?;
    pet.feed(food_value, now);
    let data = to_data(&*pet)?;

    deps.bridge.emit(DomainEvent::PetFed {
        session_id: session_id.clone(),
        pet_id,
        food_value,
    });
    deps.metrics.incr("room.action.feed");

    Ok(HandlerOutcome::new("pet fed").with_data(data))
}

/// Play session start: happiness up by the catalog play value, hunger
/// down by the play cost.
pub fn play_with_pet(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    pet_id: PetId,
    now: DateTime<Utc>,
) -> Result<HandlerOutcome, ActionError> {
    apply_play(state, deps, session_id, pet_id, now, "playing with pet")
}

/// Play completion report from the client minigame; applies the same
/// centralized mutation as the start message.
pub fn played_pet(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    pet_id: PetId,
    now: DateTime<Utc>,
) -> Result<HandlerOutcome, ActionError> {
    apply_play(state, deps, session_id, pet_id, now, "play session finished")
}

/// Shared play mutation + event emission.
fn apply_play(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    pet_id: PetId,
    now: DateTime<Utc>,
    message: &str,
) -> Result<HandlerOutcome, ActionError> {
    let defaults = deps.catalog.default_info();
    let pet = owned_pet_mut(state, session_id, pet_id)?;
    pet.play(defaults.play_happiness_value, defaults.play_hunger_cost, now);
    let data = to_data(&*pet)?;

    deps.bridge.emit(DomainEvent::PetPlayed {
        session_id: session_id.clone(),
        pet_id,
    });
    deps.metrics.incr("room.action.play");

    Ok(HandlerOutcome::new(message).with_data(data))
}

/// Cleaning completion: cleanliness to full, poops cleared.
pub fn cleaned_pet(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    pet_id: PetId,
    now: DateTime<Utc>,
) -> Result<HandlerOutcome, ActionError> {
    let pet = owned_pet_mut(state, session_id, pet_id)?;
    pet.clean(now);
    let data = to_data(&*pet)?;

    deps.bridge.emit(DomainEvent::PetCleaned {
        session_id: session_id.clone(),
        pet_id,
    });
    deps.metrics.incr("room.action.clean");

    Ok(HandlerOutcome::new("pet cleaned").with_data(data))
}

/// Drop a poop at a client-reported position, bounded per pet.
pub fn create_poop(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    pet_id: PetId,
    position_x: Decimal,
    position_y: Decimal,
) -> Result<HandlerOutcome, ActionError> {
    let max_poops = deps.catalog.default_info().max_poops_per_pet;
    let pet = owned_pet_mut(state, session_id, pet_id)?;

    let poop_cap = usize::try_from(max_poops).unwrap_or(usize::MAX);
    let Some(poop_id) = pet.add_poop(position_x, position_y, poop_cap) else {
        return Err(ActionError::Invalid(String::from("the floor is full")));
    };
    let count = pet.poops.len();

    deps.bridge.emit(DomainEvent::PoopCreated {
        session_id: session_id.clone(),
        pet_id,
        poop_id,
    });

    Ok(HandlerOutcome::new("poop created")
        .with_data(serde_json::json!({ "poop_id": poop_id, "count": count })))
}

/// Client-side food consumption sync: decrement the stack, no stat change.
pub fn food_consumed(
    state: &mut RoomState,
    session_id: &SessionId,
    item_id: &str,
) -> Result<HandlerOutcome, ActionError> {
    let key = ItemKey::new("food", item_id);
    let player = player_mut(state, session_id)?;
    player.use_item(&key, 1)?;
    let remaining = player.item_quantity(&key);

    Ok(HandlerOutcome::new("food consumed")
        .with_data(serde_json::json!({ "item_id": item_id, "remaining": remaining })))
}

/// Remove (release) an owned pet: durable delete first, then the memory
/// detach, mirroring the purchase contract in reverse.
pub async fn remove_pet(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    pet_id: PetId,
) -> Result<HandlerOutcome, ActionError> {
    ensure_owned(state, session_id, pet_id)?;
    let wallet = player(state, session_id)?.wallet_address;

    let deleted = PetStore::new(deps.postgres.pool())
        .delete(pet_id.into_inner(), &wallet)
        .await?;
    if !deleted {
        // The room believed the pet existed; the durable row is already
        // gone. Proceed with the memory detach so the views reconverge.
        tracing::warn!(%pet_id, wallet, "pet row missing during remove, detaching memory only");
    }

    state.detach_pet(pet_id);

    deps.bridge.emit(DomainEvent::PetRemoved {
        session_id: session_id.clone(),
        pet_id,
    });
    deps.metrics.incr("room.action.remove_pet");

    Ok(HandlerOutcome::new("pet removed")
        .with_data(serde_json::json!({ "pet_id": pet_id }))
        .with_resync())
}

/// Snapshot every pet a session owns for persistence at leave time.
pub(crate) fn snapshot_player_pets(state: &RoomState, session_id: &SessionId) -> Vec<OwnedPetRow> {
    let Some(player) = state.player(session_id) else {
        return Vec::new();
    };
    player
        .pet_ids
        .iter()
        .filter_map(|id| state.pet(*id))
        .map(|pet| OwnedPetRow::from_pet(pet, &player.wallet_address))
        .collect()
}
