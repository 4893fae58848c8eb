//! Idempotent read handlers.
//!
//! These never mutate state and never touch durable storage -- they answer
//! from the room's authoritative memory and the reference cache, so two
//! consecutive calls with no intervening mutation return identical data.

use menagerie_types::{Pet, RoomState, SessionId};

use crate::deps::RoomDeps;
use crate::error::ActionError;

use super::{HandlerOutcome, player, to_data};

/// The pet species and store item catalogs.
pub fn get_catalog(deps: &RoomDeps) -> Result<HandlerOutcome, ActionError> {
    let pets = deps.catalog.pets();
    let items = deps.catalog.store_items();
    Ok(HandlerOutcome::new("catalog").with_data(serde_json::json!({
        "pets": *pets,
        "store_items": *items,
    })))
}

/// The sender's inventory summary.
pub fn get_inventory(
    state: &RoomState,
    session_id: &SessionId,
) -> Result<HandlerOutcome, ActionError> {
    let player = player(state, session_id)?;
    let summary = player.inventory_summary();
    Ok(HandlerOutcome::new("inventory").with_data(serde_json::json!({
        "items": summary,
        "count": summary.len(),
    })))
}

/// Gameplay defaults plus per-species decay rates.
pub fn request_game_config(deps: &RoomDeps) -> Result<HandlerOutcome, ActionError> {
    let defaults = deps.catalog.default_info();
    let species = deps.catalog.pets();
    let rates: Vec<serde_json::Value> = species
        .iter()
        .map(|s| {
            serde_json::json!({
                "species_id": s.species_id,
                "rates": s.decay_rates(),
            })
        })
        .collect();

    Ok(HandlerOutcome::new("game config").with_data(serde_json::json!({
        "defaults": *defaults,
        "decay_rates": rates,
    })))
}

/// The sender's token balance and counts.
pub fn request_player_state(
    state: &RoomState,
    session_id: &SessionId,
) -> Result<HandlerOutcome, ActionError> {
    let player = player(state, session_id)?;
    Ok(HandlerOutcome::new("player state").with_data(serde_json::json!({
        "tokens": player.tokens,
        "total_pets_owned": player.total_pets_owned,
        "inventory_items": player.inventory.len(),
    })))
}

/// The sender's profile.
pub fn get_profile(
    state: &RoomState,
    session_id: &SessionId,
) -> Result<HandlerOutcome, ActionError> {
    let player = player(state, session_id)?;
    Ok(HandlerOutcome::new("profile").with_data(serde_json::json!({
        "wallet_address": player.wallet_address,
        "session_id": player.session_id,
        "joined_at": player.joined_at,
        "total_pets_owned": player.total_pets_owned,
        "tokens": player.tokens,
    })))
}

/// A snapshot of the sender's pets.
pub fn request_pets_state(
    state: &RoomState,
    session_id: &SessionId,
) -> Result<HandlerOutcome, ActionError> {
    let pets = player_pets(state, session_id)?;
    let data = to_data(&pets)?;
    Ok(HandlerOutcome::new("pets state")
        .with_data(serde_json::json!({ "pets": data, "count": pets.len() })))
}

/// Collect the sender's pets from the room-global map.
pub(crate) fn player_pets(
    state: &RoomState,
    session_id: &SessionId,
) -> Result<Vec<Pet>, ActionError> {
    let player = player(state, session_id)?;
    Ok(player
        .pet_ids
        .iter()
        .filter_map(|id| state.pet(*id))
        .cloned()
        .collect())
}
