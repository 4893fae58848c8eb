//! The purchase template: one consistency contract for every flow that
//! spends or grants tokens.
//!
//! All purchases are transactional on the durable side: the balance is
//! re-read inside the transaction (never trusted from memory), verified,
//! decremented, and committed -- on any failure nothing changes, durable
//! or in-memory. Only after the commit does the handler mirror the
//! returned balance (and, for pets, the new pet) into room state:
//! durable-write-first, memory-mirror-second, so a crash between the two
//! can never lose a paid-for asset.
//!
//! Inventory additions are the one deferred piece: they mutate memory and
//! mark the player dirty for the periodic bulk flush.

use chrono::{DateTime, Utc};
use menagerie_db::{OwnedPetRow, PetStore, UserStore};
use menagerie_types::{DomainEvent, ItemKey, Pet, PetId, RoomState, SessionId};
use rust_decimal::Decimal;

use crate::deps::RoomDeps;
use crate::error::ActionError;

use super::{HandlerOutcome, player, player_mut, to_data};

/// Purchase a new pet of the given species.
pub async fn buy_pet(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    pet_type: &str,
    now: DateTime<Utc>,
) -> Result<HandlerOutcome, ActionError> {
    let buyer = player(state, session_id)?;

    let species = deps
        .catalog
        .find_pet_species(pet_type)
        .ok_or_else(|| ActionError::NotFound(String::from("pet species")))?;

    let max_pets = deps.catalog.default_info().max_pets_per_player;
    if buyer.total_pets_owned >= max_pets {
        return Err(ActionError::Invalid(format!(
            "pet limit reached ({max_pets})"
        )));
    }

    // Durable write first: debit + pet row in one transaction.
    let pet = Pet::new(PetId::new(), session_id.clone(), pet_type, now);
    let row = OwnedPetRow::from_pet(&pet, &buyer.wallet_address);
    let new_balance = PetStore::new(deps.postgres.pool())
        .create_purchased(&row, species.price)
        .await?;

    // Memory mirror second.
    player_mut(state, session_id)?.set_tokens(new_balance)?;
    let data = to_data(&pet)?;
    let pet_id = pet.id;
    state.attach_pet(pet)?;

    deps.bridge.emit(DomainEvent::PetPurchased {
        session_id: session_id.clone(),
        pet_id,
        pet_type: pet_type.to_owned(),
    });
    deps.metrics.incr("room.action.buy_pet");

    Ok(HandlerOutcome::new("pet purchased")
        .with_data(serde_json::json!({ "pet": data, "tokens": new_balance }))
        .with_resync())
}

/// Purchase a stack of a store item (food included).
pub async fn purchase_item(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    item_type: &str,
    item_id: &str,
    quantity: u32,
    _now: DateTime<Utc>,
) -> Result<HandlerOutcome, ActionError> {
    if quantity == 0 {
        return Err(ActionError::Invalid(String::from("quantity must be positive")));
    }

    let buyer = player(state, session_id)?;
    let item = deps
        .catalog
        .find_store_item(item_type, item_id)
        .ok_or_else(|| ActionError::NotFound(String::from("store item")))?;

    let total = item
        .price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| ActionError::Invalid(String::from("price overflow")))?;

    // Durable write first: the transactional debit.
    let new_balance = UserStore::new(deps.postgres.pool())
        .debit_tokens(&buyer.wallet_address, total)
        .await?;

    // Memory mirror second; the inventory addition is deferred-persistence
    // (dirty flag, flushed by the tick).
    let player = player_mut(state, session_id)?;
    player.set_tokens(new_balance)?;
    player.add_item(item_type, item_id, &item.name, quantity)?;

    let key = ItemKey::new(item_type, item_id);
    let held = player.item_quantity(&key);

    deps.bridge.emit(DomainEvent::ItemPurchased {
        session_id: session_id.clone(),
        item_key: key.clone(),
        quantity,
    });
    deps.metrics.incr("room.action.purchase_item");

    Ok(HandlerOutcome::new("purchase complete").with_data(serde_json::json!({
        "item_key": key,
        "quantity": held,
        "tokens": new_balance,
    })))
}

/// Claim the once-per-day token reward.
pub async fn claim_daily_reward(
    state: &mut RoomState,
    deps: &RoomDeps,
    session_id: &SessionId,
    now: DateTime<Utc>,
) -> Result<HandlerOutcome, ActionError> {
    let claimer = player(state, session_id)?;
    let amount = deps.catalog.default_info().daily_reward_amount;

    let new_balance = UserStore::new(deps.postgres.pool())
        .claim_daily_reward(&claimer.wallet_address, amount, now)
        .await?;

    player_mut(state, session_id)?.set_tokens(new_balance)?;

    deps.bridge.emit(DomainEvent::RewardClaimed {
        session_id: session_id.clone(),
        amount,
    });
    deps.metrics.incr("room.action.daily_reward");

    Ok(HandlerOutcome::new("daily reward claimed").with_data(serde_json::json!({
        "amount": amount,
        "tokens": new_balance,
    })))
}
