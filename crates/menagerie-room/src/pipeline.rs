//! The message pipeline: parse, dispatch, respond.
//!
//! State shape per action:
//!
//! ```text
//! InboundMessage
//!   -> parse (serde)         malformed => debug log, silent drop
//!   -> handler dispatch      business failure => structured failure
//!   -> ActionResponse        always sent for well-formed messages
//!   [+ optional pets-state resync push]
//! ```
//!
//! Handler errors never escape this module; the room task keeps running
//! no matter what a message contained.

use chrono::Utc;
use menagerie_types::{Action, ActionResponse, InboundMessage, RoomState};
use tracing::{debug, warn};

use crate::deps::RoomDeps;
use crate::error::ActionError;
use crate::handlers;

/// The pipeline's output for one well-formed message.
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    /// The action name, for response routing.
    pub action: &'static str,
    /// The structured result to send to the originating client.
    pub response: ActionResponse,
    /// Whether to follow the response with a pets-state resync push.
    pub resync: bool,
}

/// Run one inbound message through the pipeline.
///
/// Returns `None` for malformed payloads (missing or mistyped fields):
/// those are dropped with a debug log and the client receives nothing.
pub async fn process(
    state: &mut RoomState,
    deps: &RoomDeps,
    message: InboundMessage,
) -> Option<ProcessedMessage> {
    let action: Action = match serde_json::from_value(message.body) {
        Ok(action) => action,
        Err(e) => {
            debug!(
                session_id = %message.session_id,
                error = %e,
                "dropping malformed message"
            );
            deps.metrics.incr("room.message.malformed");
            return None;
        }
    };

    let name = action.name();
    let now = Utc::now();
    let result = handlers::dispatch(state, deps, &message.session_id, action, now).await;

    let processed = match result {
        Ok(outcome) => ProcessedMessage {
            action: name,
            resync: outcome.resync,
            response: ActionResponse::ok(outcome.message, outcome.data, Utc::now()),
        },
        Err(error) => {
            log_failure(name, &message.session_id, &error);
            deps.metrics.incr("room.action.failed");
            ProcessedMessage {
                action: name,
                resync: false,
                response: ActionResponse::fail(
                    error.client_message(),
                    error.code(),
                    Utc::now(),
                ),
            }
        }
    };

    Some(processed)
}

/// Log a handler failure at a severity matching its class.
fn log_failure(action: &str, session_id: &menagerie_types::SessionId, error: &ActionError) {
    match error {
        ActionError::Persistence(_) | ActionError::Unexpected(_) => {
            warn!(action, %session_id, error = %error, "action failed");
        }
        _ => {
            debug!(action, %session_id, error = %error, "action refused");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use menagerie_types::SessionId;
    use rust_decimal::Decimal;

    use crate::testutil::{attach_cat, state_with_player, test_deps};

    use super::*;

    fn message(session: &SessionId, body: serde_json::Value) -> InboundMessage {
        InboundMessage {
            session_id: session.clone(),
            body,
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_silently() {
        let (mut state, session) = state_with_player("a");
        let deps = test_deps();

        // feed_pet without its required pet_id
        let result = process(
            &mut state,
            &deps,
            message(&session, serde_json::json!({ "action": "feed_pet" })),
        )
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unknown_action_is_dropped_silently() {
        let (mut state, session) = state_with_player("a");
        let deps = test_deps();

        let result = process(
            &mut state,
            &deps,
            message(&session, serde_json::json!({ "action": "grant_admin" })),
        )
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn feed_pet_caps_at_hundred_and_raises_happiness() {
        let (mut state, session) = state_with_player("a");
        let pet_id = attach_cat(&mut state, &session);
        if let Some(pet) = state.pet_mut(pet_id) {
            pet.hunger = Decimal::from(80);
            pet.happiness = Decimal::from(40);
        }
        let deps = test_deps();

        let processed = process(
            &mut state,
            &deps,
            message(
                &session,
                serde_json::json!({ "action": "feed_pet", "pet_id": pet_id }),
            ),
        )
        .await
        .unwrap();

        assert!(processed.response.success);
        assert_eq!(processed.action, "feed_pet");
        let pet = state.pet(pet_id).unwrap();
        // 80 + 25 (default food value) caps at 100
        assert_eq!(pet.hunger, Decimal::from(100));
        // happiness += 25 * 0.5
        assert_eq!(pet.happiness, Decimal::new(525, 1));
    }

    #[tokio::test]
    async fn unknown_player_gets_structured_not_found() {
        let (mut state, _session) = state_with_player("a");
        let deps = test_deps();
        let ghost = SessionId::new("ghost");

        let processed = process(
            &mut state,
            &deps,
            message(&ghost, serde_json::json!({ "action": "get_inventory" })),
        )
        .await
        .unwrap();

        assert!(!processed.response.success);
        assert_eq!(processed.response.error.as_deref(), Some("not_found"));
    }

    #[tokio::test]
    async fn removing_someone_elses_pet_fails_and_mutates_nothing() {
        let (mut state, owner) = state_with_player("a");
        let intruder = SessionId::new("b");
        let player_b = menagerie_types::Player::new(
            intruder.clone(),
            "0xb",
            Decimal::from(100),
            chrono::Utc::now(),
        );
        state.add_player(player_b).unwrap();
        let pet_id = attach_cat(&mut state, &owner);
        let pets_before = state.pets.len();

        let deps = test_deps();
        let processed = process(
            &mut state,
            &deps,
            message(
                &intruder,
                serde_json::json!({ "action": "remove_pet", "pet_id": pet_id }),
            ),
        )
        .await
        .unwrap();

        assert!(!processed.response.success);
        assert_eq!(processed.response.error.as_deref(), Some("not_owner"));
        assert_eq!(state.pets.len(), pets_before);
        assert_eq!(state.player(&owner).unwrap().total_pets_owned, 1);
    }

    #[tokio::test]
    async fn feeding_a_missing_pet_is_not_found() {
        let (mut state, session) = state_with_player("a");
        let deps = test_deps();

        let processed = process(
            &mut state,
            &deps,
            message(
                &session,
                serde_json::json!({
                    "action": "feed_pet",
                    "pet_id": menagerie_types::PetId::new(),
                }),
            ),
        )
        .await
        .unwrap();

        assert!(!processed.response.success);
        assert_eq!(processed.response.error.as_deref(), Some("not_found"));
    }

    #[tokio::test]
    async fn get_inventory_is_idempotent() {
        let (mut state, session) = state_with_player("a");
        state
            .player_mut(&session)
            .unwrap()
            .add_item("food", "apple", "Apple", 3)
            .unwrap();
        let deps = test_deps();

        let first = process(
            &mut state,
            &deps,
            message(&session, serde_json::json!({ "action": "get_inventory" })),
        )
        .await
        .unwrap();
        let second = process(
            &mut state,
            &deps,
            message(&session, serde_json::json!({ "action": "get_inventory" })),
        )
        .await
        .unwrap();

        assert!(first.response.success);
        assert_eq!(first.response.data, second.response.data);
    }

    #[tokio::test]
    async fn food_consumed_to_zero_removes_the_stack() {
        let (mut state, session) = state_with_player("a");
        state
            .player_mut(&session)
            .unwrap()
            .add_item("food", "apple", "Apple", 2)
            .unwrap();
        let deps = test_deps();
        let body = serde_json::json!({ "action": "food_consumed", "item_id": "apple" });

        let first = process(&mut state, &deps, message(&session, body.clone()))
            .await
            .unwrap();
        assert!(first.response.success);
        let second = process(&mut state, &deps, message(&session, body.clone()))
            .await
            .unwrap();
        assert!(second.response.success);
        assert!(state.player(&session).unwrap().inventory.is_empty());

        // A third consumption has nothing left to take.
        let third = process(&mut state, &deps, message(&session, body)).await.unwrap();
        assert!(!third.response.success);
    }

    #[tokio::test]
    async fn feed_with_food_checks_ownership_before_consuming() {
        let (mut state, owner) = state_with_player("a");
        let intruder = SessionId::new("b");
        let mut player_b = menagerie_types::Player::new(
            intruder.clone(),
            "0xb",
            Decimal::from(100),
            chrono::Utc::now(),
        );
        player_b.add_item("food", "apple", "Apple", 1).unwrap();
        player_b.inventory_dirty = false;
        state.add_player(player_b).unwrap();
        let pet_id = attach_cat(&mut state, &owner);

        let deps = test_deps();
        let processed = process(
            &mut state,
            &deps,
            message(
                &intruder,
                serde_json::json!({
                    "action": "feed_pet_with_food",
                    "pet_id": pet_id,
                    "item_id": "apple",
                }),
            ),
        )
        .await
        .unwrap();

        assert!(!processed.response.success);
        // The intruder's apple was not consumed.
        let key = menagerie_types::ItemKey::new("food", "apple");
        assert_eq!(state.player(&intruder).unwrap().item_quantity(&key), 1);
    }

    #[tokio::test]
    async fn purchase_with_unreachable_storage_leaves_memory_untouched() {
        let (mut state, session) = state_with_player("a");
        let deps = test_deps();
        let tokens_before = state.player(&session).unwrap().tokens;

        let processed = process(
            &mut state,
            &deps,
            message(
                &session,
                serde_json::json!({
                    "action": "purchase_food",
                    "item_id": "apple",
                    "quantity": 2,
                }),
            ),
        )
        .await
        .unwrap();

        // The transactional path failed before any memory mutation.
        assert!(!processed.response.success);
        let player = state.player(&session).unwrap();
        assert_eq!(player.tokens, tokens_before);
        assert!(player.inventory.is_empty());
        // Internal detail stays out of the client message.
        assert!(!processed.response.message.contains("postgres"));
    }

    #[tokio::test]
    async fn buy_pet_resync_flag_is_set_on_success_paths_only() {
        let (mut state, session) = state_with_player("a");
        let deps = test_deps();

        // Unknown species: structured failure, no resync.
        let processed = process(
            &mut state,
            &deps,
            message(
                &session,
                serde_json::json!({ "action": "buy_pet", "pet_type": "dragon" }),
            ),
        )
        .await
        .unwrap();
        assert!(!processed.response.success);
        assert!(!processed.resync);
        assert_eq!(processed.response.error.as_deref(), Some("not_found"));
    }

    #[tokio::test]
    async fn create_poop_respects_the_floor_cap() {
        let (mut state, session) = state_with_player("a");
        let pet_id = attach_cat(&mut state, &session);
        let deps = test_deps();
        let max = deps.catalog.default_info().max_poops_per_pet;

        for _ in 0..max {
            let processed = process(
                &mut state,
                &deps,
                message(
                    &session,
                    serde_json::json!({
                        "action": "create_poop",
                        "pet_id": pet_id,
                        "position_x": "1.5",
                        "position_y": "2.5",
                    }),
                ),
            )
            .await
            .unwrap();
            assert!(processed.response.success);
        }

        let overflow = process(
            &mut state,
            &deps,
            message(
                &session,
                serde_json::json!({
                    "action": "create_poop",
                    "pet_id": pet_id,
                    "position_x": "1.5",
                    "position_y": "2.5",
                }),
            ),
        )
        .await
        .unwrap();
        assert!(!overflow.response.success);
        assert_eq!(overflow.response.error.as_deref(), Some("invalid_request"));
    }
}
