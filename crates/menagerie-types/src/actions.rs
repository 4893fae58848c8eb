//! The closed inbound action set and the response envelope.
//!
//! Client messages arrive as a flat JSON object carrying an `action`
//! discriminator plus the action's fields. Deserialization IS validation:
//! a payload with missing or mistyped fields fails to parse and is dropped
//! by the pipeline (logged at debug, no response), per the room's
//! malformed-message policy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{PetId, SessionId};

/// One inbound client action.
///
/// Internally tagged on the `action` field, so the wire shape is
/// `{"action": "feed_pet", "pet_id": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Purchase a new pet of the given species.
    BuyPet {
        /// Species key from the pet catalog.
        pet_type: String,
    },
    /// Remove (release) an owned pet.
    RemovePet {
        /// The pet to remove.
        pet_id: PetId,
    },
    /// Basic feed using the default food value.
    FeedPet {
        /// The pet to feed.
        pet_id: PetId,
    },
    /// Play session start: raises happiness, costs hunger.
    PlayWithPet {
        /// The pet to play with.
        pet_id: PetId,
    },
    /// Cleaning completion report: restores cleanliness, clears poops.
    CleanedPet {
        /// The pet that was cleaned.
        pet_id: PetId,
    },
    /// Play completion report from the client minigame.
    PlayedPet {
        /// The pet that was played with.
        pet_id: PetId,
    },
    /// Client-side food consumption sync: decrements the stack only.
    FoodConsumed {
        /// Item id within the `food` category.
        item_id: String,
    },
    /// Drop a poop at a client-reported position.
    CreatePoop {
        /// The pet producing the poop.
        pet_id: PetId,
        /// Horizontal scene position.
        position_x: Decimal,
        /// Vertical scene position.
        position_y: Decimal,
    },
    /// Purchase food items from the store.
    PurchaseFood {
        /// Item id within the `food` category.
        item_id: String,
        /// Stack size to purchase.
        quantity: u32,
    },
    /// Fetch the pet species and store item catalogs.
    GetCatalog,
    /// Fetch the player's inventory summary.
    GetInventory,
    /// Feed a pet with a specific inventory food item.
    FeedPetWithFood {
        /// The pet to feed.
        pet_id: PetId,
        /// Item id within the `food` category.
        item_id: String,
    },
    /// Purchase an arbitrary store item.
    PurchaseItem {
        /// Item category.
        item_type: String,
        /// Item id within the category.
        item_id: String,
        /// Stack size to purchase.
        quantity: u32,
    },
    /// Fetch gameplay defaults and decay configuration.
    RequestGameConfig,
    /// Fetch the player's token balance and counts.
    RequestPlayerState,
    /// Fetch the player's profile (wallet, join time, totals).
    GetProfile,
    /// Fetch a snapshot of the player's pets.
    RequestPetsState,
    /// Claim the once-per-day token reward.
    ClaimDailyReward,
    /// Persist client settings against the user record.
    UpdateSettings {
        /// Opaque settings blob, stored as-is.
        settings: serde_json::Value,
    },
    /// Persist tutorial progress against the user record.
    UpdateTutorial {
        /// Highest tutorial step reached.
        step: u32,
        /// Whether the tutorial is finished.
        completed: bool,
    },
}

impl Action {
    /// Stable snake_case name of the action, used in response routing and logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BuyPet { .. } => "buy_pet",
            Self::RemovePet { .. } => "remove_pet",
            Self::FeedPet { .. } => "feed_pet",
            Self::PlayWithPet { .. } => "play_with_pet",
            Self::CleanedPet { .. } => "cleaned_pet",
            Self::PlayedPet { .. } => "played_pet",
            Self::FoodConsumed { .. } => "food_consumed",
            Self::CreatePoop { .. } => "create_poop",
            Self::PurchaseFood { .. } => "purchase_food",
            Self::GetCatalog => "get_catalog",
            Self::GetInventory => "get_inventory",
            Self::FeedPetWithFood { .. } => "feed_pet_with_food",
            Self::PurchaseItem { .. } => "purchase_item",
            Self::RequestGameConfig => "request_game_config",
            Self::RequestPlayerState => "request_player_state",
            Self::GetProfile => "get_profile",
            Self::RequestPetsState => "request_pets_state",
            Self::ClaimDailyReward => "claim_daily_reward",
            Self::UpdateSettings { .. } => "update_settings",
            Self::UpdateTutorial { .. } => "update_tutorial",
        }
    }
}

/// A raw message handed to the room by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The sending session.
    pub session_id: SessionId,
    /// The flat action object, parsed into [`Action`] by the pipeline.
    pub body: serde_json::Value,
}

/// The structured result sent back to the originating client.
///
/// Business failures are carried here with `success = false`; clients
/// never see a raw transport error for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Whether the action was applied.
    pub success: bool,
    /// Human-readable outcome description.
    pub message: String,
    /// Action-specific payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Machine-readable error tag on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server time of the response, epoch milliseconds.
    pub timestamp: i64,
}

impl ActionResponse {
    /// Build a success response.
    pub fn ok(message: impl Into<String>, data: Option<serde_json::Value>, now: DateTime<Utc>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
            timestamp: now.timestamp_millis(),
        }
    }

    /// Build a structured failure response.
    pub fn fail(message: impl Into<String>, error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
            timestamp: now.timestamp_millis(),
        }
    }
}

/// A message pushed to one client over its outbound channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Sent once after a successful join.
    Welcome {
        /// The room the session joined.
        room_name: String,
        /// The joining session id (echoed for client bookkeeping).
        session_id: SessionId,
        /// Token balance after hydration.
        tokens: Decimal,
        /// Number of pets restored from storage.
        pets_restored: u32,
    },
    /// The response to one inbound action.
    Response {
        /// The action name this responds to.
        action: String,
        /// The structured result.
        response: ActionResponse,
    },
    /// A full resync of the player's pets, pushed after mutations that
    /// change the pet set.
    StateSync {
        /// Current pets owned by the receiving session.
        pets: Vec<crate::pet::Pet>,
    },
}
