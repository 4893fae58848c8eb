//! Domain events emitted by the room and replicated across instances.
//!
//! Local emission is synchronous and always happens; a subset of events is
//! additionally published to the shared bus wrapped in an [`EventEnvelope`]
//! that carries the origin instance id, so consumers can drop their own
//! publications and avoid feedback loops.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{InstanceId, ItemKey, PetId, PoopId, SessionId};

/// A state change worth announcing beyond the handler that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A session joined the room.
    PlayerJoined {
        /// The joining session.
        session_id: SessionId,
        /// The wallet it authenticated with.
        wallet_address: String,
    },
    /// A session left the room.
    PlayerLeft {
        /// The leaving session.
        session_id: SessionId,
        /// Whether the client left deliberately.
        consented: bool,
    },
    /// A pet was purchased and attached to the room.
    PetPurchased {
        /// The buying session.
        session_id: SessionId,
        /// The new pet.
        pet_id: PetId,
        /// Species key.
        pet_type: String,
    },
    /// A pet was removed from the room and from durable storage.
    PetRemoved {
        /// The owning session.
        session_id: SessionId,
        /// The removed pet.
        pet_id: PetId,
    },
    /// A pet was fed.
    PetFed {
        /// The owning session.
        session_id: SessionId,
        /// The fed pet.
        pet_id: PetId,
        /// Hunger restored.
        food_value: Decimal,
    },
    /// A pet finished a play session.
    PetPlayed {
        /// The owning session.
        session_id: SessionId,
        /// The pet that played.
        pet_id: PetId,
    },
    /// A pet was cleaned.
    PetCleaned {
        /// The owning session.
        session_id: SessionId,
        /// The cleaned pet.
        pet_id: PetId,
    },
    /// A pet dropped a poop.
    PoopCreated {
        /// The owning session.
        session_id: SessionId,
        /// The pet responsible.
        pet_id: PetId,
        /// The new poop.
        poop_id: PoopId,
    },
    /// A store purchase completed.
    ItemPurchased {
        /// The buying session.
        session_id: SessionId,
        /// The purchased inventory key.
        item_key: ItemKey,
        /// Stack size purchased.
        quantity: u32,
    },
    /// The daily reward was claimed.
    RewardClaimed {
        /// The claiming session.
        session_id: SessionId,
        /// Tokens granted.
        amount: Decimal,
    },
}

impl DomainEvent {
    /// Stable event kind, used as the bus subject suffix.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PlayerJoined { .. } => "player_joined",
            Self::PlayerLeft { .. } => "player_left",
            Self::PetPurchased { .. } => "pet_purchased",
            Self::PetRemoved { .. } => "pet_removed",
            Self::PetFed { .. } => "pet_fed",
            Self::PetPlayed { .. } => "pet_played",
            Self::PetCleaned { .. } => "pet_cleaned",
            Self::PoopCreated { .. } => "poop_created",
            Self::ItemPurchased { .. } => "item_purchased",
            Self::RewardClaimed { .. } => "reward_claimed",
        }
    }

    /// Whether this event is replicated to peer instances.
    ///
    /// Pure per-client notifications stay local; everything that mutates
    /// shared durable state crosses the bridge.
    pub const fn is_bridged(&self) -> bool {
        !matches!(self, Self::PoopCreated { .. })
    }
}

/// The wire wrapper for bridged events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// The instance that produced the event.
    pub origin: InstanceId,
    /// The event itself.
    pub event: DomainEvent,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrips_serde() {
        let envelope = EventEnvelope {
            origin: InstanceId::new(),
            event: DomainEvent::PetFed {
                session_id: SessionId::new("s1"),
                pet_id: PetId::new(),
                food_value: Decimal::from(25u32),
            },
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let back: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn kind_matches_snake_case_tag() {
        let event = DomainEvent::RewardClaimed {
            session_id: SessionId::new("s1"),
            amount: Decimal::from(50u32),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json.get("type").and_then(|v| v.as_str()), Some(event.kind()));
    }

    #[test]
    fn poop_events_stay_local() {
        let event = DomainEvent::PoopCreated {
            session_id: SessionId::new("s1"),
            pet_id: PetId::new(),
            poop_id: PoopId::new(),
        };
        assert!(!event.is_bridged());
    }
}
