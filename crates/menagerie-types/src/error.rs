//! Error types for entity-model mutations.
//!
//! Mutation helpers return typed errors instead of panicking; callers in the
//! room layer translate them into structured client responses.

use rust_decimal::Decimal;

use crate::ids::{ItemKey, PetId, SessionId};

/// Errors that can occur while mutating room entities.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// Attempted to remove more of an item than the player holds.
    #[error("insufficient quantity of {key}: wanted {requested} but only have {available}")]
    InsufficientQuantity {
        /// The inventory key being consumed.
        key: ItemKey,
        /// The quantity the caller attempted to remove.
        requested: u32,
        /// The quantity the player actually holds.
        available: u32,
    },

    /// An inventory counter would overflow `u32`.
    #[error("quantity overflow for {key}")]
    QuantityOverflow {
        /// The inventory key being mutated.
        key: ItemKey,
    },

    /// A token balance write would leave the player negative.
    #[error("negative balance {balance} for session {session_id}")]
    NegativeBalance {
        /// The session whose balance was written.
        session_id: SessionId,
        /// The offending balance value.
        balance: Decimal,
    },

    /// A player with the given session id is already in the room.
    #[error("session already joined: {0}")]
    DuplicateSession(SessionId),

    /// The derived pet counter would overflow.
    #[error("pet count overflow for session {0}")]
    PetCountOverflow(SessionId),

    /// A pet was attached to a session that is not in the room.
    #[error("owner not found for pet {pet_id}: {session_id}")]
    OwnerMissing {
        /// The pet being attached.
        pet_id: PetId,
        /// The absent owning session.
        session_id: SessionId,
    },
}
