//! The action-failure taxonomy.
//!
//! Handlers return [`ActionError`]; the pipeline converts every variant
//! into a structured failure response. Errors never escape the dispatch
//! boundary -- a client always receives `{success: false, ...}`, never a
//! transport error, and the room never crashes on a handler failure.
//!
//! Malformed messages are not represented here: they fail to parse before
//! dispatch and are dropped silently (logged at debug, no response).

use menagerie_db::DbError;
use menagerie_types::{EntityError, PetId};
use rust_decimal::Decimal;

/// Why an action was refused or failed.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// A referenced player, pet, species, or item does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The durable balance could not cover the purchase.
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// The amount the purchase required.
        required: Decimal,
        /// The balance actually available.
        available: Decimal,
    },

    /// The pet exists but belongs to another session.
    #[error("pet {pet_id} is not owned by this session")]
    Ownership {
        /// The pet that was targeted.
        pet_id: PetId,
    },

    /// The daily reward gate has not elapsed yet.
    #[error("daily reward already claimed")]
    RewardNotReady,

    /// The request parsed but carries an unusable value (zero quantity,
    /// full poop floor, pet limit reached).
    #[error("{0}")]
    Invalid(String),

    /// A durable write failed. Memory may already be mutated except in
    /// the transactional purchase path, which rolls back fully.
    #[error("persistence failure: {0}")]
    Persistence(DbError),

    /// An entity-model mutation was refused.
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Anything else: converted to a generic structured failure at the
    /// dispatch boundary and logged with its chain.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<DbError> for ActionError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::InsufficientFunds {
                required, available, ..
            } => Self::InsufficientFunds {
                required,
                available,
            },
            DbError::RewardAlreadyClaimed { .. } => Self::RewardNotReady,
            DbError::NotFound(what) => Self::NotFound(what),
            other => Self::Persistence(other),
        }
    }
}

impl ActionError {
    /// Machine-readable error tag for the response envelope.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::Ownership { .. } => "not_owner",
            Self::RewardNotReady => "reward_not_ready",
            Self::Invalid(_) => "invalid_request",
            Self::Persistence(_) => "persistence_error",
            Self::Entity(_) => "entity_error",
            Self::Unexpected(_) => "internal_error",
        }
    }

    /// The human-readable message shown to the client.
    ///
    /// Internal failure detail stays in the server logs; clients get a
    /// generic line for persistence and unexpected errors.
    pub fn client_message(&self) -> String {
        match self {
            Self::Persistence(_) | Self::Unexpected(_) => {
                String::from("something went wrong, please try again")
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_insufficient_funds_maps_to_structured_variant() {
        let db = DbError::InsufficientFunds {
            wallet: String::from("0xabc"),
            required: Decimal::from(50),
            available: Decimal::from(10),
        };
        let action: ActionError = db.into();
        assert_eq!(action.code(), "insufficient_funds");
    }

    #[test]
    fn internal_errors_hide_detail_from_clients() {
        let err = ActionError::Unexpected(String::from("sqlx pool exhausted"));
        assert!(!err.client_message().contains("sqlx"));
    }

    #[test]
    fn not_found_passes_subject_through() {
        let err = ActionError::NotFound(String::from("pet"));
        assert_eq!(err.client_message(), "pet not found");
        assert_eq!(err.code(), "not_found");
    }
}
