//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] and [`fred`] errors with additional context about which
//! operation failed. Business-level storage outcomes that handlers must
//! distinguish (insufficient funds, reward gate) are their own variants so
//! the room can map them to structured client failures without string
//! matching.

use rust_decimal::Decimal;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row expected to exist was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A transactional debit found the balance too low; nothing changed.
    #[error("insufficient funds for {wallet}: need {required}, have {available}")]
    InsufficientFunds {
        /// The wallet whose balance was checked.
        wallet: String,
        /// The amount the debit required.
        required: Decimal,
        /// The balance actually on record.
        available: Decimal,
    },

    /// The daily reward was already claimed inside the gate window.
    #[error("daily reward already claimed for {wallet}")]
    RewardAlreadyClaimed {
        /// The wallet that tried to claim.
        wallet: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
