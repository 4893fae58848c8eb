//! Session audit rows: one per join, closed at leave.
//!
//! These rows exist for support and abuse investigation; the room never
//! reads them back. Writes here must tolerate arriving after the room that
//! issued them is gone (disposal does not await in-flight writes).

use chrono::{DateTime, Utc};
use menagerie_types::SessionId;
use sqlx::PgPool;

use crate::error::DbError;

/// Operations on the `sessions` table.
pub struct SessionStore<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionStore<'a> {
    /// Create a session store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a join.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn record_join(
        &self,
        session_id: &SessionId,
        wallet: &str,
        room_name: &str,
        joined_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO sessions (session_id, wallet_address, room_name, joined_at)
              VALUES ($1, $2, $3, $4)",
        )
        .bind(session_id.as_str())
        .bind(wallet)
        .bind(room_name)
        .bind(joined_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Close the most recent open row for a session.
    ///
    /// Idempotent: closing an already-closed session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn record_leave(
        &self,
        session_id: &SessionId,
        consented: bool,
        left_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE sessions SET left_at = $2, consented = $3
              WHERE id = (
                  SELECT id FROM sessions
                  WHERE session_id = $1 AND left_at IS NULL
                  ORDER BY joined_at DESC LIMIT 1
              )",
        )
        .bind(session_id.as_str())
        .bind(left_at)
        .bind(consented)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
