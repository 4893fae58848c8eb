//! Operations on the `users` table: wallet accounts and token balances.
//!
//! The durable balance is the authority. Every purchase flow goes through
//! [`UserStore::debit_tokens`], which re-reads the balance inside a
//! transaction (`FOR UPDATE`, never trusting the room's in-memory mirror),
//! verifies sufficiency, applies the decrement, and commits -- on any
//! failure the transaction aborts and nothing changes. Credits use a single
//! atomic increment statement.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::error::DbError;

/// Hours between daily reward claims.
const DAILY_REWARD_GATE_HOURS: i64 = 24;

/// A user account row.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    /// The wallet address (primary key).
    pub wallet_address: String,
    /// Current token balance.
    pub tokens: Decimal,
    /// Serialized inventory stacks, written by the bulk flush.
    pub inventory: serde_json::Value,
    /// Opaque client settings blob.
    pub settings: Option<serde_json::Value>,
    /// Highest tutorial step reached.
    pub tutorial_step: i32,
    /// Whether the tutorial is finished.
    pub tutorial_completed: bool,
    /// Last successful daily reward claim, if any.
    pub last_daily_claim: Option<DateTime<Utc>>,
}

/// Operations on the `users` table.
pub struct UserStore<'a> {
    pool: &'a PgPool,
}

impl<'a> UserStore<'a> {
    /// Create a new user store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a user by wallet, creating the account with `starting_tokens`
    /// on first contact.
    ///
    /// The upsert makes join hydration a single round-trip and keeps
    /// concurrent first joins of the same wallet race-free.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn find_or_create(
        &self,
        wallet: &str,
        starting_tokens: Decimal,
    ) -> Result<UserRecord, DbError> {
        let row = sqlx::query(
            r"INSERT INTO users (wallet_address, tokens)
              VALUES ($1, $2)
              ON CONFLICT (wallet_address)
              DO UPDATE SET wallet_address = EXCLUDED.wallet_address
              RETURNING wallet_address, tokens, inventory, settings,
                        tutorial_step, tutorial_completed, last_daily_claim",
        )
        .bind(wallet)
        .bind(starting_tokens)
        .fetch_one(self.pool)
        .await?;

        Self::record_from_row(&row)
    }

    /// Read the current durable balance for a wallet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the wallet has no account.
    pub async fn balance(&self, wallet: &str) -> Result<Decimal, DbError> {
        let row = sqlx::query(r"SELECT tokens FROM users WHERE wallet_address = $1")
            .bind(wallet)
            .fetch_optional(self.pool)
            .await?;

        row.map_or_else(
            || Err(DbError::NotFound(format!("user {wallet}"))),
            |r| Ok(r.try_get("tokens")?),
        )
    }

    /// Transactionally debit `amount` tokens from a wallet.
    ///
    /// Opens a transaction, re-reads the balance with `FOR UPDATE`, verifies
    /// sufficiency, applies the decrement, and commits. Returns the new
    /// balance. On [`DbError::InsufficientFunds`] (or any storage failure)
    /// the transaction aborts and the durable balance is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InsufficientFunds`] if the balance is too low,
    /// [`DbError::NotFound`] if the wallet has no account, or
    /// [`DbError::Postgres`] on storage failure.
    pub async fn debit_tokens(&self, wallet: &str, amount: Decimal) -> Result<Decimal, DbError> {
        let mut tx = self.pool.begin().await?;
        let new_balance = Self::debit_in_tx(&mut tx, wallet, amount).await?;
        tx.commit().await?;
        Ok(new_balance)
    }

    /// The debit step, exposed for flows that bundle further writes into
    /// the same transaction (e.g. pet purchase: debit + pet row insert).
    ///
    /// # Errors
    ///
    /// See [`UserStore::debit_tokens`].
    pub async fn debit_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        wallet: &str,
        amount: Decimal,
    ) -> Result<Decimal, DbError> {
        let row = sqlx::query(r"SELECT tokens FROM users WHERE wallet_address = $1 FOR UPDATE")
            .bind(wallet)
            .fetch_optional(&mut **tx)
            .await?;

        let available: Decimal = match row {
            Some(r) => r.try_get("tokens")?,
            None => return Err(DbError::NotFound(format!("user {wallet}"))),
        };

        if available < amount {
            return Err(DbError::InsufficientFunds {
                wallet: wallet.to_owned(),
                required: amount,
                available,
            });
        }

        let updated = sqlx::query(
            r"UPDATE users SET tokens = tokens - $2 WHERE wallet_address = $1 RETURNING tokens",
        )
        .bind(wallet)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await?;

        Ok(updated.try_get("tokens")?)
    }

    /// Atomically credit `amount` tokens to a wallet and return the new
    /// balance. A single-statement increment; no read-modify-write race.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the wallet has no account.
    pub async fn credit_tokens(&self, wallet: &str, amount: Decimal) -> Result<Decimal, DbError> {
        let row = sqlx::query(
            r"UPDATE users SET tokens = tokens + $2 WHERE wallet_address = $1 RETURNING tokens",
        )
        .bind(wallet)
        .bind(amount)
        .fetch_optional(self.pool)
        .await?;

        row.map_or_else(
            || Err(DbError::NotFound(format!("user {wallet}"))),
            |r| Ok(r.try_get("tokens")?),
        )
    }

    /// Claim the daily reward: transactionally verify the 24-hour gate,
    /// credit `amount`, and stamp the claim time. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::RewardAlreadyClaimed`] inside the gate window,
    /// [`DbError::NotFound`] for unknown wallets, or [`DbError::Postgres`]
    /// on storage failure. On any error nothing changes.
    pub async fn claim_daily_reward(
        &self,
        wallet: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Decimal, DbError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r"SELECT last_daily_claim FROM users WHERE wallet_address = $1 FOR UPDATE",
        )
        .bind(wallet)
        .fetch_optional(&mut *tx)
        .await?;

        let last_claim: Option<DateTime<Utc>> = match row {
            Some(r) => r.try_get("last_daily_claim")?,
            None => return Err(DbError::NotFound(format!("user {wallet}"))),
        };

        if let Some(claimed_at) = last_claim {
            let gate = claimed_at.checked_add_signed(Duration::hours(DAILY_REWARD_GATE_HOURS));
            if gate.is_none_or(|g| now < g) {
                return Err(DbError::RewardAlreadyClaimed {
                    wallet: wallet.to_owned(),
                });
            }
        }

        let updated = sqlx::query(
            r"UPDATE users SET tokens = tokens + $2, last_daily_claim = $3
              WHERE wallet_address = $1 RETURNING tokens",
        )
        .bind(wallet)
        .bind(amount)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let new_balance: Decimal = updated.try_get("tokens")?;
        tx.commit().await?;
        Ok(new_balance)
    }

    /// Persist a serialized inventory for a wallet (the bulk flush write).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the write fails.
    pub async fn save_inventory(
        &self,
        wallet: &str,
        inventory: &serde_json::Value,
    ) -> Result<(), DbError> {
        sqlx::query(r"UPDATE users SET inventory = $2 WHERE wallet_address = $1")
            .bind(wallet)
            .bind(inventory)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Persist the client settings blob.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the write fails.
    pub async fn save_settings(
        &self,
        wallet: &str,
        settings: &serde_json::Value,
    ) -> Result<(), DbError> {
        sqlx::query(r"UPDATE users SET settings = $2 WHERE wallet_address = $1")
            .bind(wallet)
            .bind(settings)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Persist tutorial progress.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the write fails.
    pub async fn save_tutorial(
        &self,
        wallet: &str,
        step: i32,
        completed: bool,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE users SET tutorial_step = $2, tutorial_completed = $3
              WHERE wallet_address = $1",
        )
        .bind(wallet)
        .bind(step)
        .bind(completed)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Map a `users` row into a [`UserRecord`].
    fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<UserRecord, DbError> {
        Ok(UserRecord {
            wallet_address: row.try_get("wallet_address")?,
            tokens: row.try_get("tokens")?,
            inventory: row.try_get("inventory")?,
            settings: row.try_get("settings")?,
            tutorial_step: row.try_get("tutorial_step")?,
            tutorial_completed: row.try_get("tutorial_completed")?,
            last_daily_claim: row.try_get("last_daily_claim")?,
        })
    }
}
