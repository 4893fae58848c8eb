//! Operations on the `owned_pets` table.
//!
//! Pet purchase follows one contract everywhere: durable-write-first,
//! memory-mirror-second. [`PetStore::create_purchased`] debits the wallet
//! and inserts the pet row in a single transaction, so a crash can never
//! leave a paid-for pet unrecorded (or an unpaid pet recorded). The room
//! only mirrors the pet into `RoomState` after the commit returns.

use chrono::{DateTime, Utc};
use menagerie_types::{Pet, PetId, SessionId};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::DbError;
use crate::user_store::UserStore;

/// A durable pet row, keyed by owner wallet rather than session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPetRow {
    /// Pet identifier.
    pub id: Uuid,
    /// Owning wallet address.
    pub owner_wallet: String,
    /// Species key.
    pub pet_type: String,
    /// Hunger at last persist.
    pub hunger: Decimal,
    /// Happiness at last persist.
    pub happiness: Decimal,
    /// Cleanliness at last persist.
    pub cleanliness: Decimal,
    /// Decay baseline at last persist.
    pub last_updated: DateTime<Utc>,
}

impl OwnedPetRow {
    /// Snapshot an in-memory pet for persistence.
    pub fn from_pet(pet: &Pet, owner_wallet: &str) -> Self {
        Self {
            id: pet.id.into_inner(),
            owner_wallet: owner_wallet.to_owned(),
            pet_type: pet.pet_type.clone(),
            hunger: pet.hunger,
            happiness: pet.happiness,
            cleanliness: pet.cleanliness,
            last_updated: pet.last_updated,
        }
    }

    /// Rebuild an in-memory pet for the given session from this row.
    pub fn into_pet(self, owner: SessionId) -> Pet {
        Pet {
            id: PetId::from(self.id),
            owner_id: owner,
            pet_type: self.pet_type,
            hunger: self.hunger,
            happiness: self.happiness,
            cleanliness: self.cleanliness,
            last_updated: self.last_updated,
            poops: Vec::new(),
        }
    }
}

/// Operations on the `owned_pets` table.
pub struct PetStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PetStore<'a> {
    /// Create a new pet store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Purchase a pet: debit `price` from the wallet and insert the pet row
    /// in one transaction. Returns the post-debit balance.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InsufficientFunds`] if the balance is too low,
    /// [`DbError::NotFound`] for unknown wallets, or [`DbError::Postgres`]
    /// on storage failure. On any error the transaction aborts: no debit,
    /// no pet row.
    pub async fn create_purchased(
        &self,
        row: &OwnedPetRow,
        price: Decimal,
    ) -> Result<Decimal, DbError> {
        let mut tx = self.pool.begin().await?;

        let new_balance = UserStore::debit_in_tx(&mut tx, &row.owner_wallet, price).await?;

        sqlx::query(
            r"INSERT INTO owned_pets
                  (id, owner_wallet, pet_type, hunger, happiness, cleanliness, last_updated)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(row.id)
        .bind(&row.owner_wallet)
        .bind(&row.pet_type)
        .bind(row.hunger)
        .bind(row.happiness)
        .bind(row.cleanliness)
        .bind(row.last_updated)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    /// Delete a pet row, verifying the owner in the same statement.
    ///
    /// Returns `true` if a row was deleted; `false` means the pet did not
    /// exist or belonged to a different wallet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn delete(&self, pet_id: Uuid, owner_wallet: &str) -> Result<bool, DbError> {
        let result = sqlx::query(r"DELETE FROM owned_pets WHERE id = $1 AND owner_wallet = $2")
            .bind(pet_id)
            .bind(owner_wallet)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Load every pet owned by a wallet (join-time hydration).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn find_by_wallet(&self, wallet: &str) -> Result<Vec<OwnedPetRow>, DbError> {
        let rows = sqlx::query(
            r"SELECT id, owner_wallet, pet_type, hunger, happiness, cleanliness, last_updated
              FROM owned_pets WHERE owner_wallet = $1 ORDER BY id",
        )
        .bind(wallet)
        .fetch_all(self.pool)
        .await?;

        let mut pets = Vec::with_capacity(rows.len());
        for row in &rows {
            pets.push(OwnedPetRow {
                id: row.try_get("id")?,
                owner_wallet: row.try_get("owner_wallet")?,
                pet_type: row.try_get("pet_type")?,
                hunger: row.try_get("hunger")?,
                happiness: row.try_get("happiness")?,
                cleanliness: row.try_get("cleanliness")?,
                last_updated: row.try_get("last_updated")?,
            });
        }
        Ok(pets)
    }

    /// Persist the current stats of a batch of pets (leave flush and the
    /// periodic snapshot). Uses a single UNNEST update per batch.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn save_stats(&self, rows: &[OwnedPetRow]) -> Result<(), DbError> {
        if rows.is_empty() {
            return Ok(());
        }

        let len = rows.len();
        let mut ids = Vec::with_capacity(len);
        let mut hungers = Vec::with_capacity(len);
        let mut happinesses = Vec::with_capacity(len);
        let mut cleanlinesses = Vec::with_capacity(len);
        let mut timestamps = Vec::with_capacity(len);

        for row in rows {
            ids.push(row.id);
            hungers.push(row.hunger);
            happinesses.push(row.happiness);
            cleanlinesses.push(row.cleanliness);
            timestamps.push(row.last_updated);
        }

        sqlx::query(
            r"UPDATE owned_pets AS p
              SET hunger = u.hunger, happiness = u.happiness,
                  cleanliness = u.cleanliness, last_updated = u.last_updated
              FROM UNNEST($1::UUID[], $2::NUMERIC[], $3::NUMERIC[], $4::NUMERIC[], $5::TIMESTAMPTZ[])
                   AS u(id, hunger, happiness, cleanliness, last_updated)
              WHERE p.id = u.id",
        )
        .bind(&ids)
        .bind(&hungers)
        .bind(&happinesses)
        .bind(&cleanlinesses)
        .bind(&timestamps)
        .execute(self.pool)
        .await?;

        tracing::debug!(count = len, "Persisted pet stats (batch UNNEST)");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn row_pet_roundtrip_preserves_stats() {
        let session = SessionId::new("s1");
        let mut pet = Pet::new(PetId::new(), session.clone(), "cat", Utc::now());
        pet.hunger = Decimal::new(425, 1);

        let row = OwnedPetRow::from_pet(&pet, "0xabc");
        assert_eq!(row.owner_wallet, "0xabc");
        assert_eq!(row.hunger, Decimal::new(425, 1));

        let restored = row.into_pet(session);
        assert_eq!(restored.id, pet.id);
        assert_eq!(restored.hunger, pet.hunger);
        assert!(restored.poops.is_empty());
    }
}
