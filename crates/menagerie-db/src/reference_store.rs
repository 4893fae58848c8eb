//! Read-only queries for the reference catalogs.
//!
//! These tables are operator-maintained configuration: pet species, store
//! items, and the gameplay defaults document. The room never writes them;
//! `menagerie-catalog` loads them once at host startup.

use menagerie_types::{DefaultInfo, PetSpecies, StoreItem};
use sqlx::{PgPool, Row};

use crate::error::DbError;

/// Read-only access to the reference tables.
pub struct ReferenceStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ReferenceStore<'a> {
    /// Create a reference store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load all pet species.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_pet_species(&self) -> Result<Vec<PetSpecies>, DbError> {
        let rows = sqlx::query(
            r"SELECT species_id, name, price,
                     hunger_decay_per_hour, happiness_decay_per_hour, cleanliness_decay_per_hour
              FROM pet_species ORDER BY species_id",
        )
        .fetch_all(self.pool)
        .await?;

        let mut species = Vec::with_capacity(rows.len());
        for row in &rows {
            species.push(PetSpecies {
                species_id: row.try_get("species_id")?,
                name: row.try_get("name")?,
                price: row.try_get("price")?,
                hunger_decay_per_hour: row.try_get("hunger_decay_per_hour")?,
                happiness_decay_per_hour: row.try_get("happiness_decay_per_hour")?,
                cleanliness_decay_per_hour: row.try_get("cleanliness_decay_per_hour")?,
            });
        }
        Ok(species)
    }

    /// Load all store items.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_store_items(&self) -> Result<Vec<StoreItem>, DbError> {
        let rows = sqlx::query(
            r"SELECT item_type, item_id, name, price, food_value
              FROM store_items ORDER BY item_type, item_id",
        )
        .fetch_all(self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(StoreItem {
                item_type: row.try_get("item_type")?,
                item_id: row.try_get("item_id")?,
                name: row.try_get("name")?,
                price: row.try_get("price")?,
                food_value: row.try_get("food_value")?,
            });
        }
        Ok(items)
    }

    /// Load the gameplay defaults document.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the singleton row is absent,
    /// [`DbError::Serialization`] if the document does not match
    /// [`DefaultInfo`], or [`DbError::Postgres`] on query failure.
    pub async fn load_default_info(&self) -> Result<DefaultInfo, DbError> {
        let row = sqlx::query(r"SELECT doc FROM default_info LIMIT 1")
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Err(DbError::NotFound(String::from("default_info")));
        };

        let doc: serde_json::Value = row.try_get("doc")?;
        Ok(serde_json::from_value(doc)?)
    }
}
