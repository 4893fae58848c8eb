//! `Dragonfly` (Redis-compatible) shared cache operations.
//!
//! `Dragonfly` is the cross-instance tier of the layered cache: session
//! blacklists, rate-limit marks, and other key/value state every room host
//! must agree on. Values are serde-serialized through their typed structs,
//! so dates and decimals survive the round trip as their own types.

use fred::prelude::*;
use fred::types::Expiration;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DbError;

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`] and provides typed JSON get/set with
/// optional TTLs plus the batched variants the tiered cache uses.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Serialize `value` and store it at `key`, optionally with a TTL.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if serialization fails.
    /// Returns [`DbError::Dragonfly`] if the write fails.
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<i64>,
    ) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let expiration = ttl_secs.map(Expiration::EX);
        let _: () = self
            .client
            .set(key, json.as_str(), expiration, None, false)
            .await?;
        Ok(())
    }

    /// Read the value at `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if deserialization fails.
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let value: Option<String> = self.client.get(key).await?;
        value.map(|s| serde_json::from_str(&s)).transpose().map_err(DbError::from)
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), DbError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }

    /// Batch-read several keys in one round trip.
    ///
    /// The result is position-aligned with `keys`; absent keys yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if any present value fails to
    /// deserialize. Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn mget_json<T: DeserializeOwned>(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<T>>, DbError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Option<String>> = self.client.mget(keys.to_vec()).await?;
        let mut parsed = Vec::with_capacity(values.len());
        for value in values {
            parsed.push(value.map(|s| serde_json::from_str(&s)).transpose()?);
        }
        Ok(parsed)
    }

    /// Batch-write several key/value pairs, each with the same TTL.
    ///
    /// Writes are issued concurrently; the call fails only if every pair
    /// cannot be serialized up front or a write errors.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if any value fails to serialize.
    /// Returns [`DbError::Dragonfly`] if a write fails.
    pub async fn mset_json<T: Serialize>(
        &self,
        entries: &[(String, T)],
        ttl_secs: Option<i64>,
    ) -> Result<(), DbError> {
        let mut writes = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let json = serde_json::to_string(value)?;
            writes.push((key.clone(), json));
        }

        let results = futures::future::join_all(writes.iter().map(|(key, json)| {
            let expiration = ttl_secs.map(Expiration::EX);
            self.client
                .set::<(), _, _>(key.as_str(), json.as_str(), expiration, None, false)
        }))
        .await;

        for result in results {
            result?;
        }
        Ok(())
    }

    /// Flush all keys from the `Dragonfly` instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), DbError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}
