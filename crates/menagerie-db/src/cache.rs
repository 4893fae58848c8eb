//! Layered read-through cache: a fast in-process tier in front of the
//! shared `Dragonfly` tier.
//!
//! Read policy: local hit wins; on a local miss the shared tier is
//! consulted and a hit rewarms the local tier (best-effort); a miss in
//! both yields `None`. Write policy: write-through to both tiers
//! concurrently -- a shared-tier failure is logged and never fails the
//! call, so room logic keeps working when `Dragonfly` is degraded.
//!
//! Values are [`serde_json::Value`] documents produced from typed structs;
//! `chrono` timestamps and `rust_decimal` values round-trip through their
//! own serde impls, so no structure is lost in the cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::dragonfly::DragonflyPool;

/// One entry in the local tier.
#[derive(Debug, Clone)]
struct LocalEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// The in-process tier: a TTL map with lazy expiry.
#[derive(Debug, Default)]
pub struct LocalTier {
    entries: RwLock<HashMap<String, LocalEntry>>,
}

impl LocalTier {
    /// Create an empty local tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a key if present and not expired. Expired entries are pruned
    /// on the way out.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // The entry exists but is expired; drop it.
        self.entries.write().await.remove(key);
        None
    }

    /// Insert a key with a TTL.
    pub async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        let entry = LocalEntry {
            value,
            expires_at: Instant::now().checked_add(ttl).unwrap_or_else(Instant::now),
        };
        self.entries.write().await.insert(key.to_owned(), entry);
    }

    /// Number of live (possibly expired, not yet pruned) entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the tier holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// The layered cache: local tier over the shared `Dragonfly` tier.
pub struct TieredCache {
    local: LocalTier,
    shared: DragonflyPool,
    local_ttl: Duration,
}

/// Default lifetime of rewarmed/local entries.
const DEFAULT_LOCAL_TTL_SECS: u64 = 30;

impl TieredCache {
    /// Create a layered cache over a shared pool with the default local TTL.
    pub fn new(shared: DragonflyPool) -> Self {
        Self {
            local: LocalTier::new(),
            shared,
            local_ttl: Duration::from_secs(DEFAULT_LOCAL_TTL_SECS),
        }
    }

    /// Override the local-tier TTL.
    #[must_use]
    pub fn with_local_ttl(mut self, ttl: Duration) -> Self {
        self.local_ttl = ttl;
        self
    }

    /// Read-through get.
    ///
    /// Local hit wins; a shared hit rewarms the local tier; shared-tier
    /// errors are logged and treated as misses.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        if let Some(value) = self.local.get(key).await {
            return Some(value);
        }

        match self.shared.get_json::<serde_json::Value>(key).await {
            Ok(Some(value)) => {
                self.local.set(key, value.clone(), self.local_ttl).await;
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "shared cache read failed, treating as miss");
                None
            }
        }
    }

    /// Write-through set with a shared-tier TTL.
    ///
    /// Both tiers are written concurrently; a shared-tier failure is
    /// logged and does not fail the call.
    pub async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        let ttl_secs = i64::try_from(ttl.as_secs()).ok();
        let local_write = self.local.set(key, value.clone(), ttl.min(self.local_ttl));
        let shared_write = self.shared.set_json(key, &value, ttl_secs);

        let ((), shared_result) = tokio::join!(local_write, shared_write);
        if let Err(e) = shared_result {
            tracing::warn!(key, error = %e, "shared cache write failed, local tier updated");
        }
    }

    /// Batched read-through get.
    ///
    /// Local hits are answered in place; the remaining keys go to the
    /// shared tier in one round trip, and shared hits rewarm locally.
    /// The result is position-aligned with `keys`.
    pub async fn mget(&self, keys: &[String]) -> Vec<Option<serde_json::Value>> {
        let mut results: Vec<Option<serde_json::Value>> = Vec::with_capacity(keys.len());
        let mut missing: Vec<(usize, String)> = Vec::new();

        for (index, key) in keys.iter().enumerate() {
            let hit = self.local.get(key).await;
            if hit.is_none() {
                missing.push((index, key.clone()));
            }
            results.push(hit);
        }

        if missing.is_empty() {
            return results;
        }

        let shared_keys: Vec<String> = missing.iter().map(|(_, k)| k.clone()).collect();
        match self
            .shared
            .mget_json::<serde_json::Value>(&shared_keys)
            .await
        {
            Ok(shared_values) => {
                for ((index, key), value) in missing.into_iter().zip(shared_values) {
                    if let Some(value) = value {
                        self.local.set(&key, value.clone(), self.local_ttl).await;
                        if let Some(slot) = results.get_mut(index) {
                            *slot = Some(value);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "shared cache batch read failed, treating as misses");
            }
        }

        results
    }

    /// Batched write-through set.
    ///
    /// Applies the same per-key policy as [`TieredCache::set`]; the shared
    /// round trip is batched.
    pub async fn mset(&self, entries: &[(String, serde_json::Value)], ttl: Duration) {
        let ttl_secs = i64::try_from(ttl.as_secs()).ok();

        for (key, value) in entries {
            self.local
                .set(key, value.clone(), ttl.min(self.local_ttl))
                .await;
        }

        if let Err(e) = self.shared.mset_json(entries, ttl_secs).await {
            tracing::warn!(error = %e, "shared cache batch write failed, local tier updated");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_tier_hit_within_ttl() {
        let tier = LocalTier::new();
        tier.set("k", serde_json::json!(1), Duration::from_secs(60)).await;
        assert_eq!(tier.get("k").await, Some(serde_json::json!(1)));
    }

    #[tokio::test]
    async fn local_tier_expires() {
        let tier = LocalTier::new();
        tier.set("k", serde_json::json!(1), Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(tier.get("k").await, None);
        // Expired entry was pruned, not just hidden.
        assert!(tier.is_empty().await);
    }

    #[tokio::test]
    async fn local_tier_miss_on_absent_key() {
        let tier = LocalTier::new();
        assert_eq!(tier.get("nope").await, None);
        assert_eq!(tier.len().await, 0);
    }

    #[tokio::test]
    async fn local_tier_overwrite_refreshes_value() {
        let tier = LocalTier::new();
        tier.set("k", serde_json::json!("old"), Duration::from_secs(60)).await;
        tier.set("k", serde_json::json!("new"), Duration::from_secs(60)).await;
        assert_eq!(tier.get("k").await, Some(serde_json::json!("new")));
    }
}
