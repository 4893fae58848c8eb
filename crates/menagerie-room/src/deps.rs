//! Explicit collaborator injection for the room.
//!
//! The room factory receives every collaborator (durable storage, caches,
//! the event bridge, metrics) by value at construction -- there is no
//! global registry and nothing is looked up by runtime shape. Handlers
//! borrow the same [`RoomDeps`] the room was built with.

use std::sync::Arc;
use std::time::Duration;

use menagerie_bridge::EventBridge;
use menagerie_catalog::ReferenceCache;
use menagerie_db::{PostgresPool, TieredCache};

use crate::metrics::{MetricsSink, NullMetrics};

/// Default seconds between decay ticks.
const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;

/// Default reconnection grace window in seconds.
const DEFAULT_RECONNECT_GRACE_SECS: u64 = 60;

/// Default ticks between bulk player flushes (~5 minutes at the default
/// tick interval).
const DEFAULT_FLUSH_EVERY_TICKS: u64 = 10;

/// Default ticks between pet-stat snapshots (~15 minutes at the default
/// tick interval).
const DEFAULT_SNAPSHOT_EVERY_TICKS: u64 = 30;

/// Tunables for one room instance.
///
/// The flush and snapshot cadences are tick counters relative to room
/// start, not calendar-aligned; they reset when the room restarts.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Room name, used in logs and session audit rows.
    pub room_name: String,
    /// Interval between decay ticks.
    pub tick_interval: Duration,
    /// How long an unconsented leaver may resume their session.
    pub reconnect_grace: Duration,
    /// Ticks between bulk flushes of dirty player state.
    pub flush_every_ticks: u64,
    /// Ticks between pet-stat snapshot persists.
    pub snapshot_every_ticks: u64,
}

impl RoomConfig {
    /// Config for a named room with default cadences.
    pub fn new(room_name: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
            reconnect_grace: Duration::from_secs(DEFAULT_RECONNECT_GRACE_SECS),
            flush_every_ticks: DEFAULT_FLUSH_EVERY_TICKS,
            snapshot_every_ticks: DEFAULT_SNAPSHOT_EVERY_TICKS,
        }
    }

    /// Override the tick interval.
    #[must_use]
    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Override the reconnection grace window.
    #[must_use]
    pub const fn with_reconnect_grace(mut self, grace: Duration) -> Self {
        self.reconnect_grace = grace;
        self
    }
}

/// Everything the room needs from the outside world.
#[derive(Clone)]
pub struct RoomDeps {
    /// Durable storage pool; handlers build typed stores over it.
    pub postgres: PostgresPool,
    /// The layered key/value cache (session blacklists). `None` disables
    /// the shared tier in single-instance deployments and tests.
    pub cache: Option<Arc<TieredCache>>,
    /// The reference-data cache, loaded at host startup.
    pub catalog: Arc<ReferenceCache>,
    /// The cross-instance event bridge.
    pub bridge: Arc<EventBridge>,
    /// Fire-and-forget metrics.
    pub metrics: Arc<dyn MetricsSink>,
}

impl RoomDeps {
    /// Assemble the dependency set.
    pub fn new(
        postgres: PostgresPool,
        cache: Option<Arc<TieredCache>>,
        catalog: Arc<ReferenceCache>,
        bridge: Arc<EventBridge>,
    ) -> Self {
        Self {
            postgres,
            cache,
            catalog,
            bridge,
            metrics: Arc::new(NullMetrics),
        }
    }

    /// Replace the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }
}

impl std::fmt::Debug for RoomDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomDeps")
            .field("cache", &self.cache.is_some())
            .field("catalog_warm", &self.catalog.is_warm())
            .finish_non_exhaustive()
    }
}
