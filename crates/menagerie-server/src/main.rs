//! Room host binary for the Menagerie pet-room server.
//!
//! Wires every collaborator together and starts one room. The realtime
//! transport (client connections, wallet-signature auth, the state-sync
//! wire protocol) lives in front of this process and talks to the room
//! through its [`RoomHandle`].
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `menagerie-config.yaml`
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Connect to Dragonfly (optional, degrades to no shared cache)
//! 5. Connect to NATS (optional, degrades to no event replication)
//! 6. Load the reference catalogs (bounded retry, non-fatal)
//! 7. Spawn the room and wait for shutdown
//!
//! [`RoomHandle`]: menagerie_room::RoomHandle

mod config;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use menagerie_bridge::EventBridge;
use menagerie_catalog::ReferenceCache;
use menagerie_db::{DragonflyPool, PostgresPool, TieredCache};
use menagerie_room::{Room, RoomConfig, RoomDeps};
use menagerie_types::InstanceId;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

/// Application entry point for the room host.
///
/// # Errors
///
/// Returns an error if configuration or the durable-storage connection
/// fails; everything else degrades and is logged.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration first so logging can honor its filter.
    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_target(true)
        .init();

    info!("menagerie-server starting");
    info!(
        room = config.room.name,
        tick_interval_secs = config.room.tick_interval_secs,
        "Configuration loaded"
    );

    // 2. Durable storage is the one hard dependency.
    let postgres = PostgresPool::connect_url(&config.infrastructure.postgres_url).await?;
    postgres.run_migrations().await?;

    // 3. Shared cache tier, optional.
    let cache = match &config.infrastructure.dragonfly_url {
        Some(url) => match DragonflyPool::connect(url).await {
            Ok(pool) => Some(Arc::new(TieredCache::new(pool))),
            Err(e) => {
                warn!(error = %e, "Dragonfly unavailable, shared cache tier disabled");
                None
            }
        },
        None => {
            info!("no Dragonfly URL configured, shared cache tier disabled");
            None
        }
    };

    // 4. Event replication, optional.
    let instance_id = InstanceId::new();
    let bridge = match &config.infrastructure.nats_url {
        Some(url) => match EventBridge::connect(instance_id, url).await {
            Ok(bridge) => bridge,
            Err(e) => {
                warn!(error = %e, "NATS unavailable, event replication disabled");
                EventBridge::new(instance_id, None)
            }
        },
        None => {
            info!("no NATS URL configured, event replication disabled");
            EventBridge::new(instance_id, None)
        }
    };
    let bridge = Arc::new(bridge);
    if let Err(e) = bridge.spawn_consumer().await {
        warn!(error = %e, "bridge consumer failed to start, remote events disabled");
    }

    // 5. Reference catalogs: bounded retry, non-fatal on exhaustion.
    let catalog = Arc::new(ReferenceCache::new());
    catalog.load(&postgres).await;
    if !catalog.is_warm() {
        warn!("reference catalogs are cold, gameplay lookups will miss");
    }

    // 6. Spawn the room.
    let deps = RoomDeps::new(postgres, cache, Arc::clone(&catalog), bridge);
    let room_config = RoomConfig {
        room_name: config.room.name.clone(),
        tick_interval: Duration::from_secs(config.room.tick_interval_secs),
        reconnect_grace: Duration::from_secs(config.room.reconnect_grace_secs),
        flush_every_ticks: config.room.flush_every_ticks,
        snapshot_every_ticks: config.room.snapshot_every_ticks,
    };
    let handle = Room::spawn(room_config, deps);
    info!(instance_id = %instance_id, room = config.room.name, "room running");

    // 7. Wait for shutdown and dispose the room.
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, disposing room");
    handle.dispose();
    // Give the final flush a moment; in-flight writes beyond this are the
    // stores' problem, not ours.
    tokio::time::sleep(Duration::from_secs(2)).await;
    info!("menagerie-server shutdown complete");

    Ok(())
}

/// Load the host configuration from `menagerie-config.yaml`.
///
/// A missing file is not an error: defaults apply (with env overrides).
fn load_config() -> Result<ServerConfig, config::ConfigError> {
    let config_path = Path::new("menagerie-config.yaml");
    if config_path.exists() {
        ServerConfig::from_file(config_path)
    } else {
        let mut config = ServerConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }
}
