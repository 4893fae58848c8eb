//! The decay / simulation tick and its deferred-persistence counters.
//!
//! Runs on a fixed interval for the room's lifetime. Each tick walks every
//! pet and applies the shared decay arithmetic when enough time has
//! elapsed. Two coarser side effects ride on tick counters relative to
//! room start (they reset on room restart):
//!
//! - every `flush_every_ticks`: the bulk flush of dirty player inventories
//! - every `snapshot_every_ticks`: a pet-stat snapshot persist
//!
//! Persistence failures are logged; the tick never stops.

use chrono::{DateTime, Utc};
use menagerie_db::{OwnedPetRow, PetStore, UserStore};
use menagerie_types::RoomState;
use tracing::{debug, warn};

use crate::deps::{RoomConfig, RoomDeps};

/// Tick bookkeeping, owned by the room task.
#[derive(Debug, Default)]
pub struct TickCounters {
    /// Ticks executed since room start.
    pub ticks: u64,
}

/// Execute one tick: decay, then the counter-driven persistence passes.
pub async fn run_tick(
    state: &mut RoomState,
    deps: &RoomDeps,
    config: &RoomConfig,
    counters: &mut TickCounters,
    now: DateTime<Utc>,
) {
    counters.ticks = counters.ticks.saturating_add(1);
    let tick = counters.ticks;

    let decayed = decay_all(state, deps, now);
    if decayed > 0 {
        debug!(tick, decayed, "tick decay applied");
    }

    if config.flush_every_ticks > 0 && tick.checked_rem(config.flush_every_ticks) == Some(0) {
        flush_dirty_players(state, deps).await;
    }

    if config.snapshot_every_ticks > 0 && tick.checked_rem(config.snapshot_every_ticks) == Some(0)
    {
        snapshot_pets(state, deps).await;
    }

    deps.metrics.record("room.players", i64::from(state.player_count));
}

/// Walk every pet and apply decay where the threshold has elapsed.
///
/// A pet whose species is missing from the catalog is skipped: reference
/// load failure degrades gameplay, it does not corrupt stats.
pub fn decay_all(state: &mut RoomState, deps: &RoomDeps, now: DateTime<Utc>) -> usize {
    let threshold_ms = deps.catalog.default_info().update_threshold_ms;
    let mut decayed = 0usize;

    for pet in state.pets.values_mut() {
        let Some(species) = deps.catalog.find_pet_species(&pet.pet_type) else {
            debug!(pet_id = %pet.id, pet_type = pet.pet_type, "species missing, skipping decay");
            continue;
        };
        if pet.apply_decay(&species.decay_rates(), threshold_ms, now) {
            decayed = decayed.saturating_add(1);
        }
    }

    decayed
}

/// Persist dirty player inventories (the deferred purchase writes).
///
/// The dirty flag is cleared only on a successful write, so a failed
/// flush retries at the next cadence.
pub async fn flush_dirty_players(state: &mut RoomState, deps: &RoomDeps) {
    let store = UserStore::new(deps.postgres.pool());
    let mut flushed = 0usize;

    let dirty_sessions: Vec<menagerie_types::SessionId> = state
        .players
        .values()
        .filter(|p| p.inventory_dirty)
        .map(|p| p.session_id.clone())
        .collect();

    for session_id in dirty_sessions {
        let Some(player) = state.player(&session_id) else {
            continue;
        };
        let inventory = match serde_json::to_value(&player.inventory) {
            Ok(value) => value,
            Err(e) => {
                warn!(%session_id, error = %e, "inventory serialization failed, skipping flush");
                continue;
            }
        };
        let wallet = player.wallet_address.clone();

        match store.save_inventory(&wallet, &inventory).await {
            Ok(()) => {
                if let Some(player) = state.player_mut(&session_id) {
                    player.inventory_dirty = false;
                }
                flushed = flushed.saturating_add(1);
            }
            Err(e) => {
                warn!(%session_id, wallet, error = %e, "inventory flush failed, will retry");
            }
        }
    }

    if flushed > 0 {
        debug!(flushed, "bulk player flush complete");
        deps.metrics.incr("room.flush.players");
    }
}

/// Persist a stat snapshot of every pet in the room.
pub async fn snapshot_pets(state: &RoomState, deps: &RoomDeps) {
    let rows: Vec<OwnedPetRow> = state
        .pets
        .values()
        .filter_map(|pet| {
            state
                .player(&pet.owner_id)
                .map(|owner| OwnedPetRow::from_pet(pet, &owner.wallet_address))
        })
        .collect();

    if rows.is_empty() {
        return;
    }

    match PetStore::new(deps.postgres.pool()).save_stats(&rows).await {
        Ok(()) => {
            debug!(count = rows.len(), "pet snapshot persisted");
            deps.metrics.incr("room.flush.pets");
        }
        Err(e) => {
            warn!(error = %e, "pet snapshot failed, will retry");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use menagerie_types::{Pet, PetId, STAT_MAX, STAT_MIN};
    use rust_decimal::Decimal;

    use crate::testutil::{attach_cat, state_with_player, test_deps};

    use super::*;

    #[tokio::test]
    async fn decay_one_hour_subtracts_the_hourly_rate() {
        let (mut state, session) = state_with_player("a");
        let pet_id = attach_cat(&mut state, &session);
        let now = Utc::now();
        if let Some(pet) = state.pet_mut(pet_id) {
            pet.hunger = Decimal::from(100);
            pet.last_updated = now - Duration::milliseconds(3_600_000);
        }
        let deps = test_deps();

        let decayed = decay_all(&mut state, &deps, now);
        assert_eq!(decayed, 1);

        let pet = state.pet(pet_id).unwrap();
        // cat hunger rate is 5/hour
        assert_eq!(pet.hunger, Decimal::from(95));
        assert_eq!(pet.last_updated, now);
    }

    #[tokio::test]
    async fn decay_below_threshold_is_skipped() {
        let (mut state, session) = state_with_player("a");
        let pet_id = attach_cat(&mut state, &session);
        let now = Utc::now();
        if let Some(pet) = state.pet_mut(pet_id) {
            // 30s elapsed, threshold is 60s
            pet.last_updated = now - Duration::seconds(30);
        }
        let deps = test_deps();

        let decayed = decay_all(&mut state, &deps, now);
        assert_eq!(decayed, 0);
        assert_eq!(state.pet(pet_id).unwrap().hunger, Decimal::from(100));
    }

    #[tokio::test]
    async fn unknown_species_is_skipped_not_corrupted() {
        let (mut state, session) = state_with_player("a");
        let pet = Pet::new(PetId::new(), session.clone(), "dragon", Utc::now());
        let pet_id = pet.id;
        state.attach_pet(pet).unwrap();
        let now = Utc::now() + Duration::hours(5);
        let deps = test_deps();

        let decayed = decay_all(&mut state, &deps, now);
        assert_eq!(decayed, 0);
        assert_eq!(state.pet(pet_id).unwrap().hunger, Decimal::from(100));
    }

    #[tokio::test]
    async fn long_neglect_floors_stats_at_zero() {
        let (mut state, session) = state_with_player("a");
        let pet_id = attach_cat(&mut state, &session);
        let now = Utc::now();
        if let Some(pet) = state.pet_mut(pet_id) {
            pet.last_updated = now - Duration::days(30);
        }
        let deps = test_deps();

        decay_all(&mut state, &deps, now);
        let pet = state.pet(pet_id).unwrap();
        for stat in [pet.hunger, pet.happiness, pet.cleanliness] {
            assert!(stat >= STAT_MIN && stat <= STAT_MAX);
        }
        assert_eq!(pet.hunger, STAT_MIN);
    }

    #[tokio::test]
    async fn flush_skips_clean_players_and_tolerates_storage_failure() {
        let (mut state, session) = state_with_player("a");
        let deps = test_deps();

        // Clean player: nothing to flush.
        flush_dirty_players(&mut state, &deps).await;
        assert!(!state.player(&session).unwrap().inventory_dirty);

        // Dirty player + unreachable storage: the flag survives for retry.
        state
            .player_mut(&session)
            .unwrap()
            .add_item("food", "apple", "Apple", 1)
            .unwrap();
        flush_dirty_players(&mut state, &deps).await;
        assert!(state.player(&session).unwrap().inventory_dirty);
    }
}
