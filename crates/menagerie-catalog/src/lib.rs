//! Reference-data cache: read-mostly configuration loaded once at host
//! startup and served as O(1) snapshot reads for the room's lifetime.
//!
//! Each dataset (pet species, store items, gameplay defaults) is loaded
//! from `PostgreSQL` with bounded retry: a fixed delay between attempts
//! and a capped attempt count. On exhaustion the cache keeps whatever was
//! last successfully loaded -- an empty list (or built-in defaults) if
//! nothing ever loaded. Load failure degrades gameplay (id lookups miss)
//! but never takes the host down.
//!
//! There is deliberately no refresh mechanism; changing the catalogs means
//! restarting the host.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use menagerie_db::{PostgresPool, ReferenceStore};
use menagerie_types::{DefaultInfo, PetSpecies, StoreItem};

/// Attempts per dataset before giving up.
const MAX_LOAD_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Immutable snapshots of the three reference datasets.
///
/// Reads are `Arc` clones so lookups never block the loader and the loader
/// never blocks lookups.
#[derive(Debug)]
pub struct ReferenceCache {
    pets: RwLock<Arc<Vec<PetSpecies>>>,
    store_items: RwLock<Arc<Vec<StoreItem>>>,
    default_info: RwLock<Arc<DefaultInfo>>,
}

impl Default for ReferenceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceCache {
    /// Create an empty cache (no species, no items, built-in defaults).
    pub fn new() -> Self {
        Self {
            pets: RwLock::new(Arc::new(Vec::new())),
            store_items: RwLock::new(Arc::new(Vec::new())),
            default_info: RwLock::new(Arc::new(DefaultInfo::default())),
        }
    }

    /// Build a cache directly from datasets (tests, seeded fixtures).
    pub fn from_parts(
        pets: Vec<PetSpecies>,
        store_items: Vec<StoreItem>,
        default_info: DefaultInfo,
    ) -> Self {
        Self {
            pets: RwLock::new(Arc::new(pets)),
            store_items: RwLock::new(Arc::new(store_items)),
            default_info: RwLock::new(Arc::new(default_info)),
        }
    }

    /// Load all three datasets from `PostgreSQL` with bounded retry.
    ///
    /// Each dataset retries independently; one dataset exhausting its
    /// attempts does not stop the others from loading. Exhaustion is
    /// logged at `warn` and the previous snapshot is kept.
    pub async fn load(&self, postgres: &PostgresPool) {
        let store = ReferenceStore::new(postgres.pool());

        for attempt in 1..=MAX_LOAD_ATTEMPTS {
            match store.load_pet_species().await {
                Ok(species) => {
                    tracing::info!(count = species.len(), "Loaded pet species catalog");
                    self.replace_pets(species);
                    break;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Failed to load pet species catalog");
                    if attempt < MAX_LOAD_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        for attempt in 1..=MAX_LOAD_ATTEMPTS {
            match store.load_store_items().await {
                Ok(items) => {
                    tracing::info!(count = items.len(), "Loaded store item catalog");
                    self.replace_store_items(items);
                    break;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Failed to load store item catalog");
                    if attempt < MAX_LOAD_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        for attempt in 1..=MAX_LOAD_ATTEMPTS {
            match store.load_default_info().await {
                Ok(info) => {
                    tracing::info!("Loaded gameplay defaults");
                    self.replace_default_info(info);
                    break;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Failed to load gameplay defaults");
                    if attempt < MAX_LOAD_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
    }

    /// Snapshot of the pet species catalog.
    pub fn pets(&self) -> Arc<Vec<PetSpecies>> {
        self.pets.read().map(|g| Arc::clone(&g)).unwrap_or_default()
    }

    /// Snapshot of the store item catalog.
    pub fn store_items(&self) -> Arc<Vec<StoreItem>> {
        self.store_items
            .read()
            .map(|g| Arc::clone(&g))
            .unwrap_or_default()
    }

    /// Snapshot of the gameplay defaults.
    pub fn default_info(&self) -> Arc<DefaultInfo> {
        self.default_info
            .read()
            .map(|g| Arc::clone(&g))
            .unwrap_or_else(|_| Arc::new(DefaultInfo::default()))
    }

    /// Find a pet species by key (linear scan over the snapshot).
    pub fn find_pet_species(&self, species_id: &str) -> Option<PetSpecies> {
        self.pets()
            .iter()
            .find(|s| s.species_id == species_id)
            .cloned()
    }

    /// Find a store item by type and id (linear scan over the snapshot).
    pub fn find_store_item(&self, item_type: &str, item_id: &str) -> Option<StoreItem> {
        self.store_items()
            .iter()
            .find(|i| i.item_type == item_type && i.item_id == item_id)
            .cloned()
    }

    /// Whether all datasets have content (used by the room bootstrap hook).
    pub fn is_warm(&self) -> bool {
        !self.pets().is_empty() && !self.store_items().is_empty()
    }

    fn replace_pets(&self, species: Vec<PetSpecies>) {
        if let Ok(mut guard) = self.pets.write() {
            *guard = Arc::new(species);
        }
    }

    fn replace_store_items(&self, items: Vec<StoreItem>) {
        if let Ok(mut guard) = self.store_items.write() {
            *guard = Arc::new(items);
        }
    }

    fn replace_default_info(&self, info: DefaultInfo) {
        if let Ok(mut guard) = self.default_info.write() {
            *guard = Arc::new(info);
        }
    }
}
