//! Data layer for the Menagerie pet-room server.
//!
//! Two stores with different jobs:
//!
//! - **`PostgreSQL`** (cold, durable): user accounts and token balances,
//!   owned pets, the read-only reference catalogs, and session audit rows.
//!   All balance-changing writes go through explicit transactions or atomic
//!   single-statement updates -- the durable store is the authority on
//!   token balances.
//! - **Dragonfly** (hot, shared): cross-instance key/value state fronted by
//!   the in-process tier of [`cache::TieredCache`].
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time checked)
//! to avoid requiring a live database at build time. All queries are
//! parameterized.

pub mod cache;
pub mod dragonfly;
pub mod error;
pub mod pet_store;
pub mod postgres;
pub mod reference_store;
pub mod session_store;
pub mod user_store;

pub use cache::TieredCache;
pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use pet_store::{OwnedPetRow, PetStore};
pub use postgres::{PostgresConfig, PostgresPool};
pub use reference_store::ReferenceStore;
pub use session_store::SessionStore;
pub use user_store::{UserRecord, UserStore};
