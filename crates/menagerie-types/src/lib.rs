//! Shared type definitions for the Menagerie pet-room server.
//!
//! This crate holds the authoritative entity model (rooms, players, pets,
//! inventory), the pure stat-decay arithmetic, the reference-catalog row
//! types, the inbound action set with its response envelope, and the domain
//! events replicated across server instances.
//!
//! Everything here is plain data plus mutation helpers. The helpers are the
//! only sanctioned write path for pet stats and derived counts -- handlers
//! must never write a stat directly.

pub mod actions;
pub mod catalog;
pub mod decay;
pub mod error;
pub mod events;
pub mod ids;
pub mod pet;
pub mod player;
pub mod room;

pub use actions::{Action, ActionResponse, InboundMessage, OutboundMessage};
pub use catalog::{DefaultInfo, PetSpecies, StoreItem};
pub use decay::{DecayOutcome, decay_stat};
pub use error::EntityError;
pub use events::{DomainEvent, EventEnvelope};
pub use ids::{InstanceId, ItemKey, PetId, PoopId, SessionId};
pub use pet::{DecayRates, Pet, Poop, STAT_MAX, STAT_MIN, clamp_stat};
pub use player::{InventoryItem, Player};
pub use room::RoomState;
