//! Realtime room engine for the Menagerie pet-room server.
//!
//! A room is a single tokio task that owns its [`RoomState`] outright:
//! inbound commands, the decay tick, and bridged events all drain through
//! one `select!` loop, so handlers and the tick never run concurrently and
//! no lock guards room state. Storage I/O is awaited inside handlers;
//! other sessions' commands simply queue behind it.
//!
//! Module map:
//!
//! - [`room`] -- lifecycle (`Created -> Active -> Disposing -> Disposed`),
//!   the command loop, join/leave/reconnection handling.
//! - [`pipeline`] -- message parsing and the validate-mutate-respond path.
//! - [`handlers`] -- one function per inbound action.
//! - [`tick`] -- the decay walk and the deferred-persistence counters.
//! - [`deps`] -- explicit collaborator injection ([`deps::RoomDeps`]).
//! - [`metrics`] -- the fire-and-forget metrics sink trait.
//!
//! [`RoomState`]: menagerie_types::RoomState

pub mod deps;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod room;
pub mod tick;

#[cfg(test)]
mod testutil;

pub use deps::{RoomConfig, RoomDeps};
pub use error::ActionError;
pub use metrics::{MetricsSink, NullMetrics};
pub use room::{JoinOptions, Room, RoomCommand, RoomHandle};
