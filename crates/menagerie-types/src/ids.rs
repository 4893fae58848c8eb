//! Identifier types for room entities.
//!
//! Server-generated entities (pets, poops, instances) use strongly-typed
//! wrappers around UUID v7 (time-ordered) so identifiers cannot be mixed up
//! at compile time. Session identifiers are assigned by the realtime
//! transport and arrive as opaque strings, so [`SessionId`] wraps a `String`
//! instead.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a pet owned by a player.
    PetId
}

define_id! {
    /// Unique identifier for a poop dropped by a pet.
    PoopId
}

define_id! {
    /// Unique identifier for a server instance, used to tag bridged events
    /// so a consumer can drop its own publications.
    InstanceId
}

/// Transport-assigned session identifier for a connected client.
///
/// The realtime transport hands these out at connection time; the room
/// treats them as opaque. The same value may resume a session within the
/// reconnection grace window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Wrap a transport-assigned session string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw session string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

/// Inventory map key: a store item scoped by its type.
///
/// The canonical form is `{item_type}:{item_id}` so that items with the
/// same id under different types (e.g. `food:apple` vs `toy:apple`) occupy
/// distinct inventory slots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey(pub String);

impl ItemKey {
    /// Build the canonical key for an item type / item id pair.
    pub fn new(item_type: &str, item_id: &str) -> Self {
        Self(format!("{item_type}:{item_id}"))
    }

    /// Borrow the raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let pet = PetId::new();
        let poop = PoopId::new();
        assert_ne!(pet.into_inner(), Uuid::nil());
        assert_ne!(poop.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = PetId::new();
        let json = serde_json::to_string(&original).ok();
        assert!(json.is_some());
        let restored: Result<PetId, _> = serde_json::from_str(json.as_deref().unwrap_or(""));
        assert!(restored.is_ok());
    }

    #[test]
    fn session_id_is_opaque_string() {
        let id = SessionId::new("aBcD1234");
        assert_eq!(id.as_str(), "aBcD1234");
        assert_eq!(id.to_string(), "aBcD1234");
    }

    #[test]
    fn item_key_scopes_by_type() {
        let food = ItemKey::new("food", "apple");
        let toy = ItemKey::new("toy", "apple");
        assert_ne!(food, toy);
        assert_eq!(food.as_str(), "food:apple");
    }
}
