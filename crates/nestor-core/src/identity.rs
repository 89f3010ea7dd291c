//! Stable identifiers for everything stored in the graph arena
//!
//! Back-references (port to actor, actor to container, director to
//! composite) are lookups by these IDs, never ownership.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Create an ID from its raw value
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the raw ID value
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Identifier of an atomic or composite actor
    ActorId,
    "actor"
);
arena_id!(
    /// Identifier of a port
    PortId,
    "port"
);
arena_id!(
    /// Identifier of a relation
    RelationId,
    "relation"
);
arena_id!(
    /// Identifier of a director
    DirectorId,
    "director"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ActorId::new(3).to_string(), "actor:3");
        assert_eq!(PortId::new(7).to_string(), "port:7");
        assert_eq!(DirectorId::new(1).raw(), 1);
    }

    #[test]
    fn test_ordering_follows_raw_value() {
        assert!(RelationId(1) < RelationId(2));
    }
}
