//! Component identifiers.
//!
//! Every endpoint on the interconnect is addressed by a `ComponentId`. Caches,
//! requesters, and memory controllers live in separate arenas inside the
//! [`System`](crate::soc::System), and the id carries the arena index.

use std::fmt;

/// Handle for an endpoint attached to the interconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentId {
    /// A trace-driven requester (processor stand-in).
    Requester(usize),
    /// A cache in the hierarchy arena.
    Cache(usize),
    /// A memory controller.
    Memory(usize),
}

impl ComponentId {
    /// Returns the cache arena index if this id names a cache.
    pub const fn cache(self) -> Option<usize> {
        match self {
            Self::Cache(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requester(id) => write!(f, "requester#{id}"),
            Self::Cache(id) => write!(f, "cache#{id}"),
            Self::Memory(id) => write!(f, "memory#{id}"),
        }
    }
}
