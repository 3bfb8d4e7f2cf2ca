//! Cache lines and sets.
//!
//! A line stores the address it was allocated for, a MOESI status, and the
//! bookkeeping used by the replacement policies. Dirtiness is derived from the
//! status (Modified and Owned are dirty), so an Invalid line can never be dirty.

use std::fmt;

/// MOESI coherence status of a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ProtocolStatus {
    /// Only valid copy, differs from memory.
    Modified,
    /// Dirty copy responsible for the copyback; other Shared copies may exist.
    Owned,
    /// Only valid copy, identical to memory.
    Exclusive,
    /// Read-only copy.
    Shared,
    /// No usable data.
    #[default]
    Invalid,
}

impl ProtocolStatus {
    /// Whether the line holds usable data.
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::Invalid
    }

    /// Whether the line holds data newer than memory.
    #[inline]
    pub const fn is_dirty(self) -> bool {
        matches!(self, Self::Modified | Self::Owned)
    }

    /// Whether the holder may write without asking anyone.
    #[inline]
    pub const fn is_exclusive(self) -> bool {
        matches!(self, Self::Modified | Self::Exclusive)
    }
}

impl fmt::Display for ProtocolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::Modified => "M",
            Self::Owned => "O",
            Self::Exclusive => "E",
            Self::Shared => "S",
            Self::Invalid => "I",
        };
        f.write_str(letter)
    }
}

/// One way of a set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheLine {
    /// Line-aligned address the way was allocated for; `None` if never used.
    pub tag: Option<u64>,
    /// Coherence status.
    pub status: ProtocolStatus,
    /// Access stamp of the last touch (per-cache monotonic counter).
    pub last_access: u64,
    /// Access stamp of the allocation.
    pub inserted_at: u64,
    /// Touches since the allocation.
    pub usage_counter: u64,
}

impl CacheLine {
    /// Whether the line holds data newer than memory.
    #[inline]
    pub const fn is_dirty(&self) -> bool {
        self.status.is_dirty()
    }
}

impl fmt::Display for CacheLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            Some(tag) => write!(
                f,
                "[{tag:#x} {} last:{} usage:{}]",
                self.status, self.last_access, self.usage_counter
            ),
            None => write!(f, "[- {}]", self.status),
        }
    }
}

/// Associative bucket of lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSet {
    /// Lines, indexed by way.
    pub ways: Vec<CacheLine>,
}

impl CacheSet {
    /// Creates a set of `associativity` Invalid lines.
    pub fn new(associativity: usize) -> Self {
        Self {
            ways: vec![CacheLine::default(); associativity],
        }
    }
}
