//! Shared simulation context.
//!
//! The handful of values every component needs while it is clocked: the current
//! cycle and the global geometry and watchdog limits. Components receive the
//! context by reference instead of reaching for a global.

use crate::config::GeneralConfig;

/// Global state visible to every component during a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimContext {
    /// Current cycle.
    pub cycle: u64,
    /// Line size of the hierarchy in bytes.
    pub line_size: usize,
    /// Maximum cycles a transaction may stay in one buffer.
    pub max_alive_time: u64,
}

impl SimContext {
    /// Creates the context at cycle 0.
    pub const fn new(general: &GeneralConfig) -> Self {
        Self {
            cycle: 0,
            line_size: general.line_size,
            max_alive_time: general.max_alive_time,
        }
    }
}
