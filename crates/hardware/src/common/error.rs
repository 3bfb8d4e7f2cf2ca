//! Fatal error definitions.
//!
//! The simulator distinguishes two classes of failure:
//! 1. **Backpressure:** A full MSHR partition, a denied token, a locked address, or a
//!    busy port. These are never errors; they surface as `false`, `None`, or an
//!    `Untreated` package state and the caller retries on a later cycle.
//! 2. **Invariant Violations:** Everything in [`SimError`]. They abort the run after
//!    the simulator has dumped the internal state of every component.

use thiserror::Error;

use crate::core::package::MemoryOperation;

/// Errors that abort a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    /// The configuration describes hardware that cannot be built.
    #[error("invalid configuration for {component}: {reason}")]
    InvalidConfig {
        /// Label of the component being configured.
        component: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A structural or protocol invariant does not hold.
    #[error("{component}: {reason} (address {address:#x}, operation {operation})")]
    Invariant {
        /// Label of the component that detected the violation.
        component: String,
        /// Address of the transaction involved.
        address: u64,
        /// Operation of the transaction involved.
        operation: MemoryOperation,
        /// Description of the violated invariant.
        reason: String,
    },

    /// An in-flight entry outlived the configured maximum age.
    #[error(
        "{component}: {operation} to {address:#x} born at cycle {born_cycle} is still alive at cycle {cycle}"
    )]
    Watchdog {
        /// Label of the component holding the stale entry.
        component: String,
        /// Address of the stale transaction.
        address: u64,
        /// Operation of the stale transaction.
        operation: MemoryOperation,
        /// Cycle the entry was (last) born.
        born_cycle: u64,
        /// Cycle of the check.
        cycle: u64,
    },

    /// A trace file line could not be parsed.
    #[error("trace line {line}: {reason}")]
    Trace {
        /// One-based line number.
        line: usize,
        /// Parse failure description.
        reason: String,
    },

    /// Filesystem failure while reading configuration or traces.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Builds an [`SimError::InvalidConfig`] for `component`.
    pub fn config(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Builds an [`SimError::Invariant`] for `component`.
    pub fn invariant(
        component: impl Into<String>,
        address: u64,
        operation: MemoryOperation,
        reason: impl Into<String>,
    ) -> Self {
        Self::Invariant {
            component: component.into(),
            address,
            operation,
            reason: reason.into(),
        }
    }
}
