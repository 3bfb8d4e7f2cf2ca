//! Cycle-level cache hierarchy and coherence simulator library.
//!
//! This crate models a multi-core memory hierarchy at cycle granularity with the following:
//! 1. **Caches:** Set-associative, optionally banked caches with partitioned MSHRs, token
//!    admission, replacement policies, prefetchers, and line-usage predictors.
//! 2. **Coherence:** A global directory running MOESI with per-line locking and
//!    configurable inclusion between levels.
//! 3. **System:** Trace-driven requesters, a point-to-point interconnect, and memory
//!    controllers with simple or DRAM row-buffer timing.
//! 4. **Simulation:** JSON configuration, trace loading, watchdog checks, and statistics.

/// Common types (address decoding, component ids, errors).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Cache hierarchy core (packages, caches, policies, directory).
pub mod core;
/// Simulation driver (context, traces, requesters, simulator loop).
pub mod sim;
/// System assembly (builder, interconnect, memory controllers, endpoint contract).
pub mod soc;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Top-level simulator; construct with `Simulator::new`.
pub use crate::sim::Simulator;
/// The wired hierarchy; construct with `System::new`.
pub use crate::soc::System;
