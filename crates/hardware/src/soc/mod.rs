//! System Components.
//!
//! This module organizes the components that sit around the cache hierarchy core,
//! including the interconnect, the memory controllers, the endpoint contract, and
//! the builder that assembles and clocks the whole system.

/// System construction, package sending, and per-cycle clocking.
pub mod builder;

/// Point-to-point interconnect and transit latency.
pub mod interconnect;

/// Memory controllers and their timing models.
pub mod memory;

/// Endpoint contract shared by requesters, caches, and memory controllers.
pub mod traits;

pub use builder::System;
