//! Shared helpers for the simulator tests.

/// Configuration builders, package constructors, and run helpers.
pub mod harness;
