//! Cache units and their pluggable policies.
//!
//! This module contains the per-cache structures and the strategy objects a cache
//! is configured with.

/// Set-associative cache with MSHR, token ledger, and replacement policies.
pub mod cache;

/// Hardware prefetcher implementations (next-line, stride).
pub mod prefetch;

/// Line-usage predictors (sub-block, dead-block).
pub mod usage;
