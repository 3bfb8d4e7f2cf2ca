//! Cache Replacement Policies.
//!
//! Implements the algorithms that pick a victim way in a set. The cache hands the
//! policy only the ways that may be replaced (lines whose address has an open
//! directory transaction are left out), in ascending way order.
//!
//! # Policies
//!
//! - `Lru`: Least Recently Used.
//! - `Fifo`: First-In, First-Out.
//! - `Random`: Random selection.
//! - `InvalidOrLru`: First Invalid way, otherwise LRU.
//! - `DeadOrLru`: LRU among predicted-dead ways, otherwise LRU.

use std::fmt;

/// LRU among predicted-dead ways, falling back to LRU.
pub mod dead_or_lru;

/// First-In, First-Out replacement policy.
pub mod fifo;

/// First Invalid way, falling back to LRU.
pub mod invalid_or_lru;

/// Least Recently Used replacement policy.
pub mod lru;

/// Random replacement policy.
pub mod random;

pub use dead_or_lru::DeadOrLruPolicy;
pub use fifo::FifoPolicy;
pub use invalid_or_lru::InvalidOrLruPolicy;
pub use lru::LruPolicy;
pub use random::RandomPolicy;

use crate::config::ReplacementPolicy as PolicyType;

/// Replacement-relevant view of one way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Way index within the set.
    pub way: usize,
    /// Whether the line holds usable data.
    pub valid: bool,
    /// Access stamp of the last touch.
    pub last_access: u64,
    /// Access stamp of the allocation.
    pub inserted_at: u64,
    /// Whether the line-usage predictor expects no further use.
    pub dead: bool,
}

/// Trait for cache replacement policies.
pub trait ReplacementPolicy: Send + Sync + fmt::Debug {
    /// Selects a victim among `candidates`.
    ///
    /// # Arguments
    ///
    /// * `candidates` - Replaceable ways, ascending by way index.
    ///
    /// # Returns
    ///
    /// The way to evict, or `None` if `candidates` is empty.
    fn get_victim(&mut self, candidates: &[Candidate]) -> Option<usize>;
}

/// Way with the smallest `key`; ties go to the lowest way.
pub(crate) fn min_by_stamp<'a>(
    candidates: impl Iterator<Item = &'a Candidate>,
    key: impl Fn(&Candidate) -> u64,
) -> Option<usize> {
    let mut best: Option<&Candidate> = None;
    for candidate in candidates {
        match best {
            Some(b) if key(candidate) >= key(b) => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|c| c.way)
}

/// Builds the policy selected in the configuration.
pub fn build(kind: PolicyType) -> Box<dyn ReplacementPolicy> {
    match kind {
        PolicyType::Lru => Box::new(LruPolicy),
        PolicyType::Fifo => Box::new(FifoPolicy),
        PolicyType::Random => Box::new(RandomPolicy::new()),
        PolicyType::InvalidOrLru => Box::new(InvalidOrLruPolicy),
        PolicyType::DeadOrLru => Box::new(DeadOrLruPolicy),
    }
}
