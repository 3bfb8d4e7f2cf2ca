//! Dead-or-LRU Replacement Policy.
//!
//! Prefers the least recently used among the ways the line-usage predictor marked
//! dead. Without any dead way it behaves like LRU. With the disabled predictor no
//! line is ever dead, so this is plain LRU.

use super::{Candidate, ReplacementPolicy, min_by_stamp};

/// Dead-or-LRU Policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeadOrLruPolicy;

impl ReplacementPolicy for DeadOrLruPolicy {
    fn get_victim(&mut self, candidates: &[Candidate]) -> Option<usize> {
        min_by_stamp(candidates.iter().filter(|c| c.dead), |c| c.last_access)
            .or_else(|| min_by_stamp(candidates.iter(), |c| c.last_access))
    }
}
