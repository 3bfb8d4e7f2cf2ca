//! Invalid-or-LRU Replacement Policy.
//!
//! Takes the first Invalid way (lowest way index). When every replaceable way is
//! valid it behaves like LRU.

use super::{Candidate, ReplacementPolicy, min_by_stamp};

/// Invalid-or-LRU Policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct InvalidOrLruPolicy;

impl ReplacementPolicy for InvalidOrLruPolicy {
    fn get_victim(&mut self, candidates: &[Candidate]) -> Option<usize> {
        candidates
            .iter()
            .find(|c| !c.valid)
            .map(|c| c.way)
            .or_else(|| min_by_stamp(candidates.iter(), |c| c.last_access))
    }
}
