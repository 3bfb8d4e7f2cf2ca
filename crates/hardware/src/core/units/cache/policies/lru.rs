//! Least Recently Used (LRU) Replacement Policy.
//!
//! This policy evicts the way whose last access stamp is the smallest. Stamps come
//! from a per-cache counter bumped on every touch, so two accesses in the same
//! cycle are still ordered. Never-used ways carry stamp zero and go first.
//!
//! # Performance
//!
//! - **Time Complexity:** `get_victim()`: O(W) where W is the associativity
//! - **Space Complexity:** O(1) beyond the per-line stamps
//! - **Best Case:** Workloads with good temporal locality
//! - **Worst Case:** Scanning patterns larger than cache capacity (thrashing)

use super::{Candidate, ReplacementPolicy, min_by_stamp};

/// LRU Policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct LruPolicy;

impl ReplacementPolicy for LruPolicy {
    fn get_victim(&mut self, candidates: &[Candidate]) -> Option<usize> {
        min_by_stamp(candidates.iter(), |c| c.last_access)
    }
}
