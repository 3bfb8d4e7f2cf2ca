//! First-In, First-Out (FIFO) Replacement Policy.
//!
//! This policy evicts the way that was allocated first, regardless of how recently
//! it was accessed.
//!
//! # Performance
//!
//! - **Time Complexity:** `get_victim()`: O(W)
//! - **Best Case:** Streaming accesses where all lines have equal importance
//! - **Worst Case:** Workloads with strong temporal locality (may evict frequently-used lines)

use super::{Candidate, ReplacementPolicy, min_by_stamp};

/// FIFO Policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct FifoPolicy;

impl ReplacementPolicy for FifoPolicy {
    fn get_victim(&mut self, candidates: &[Candidate]) -> Option<usize> {
        min_by_stamp(candidates.iter(), |c| c.inserted_at)
    }
}
