//! Random Replacement Policy.
//!
//! This policy evicts a random replaceable way. It uses a xorshift generator with a
//! fixed seed, so runs stay reproducible.

use super::{Candidate, ReplacementPolicy};

/// Random Policy state.
#[derive(Clone, Copy, Debug)]
pub struct RandomPolicy {
    /// Internal state for the pseudo-random number generator.
    state: u64,
}

impl RandomPolicy {
    /// Creates a new Random policy instance with the fixed seed.
    pub const fn new() -> Self {
        Self { state: 123456789 }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn get_victim(&mut self, candidates: &[Candidate]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        Some(candidates[(x as usize) % candidates.len()].way)
    }
}
