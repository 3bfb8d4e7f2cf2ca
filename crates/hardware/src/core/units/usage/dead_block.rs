//! Dead-block line-usage predictor.
//!
//! Counts the touches every line receives while resident. When a line is
//! evicted, its count is stored in a history table indexed by a hash of the line
//! address. A resident line whose count reached the learned value is predicted
//! dead. Invalidations reset the count without training the table.

use super::LineUsagePredictor;
use crate::core::package::MemoryPackage;

/// Dead-block predictor state.
#[derive(Debug, Clone)]
pub struct DeadBlockPredictor {
    usage: Vec<u32>,
    signature: Vec<u64>,
    history: Vec<u32>,
    history_mask: usize,
    associativity: usize,
    line_shift: u32,
}

impl DeadBlockPredictor {
    /// Creates the predictor.
    ///
    /// # Arguments
    ///
    /// * `sets` - Sets in the cache.
    /// * `associativity` - Ways per set.
    /// * `line_size` - Bytes per line.
    /// * `table_size` - History entries (rounded up to a power of two).
    pub fn new(sets: usize, associativity: usize, line_size: usize, table_size: usize) -> Self {
        let size = table_size.max(1).next_power_of_two();
        Self {
            usage: vec![0; sets * associativity],
            signature: vec![0; sets * associativity],
            history: vec![0; size],
            history_mask: size - 1,
            associativity,
            line_shift: line_size.trailing_zeros(),
        }
    }

    const fn slot(&self, index: usize, way: usize) -> usize {
        index * self.associativity + way
    }

    fn history_index(&self, line_address: u64) -> usize {
        let line = line_address >> self.line_shift;
        ((line ^ (line >> 10)) as usize) & self.history_mask
    }

    /// Learned touch count for a line address; zero when nothing was learned.
    pub fn learned(&self, line_address: u64) -> u32 {
        self.history[self.history_index(line_address)]
    }

    fn start(&mut self, package: &MemoryPackage, index: usize, way: usize) {
        let slot = self.slot(index, way);
        self.usage[slot] = 1;
        self.signature[slot] = package.memory_address >> self.line_shift << self.line_shift;
    }
}

impl LineUsagePredictor for DeadBlockPredictor {
    fn check_line_is_dead(&self, index: usize, way: usize) -> bool {
        let slot = self.slot(index, way);
        let learned = self.learned(self.signature[slot]);
        learned > 0 && self.usage[slot] >= learned
    }

    fn line_hit(&mut self, _package: &MemoryPackage, index: usize, way: usize) {
        let slot = self.slot(index, way);
        self.usage[slot] = self.usage[slot].saturating_add(1);
    }

    fn line_miss(&mut self, package: &MemoryPackage, index: usize, way: usize) {
        self.start(package, index, way);
    }

    fn line_recv_copyback(&mut self, package: &MemoryPackage, index: usize, way: usize) {
        self.start(package, index, way);
    }

    fn line_eviction(&mut self, index: usize, way: usize) {
        let slot = self.slot(index, way);
        if self.usage[slot] > 0 {
            let entry = self.history_index(self.signature[slot]);
            self.history[entry] = self.usage[slot];
        }
        self.usage[slot] = 0;
    }

    fn line_invalidation(&mut self, index: usize, way: usize) {
        let slot = self.slot(index, way);
        self.usage[slot] = 0;
    }
}
