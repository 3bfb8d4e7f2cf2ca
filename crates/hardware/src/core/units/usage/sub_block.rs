//! Sub-block line-usage predictor.
//!
//! Each line carries a bitmask of the sub-blocks fetched so far. A miss fetches
//! only the sub-blocks the request touches; a later access to a missing sub-block
//! is a sub-block miss. The line keeps its coherence status while the missing
//! part is refetched. Copybacks always carry whole lines.

use super::LineUsagePredictor;
use crate::common::error::SimError;
use crate::core::package::MemoryPackage;

/// Sub-block predictor state.
#[derive(Debug, Clone)]
pub struct SubBlockPredictor {
    valid: Vec<u64>,
    associativity: usize,
    line_size: u64,
    sub_block_size: u64,
    full_mask: u64,
}

impl SubBlockPredictor {
    /// Creates the predictor.
    ///
    /// # Arguments
    ///
    /// * `label` - Cache label for configuration errors.
    /// * `sets` - Sets in the cache.
    /// * `associativity` - Ways per set.
    /// * `line_size` - Bytes per line.
    /// * `sub_block_size` - Bytes per sub-block.
    ///
    /// # Returns
    ///
    /// The predictor, or an error if the sub-block size is not a power of two or a
    /// line holds more than 64 sub-blocks.
    pub fn new(
        label: &str,
        sets: usize,
        associativity: usize,
        line_size: usize,
        sub_block_size: usize,
    ) -> Result<Self, SimError> {
        if !sub_block_size.is_power_of_two() || sub_block_size > line_size {
            return Err(SimError::config(
                label,
                format!("sub-block size {sub_block_size} must be a power of two no larger than the line"),
            ));
        }
        let blocks = line_size / sub_block_size;
        if blocks > 64 {
            return Err(SimError::config(
                label,
                format!("{blocks} sub-blocks per line exceed the 64 tracked"),
            ));
        }
        let full_mask = if blocks == 64 { u64::MAX } else { (1u64 << blocks) - 1 };
        Ok(Self {
            valid: vec![0; sets * associativity],
            associativity,
            line_size: line_size as u64,
            sub_block_size: sub_block_size as u64,
            full_mask,
        })
    }

    /// Sub-blocks touched by `package`.
    fn touched(&self, package: &MemoryPackage) -> u64 {
        let offset = package.memory_address & (self.line_size - 1);
        let size = (package.memory_size as u64).max(1);
        let last = (offset + size - 1).min(self.line_size - 1);
        let first_block = offset / self.sub_block_size;
        let last_block = last / self.sub_block_size;
        let mut mask = 0;
        for block in first_block..=last_block {
            mask |= 1u64 << block;
        }
        mask
    }

    const fn slot(&self, index: usize, way: usize) -> usize {
        index * self.associativity + way
    }

    /// Valid sub-block mask of a line.
    pub fn valid_mask(&self, index: usize, way: usize) -> u64 {
        self.valid[self.slot(index, way)]
    }
}

impl LineUsagePredictor for SubBlockPredictor {
    fn check_sub_block_is_hit(&mut self, package: &MemoryPackage, index: usize, way: usize) -> bool {
        let need = self.touched(package);
        (self.valid[self.slot(index, way)] & need) == need
    }

    fn line_miss(&mut self, package: &MemoryPackage, index: usize, way: usize) {
        let slot = self.slot(index, way);
        self.valid[slot] = self.touched(package);
    }

    fn sub_block_miss(&mut self, package: &MemoryPackage, index: usize, way: usize) {
        let slot = self.slot(index, way);
        self.valid[slot] |= self.touched(package);
    }

    fn line_recv_copyback(&mut self, _package: &MemoryPackage, index: usize, way: usize) {
        let slot = self.slot(index, way);
        self.valid[slot] = self.full_mask;
    }

    fn line_eviction(&mut self, index: usize, way: usize) {
        let slot = self.slot(index, way);
        self.valid[slot] = 0;
    }

    fn line_invalidation(&mut self, index: usize, way: usize) {
        let slot = self.slot(index, way);
        self.valid[slot] = 0;
    }
}
