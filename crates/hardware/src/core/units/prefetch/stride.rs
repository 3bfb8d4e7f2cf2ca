//! Stride Prefetcher.
//!
//! Detects constant stride patterns in demand requests. A Reference Prediction
//! Table, indexed by the 4 KiB page of the access, keeps the last address, the
//! last stride, and a 2-bit confidence counter per stream.
//!
//! Prefetching starts only once the same stride has been seen often enough to
//! saturate the counter.
//!
//! # Performance
//!
//! - **Time Complexity:** O(D) per request where D is the prefetch degree
//! - **Space Complexity:** O(T) where T is the table size
//! - **Best Case:** Regular strided patterns (array traversals, matrix operations)
//! - **Worst Case:** Irregular or random access patterns (linked lists, hash tables)

use super::Prefetcher;
use crate::core::package::MemoryPackage;

const PAGE_SHIFT: u32 = 12;

/// Entry in the Reference Prediction Table.
#[derive(Debug, Default, Clone, Copy)]
struct StreamEntry {
    /// The last address accessed by this stream.
    last_addr: u64,
    /// The detected stride (difference between consecutive accesses).
    stride: i64,
    /// Confidence counter (2-bit saturating).
    confidence: u8,
}

/// Stride Prefetcher state.
#[derive(Debug, Clone)]
pub struct StridePrefetcher {
    /// Reference Prediction Table.
    table: Vec<StreamEntry>,
    /// Size of a cache line in bytes.
    line_bytes: u64,
    /// Mask used to index the table.
    table_mask: usize,
    /// Number of strides to prefetch ahead.
    degree: usize,
}

impl StridePrefetcher {
    /// Creates a new Stride prefetcher.
    ///
    /// # Arguments
    ///
    /// * `line_bytes` - The size of a cache line in bytes.
    /// * `table_size` - Number of entries in the tracking table (rounded up to a power of 2).
    /// * `degree` - The number of strides to prefetch ahead.
    pub fn new(line_bytes: usize, table_size: usize, degree: usize) -> Self {
        let size = table_size.max(1).next_power_of_two();
        Self {
            table: vec![StreamEntry::default(); size],
            line_bytes: line_bytes as u64,
            table_mask: size - 1,
            degree: degree.max(1),
        }
    }
}

impl Prefetcher for StridePrefetcher {
    fn treat_prefetch(&mut self, package: &MemoryPackage) -> Vec<u64> {
        let addr = package.memory_address;
        let idx = ((addr >> PAGE_SHIFT) as usize) & self.table_mask;
        let entry = &mut self.table[idx];

        let current_stride = (addr as i64).wrapping_sub(entry.last_addr as i64);
        let mut prefetches = Vec::new();

        if current_stride == entry.stride && current_stride != 0 {
            if entry.confidence < 3 {
                entry.confidence += 1;
            } else {
                for k in 1..=self.degree as i64 {
                    let target = (addr as i64).wrapping_add(entry.stride * k) as u64;
                    let aligned = target & !(self.line_bytes - 1);
                    if !prefetches.contains(&aligned) {
                        prefetches.push(aligned);
                    }
                }
            }
        } else if entry.confidence > 0 {
            entry.confidence -= 1;
        } else {
            entry.stride = current_stride;
        }

        entry.last_addr = addr;
        prefetches
    }
}
