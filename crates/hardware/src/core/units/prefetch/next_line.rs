//! Next-Line Prefetcher.
//!
//! A simple spatial prefetcher that fetches the next sequential cache line(s)
//! whenever a demand request reaches the cache. This exploits the spatial locality
//! of instruction streams and sequential data arrays.

use super::Prefetcher;
use crate::core::package::MemoryPackage;

/// Next-Line Prefetcher state.
#[derive(Clone, Copy, Debug)]
pub struct NextLinePrefetcher {
    /// Size of a cache line in bytes.
    line_bytes: u64,
    /// Number of subsequent lines to prefetch (prefetch degree).
    degree: usize,
}

impl NextLinePrefetcher {
    /// Creates a new Next-Line prefetcher.
    ///
    /// # Arguments
    ///
    /// * `line_bytes` - The size of a cache line in bytes.
    /// * `degree` - The number of lines to prefetch ahead.
    pub fn new(line_bytes: usize, degree: usize) -> Self {
        Self {
            line_bytes: line_bytes as u64,
            degree: degree.max(1),
        }
    }
}

impl Prefetcher for NextLinePrefetcher {
    fn treat_prefetch(&mut self, package: &MemoryPackage) -> Vec<u64> {
        let base = package.memory_address & !(self.line_bytes - 1);
        (1..=self.degree as u64)
            .map(|k| base.wrapping_add(self.line_bytes * k))
            .collect()
    }
}
