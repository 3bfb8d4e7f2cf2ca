//! Hardware Prefetcher implementations.
//!
//! A prefetcher watches the demand requests a cache receives and proposes line
//! addresses to fetch ahead of use. The cache keeps the proposals in a bounded
//! queue and turns one of them per cycle into a prefetch transaction in its
//! prefetch MSHR partition.

/// Next-line prefetcher (prefetches sequential cache lines).
pub mod next_line;

/// Stride prefetcher (detects constant-stride access patterns).
pub mod stride;

/// Stream prefetcher (follows ascending or descending runs of lines).
pub mod stream;

pub use self::next_line::NextLinePrefetcher;
pub use self::stream::StreamPrefetcher;
pub use self::stride::StridePrefetcher;

use std::fmt;

use crate::config::CacheConfig;
use crate::config::Prefetcher as PrefetcherType;
use crate::core::package::MemoryPackage;

/// Trait for cache prefetcher implementations.
pub trait Prefetcher: Send + Sync + fmt::Debug {
    /// Observes a demand request received by the cache.
    ///
    /// # Arguments
    ///
    /// * `package` - The request.
    ///
    /// # Returns
    ///
    /// Line-aligned addresses to prefetch. Empty if no prefetches are needed.
    fn treat_prefetch(&mut self, package: &MemoryPackage) -> Vec<u64>;
}

/// Builds the prefetcher selected in a cache configuration.
pub fn build(config: &CacheConfig, line_size: usize) -> Option<Box<dyn Prefetcher>> {
    match config.prefetcher {
        PrefetcherType::NextLine => Some(Box::new(NextLinePrefetcher::new(
            line_size,
            config.prefetch_degree,
        ))),
        PrefetcherType::Stride => Some(Box::new(StridePrefetcher::new(
            line_size,
            config.prefetch_table_size,
            config.prefetch_degree,
        ))),
        PrefetcherType::Stream => Some(Box::new(StreamPrefetcher::new(
            line_size,
            config.prefetch_table_size,
            config.prefetch_degree,
        ))),
        PrefetcherType::None => None,
    }
}
