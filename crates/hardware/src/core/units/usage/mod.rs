//! Line-usage predictors.
//!
//! A line-usage predictor observes how every line of a cache is used and answers
//! two questions for the cache and the directory:
//! 1. **Sub-block hits:** Whether the bytes an access touches are present in a
//!    valid line, or whether the line must be refetched without losing its state.
//! 2. **Dead lines:** Whether a line is expected to see no further use, so the
//!    `DeadOrLru` replacement policy can evict it early.
//!
//! Predictors never change coherence status. The directory calls the hooks at
//! the matching points of the request, answer, copyback, eviction, and
//! invalidation paths.

/// Learned access-count dead-block predictor.
pub mod dead_block;

/// Per-line valid sub-block tracking.
pub mod sub_block;

pub use dead_block::DeadBlockPredictor;
pub use sub_block::SubBlockPredictor;

use std::fmt;

use crate::common::error::SimError;
use crate::config::{CacheConfig, LineUsagePredictor as PredictorType};
use crate::core::package::MemoryPackage;

/// Hooks a line-usage predictor receives from its cache.
///
/// Every hook has a neutral default, so a predictor only implements what it tracks.
pub trait LineUsagePredictor: Send + Sync + fmt::Debug {
    /// Whether the bytes `package` touches are present in line (`index`, `way`).
    fn check_sub_block_is_hit(&mut self, _package: &MemoryPackage, _index: usize, _way: usize) -> bool {
        true
    }

    /// Whether line (`index`, `way`) is expected to see no further use.
    fn check_line_is_dead(&self, _index: usize, _way: usize) -> bool {
        false
    }

    /// A request hit the line.
    fn line_hit(&mut self, _package: &MemoryPackage, _index: usize, _way: usize) {}

    /// The line was allocated for a missing request.
    fn line_miss(&mut self, _package: &MemoryPackage, _index: usize, _way: usize) {}

    /// A request found the line but not all of its bytes.
    fn sub_block_miss(&mut self, _package: &MemoryPackage, _index: usize, _way: usize) {}

    /// The line left the cache as a copyback.
    fn line_send_copyback(&mut self, _index: usize, _way: usize) {}

    /// A copyback from a higher level was installed in the line.
    fn line_recv_copyback(&mut self, _package: &MemoryPackage, _index: usize, _way: usize) {}

    /// The line was evicted.
    fn line_eviction(&mut self, _index: usize, _way: usize) {}

    /// The line was invalidated by coherence or inclusion.
    fn line_invalidation(&mut self, _index: usize, _way: usize) {}
}

/// Predictor that treats every present line as fully usable.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledPredictor;

impl LineUsagePredictor for DisabledPredictor {}

/// Builds the predictor selected in a cache configuration.
///
/// # Arguments
///
/// * `config` - Cache configuration.
/// * `sets` - Sets in the cache.
/// * `line_size` - Bytes per line.
///
/// # Returns
///
/// The predictor, or a configuration error for an unusable sub-block geometry.
pub fn build(
    config: &CacheConfig,
    sets: usize,
    line_size: usize,
) -> Result<Box<dyn LineUsagePredictor>, SimError> {
    Ok(match config.line_usage_predictor {
        PredictorType::Disabled => Box::new(DisabledPredictor),
        PredictorType::SubBlock => Box::new(SubBlockPredictor::new(
            &config.label,
            sets,
            config.associativity,
            line_size,
            config.sub_block_size,
        )?),
        PredictorType::DeadBlock => Box::new(DeadBlockPredictor::new(
            sets,
            config.associativity,
            line_size,
            config.dead_block_table_size,
        )),
    })
}
