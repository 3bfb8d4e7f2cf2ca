//! Sub-Block Predictor Tests.
//!
//! Verifies per-line sub-block tracking, the geometry checks, and a run in which a
//! second access to an untouched part of a resident line is refetched without
//! changing the line's coherence status.

use cohsim_core::common::ids::ComponentId;
use cohsim_core::config::LineUsagePredictor as PredictorType;
use cohsim_core::core::package::{MemoryOperation, MemoryPackage};
use cohsim_core::core::units::cache::line::ProtocolStatus;
use cohsim_core::core::units::usage::{LineUsagePredictor, SubBlockPredictor};
use cohsim_core::sim::TraceEntry;
use rstest::rstest;

use crate::common::harness::{run_traces, single_cache_config, status};

fn access(addr: u64, size: usize) -> MemoryPackage {
    MemoryPackage::new(ComponentId::Requester(0), 1, 0, addr, size, MemoryOperation::Read, 0)
}

fn predictor() -> SubBlockPredictor {
    SubBlockPredictor::new("L1", 4, 2, 64, 16).unwrap()
}

// ══════════════════════════════════════════════════════════
// 1. Tracking
// ══════════════════════════════════════════════════════════

/// A miss fetches only the touched sub-blocks.
#[test]
fn miss_fetches_touched_blocks() {
    let mut predictor = predictor();
    predictor.line_miss(&access(0x10, 8), 1, 0);
    assert_eq!(predictor.valid_mask(1, 0), 0b0010);
    assert!(predictor.check_sub_block_is_hit(&access(0x18, 4), 1, 0));
    assert!(!predictor.check_sub_block_is_hit(&access(0x00, 4), 1, 0));
    assert!(!predictor.check_sub_block_is_hit(&access(0x10, 8), 1, 1));
}

/// An access crossing a sub-block boundary needs both blocks.
#[rstest]
#[case(0x0C, 8, 0b0011)]
#[case(0x00, 64, 0b1111)]
#[case(0x3F, 1, 0b1000)]
#[case(0x30, 200, 0b1000)]
fn touched_blocks(#[case] addr: u64, #[case] size: usize, #[case] mask: u64) {
    let mut predictor = predictor();
    predictor.line_miss(&access(addr, size), 0, 1);
    assert_eq!(predictor.valid_mask(0, 1), mask);
}

/// A sub-block miss adds blocks without dropping the ones present.
#[test]
fn sub_block_miss_accumulates() {
    let mut predictor = predictor();
    predictor.line_miss(&access(0x00, 8), 2, 1);
    predictor.sub_block_miss(&access(0x20, 8), 2, 1);
    assert_eq!(predictor.valid_mask(2, 1), 0b0101);
}

/// Copybacks install whole lines; evictions and invalidations clear them.
#[test]
fn copyback_fills_eviction_clears() {
    let mut predictor = predictor();
    predictor.line_recv_copyback(&access(0x00, 64), 3, 0);
    assert_eq!(predictor.valid_mask(3, 0), 0b1111);
    predictor.line_eviction(3, 0);
    assert_eq!(predictor.valid_mask(3, 0), 0);

    predictor.line_recv_copyback(&access(0x00, 64), 3, 1);
    predictor.line_invalidation(3, 1);
    assert_eq!(predictor.valid_mask(3, 1), 0);
}

/// Sub-blocks must be a power of two, no larger than a line, and at most 64 per line.
#[rstest]
#[case(64, 48)]
#[case(64, 128)]
#[case(128, 1)]
fn rejects_bad_sub_block_size(#[case] line_size: usize, #[case] sub_block_size: usize) {
    assert!(SubBlockPredictor::new("L1", 4, 2, line_size, sub_block_size).is_err());
}

// ══════════════════════════════════════════════════════════
// 2. Through a cache
// ══════════════════════════════════════════════════════════

/// A second access to another part of a resident line misses, refetches, and
/// leaves the line Exclusive; a third access to a fetched part hits.
#[test]
fn sub_block_miss_keeps_status() {
    let mut config = single_cache_config();
    config.caches[0].line_usage_predictor = PredictorType::SubBlock;
    let sim = run_traces(
        &config,
        vec![vec![
            TraceEntry::read(0x00, 8),
            TraceEntry::read(0x20, 8),
            TraceEntry::read(0x28, 8),
        ]],
    );
    let cache = &sim.system.caches[0];
    assert_eq!(cache.stats.read_miss, 2);
    assert_eq!(cache.stats.read_hit, 1);
    assert_eq!(sim.system.memories[0].stats.reads, 2);
    assert_eq!(status(&sim.system, "L1", 0x00), ProtocolStatus::Exclusive);
}
