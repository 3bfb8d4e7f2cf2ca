//! Stride Prefetcher Tests.
//!
//! Verifies stride detection, the confidence ramp before prefetching starts, and
//! that streams in different pages are tracked independently.

use cohsim_core::common::ids::ComponentId;
use cohsim_core::core::package::{MemoryOperation, MemoryPackage};
use cohsim_core::core::units::prefetch::{Prefetcher, StridePrefetcher};

fn demand(addr: u64) -> MemoryPackage {
    MemoryPackage::new(ComponentId::Requester(0), 1, 0, addr, 8, MemoryOperation::Read, 0)
}

/// Feeds `count` accesses of `stride` starting at `base` and returns the last proposals.
fn train(prefetcher: &mut StridePrefetcher, base: u64, stride: u64, count: u64) -> Vec<u64> {
    let mut last = Vec::new();
    for n in 0..count {
        last = prefetcher.treat_prefetch(&demand(base + n * stride));
    }
    last
}

// ══════════════════════════════════════════════════════════
// 1. Training
// ══════════════════════════════════════════════════════════

/// No proposals until the stride has been confirmed enough times.
#[test]
fn no_prefetch_while_training() {
    let mut prefetcher = StridePrefetcher::new(64, 16, 1);
    for n in 0..5 {
        assert!(prefetcher.treat_prefetch(&demand(n * 128)).is_empty());
    }
}

/// A saturated stream proposes the next stride targets, line aligned.
#[test]
fn saturated_stream_prefetches() {
    let mut prefetcher = StridePrefetcher::new(64, 16, 2);
    let proposals = train(&mut prefetcher, 0, 128, 6);
    assert_eq!(proposals, vec![5 * 128 + 128, 5 * 128 + 256]);
}

/// Targets inside the same line are proposed once.
#[test]
fn small_strides_are_deduplicated() {
    let mut prefetcher = StridePrefetcher::new(64, 16, 4);
    let proposals = train(&mut prefetcher, 0, 8, 6);
    assert_eq!(proposals, vec![0x00, 0x40]);
}

// ══════════════════════════════════════════════════════════
// 2. Stream tracking
// ══════════════════════════════════════════════════════════

/// A broken stride drains confidence before a new stride is learned.
#[test]
fn broken_stride_stops_prefetching() {
    let mut prefetcher = StridePrefetcher::new(64, 16, 1);
    let _ = train(&mut prefetcher, 0, 128, 6);
    assert!(prefetcher.treat_prefetch(&demand(0x900)).is_empty());
}

/// Streams in different pages do not disturb each other.
#[test]
fn pages_are_independent() {
    let mut prefetcher = StridePrefetcher::new(64, 16, 1);
    for n in 0..6 {
        let _ = prefetcher.treat_prefetch(&demand(n * 64));
        let _ = prefetcher.treat_prefetch(&demand(0x1000 + n * 7));
    }
    assert_eq!(prefetcher.treat_prefetch(&demand(6 * 64)), vec![7 * 64]);
}
