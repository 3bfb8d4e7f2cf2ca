//! Statistics Tests.
//!
//! Verifies wait-time aggregation, hit and miss bookkeeping per operation, and
//! the flattened JSON shape of labelled statistics blocks.

use cohsim_core::core::package::MemoryOperation;
use cohsim_core::stats::{CacheStats, DirectoryStats, Labeled, MemoryStats, WaitTime};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

/// An empty wait record averages to zero.
#[test]
fn empty_wait_time() {
    let wait = WaitTime::default();
    assert_eq!(wait.average(), 0.0);
    assert_eq!(wait.min, 0);
}

/// Minimum, maximum, and sum follow the recorded waits.
#[test]
fn wait_time_aggregates() {
    let mut wait = WaitTime::default();
    for cycles in [12, 4, 30] {
        wait.record(cycles);
    }
    assert_eq!(
        wait,
        WaitTime {
            count: 3,
            min: 4,
            max: 30,
            accumulated: 46,
        }
    );
    assert!((wait.average() - 46.0 / 3.0).abs() < 1e-9);
}

/// Each operation has its own hit and miss counters.
#[rstest]
#[case(MemoryOperation::Instruction)]
#[case(MemoryOperation::Read)]
#[case(MemoryOperation::Prefetch)]
#[case(MemoryOperation::Write)]
fn cache_hits_and_misses(#[case] op: MemoryOperation) {
    let mut stats = CacheStats::default();
    stats.record_hit(op);
    stats.record_miss(op);
    stats.record_miss(op);
    assert_eq!(stats.hits(), 1);
    assert_eq!(stats.misses(), 2);
    stats.record_wait(op, 7);
    let json = serde_json::to_value(&stats).unwrap();
    let name = match op {
        MemoryOperation::Instruction => "instruction",
        MemoryOperation::Read => "read",
        MemoryOperation::Prefetch => "prefetch",
        _ => "write",
    };
    assert_eq!(json[format!("{name}_hit")], 1);
    assert_eq!(json[format!("{name}_miss")], 2);
    assert_eq!(json[format!("{name}_wait")]["max"], 7);
}

/// Copybacks are counted as received lines, not as hits or misses.
#[test]
fn copybacks_count_separately() {
    let mut stats = CacheStats::default();
    stats.record_hit(MemoryOperation::Copyback);
    stats.record_miss(MemoryOperation::Copyback);
    assert_eq!(stats.copyback_recv, 2);
    assert_eq!(stats.hits() + stats.misses(), 0);

    let mut directory = DirectoryStats::default();
    directory.record_miss(MemoryOperation::Copyback);
    directory.record_hit(MemoryOperation::Read);
    assert_eq!(directory.copyback, 1);
    assert_eq!(directory.read_hit, 1);
}

/// Resetting restores every counter to zero.
#[test]
fn reset_clears_counters() {
    let mut stats = CacheStats::default();
    stats.record_hit(MemoryOperation::Read);
    stats.eviction = 3;
    stats.reset();
    assert_eq!(stats, CacheStats::default());
}

/// Labels sit next to the counters they describe.
#[test]
fn labeled_blocks_flatten() {
    let block = Labeled {
        label: "MEM0".to_string(),
        stats: MemoryStats {
            reads: 4,
            writes: 1,
            accumulated_latency: 500,
            max_buffered: 2,
        },
    };
    let json = serde_json::to_value(&block).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "label": "MEM0",
            "reads": 4,
            "writes": 1,
            "accumulated_latency": 500,
            "max_buffered": 2,
        })
    );
}

proptest! {
    /// The minimum never exceeds the average, nor the average the maximum.
    #[test]
    fn wait_time_bounds(waits in prop::collection::vec(0u64..10_000, 1..50)) {
        let mut wait = WaitTime::default();
        for &cycles in &waits {
            wait.record(cycles);
        }
        prop_assert_eq!(wait.count, waits.len() as u64);
        prop_assert_eq!(wait.min, *waits.iter().min().unwrap());
        prop_assert_eq!(wait.max, *waits.iter().max().unwrap());
        prop_assert!(wait.min as f64 <= wait.average() + 1e-9);
        prop_assert!(wait.average() <= wait.max as f64 + 1e-9);
    }
}
