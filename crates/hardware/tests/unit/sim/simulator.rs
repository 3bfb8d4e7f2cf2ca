//! Simulator Loop Tests.
//!
//! Whole runs through the simulator: completion, cycle limits, the watchdog,
//! statistics resets, prefetching, and the machine-readable report. Runs with
//! small MSHRs and several cores check that admission never deadlocks, and a
//! property test replays random shared traces while checking coherence every cycle.

use std::collections::HashSet;

use cohsim_core::common::error::SimError;
use cohsim_core::config::{Inclusiveness, Prefetcher};
use cohsim_core::sim::{Simulator, TraceEntry};
use proptest::prelude::*;
use rstest::rstest;

use crate::common::harness::{
    LINE, RUN_LIMIT, init_logging, read_after, run_traces, shared_l2_config, single_cache_config,
    write_after,
};

/// Conflicting reads in one set evict the least recently used line.
#[test]
fn conflict_misses_evict_lru() {
    let sim = run_traces(
        &single_cache_config(),
        vec![vec![
            TraceEntry::read(0, 8),
            TraceEntry::read(256, 8),
            TraceEntry::read(0, 8),
            TraceEntry::read(512, 8),
        ]],
    );
    let l1 = &sim.system.caches[0];
    assert_eq!(l1.stats.read_miss, 3);
    assert_eq!(l1.stats.read_hit, 1);
    assert_eq!(l1.stats.eviction, 1);
    assert!(l1.find_line(0).is_some());
    assert!(l1.find_line(256).is_none());
    assert_eq!(sim.system.requesters[0].stats.latency.count, 4);
}

/// A run stops at the cycle limit without error, leaving work in flight.
#[test]
fn run_respects_cycle_limit() {
    init_logging();
    let mut sim = Simulator::new(&single_cache_config()).unwrap();
    sim.load_trace(0, [TraceEntry::read(0, 8)]).unwrap();
    assert_eq!(sim.run(Some(3)).unwrap(), 3);
    assert_eq!(sim.cycle(), 3);
    assert!(!sim.system.is_idle());
    let rest = sim.run(None).unwrap();
    assert!(rest > 0);
    assert!(sim.system.is_idle());
}

/// Loading a trace for a requester that does not exist fails.
#[test]
fn load_trace_unknown_requester() {
    let mut sim = Simulator::new(&single_cache_config()).unwrap();
    assert!(matches!(
        sim.load_trace(1, [TraceEntry::read(0, 8)]),
        Err(SimError::InvalidConfig { .. })
    ));
}

/// Periodic checks run every `periodic_check` cycles.
#[test]
fn periodic_checks_are_counted() {
    let mut config = single_cache_config();
    config.general.periodic_check = 4;
    let mut sim = Simulator::new(&config).unwrap();
    for _ in 0..10 {
        sim.tick().unwrap();
    }
    assert_eq!(sim.stats.periodic_checks, 2);
    assert_eq!(sim.stats.cycles, 10);
}

/// A transaction outliving the limit aborts the run.
#[test]
fn watchdog_aborts_run() {
    init_logging();
    let mut config = single_cache_config();
    config.general.max_alive_time = 5;
    config.general.periodic_check = 1;
    let mut sim = Simulator::new(&config).unwrap();
    sim.load_trace(0, [TraceEntry::read(0x40, 8)]).unwrap();
    assert!(matches!(sim.run(None), Err(SimError::Watchdog { .. })));
}

/// Statistics reset after a warm-up only count what follows.
#[test]
fn reset_after_warm_up() {
    init_logging();
    let mut sim = Simulator::new(&single_cache_config()).unwrap();
    sim.load_trace(0, [TraceEntry::read(0x80, 8)]).unwrap();
    let _ = sim.run(None).unwrap();
    let warm_up = sim.cycle();
    sim.reset_statistics();
    sim.load_trace(0, [read_after(0x80, 0), write_after(0x88, 0)]).unwrap();
    let _ = sim.run(None).unwrap();

    let l1 = &sim.system.caches[0];
    assert_eq!(l1.stats.read_miss, 0);
    assert_eq!(l1.stats.read_hit, 1);
    assert_eq!(l1.stats.write_hit, 1);
    assert_eq!(sim.system.memories[0].stats.reads, 0);
    let report = sim.report();
    assert_eq!(report.measured_cycles, sim.cycle() - warm_up);
}

/// The final pass counts resident and dirty lines.
#[test]
fn final_statistics_count_resident_lines() {
    let mut sim = run_traces(
        &single_cache_config(),
        vec![vec![
            TraceEntry::read(0, 8),
            TraceEntry::read(LINE, 8),
            TraceEntry::write(2 * LINE, 8),
        ]],
    );
    sim.final_statistics();
    let l1 = &sim.system.caches[0];
    assert_eq!(l1.stats.final_eviction, 3);
    assert_eq!(l1.stats.final_writeback, 1);
}

/// A next-line prefetch turns the following sequential read into a hit.
#[test]
fn next_line_prefetch_hits() {
    let mut config = single_cache_config();
    config.caches[0].prefetcher = Prefetcher::NextLine;
    let sim = run_traces(&config, vec![vec![TraceEntry::read(0, 8), read_after(LINE, 500)]]);
    let l1 = &sim.system.caches[0];
    assert_eq!(l1.stats.read_hit, 1);
    assert_eq!(l1.stats.read_miss, 1);
    assert_eq!(l1.stats.prefetch_issued, 2);
    assert_eq!(l1.stats.prefetch_miss, 2);
    assert_eq!(sim.system.memories[0].stats.reads, 3);
}

/// The report serializes every block with labels next to the counters.
#[test]
fn report_serializes_to_json() {
    let sim = run_traces(&single_cache_config(), vec![vec![TraceEntry::read(0, 8)]]);
    let json = serde_json::to_value(sim.report()).unwrap();
    assert_eq!(json["caches"][0]["label"], "L1");
    assert_eq!(json["caches"][0]["read_miss"], 1);
    assert_eq!(json["caches"][0]["read_wait"]["count"], 1);
    assert_eq!(json["requesters"][0]["label"], "CPU0");
    assert_eq!(json["requesters"][0]["reads"], 1);
    assert_eq!(json["memories"][0]["reads"], 1);
    assert_eq!(json["directory"]["read_miss"], 1);
    assert_eq!(json["cycles"], sim.cycle());
}

// ══════════════════════════════════════════════════════════
// Admission under pressure
// ══════════════════════════════════════════════════════════

/// Prefetches and writes from three cores share two-slot request partitions.
#[test]
fn small_request_partitions_with_prefetching_drain() {
    let mut config = shared_l2_config(3, 4, 2, Inclusiveness::NonInclusive);
    for cache in &mut config.caches {
        cache.mshr_request_size = 2;
        cache.prefetcher = Prefetcher::NextLine;
    }
    let sim = run_traces(
        &config,
        vec![
            vec![read_after(0x200, 0)],
            vec![write_after(0x180, 1)],
            vec![write_after(0x000, 0)],
        ],
    );
    assert!(sim.system.directory.check_single_writer(&sim.system.caches).is_ok());
    assert_eq!(sim.system.directory.open_lines(), 0);
}

/// Dirty evictions compete with reads for single-slot request partitions.
#[rstest]
#[case(Inclusiveness::NonInclusive)]
#[case(Inclusiveness::InclusiveLlc)]
#[case(Inclusiveness::InclusiveAll)]
fn copybacks_and_reads_share_single_slots(#[case] inclusiveness: Inclusiveness) {
    let mut config = shared_l2_config(2, 4, 2, inclusiveness);
    for cache in &mut config.caches {
        cache.mshr_request_size = 1;
    }
    let sim = run_traces(
        &config,
        vec![
            vec![
                write_after(0x000, 0),
                read_after(0x100, 0),
                read_after(0x200, 0),
                write_after(0x100, 0),
            ],
            vec![read_after(0x200, 0), write_after(0x000, 0), read_after(0x100, 0)],
        ],
    );
    assert!(sim.system.directory.check_single_writer(&sim.system.caches).is_ok());
    assert_eq!(sim.system.directory.open_lines(), 0);
}

// ══════════════════════════════════════════════════════════
// Random shared traces
// ══════════════════════════════════════════════════════════

const INCLUSIVENESS: [Inclusiveness; 3] = [
    Inclusiveness::NonInclusive,
    Inclusiveness::InclusiveLlc,
    Inclusiveness::InclusiveAll,
];

/// Six lines over two L1 sets, so every core keeps evicting.
fn shared_address(line: u64) -> u64 {
    (line % 3) * 0x100 + (line / 3) * LINE
}

fn trace_strategy() -> impl Strategy<Value = Vec<TraceEntry>> {
    prop::collection::vec((any::<bool>(), 0u64..6, 0u64..4), 1..10).prop_map(|accesses| {
        accesses
            .into_iter()
            .map(|(write, line, delay)| {
                if write {
                    write_after(shared_address(line), delay)
                } else {
                    read_after(shared_address(line), delay)
                }
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every cycle of a random shared run keeps a single writer per line and at
    /// most one open transaction per line, and the run drains.
    #[test]
    fn random_shared_traces_stay_coherent(
        traces in prop::collection::vec(trace_strategy(), 2..=3),
        inclusiveness in 0usize..3,
        request_size in 1usize..=3,
        copyback_size in 1usize..=3,
    ) {
        let mut config = shared_l2_config(traces.len(), 4, 2, INCLUSIVENESS[inclusiveness]);
        for cache in &mut config.caches {
            cache.mshr_request_size = request_size;
            cache.mshr_copyback_size = copyback_size;
        }
        let mut sim = Simulator::new(&config).unwrap();
        for (requester, trace) in traces.into_iter().enumerate() {
            sim.load_trace(requester, trace).unwrap();
        }

        while !sim.system.is_idle() && sim.cycle() < RUN_LIMIT {
            prop_assert!(sim.tick().is_ok(), "{}", sim.dump_structures());
            prop_assert!(sim.system.directory.check_single_writer(&sim.system.caches).is_ok());
            let mut open = HashSet::new();
            for line in sim.system.directory.lines() {
                prop_assert!(open.insert(line.line_address), "two open lines for {:#x}", line.line_address);
            }
        }
        prop_assert!(sim.system.is_idle(), "hierarchy did not drain:\n{}", sim.dump_structures());
    }
}
