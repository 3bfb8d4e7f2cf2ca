//! Cache Memory Tests.
//!
//! Verifies lookup, victim selection, MSHR allocation, request reception, and
//! prefetch issue of a single `CacheMemory`, plus the LRU conflict eviction of a
//! whole run through a 4-set, 2-way cache.

use cohsim_core::common::error::SimError;
use cohsim_core::common::ids::ComponentId;
use cohsim_core::config::{AddressMask, CacheConfig, Prefetcher};
use cohsim_core::core::package::{MemoryOperation, MemoryPackage, PackageState};
use cohsim_core::core::units::cache::CacheMemory;
use cohsim_core::core::units::cache::line::ProtocolStatus;
use cohsim_core::core::units::cache::mshr::MshrPartition;
use cohsim_core::sim::TraceEntry;
use cohsim_core::soc::traits::Transport;
use rstest::rstest;

use crate::common::harness::{LINE, cache, install, request, run_traces, single_cache_config};

/// A 4-set, 2-way LRU cache with the given request partition size.
fn small_cache(mshr_request_size: usize) -> CacheMemory {
    let config = CacheConfig {
        mshr_request_size,
        ..cache("L1", 8, 2, &[])
    };
    CacheMemory::new(0, &config, LINE as usize).unwrap()
}

fn untreated(opcode_number: u64, addr: u64) -> MemoryPackage {
    request(
        ComponentId::Requester(0),
        opcode_number,
        addr,
        MemoryOperation::Read,
        ComponentId::Cache(0),
    )
}

// ══════════════════════════════════════════════════════════
// 1. Construction
// ══════════════════════════════════════════════════════════

/// Geometry follows line number and associativity.
#[test]
fn geometry() {
    let cache = small_cache(8);
    assert_eq!(cache.set_count(), 4);
    assert_eq!(cache.associativity(), 2);
    assert!(cache.is_llc());
    assert_eq!(cache.mshr.len(), 8 + 4 + 2);
}

/// A bank number outside the bank count is rejected.
#[test]
fn bank_out_of_range() {
    let config = CacheConfig {
        bank_number: 2,
        total_banks: 2,
        address_mask: AddressMask::TagIndexBankOffset,
        ..cache("L2_2", 8, 2, &[])
    };
    assert!(matches!(
        CacheMemory::new(0, &config, 64),
        Err(SimError::InvalidConfig { .. })
    ));
}

/// Request and copyback partitions need at least one slot each.
#[test]
fn empty_partitions_rejected() {
    let config = CacheConfig {
        mshr_copyback_size: 0,
        ..cache("L1", 8, 2, &[])
    };
    assert!(CacheMemory::new(0, &config, 64).is_err());
}

// ══════════════════════════════════════════════════════════
// 2. Lookup and victim selection
// ══════════════════════════════════════════════════════════

/// A freshly allocated line matches its tag but is not yet valid.
#[test]
fn allocated_line_is_invalid_until_filled() {
    let mut cache = small_cache(8);
    let (index, way) = cache.evict_address(0x100, |_| false).unwrap();
    cache.change_address(index, way, 0x100);
    assert_eq!(cache.find_line(0x13F), Some((index, way)));
    assert_eq!(cache.find_valid_line(0x100), None);

    cache.change_status(index, way, ProtocolStatus::Shared);
    assert_eq!(cache.find_valid_line(0x120), Some((index, way)));
}

/// The least recently touched way of a full set is the victim.
#[test]
fn lru_victim_in_full_set() {
    let mut cache = small_cache(8);
    let x = install(&mut cache, 0x000, ProtocolStatus::Exclusive);
    let y = install(&mut cache, 0x100, ProtocolStatus::Exclusive);
    assert_eq!(x.0, y.0);
    assert_ne!(x.1, y.1);
    assert_eq!(cache.evict_address(0x200, |_| false), Some(x));

    cache.update_last_access(x.0, x.1);
    assert_eq!(cache.evict_address(0x200, |_| false), Some(y));
}

/// Ways whose address is locked are never offered to the policy.
#[test]
fn locked_ways_are_skipped() {
    let mut cache = small_cache(8);
    let x = install(&mut cache, 0x000, ProtocolStatus::Shared);
    let y = install(&mut cache, 0x100, ProtocolStatus::Shared);
    assert_eq!(cache.evict_address(0x200, |addr| addr == 0x000), Some(y));
    assert_eq!(cache.evict_address(0x200, |addr| addr == 0x100), Some(x));
    assert_eq!(cache.evict_address(0x200, |_| true), None);
}

/// Clearing a line forgets its tag.
#[test]
fn clear_line_drops_tag() {
    let mut cache = small_cache(8);
    let (index, way) = install(&mut cache, 0x40, ProtocolStatus::Modified);
    cache.clear_line(index, way);
    assert_eq!(cache.find_line(0x40), None);
    assert_eq!(cache.line(index, way).status, ProtocolStatus::Invalid);
}

/// End-of-run statistics count the lines still valid and still dirty.
#[test]
fn final_statistics_count_resident_lines() {
    let mut cache = small_cache(8);
    let _ = install(&mut cache, 0x000, ProtocolStatus::Modified);
    let _ = install(&mut cache, 0x040, ProtocolStatus::Shared);
    let _ = install(&mut cache, 0x080, ProtocolStatus::Owned);
    cache.final_statistics();
    assert_eq!(cache.stats.final_eviction, 3);
    assert_eq!(cache.stats.final_writeback, 2);
}

/// In a 4-set, 2-way LRU cache, X, Y, and Z map to set 0; touching X, Y, Z in
/// order evicts X.
#[test]
fn conflict_evicts_least_recently_used() {
    let x = 0;
    let y = 4 * LINE;
    let z = 8 * LINE;
    let sim = run_traces(
        &single_cache_config(),
        vec![vec![
            TraceEntry::read(x, 8),
            TraceEntry::read(y, 8),
            TraceEntry::read(z, 8),
        ]],
    );
    let cache = &sim.system.caches[0];
    assert_eq!(cache.decoder.index(x), cache.decoder.index(z));
    assert_eq!(cache.find_line(x), None);
    assert!(cache.find_valid_line(y).is_some());
    assert!(cache.find_valid_line(z).is_some());
    assert_eq!(cache.stats.eviction, 1);
    assert_eq!(cache.stats.read_miss, 3);
}

// ══════════════════════════════════════════════════════════
// 3. MSHR allocation
// ══════════════════════════════════════════════════════════

/// With a request partition of two, a third allocation is denied and counted.
#[test]
fn full_request_partition() {
    let mut cache = small_cache(2);
    assert!(cache.allocate_request(untreated(1, 0x000)).is_some());
    assert!(cache.allocate_request(untreated(2, 0x040)).is_some());
    assert_eq!(cache.allocate_request(untreated(3, 0x080)), None);
    assert_eq!(cache.stats.full_mshr_request, 1);
    assert_eq!(cache.stats.full_mshr_copyback, 0);
    assert_eq!(cache.mshr.free_slots(MshrPartition::Copyback), 4);
}

/// Ready entries are released once their ready cycle passes, and their wait is recorded.
#[test]
fn release_ready_records_wait() {
    let mut cache = small_cache(2);
    let mut package = untreated(1, 0x000);
    package.package_ready(5, 10);
    let _ = cache.allocate_request(package).unwrap();

    cache.release_ready(14);
    assert_eq!(cache.mshr.occupied(), 1);
    cache.release_ready(15);
    assert!(cache.mshr.is_empty());
    assert_eq!(cache.stats.read_wait.count, 1);
    assert_eq!(cache.stats.read_wait.max, 15);
}

// ══════════════════════════════════════════════════════════
// 4. Receiving packages
// ══════════════════════════════════════════════════════════

/// An accepted request lands untreated in the request partition and busies the read port.
#[test]
fn receive_request() {
    let mut cache = small_cache(2);
    let package = untreated(1, 0x000);
    assert!(cache.receive_package(&package, 0, 3, 10).unwrap());
    let slot = cache.mshr.born_ordered()[0];
    assert_eq!(cache.mshr.get(slot).state, PackageState::Untreated);
    assert_eq!(cache.mshr.get(slot).ready_cycle, 13);
    assert_eq!(cache.ports.recv_read_ready, 13);

    let second = untreated(2, 0x040);
    assert!(!cache.receive_package(&second, 0, 3, 11).unwrap());
    assert!(cache.receive_package(&second, 0, 3, 13).unwrap());
}

/// A request that still has a hop to take was misrouted.
#[test]
fn receive_rejects_unrouted_package() {
    let mut cache = small_cache(2);
    let mut package = untreated(1, 0x000);
    package.hop_count = Some(0);
    assert!(cache.receive_package(&package, 0, 1, 0).is_err());
}

/// Arriving with a granted token but no free slot breaks admission control.
#[test]
fn receive_without_slot_is_error() {
    let mut cache = small_cache(1);
    assert!(cache.receive_package(&untreated(1, 0x000), 0, 0, 0).unwrap());
    assert!(cache.receive_package(&untreated(2, 0x040), 0, 0, 1).is_err());
}

/// An answer must match a waiting request of the same transaction.
#[test]
fn receive_answer() {
    let mut cache = small_cache(2);
    let mut waiting = untreated(1, 0x000);
    waiting.package_wait(0, 0);
    let _ = cache.allocate_request(waiting.clone()).unwrap();

    let mut stray = waiting.clone();
    stray.is_answer = true;
    stray.opcode_number = 9;
    assert!(cache.receive_package(&stray, 0, 1, 5).is_err());

    let mut answer = waiting;
    answer.is_answer = true;
    answer.memory_size = 64;
    answer.set_src_dst(ComponentId::Memory(0), ComponentId::Cache(0));
    assert!(cache.receive_package(&answer, 0, 4, 5).unwrap());
    let slot = cache.mshr.born_ordered()[0];
    let entry = cache.mshr.get(slot);
    assert!(entry.is_answer);
    assert_eq!(entry.state, PackageState::Untreated);
    assert_eq!(entry.ready_cycle, 9);
    assert_eq!(entry.memory_size, 64);
}

/// Token checks reserve request slots in arrival order.
#[test]
fn token_admission_follows_free_slots() {
    let mut cache = small_cache(1);
    let first = untreated(1, 0x000);
    let second = untreated(2, 0x040);
    assert!(cache.check_token_list(&first));
    assert!(!cache.check_token_list(&second));
    assert!(cache.receive_package(&first, 0, 0, 0).unwrap());
    assert_eq!(cache.tokens.len(), 1);
    assert!(!cache.check_token_list(&second));
}

fn copyback_from(cache: usize, opcode_number: u64, addr: u64) -> MemoryPackage {
    request(
        ComponentId::Cache(cache),
        opcode_number,
        addr,
        MemoryOperation::Copyback,
        ComponentId::Cache(0),
    )
}

/// Copyback tokens count against the copyback partition, not the request partition.
#[test]
fn token_admission_is_per_class() {
    let mut cache = small_cache(1);
    assert!(cache.check_token_list(&copyback_from(1, 1, 0x000)));
    assert_eq!(cache.tokens.granted(MshrPartition::Copyback), 1);
    assert!(cache.check_token_list(&untreated(2, 0x040)));
    assert_eq!(cache.tokens.granted(MshrPartition::Request), 1);
    assert!(!cache.check_token_list(&untreated(3, 0x080)));
}

/// An arriving copyback occupies a copyback slot and leaves the request partition free.
#[test]
fn incoming_copyback_lands_in_copyback_partition() {
    let mut cache = small_cache(1);
    let copyback = copyback_from(1, 1, 0x000);
    assert!(cache.check_token_list(&copyback));
    assert!(cache.receive_package(&copyback, 0, 0, 0).unwrap());
    let slot = cache.mshr.born_ordered()[0];
    assert!(cache.mshr.partition_range(MshrPartition::Copyback).contains(&slot));
    assert_eq!(cache.mshr.free_slots(MshrPartition::Request), 1);
    assert!(cache.tokens.is_empty());
}

/// One copyback slot stays out of reach of upstream copybacks, and own evictions
/// do not take slots already promised to them.
#[test]
fn granted_copyback_tokens_hold_their_slots() {
    let config = CacheConfig {
        mshr_copyback_size: 2,
        ..cache("L1", 8, 2, &[])
    };
    let mut cache = CacheMemory::new(0, &config, LINE as usize).unwrap();
    assert!(cache.check_token_list(&copyback_from(1, 1, 0x000)));
    assert!(!cache.check_token_list(&copyback_from(2, 1, 0x040)));

    let own = request(
        ComponentId::Cache(0),
        7,
        0x080,
        MemoryOperation::Copyback,
        ComponentId::Memory(0),
    );
    assert!(cache.allocate_copyback(own.clone()).is_some());
    assert_eq!(cache.allocate_copyback(own), None);
    assert_eq!(cache.stats.full_mshr_copyback, 1);
}

/// Classes without a usable partition of their own fall back to the request partition.
#[rstest]
#[case(4, 2, MemoryOperation::Copyback, MshrPartition::Copyback)]
#[case(1, 2, MemoryOperation::Copyback, MshrPartition::Request)]
#[case(4, 2, MemoryOperation::Prefetch, MshrPartition::Prefetch)]
#[case(4, 0, MemoryOperation::Prefetch, MshrPartition::Request)]
#[case(4, 2, MemoryOperation::Read, MshrPartition::Request)]
#[case(4, 2, MemoryOperation::Write, MshrPartition::Request)]
fn incoming_partition_by_class(
    #[case] mshr_copyback_size: usize,
    #[case] mshr_prefetch_size: usize,
    #[case] operation: MemoryOperation,
    #[case] expected: MshrPartition,
) {
    let config = CacheConfig {
        mshr_copyback_size,
        mshr_prefetch_size,
        ..cache("L1", 8, 2, &[])
    };
    let cache = CacheMemory::new(0, &config, LINE as usize).unwrap();
    assert_eq!(cache.incoming_partition(operation), expected);
}

// ══════════════════════════════════════════════════════════
// 5. Prefetching
// ══════════════════════════════════════════════════════════

/// Demand requests feed the prefetcher; the queue drains into the prefetch partition.
#[test]
fn next_line_prefetch_issue() {
    let config = CacheConfig {
        prefetcher: Prefetcher::NextLine,
        prefetch_degree: 2,
        ..cache("L1", 8, 2, &[])
    };
    let mut cache = CacheMemory::new(0, &config, 64).unwrap();
    assert!(cache.receive_package(&untreated(1, 0x1010), 0, 0, 0).unwrap());
    assert_eq!(cache.queued_prefetches(), 2);

    cache.issue_prefetch(1);
    cache.issue_prefetch(2);
    cache.issue_prefetch(3);
    assert_eq!(cache.queued_prefetches(), 0);
    assert_eq!(cache.stats.prefetch_issued, 2);
    assert_eq!(cache.mshr.free_slots(MshrPartition::Prefetch), 0);

    let addresses: Vec<u64> = cache
        .mshr
        .iter()
        .filter(|(_, p)| p.memory_operation == MemoryOperation::Prefetch)
        .map(|(_, p)| p.memory_address)
        .collect();
    assert_eq!(addresses, vec![0x1040, 0x1080]);
}

/// A full prefetch partition leaves proposals queued and counts the stall.
#[test]
fn prefetch_waits_for_partition() {
    let config = CacheConfig {
        prefetcher: Prefetcher::NextLine,
        mshr_prefetch_size: 1,
        ..cache("L1", 8, 2, &[])
    };
    let mut cache = CacheMemory::new(0, &config, 64).unwrap();
    assert!(cache.receive_package(&untreated(1, 0x000), 0, 0, 0).unwrap());
    assert!(cache.receive_package(&untreated(2, 0x100), 0, 0, 1).unwrap());
    cache.issue_prefetch(2);
    cache.issue_prefetch(3);
    assert_eq!(cache.stats.prefetch_issued, 1);
    assert_eq!(cache.queued_prefetches(), 1);
    assert_eq!(cache.stats.full_mshr_prefetch, 1);
}
