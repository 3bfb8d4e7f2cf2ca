use cohsim_core::common::ids::ComponentId;
use cohsim_core::config::{
    CacheConfig, Config, DirectoryConfig, GeneralConfig, Inclusiveness, MemoryControllerConfig,
    RequesterConfig,
};
use cohsim_core::core::package::{MemoryOperation, MemoryPackage};
use cohsim_core::core::units::cache::CacheMemory;
use cohsim_core::core::units::cache::line::ProtocolStatus;
use cohsim_core::sim::{Simulator, TraceEntry};
use cohsim_core::soc::System;
use tracing_subscriber::EnvFilter;

/// Line size used by every test hierarchy.
pub const LINE: u64 = 64;

/// Cycle budget for a test run; every scenario drains long before it.
pub const RUN_LIMIT: u64 = 200_000;

/// Installs a test-captured tracing subscriber once per process.
///
/// The level follows `RUST_LOG` and is silent otherwise.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A 4-set LRU cache when called with 8 lines and 2 ways.
pub fn cache(label: &str, line_number: usize, associativity: usize, lower: &[&str]) -> CacheConfig {
    CacheConfig {
        label: label.to_string(),
        line_number,
        associativity,
        lower_level: lower.iter().map(ToString::to_string).collect(),
        ..CacheConfig::default()
    }
}

/// A requester that keeps a single read in flight, so trace order is access order.
pub fn requester(label: &str, data_cache: &str) -> RequesterConfig {
    RequesterConfig {
        label: label.to_string(),
        data_cache: data_cache.to_string(),
        max_outstanding: 1,
        ..RequesterConfig::default()
    }
}

/// Wraps caches and requesters with one fast memory controller and tight watchdogs.
pub fn config(
    caches: Vec<CacheConfig>,
    requesters: Vec<RequesterConfig>,
    inclusiveness: Inclusiveness,
) -> Config {
    Config {
        general: GeneralConfig {
            max_alive_time: 20_000,
            periodic_check: 64,
            ..GeneralConfig::default()
        },
        directory: DirectoryConfig {
            inclusiveness,
            ..DirectoryConfig::default()
        },
        caches,
        memory_controllers: vec![MemoryControllerConfig {
            latency: 20,
            ..MemoryControllerConfig::default()
        }],
        requesters,
    }
}

/// One requester on one 4-set, 2-way LRU cache that talks to memory directly.
pub fn single_cache_config() -> Config {
    config(
        vec![cache("L1", 8, 2, &[])],
        vec![requester("CPU0", "L1")],
        Inclusiveness::NonInclusive,
    )
}

/// `cores` requesters, each with a private 4-set, 2-way `L1_n`, sharing one `L2`.
pub fn shared_l2_config(
    cores: usize,
    l2_lines: usize,
    l2_ways: usize,
    inclusiveness: Inclusiveness,
) -> Config {
    let mut caches: Vec<CacheConfig> = (0..cores)
        .map(|n| cache(&format!("L1_{n}"), 8, 2, &["L2"]))
        .collect();
    caches.push(cache("L2", l2_lines, l2_ways, &[]));
    let requesters = (0..cores)
        .map(|n| requester(&format!("CPU{n}"), &format!("L1_{n}")))
        .collect();
    config(caches, requesters, inclusiveness)
}

/// A read that waits `delay` cycles after the previous access of its trace.
pub fn read_after(address: u64, delay: u64) -> TraceEntry {
    TraceEntry {
        delay,
        ..TraceEntry::read(address, 8)
    }
}

/// A write that waits `delay` cycles after the previous access of its trace.
pub fn write_after(address: u64, delay: u64) -> TraceEntry {
    TraceEntry {
        delay,
        ..TraceEntry::write(address, 8)
    }
}

/// Builds a simulator, loads one trace per requester, and runs until the hierarchy drains.
pub fn run_traces(config: &Config, traces: Vec<Vec<TraceEntry>>) -> Simulator {
    init_logging();
    let mut sim = Simulator::new(config).unwrap();
    for (requester, trace) in traces.into_iter().enumerate() {
        sim.load_trace(requester, trace).unwrap();
    }
    let _ = sim.run(Some(RUN_LIMIT)).unwrap();
    assert!(sim.system.is_idle(), "hierarchy did not drain:\n{}", sim.dump_structures());
    sim
}

/// Cache with the given label.
pub fn cache_named<'a>(system: &'a System, label: &str) -> &'a CacheMemory {
    system
        .caches
        .iter()
        .find(|c| c.label == label)
        .unwrap()
}

/// Status of the line holding `addr` in the cache labelled `label`, Invalid if absent.
pub fn status(system: &System, label: &str, addr: u64) -> ProtocolStatus {
    let cache = cache_named(system, label);
    cache
        .find_line(addr)
        .map_or(ProtocolStatus::Invalid, |(index, way)| {
            cache.line(index, way).status
        })
}

/// An untreated request from `owner` for `addr`, addressed to `dst`.
pub fn request(
    owner: ComponentId,
    opcode_number: u64,
    addr: u64,
    operation: MemoryOperation,
    dst: ComponentId,
) -> MemoryPackage {
    let mut package = MemoryPackage::new(owner, opcode_number, 0, addr, 8, operation, 0);
    package.set_src_dst(owner, dst);
    package.package_untreated(0, 0);
    package
}

/// Installs `addr` in `cache` with `status`, as a completed fill would.
pub fn install(cache: &mut CacheMemory, addr: u64, status: ProtocolStatus) -> (usize, usize) {
    let (index, way) = cache.evict_address(addr, |_| false).unwrap();
    cache.change_address(index, way, addr);
    cache.change_status(index, way, status);
    cache.update_last_access(index, way);
    (index, way)
}
