//! Simulation statistics collection and reporting.
//!
//! This module tracks performance metrics for the coherence simulator. It provides:
//! 1. **Run summary:** Simulated cycles, host time, and simulation speed.
//! 2. **Caches:** Hits and misses per operation, evictions, copybacks, invalidations,
//!    MSHR backpressure, and per-operation wait times.
//! 3. **Directory:** Coherence hits and misses, cache-to-cache transfers, upgrades.
//! 4. **Memory and requesters:** Accesses served and end-to-end latencies.
//!
//! Every block can be reset after a warm-up period and printed as a table.

use std::time::Instant;

use serde::Serialize;

use crate::core::package::MemoryOperation;

const BANNER: &str = "==========================================================";
const RULE: &str = "----------------------------------------------------------";

/// Returns `part / total` as a percentage, or zero for an empty total.
fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Run-wide statistics.
#[derive(Clone, Debug)]
pub struct SimStats {
    start_time: Instant,
    /// Total simulated cycles.
    pub cycles: u64,
    /// Cycle at which statistics were last reset.
    pub reset_cycle: u64,
    /// Number of periodic checks performed.
    pub periodic_checks: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            reset_cycle: 0,
            periodic_checks: 0,
        }
    }
}

impl SimStats {
    /// Restarts counting at `cycle`.
    pub fn reset(&mut self, cycle: u64) {
        self.start_time = Instant::now();
        self.reset_cycle = cycle;
        self.periodic_checks = 0;
    }

    /// Prints the run summary to stdout.
    pub fn print(&self) {
        let seconds = self.start_time.elapsed().as_secs_f64();
        let measured = self.cycles - self.reset_cycle;
        let khz = if seconds > 0.0 {
            (measured as f64 / seconds) / 1000.0
        } else {
            0.0
        };
        println!("\n{BANNER}");
        println!("CACHE HIERARCHY SIMULATION STATISTICS");
        println!("{BANNER}");
        println!("host_seconds             {seconds:.4} s");
        println!("sim_cycles               {}", self.cycles);
        println!("measured_cycles          {measured}");
        println!("sim_freq                 {khz:.2} kHz");
        println!("periodic_checks          {}", self.periodic_checks);
        println!("{RULE}");
    }
}

/// Minimum, maximum, and accumulated wait of one operation class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WaitTime {
    /// Completed transactions.
    pub count: u64,
    /// Shortest wait (cycles).
    pub min: u64,
    /// Longest wait (cycles).
    pub max: u64,
    /// Sum of all waits (cycles).
    pub accumulated: u64,
}

impl WaitTime {
    /// Records one completed transaction that waited `cycles`.
    pub fn record(&mut self, cycles: u64) {
        if self.count == 0 || cycles < self.min {
            self.min = cycles;
        }
        self.max = self.max.max(cycles);
        self.accumulated += cycles;
        self.count += 1;
    }

    /// Average wait, or zero when nothing completed.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.accumulated as f64 / self.count as f64
        }
    }

    fn print(&self, name: &str) {
        println!(
            "  {name:<22} count: {:<10} | min: {:<6} | avg: {:<10.2} | max: {}",
            self.count,
            self.min,
            self.average(),
            self.max
        );
    }
}

/// Per-cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests and answers treated.
    pub accesses: u64,
    /// Instruction fetch hits.
    pub instruction_hit: u64,
    /// Instruction fetch misses.
    pub instruction_miss: u64,
    /// Read hits.
    pub read_hit: u64,
    /// Read misses.
    pub read_miss: u64,
    /// Prefetch hits.
    pub prefetch_hit: u64,
    /// Prefetch misses.
    pub prefetch_miss: u64,
    /// Write hits.
    pub write_hit: u64,
    /// Write misses.
    pub write_miss: u64,
    /// Copybacks installed from higher levels.
    pub copyback_recv: u64,
    /// Copybacks sent to the next level.
    pub copyback_send: u64,
    /// Valid lines evicted.
    pub eviction: u64,
    /// Dirty lines evicted (each produced a copyback).
    pub writeback: u64,
    /// Lines invalidated by coherence or inclusion.
    pub invalidation: u64,
    /// Valid lines left at the end of the run.
    pub final_eviction: u64,
    /// Dirty lines left at the end of the run.
    pub final_writeback: u64,
    /// Failed request-partition allocations.
    pub full_mshr_request: u64,
    /// Failed copyback-partition allocations.
    pub full_mshr_copyback: u64,
    /// Failed prefetch-partition allocations.
    pub full_mshr_prefetch: u64,
    /// Prefetch transactions started.
    pub prefetch_issued: u64,
    /// Prefetch addresses dropped because the queue was full.
    pub prefetch_dropped: u64,
    /// Instruction fetch wait times.
    pub instruction_wait: WaitTime,
    /// Read wait times.
    pub read_wait: WaitTime,
    /// Prefetch wait times.
    pub prefetch_wait: WaitTime,
    /// Write wait times.
    pub write_wait: WaitTime,
    /// Copyback wait times.
    pub copyback_wait: WaitTime,
}

impl CacheStats {
    /// Counts a hit of `op`.
    pub fn record_hit(&mut self, op: MemoryOperation) {
        match op {
            MemoryOperation::Instruction => self.instruction_hit += 1,
            MemoryOperation::Read => self.read_hit += 1,
            MemoryOperation::Prefetch => self.prefetch_hit += 1,
            MemoryOperation::Write => self.write_hit += 1,
            MemoryOperation::Copyback => self.copyback_recv += 1,
        }
    }

    /// Counts a miss of `op`.
    pub fn record_miss(&mut self, op: MemoryOperation) {
        match op {
            MemoryOperation::Instruction => self.instruction_miss += 1,
            MemoryOperation::Read => self.read_miss += 1,
            MemoryOperation::Prefetch => self.prefetch_miss += 1,
            MemoryOperation::Write => self.write_miss += 1,
            MemoryOperation::Copyback => self.copyback_recv += 1,
        }
    }

    /// Records how long a finished transaction of `op` stayed in the MSHR.
    pub fn record_wait(&mut self, op: MemoryOperation, cycles: u64) {
        match op {
            MemoryOperation::Instruction => self.instruction_wait.record(cycles),
            MemoryOperation::Read => self.read_wait.record(cycles),
            MemoryOperation::Prefetch => self.prefetch_wait.record(cycles),
            MemoryOperation::Write => self.write_wait.record(cycles),
            MemoryOperation::Copyback => self.copyback_wait.record(cycles),
        }
    }

    /// Total hits over all demand and prefetch operations.
    pub const fn hits(&self) -> u64 {
        self.instruction_hit + self.read_hit + self.prefetch_hit + self.write_hit
    }

    /// Total misses over all demand and prefetch operations.
    pub const fn misses(&self) -> u64 {
        self.instruction_miss + self.read_miss + self.prefetch_miss + self.write_miss
    }

    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prints the statistics of the cache labelled `label` to stdout.
    pub fn print(&self, label: &str) {
        let line = |name: &str, hit: u64, miss: u64| {
            println!(
                "  {name:<12} hit: {hit:<10} | miss: {miss:<10} | miss_rate: {:.2}%",
                percent(miss, hit + miss)
            );
        };
        println!("CACHE {label}");
        println!("  accesses               {}", self.accesses);
        line("instruction", self.instruction_hit, self.instruction_miss);
        line("read", self.read_hit, self.read_miss);
        line("prefetch", self.prefetch_hit, self.prefetch_miss);
        line("write", self.write_hit, self.write_miss);
        println!("  copyback.recv          {}", self.copyback_recv);
        println!("  copyback.send          {}", self.copyback_send);
        println!("  eviction               {}", self.eviction);
        println!("  writeback              {}", self.writeback);
        println!("  invalidation           {}", self.invalidation);
        println!("  final.eviction         {}", self.final_eviction);
        println!("  final.writeback        {}", self.final_writeback);
        println!("  mshr.full.request      {}", self.full_mshr_request);
        println!("  mshr.full.copyback     {}", self.full_mshr_copyback);
        println!("  mshr.full.prefetch     {}", self.full_mshr_prefetch);
        println!("  prefetch.issued        {}", self.prefetch_issued);
        println!("  prefetch.dropped       {}", self.prefetch_dropped);
        self.instruction_wait.print("wait.instruction");
        self.read_wait.print("wait.read");
        self.prefetch_wait.print("wait.prefetch");
        self.write_wait.print("wait.write");
        self.copyback_wait.print("wait.copyback");
        println!("{RULE}");
    }
}

/// Directory statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    /// Instruction fetch hits.
    pub instruction_hit: u64,
    /// Instruction fetch misses.
    pub instruction_miss: u64,
    /// Read hits.
    pub read_hit: u64,
    /// Read misses.
    pub read_miss: u64,
    /// Prefetch hits.
    pub prefetch_hit: u64,
    /// Prefetch misses.
    pub prefetch_miss: u64,
    /// Write hits.
    pub write_hit: u64,
    /// Write misses.
    pub write_miss: u64,
    /// Copybacks installed.
    pub copyback: u64,
    /// Misses served by a higher-level cache.
    pub cache_to_cache: u64,
    /// Writes that hit a Shared or Owned line.
    pub upgrade: u64,
    /// Requests rejected because their line was locked.
    pub locked: u64,
    /// Most directory lines open at once.
    pub max_open_lines: u64,
}

impl DirectoryStats {
    /// Counts a coherence hit of `op`.
    pub fn record_hit(&mut self, op: MemoryOperation) {
        match op {
            MemoryOperation::Instruction => self.instruction_hit += 1,
            MemoryOperation::Read => self.read_hit += 1,
            MemoryOperation::Prefetch => self.prefetch_hit += 1,
            MemoryOperation::Write => self.write_hit += 1,
            MemoryOperation::Copyback => self.copyback += 1,
        }
    }

    /// Counts a coherence miss of `op`.
    pub fn record_miss(&mut self, op: MemoryOperation) {
        match op {
            MemoryOperation::Instruction => self.instruction_miss += 1,
            MemoryOperation::Read => self.read_miss += 1,
            MemoryOperation::Prefetch => self.prefetch_miss += 1,
            MemoryOperation::Write => self.write_miss += 1,
            MemoryOperation::Copyback => self.copyback += 1,
        }
    }

    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prints the directory statistics to stdout.
    pub fn print(&self) {
        println!("DIRECTORY");
        println!(
            "  instruction            hit: {:<10} | miss: {}",
            self.instruction_hit, self.instruction_miss
        );
        println!(
            "  read                   hit: {:<10} | miss: {}",
            self.read_hit, self.read_miss
        );
        println!(
            "  prefetch               hit: {:<10} | miss: {}",
            self.prefetch_hit, self.prefetch_miss
        );
        println!(
            "  write                  hit: {:<10} | miss: {}",
            self.write_hit, self.write_miss
        );
        println!("  copyback               {}", self.copyback);
        println!("  cache_to_cache         {}", self.cache_to_cache);
        println!("  upgrade                {}", self.upgrade);
        println!("  locked                 {}", self.locked);
        println!("  max_open_lines         {}", self.max_open_lines);
        println!("{RULE}");
    }
}

/// Memory controller statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Read-type requests served.
    pub reads: u64,
    /// Writes and copybacks absorbed.
    pub writes: u64,
    /// Sum of access latencies (cycles).
    pub accumulated_latency: u64,
    /// Most requests buffered at once.
    pub max_buffered: u64,
}

impl MemoryStats {
    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prints the statistics of the controller labelled `label` to stdout.
    pub fn print(&self, label: &str) {
        let served = self.reads + self.writes;
        let avg = if served == 0 {
            0.0
        } else {
            self.accumulated_latency as f64 / served as f64
        };
        println!("MEMORY {label}");
        println!("  reads                  {}", self.reads);
        println!("  writes                 {}", self.writes);
        println!("  latency.avg            {avg:.2}");
        println!("  buffer.max             {}", self.max_buffered);
        println!("{RULE}");
    }
}

/// Requester statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RequesterStats {
    /// Instruction fetches issued.
    pub instructions: u64,
    /// Reads issued.
    pub reads: u64,
    /// Writes issued.
    pub writes: u64,
    /// Software prefetches issued.
    pub prefetches: u64,
    /// Cycles a ready trace entry waited for the first-level cache.
    pub stall_cycles: u64,
    /// End-to-end latency of completed read-type transactions.
    pub latency: WaitTime,
}

impl RequesterStats {
    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prints the statistics of the requester labelled `label` to stdout.
    pub fn print(&self, label: &str) {
        println!("REQUESTER {label}");
        println!("  op.instruction         {}", self.instructions);
        println!("  op.read                {}", self.reads);
        println!("  op.write               {}", self.writes);
        println!("  op.prefetch            {}", self.prefetches);
        println!("  stall_cycles           {}", self.stall_cycles);
        self.latency.print("latency");
        println!("{RULE}");
    }
}

/// Statistics of one labelled component.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Labeled<T> {
    /// Component label.
    pub label: String,
    /// The component's counters.
    #[serde(flatten)]
    pub stats: T,
}

/// Every statistics block of a run, for machine-readable output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsReport {
    /// Total simulated cycles.
    pub cycles: u64,
    /// Cycles since the last statistics reset.
    pub measured_cycles: u64,
    /// Per-cache counters, in arena order.
    pub caches: Vec<Labeled<CacheStats>>,
    /// Directory counters.
    pub directory: DirectoryStats,
    /// Per-controller counters.
    pub memories: Vec<Labeled<MemoryStats>>,
    /// Per-requester counters.
    pub requesters: Vec<Labeled<RequesterStats>>,
}
