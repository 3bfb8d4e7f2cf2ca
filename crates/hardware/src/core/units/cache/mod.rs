//! Set-Associative Cache Memory.
//!
//! This module implements one cache (or one bank of a banked cache) of the
//! hierarchy. A `CacheMemory` owns:
//! 1. **Storage:** Sets of MOESI lines addressed through an [`AddressDecoder`].
//! 2. **MSHR:** The partitioned, age-ordered buffer of in-flight transactions.
//! 3. **Token ledger:** Admission control for upstream senders.
//! 4. **Policies:** Replacement policy, optional prefetcher, and line-usage predictor.
//!
//! Hit/miss/eviction decisions that involve other caches are taken by the
//! [`DirectoryController`](crate::core::directory::DirectoryController), which
//! receives the whole cache arena. The cache itself only offers the local
//! primitives (lookup, victim selection, allocation, statistics) and the
//! [`Transport`] endpoint.

/// Cache lines, sets, and MOESI status.
pub mod line;

/// Miss Status Holding Registers.
pub mod mshr;

/// Cache replacement policy implementations (LRU, FIFO, Random, Invalid/Dead-or-LRU).
pub mod policies;

/// Token ledger for admission control.
pub mod token;

use std::collections::VecDeque;
use std::fmt::Write as _;

use self::line::{CacheLine, CacheSet, ProtocolStatus};
use self::mshr::{Mshr, MshrPartition};
use self::policies::{Candidate, ReplacementPolicy};
use self::token::TokenLedger;
use crate::common::addr::AddressDecoder;
use crate::common::error::SimError;
use crate::common::ids::ComponentId;
use crate::config::CacheConfig;
use crate::core::package::{MemoryOperation, MemoryPackage, PackageState};
use crate::core::units::prefetch::{self, Prefetcher};
use crate::core::units::usage::{self, LineUsagePredictor};
use crate::soc::traits::{PortTimers, Transport};
use crate::stats::CacheStats;

/// One cache of the hierarchy.
#[derive(Debug)]
pub struct CacheMemory {
    /// Index in the cache arena.
    pub id: usize,
    /// Label used in reports and errors.
    pub label: String,
    /// Address decomposition for this cache.
    pub decoder: AddressDecoder,
    sets: Vec<CacheSet>,
    /// In-flight transactions.
    pub mshr: Mshr,
    /// Admission tokens of upstream senders.
    pub tokens: TokenLedger,
    policy: Box<dyn ReplacementPolicy>,
    prefetcher: Option<Box<dyn Prefetcher>>,
    prefetch_queue: VecDeque<u64>,
    prefetch_queue_size: usize,
    /// Line-usage predictor.
    pub predictor: Box<dyn LineUsagePredictor>,
    /// Arena indices of the caches directly above (closer to the requesters).
    pub higher_level: Vec<usize>,
    /// Arena indices of the caches directly below; empty for a last-level cache.
    pub lower_level: Vec<usize>,
    /// Distance from the requesters (first-level caches are level 1).
    pub hierarchy_level: usize,
    /// Bank served by this cache.
    pub bank_number: usize,
    /// Line size in bytes.
    pub line_size: usize,
    /// Cycles to read a line.
    pub penalty_read: u64,
    /// Cycles to write a line.
    pub penalty_write: u64,
    /// Link latency.
    pub interconnection_latency: u64,
    /// Link width in bytes.
    pub interconnection_width: usize,
    /// Port ready cycles.
    pub ports: PortTimers,
    /// Statistics.
    pub stats: CacheStats,
    access_clock: u64,
    transaction_counter: u64,
    config: CacheConfig,
}

impl CacheMemory {
    /// Builds a cache from its configuration.
    ///
    /// # Arguments
    ///
    /// * `id` - Index in the cache arena.
    /// * `config` - Cache configuration.
    /// * `line_size` - Line size shared by the hierarchy.
    ///
    /// # Returns
    ///
    /// The cache with every line Invalid, or a configuration error.
    pub fn new(id: usize, config: &CacheConfig, line_size: usize) -> Result<Self, SimError> {
        let label = config.label.as_str();
        if config.associativity == 0 || config.line_number % config.associativity != 0 {
            return Err(SimError::config(
                label,
                format!(
                    "line number {} is not a multiple of the associativity {}",
                    config.line_number, config.associativity
                ),
            ));
        }
        if config.bank_number >= config.total_banks {
            return Err(SimError::config(
                label,
                format!(
                    "bank number {} out of range for {} banks",
                    config.bank_number, config.total_banks
                ),
            ));
        }
        if config.mshr_request_size == 0 || config.mshr_copyback_size == 0 {
            return Err(SimError::config(
                label,
                "the request and copyback MSHR partitions need at least one slot",
            ));
        }

        let sets = config.line_number / config.associativity;
        let decoder = AddressDecoder::new(
            label,
            config.address_mask,
            line_size,
            sets,
            config.total_banks,
        )?;

        Ok(Self {
            id,
            label: config.label.clone(),
            decoder,
            sets: (0..sets).map(|_| CacheSet::new(config.associativity)).collect(),
            mshr: Mshr::new(
                ComponentId::Cache(id),
                config.mshr_request_size,
                config.mshr_copyback_size,
                config.mshr_prefetch_size,
            ),
            tokens: TokenLedger::new(),
            policy: policies::build(config.replacement_policy),
            prefetcher: prefetch::build(config, line_size),
            prefetch_queue: VecDeque::with_capacity(config.prefetch_queue_size),
            prefetch_queue_size: config.prefetch_queue_size,
            predictor: usage::build(config, sets, line_size)?,
            higher_level: Vec::new(),
            lower_level: Vec::new(),
            hierarchy_level: 0,
            bank_number: config.bank_number,
            line_size,
            penalty_read: config.penalty_read,
            penalty_write: config.penalty_write,
            interconnection_latency: config.interconnection_latency,
            interconnection_width: config.interconnection_width,
            ports: PortTimers::default(),
            stats: CacheStats::default(),
            access_clock: 0,
            transaction_counter: 0,
            config: config.clone(),
        })
    }

    /// Whether this cache talks to the memory controllers directly.
    pub fn is_llc(&self) -> bool {
        self.lower_level.is_empty()
    }

    /// Number of sets.
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// Ways per set.
    pub const fn associativity(&self) -> usize {
        self.config.associativity
    }

    /// Whether `addr` belongs to the bank served by this cache.
    pub const fn serves(&self, addr: u64) -> bool {
        self.decoder.bank(addr) == self.bank_number
    }

    /// Line at (`index`, `way`).
    pub fn line(&self, index: usize, way: usize) -> &CacheLine {
        &self.sets[index].ways[way]
    }

    /// Set at `index`.
    pub fn set(&self, index: usize) -> &CacheSet {
        &self.sets[index]
    }

    /// Looks up the line allocated for `addr`, whatever its status.
    ///
    /// # Returns
    ///
    /// `(index, way)` of the line whose tag matches, or `None`.
    pub fn find_line(&self, addr: u64) -> Option<(usize, usize)> {
        let index = self.decoder.index(addr);
        let target = Some(self.decoder.line_address(addr));
        self.sets[index]
            .ways
            .iter()
            .position(|line| line.tag == target)
            .map(|way| (index, way))
    }

    /// Looks up a valid line for `addr`.
    pub fn find_valid_line(&self, addr: u64) -> Option<(usize, usize)> {
        self.find_line(addr)
            .filter(|&(index, way)| self.line(index, way).status.is_valid())
    }

    /// Selects the victim way for `addr` in its set.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address that needs a line.
    /// * `is_locked` - Whether a line address has an open directory transaction;
    ///   such lines are never chosen.
    ///
    /// # Returns
    ///
    /// `(index, way)` of the victim, or `None` when every way is locked.
    pub fn evict_address(
        &mut self,
        addr: u64,
        is_locked: impl Fn(u64) -> bool,
    ) -> Option<(usize, usize)> {
        let index = self.decoder.index(addr);
        let candidates: Vec<Candidate> = self.sets[index]
            .ways
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.tag.is_some_and(&is_locked))
            .map(|(way, line)| Candidate {
                way,
                valid: line.status.is_valid(),
                last_access: line.last_access,
                inserted_at: line.inserted_at,
                dead: self.predictor.check_line_is_dead(index, way),
            })
            .collect();
        self.policy.get_victim(&candidates).map(|way| (index, way))
    }

    fn stamp(&mut self) -> u64 {
        self.access_clock += 1;
        self.access_clock
    }

    /// Re-tags a line for `addr`; the line becomes Invalid until filled.
    pub fn change_address(&mut self, index: usize, way: usize, addr: u64) {
        let tag = self.decoder.line_address(addr);
        let stamp = self.stamp();
        let line = &mut self.sets[index].ways[way];
        line.tag = Some(tag);
        line.status = ProtocolStatus::Invalid;
        line.inserted_at = stamp;
        line.last_access = stamp;
        line.usage_counter = 0;
    }

    /// Sets the coherence status of a line.
    pub fn change_status(&mut self, index: usize, way: usize, status: ProtocolStatus) {
        self.sets[index].ways[way].status = status;
    }

    /// Marks a line as just used.
    pub fn update_last_access(&mut self, index: usize, way: usize) {
        let stamp = self.stamp();
        let line = &mut self.sets[index].ways[way];
        line.last_access = stamp;
        line.usage_counter += 1;
    }

    /// Drops a line entirely (no tag, Invalid).
    pub fn clear_line(&mut self, index: usize, way: usize) {
        let line = &mut self.sets[index].ways[way];
        line.tag = None;
        line.status = ProtocolStatus::Invalid;
        line.usage_counter = 0;
    }

    /// Next sequence number for a transaction this cache starts itself.
    pub fn next_transaction_number(&mut self) -> u64 {
        self.transaction_counter += 1;
        self.transaction_counter
    }

    fn allocate(&mut self, partition: MshrPartition, package: MemoryPackage) -> Option<usize> {
        let slot = self.mshr.allocate(partition, package);
        if slot.is_none() {
            match partition {
                MshrPartition::Request => self.stats.full_mshr_request += 1,
                MshrPartition::Copyback => self.stats.full_mshr_copyback += 1,
                MshrPartition::Prefetch => self.stats.full_mshr_prefetch += 1,
            }
        }
        slot
    }

    /// Allocates a slot in the request partition.
    ///
    /// # Returns
    ///
    /// The slot, or `None` (and `full_mshr_request` bumped) when the partition is full.
    pub fn allocate_request(&mut self, package: MemoryPackage) -> Option<usize> {
        self.allocate(MshrPartition::Request, package)
    }

    /// Allocates a slot in the copyback partition for a copyback this cache starts.
    ///
    /// Slots promised to upstream copybacks through granted tokens are not taken.
    pub fn allocate_copyback(&mut self, package: MemoryPackage) -> Option<usize> {
        self.allocate_own(MshrPartition::Copyback, package)
    }

    /// Allocates a slot in the prefetch partition for a prefetch this cache starts.
    ///
    /// Slots promised to upstream prefetches through granted tokens are not taken.
    pub fn allocate_prefetch(&mut self, package: MemoryPackage) -> Option<usize> {
        self.allocate_own(MshrPartition::Prefetch, package)
    }

    fn allocate_own(&mut self, partition: MshrPartition, package: MemoryPackage) -> Option<usize> {
        if self.mshr.free_slots(partition) <= self.tokens.granted(partition) {
            match partition {
                MshrPartition::Request => self.stats.full_mshr_request += 1,
                MshrPartition::Copyback => self.stats.full_mshr_copyback += 1,
                MshrPartition::Prefetch => self.stats.full_mshr_prefetch += 1,
            }
            return None;
        }
        self.allocate(partition, package)
    }

    /// Partition an upstream request of `op` occupies on arrival.
    ///
    /// Copybacks use the copyback partition when it has room for one of them plus
    /// one eviction of this cache, prefetches use a non-empty prefetch partition,
    /// and everything else goes to the request partition.
    pub fn incoming_partition(&self, op: MemoryOperation) -> MshrPartition {
        match op {
            MemoryOperation::Copyback if self.config.mshr_copyback_size >= 2 => {
                MshrPartition::Copyback
            }
            MemoryOperation::Prefetch if self.config.mshr_prefetch_size >= 1 => {
                MshrPartition::Prefetch
            }
            _ => MshrPartition::Request,
        }
    }

    /// Slots of `partition` that tokens may be granted against.
    fn admission_slots(&self, partition: MshrPartition) -> usize {
        let free = self.mshr.free_slots(partition);
        match partition {
            MshrPartition::Copyback => free.saturating_sub(1),
            MshrPartition::Request | MshrPartition::Prefetch => free,
        }
    }

    /// Counts a hit of `op`.
    pub fn cache_hit(&mut self, op: MemoryOperation) {
        self.stats.accesses += 1;
        self.stats.record_hit(op);
    }

    /// Counts a miss of `op`.
    pub fn cache_miss(&mut self, op: MemoryOperation) {
        self.stats.accesses += 1;
        self.stats.record_miss(op);
    }

    /// Counts the eviction of a valid line; `dirty` if it produced a copyback.
    pub fn cache_evict(&mut self, dirty: bool) {
        self.stats.eviction += 1;
        if dirty {
            self.stats.writeback += 1;
        }
    }

    /// Counts an invalidation.
    pub fn cache_invalidate(&mut self) {
        self.stats.invalidation += 1;
    }

    /// Records the time a finished transaction spent in the MSHR.
    pub fn cache_wait(&mut self, package: &MemoryPackage, now: u64) {
        self.stats
            .record_wait(package.memory_operation, now.saturating_sub(package.born_cycle));
    }

    /// Frees every `Ready` slot whose ready cycle has passed.
    pub fn release_ready(&mut self, now: u64) {
        let done: Vec<usize> = self
            .mshr
            .iter()
            .filter(|(_, p)| p.state == PackageState::Ready && p.ready_cycle <= now)
            .map(|(slot, _)| slot)
            .collect();
        for slot in done {
            let package = self.mshr.get(slot).clone();
            self.cache_wait(&package, now);
            tracing::trace!(cache = %self.label, %package, "released");
            self.mshr.release(slot);
        }
    }

    /// Feeds a demand request to the prefetcher and queues its proposals.
    fn enqueue_prefetches(&mut self, package: &MemoryPackage) {
        let Some(prefetcher) = self.prefetcher.as_mut() else {
            return;
        };
        for addr in prefetcher.treat_prefetch(package) {
            if !self.serves(addr) || self.prefetch_queue.contains(&addr) {
                continue;
            }
            if self.prefetch_queue.len() >= self.prefetch_queue_size {
                self.stats.prefetch_dropped += 1;
            } else {
                self.prefetch_queue.push_back(addr);
            }
        }
    }

    /// Turns the oldest queued prefetch address into a transaction, if the
    /// prefetch partition has room.
    pub fn issue_prefetch(&mut self, now: u64) {
        let Some(&addr) = self.prefetch_queue.front() else {
            return;
        };
        let me = ComponentId::Cache(self.id);
        let number = self.transaction_counter + 1;
        let mut package = MemoryPackage::new(
            me,
            number,
            0,
            addr,
            self.line_size,
            MemoryOperation::Prefetch,
            now,
        );
        package.package_untreated(0, now);
        if self.allocate_prefetch(package).is_some() {
            self.transaction_counter = number;
            let _ = self.prefetch_queue.pop_front();
            self.stats.prefetch_issued += 1;
        }
    }

    /// Prefetch addresses waiting for a slot.
    pub fn queued_prefetches(&self) -> usize {
        self.prefetch_queue.len()
    }

    /// Counts the lines still resident at the end of the run.
    pub fn final_statistics(&mut self) {
        let (valid, dirty) = self
            .sets
            .iter()
            .flat_map(|set| set.ways.iter())
            .fold((0, 0), |(valid, dirty), line| {
                (
                    valid + u64::from(line.status.is_valid()),
                    dirty + u64::from(line.is_dirty()),
                )
            });
        self.stats.final_eviction = valid;
        self.stats.final_writeback = dirty;
    }

    /// Clears the statistics.
    pub fn reset_statistics(&mut self) {
        self.stats.reset();
    }

    /// Renders the configuration, including the address masks in binary.
    pub fn print_configuration(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "CACHE {} (level {})", self.label, self.hierarchy_level);
        let _ = writeln!(
            out,
            "  lines: {} | sets: {} | ways: {} | line_size: {} | bank: {}/{}",
            self.config.line_number,
            self.sets.len(),
            self.config.associativity,
            self.line_size,
            self.bank_number,
            self.config.total_banks
        );
        let _ = writeln!(
            out,
            "  policy: {:?} | prefetcher: {:?} | predictor: {:?} | mask: {:?}",
            self.config.replacement_policy,
            self.config.prefetcher,
            self.config.line_usage_predictor,
            self.decoder.layout()
        );
        let _ = writeln!(
            out,
            "  penalty read/write: {}/{} | mshr request/copyback/prefetch: {}/{}/{}",
            self.penalty_read,
            self.penalty_write,
            self.config.mshr_request_size,
            self.config.mshr_copyback_size,
            self.config.mshr_prefetch_size
        );
        let _ = writeln!(
            out,
            "  higher: {:?} | lower: {:?}",
            self.higher_level, self.lower_level
        );
        for mask in self.decoder.describe().lines() {
            let _ = writeln!(out, "  {mask}");
        }
        out
    }
}

impl Transport for CacheMemory {
    fn label(&self) -> &str {
        &self.label
    }

    fn ports(&mut self) -> &mut PortTimers {
        &mut self.ports
    }

    fn receive_package(
        &mut self,
        package: &MemoryPackage,
        _input_port: usize,
        latency: u64,
        now: u64,
    ) -> Result<bool, SimError> {
        let me = ComponentId::Cache(self.id);
        if package.hop_count.is_some() || package.id_dst != me {
            return Err(SimError::invariant(
                &self.label,
                package.memory_address,
                package.memory_operation,
                format!("received a package routed to {}", package.id_dst),
            ));
        }

        if package.is_answer {
            if self.ports.recv_answer_ready > now {
                return Ok(false);
            }
            let decoder = self.decoder;
            let slot = self
                .mshr
                .find(|p| {
                    p.state == PackageState::Wait
                        && !p.is_answer
                        && p.id_owner == package.id_owner
                        && p.opcode_number == package.opcode_number
                        && p.uop_number == package.uop_number
                        && decoder.same_line(p.memory_address, package.memory_address)
                })
                .ok_or_else(|| {
                    SimError::invariant(
                        &self.label,
                        package.memory_address,
                        package.memory_operation,
                        "answer without a waiting request",
                    )
                })?;
            let mut entry = self.mshr.get(slot).clone();
            entry.is_answer = true;
            entry.memory_size = package.memory_size;
            entry.set_src_dst(package.id_src, package.id_dst);
            entry.package_untreated(latency, now);
            tracing::trace!(cache = %self.label, package = %entry, "answer received");
            self.mshr.replace(slot, entry);
            self.ports.recv_answer_ready = now + latency;
            return Ok(true);
        }

        if !self.serves(package.memory_address) {
            return Err(SimError::invariant(
                &self.label,
                package.memory_address,
                package.memory_operation,
                format!("request for bank {} reached bank {}", self.decoder.bank(package.memory_address), self.bank_number),
            ));
        }
        let is_read = package.memory_operation.is_read_type();
        let port_ready = if is_read {
            self.ports.recv_read_ready
        } else {
            self.ports.recv_write_ready
        };
        if port_ready > now {
            return Ok(false);
        }

        let partition = self.incoming_partition(package.memory_operation);
        let mut entry = package.clone();
        entry.born_cycle = now;
        entry.package_untreated(latency, now);
        if self.allocate(partition, entry).is_none() {
            return Err(SimError::invariant(
                &self.label,
                package.memory_address,
                package.memory_operation,
                format!("request arrived with a granted token but no free {partition:?} slot"),
            ));
        }
        let _ = self.tokens.remove(package);
        if matches!(
            package.memory_operation,
            MemoryOperation::Read | MemoryOperation::Instruction | MemoryOperation::Write
        ) {
            self.enqueue_prefetches(package);
        }
        tracing::trace!(cache = %self.label, %package, "request received");

        if is_read {
            self.ports.recv_read_ready = now + latency;
        } else {
            self.ports.recv_write_ready = now + latency;
        }
        Ok(true)
    }

    fn check_token_list(&mut self, package: &MemoryPackage) -> bool {
        let partition = self.incoming_partition(package.memory_operation);
        let slots = self.admission_slots(partition);
        self.tokens.check(package, partition, slots)
    }

    fn remove_token_list(&mut self, package: &MemoryPackage) {
        let _ = self.tokens.remove(package);
    }

    fn print_structures(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "CACHE {} (level {})", self.label, self.hierarchy_level);
        for (index, set) in self.sets.iter().enumerate() {
            let used: Vec<String> = set
                .ways
                .iter()
                .enumerate()
                .filter(|(_, line)| line.tag.is_some())
                .map(|(way, line)| format!("w{way}{line}"))
                .collect();
            if !used.is_empty() {
                let _ = writeln!(out, "  set {index:>5}: {}", used.join(" "));
            }
        }
        let _ = writeln!(out, "  MSHR ({} of {} slots used)", self.mshr.occupied(), self.mshr.len());
        out.push_str(&self.mshr.dump());
        let _ = writeln!(out, "  TOKENS ({})", self.tokens.len());
        out.push_str(&self.tokens.dump());
        out
    }
}
