//! Coherence Directory Controller.
//!
//! The directory is the single arbiter of every cache decision that involves
//! more than one cache. It performs:
//! 1. **Locking:** One open transaction per line address. New transactions on a
//!    locked line retry later.
//! 2. **Request handling:** Hit, sub-block miss, miss, cache-to-cache transfer,
//!    and copyback arrival for a request a cache is about to treat.
//! 3. **Answer routing:** Retracing the request path back to the owner using the
//!    per-cache request order.
//! 4. **Protocol:** MOESI transitions, invalidations, and inclusion enforcement
//!    (see [`coherence`]).
//! 5. **Checks:** Watchdog on open lines and the single-writer invariant.
//!
//! The controller does not own the caches; each operation receives the cache
//! arena and the index of the cache being clocked.

/// MOESI transitions, invalidations, and inclusion enforcement.
pub mod coherence;

/// Directory line records.
pub mod line;

use std::collections::HashMap;
use std::fmt::Write as _;

pub use self::line::{DirectoryLine, LockKind};
use crate::common::addr::AddressDecoder;
use crate::common::error::SimError;
use crate::common::ids::ComponentId;
use crate::config::{DirectoryConfig, Inclusiveness};
use crate::core::package::{MemoryOperation, MemoryPackage, PackageState};
use crate::core::units::cache::CacheMemory;
use crate::sim::context::SimContext;
use crate::stats::DirectoryStats;

/// Memory controller reachable from the last-level caches.
#[derive(Clone, Copy, Debug)]
pub struct MemoryRoute {
    /// Index of the controller in the memory arena.
    pub memory: usize,
    /// Controller interleaving decoder.
    pub decoder: AddressDecoder,
    /// Interleaving slot served by the controller.
    pub controller_number: usize,
}

/// Global coherence directory.
#[derive(Debug)]
pub struct DirectoryController {
    lines: Vec<DirectoryLine>,
    inclusiveness: Inclusiveness,
    generate_llc_copyback: bool,
    llc_caches: Vec<usize>,
    memory_map: Vec<MemoryRoute>,
    line_mask: u64,
    /// Statistics.
    pub stats: DirectoryStats,
}

impl DirectoryController {
    /// Creates an empty directory.
    ///
    /// # Arguments
    ///
    /// * `config` - Inclusion and copyback settings.
    /// * `line_size` - Line size of the hierarchy (power of two).
    pub fn new(config: &DirectoryConfig, line_size: usize) -> Self {
        Self {
            lines: Vec::new(),
            inclusiveness: config.inclusiveness,
            generate_llc_copyback: config.generate_llc_copyback,
            llc_caches: Vec::new(),
            memory_map: Vec::new(),
            line_mask: !(line_size as u64).wrapping_sub(1),
            stats: DirectoryStats::default(),
        }
    }

    /// Registers the last-level caches.
    pub fn set_llc_caches(&mut self, llc_caches: Vec<usize>) {
        self.llc_caches = llc_caches;
    }

    /// Last-level caches, in arena order.
    pub fn llc_caches(&self) -> &[usize] {
        &self.llc_caches
    }

    /// Registers a memory controller reachable from the last level.
    pub fn add_memory_route(&mut self, route: MemoryRoute) {
        self.memory_map.push(route);
    }

    /// Inclusion policy.
    pub const fn inclusiveness(&self) -> Inclusiveness {
        self.inclusiveness
    }

    /// Number of open directory lines.
    pub fn open_lines(&self) -> usize {
        self.lines.len()
    }

    /// Open directory lines, oldest first.
    pub fn lines(&self) -> &[DirectoryLine] {
        &self.lines
    }

    const fn line_address(&self, addr: u64) -> u64 {
        addr & self.line_mask
    }

    /// Whether any transaction holds a lock on the line of `addr`.
    pub fn is_locked(&self, addr: u64) -> bool {
        let line = self.line_address(addr);
        self.lines.iter().any(|l| l.line_address == line)
    }

    /// Position of the directory line belonging to the transaction of `package`.
    pub fn find_directory_line(&self, package: &MemoryPackage) -> Option<usize> {
        let line = self.line_address(package.memory_address);
        self.lines.iter().position(|l| l.matches(package, line))
    }

    fn require_directory_line(
        &self,
        caches: &[CacheMemory],
        cache_id: usize,
        package: &MemoryPackage,
    ) -> Result<usize, SimError> {
        self.find_directory_line(package).ok_or_else(|| {
            SimError::invariant(
                &caches[cache_id].label,
                package.memory_address,
                package.memory_operation,
                "no directory line for an ongoing transaction",
            )
        })
    }

    fn open_line(&mut self, package: &MemoryPackage, cache_count: usize, now: u64) -> usize {
        let line = DirectoryLine::open(
            package,
            self.line_address(package.memory_address),
            cache_count,
            now,
        );
        tracing::debug!(line = %line, "directory line opened");
        self.lines.push(line);
        self.stats.max_open_lines = self.stats.max_open_lines.max(self.lines.len() as u64);
        self.lines.len() - 1
    }

    /// Opens the line of a new transaction, or joins the request path of an
    /// existing one.
    fn join_request_path(
        &mut self,
        package: &MemoryPackage,
        existing: Option<usize>,
        cache_id: usize,
        cache_count: usize,
        now: u64,
    ) {
        let position = match existing {
            Some(position) => position,
            None => self.open_line(package, cache_count, now),
        };
        self.lines[position].add_requester(cache_id);
    }

    fn erase_line(&mut self, position: usize) {
        let line = self.lines.remove(position);
        tracing::debug!(line = %line, "directory line closed");
    }

    /// Next component on the way toward memory for `addr`.
    ///
    /// # Returns
    ///
    /// The lower-level cache serving the bank of `addr`, or, for a last-level
    /// cache, the memory controller whose interleaving slot matches.
    pub fn find_next_obj_id(
        &self,
        caches: &[CacheMemory],
        cache_id: usize,
        addr: u64,
    ) -> Result<ComponentId, SimError> {
        let cache = &caches[cache_id];
        let next = if cache.is_llc() {
            self.memory_map
                .iter()
                .find(|route| route.decoder.bank(addr) == route.controller_number)
                .map(|route| ComponentId::Memory(route.memory))
        } else {
            cache
                .lower_level
                .iter()
                .copied()
                .find(|&lower| caches[lower].serves(addr))
                .map(ComponentId::Cache)
        };
        next.ok_or_else(|| {
            SimError::invariant(
                &cache.label,
                addr,
                MemoryOperation::Read,
                "no lower component serves this address",
            )
        })
    }

    /// Decides what a cache does with the request it is about to treat.
    ///
    /// # Arguments
    ///
    /// * `caches` - The cache arena.
    /// * `cache_id` - Cache treating the request.
    /// * `package` - The request; updated in place (route endpoints, operation, state).
    /// * `ctx` - Simulation context.
    ///
    /// # Returns
    ///
    /// The new state of the package: `Untreated` to retry later, `Transmit` to send
    /// it on, or `Ready` when the transaction ends here.
    pub fn treat_cache_request(
        &mut self,
        caches: &mut [CacheMemory],
        cache_id: usize,
        package: &mut MemoryPackage,
        ctx: &SimContext,
    ) -> Result<PackageState, SimError> {
        let now = ctx.cycle;
        let me = ComponentId::Cache(cache_id);
        let addr = package.memory_address;
        let new_transaction =
            matches!(package.id_src, ComponentId::Requester(_)) || package.id_owner == me;

        let existing = if new_transaction {
            if self.is_locked(addr) {
                self.stats.locked += 1;
                return Ok(PackageState::Untreated);
            }
            None
        } else {
            Some(self.require_directory_line(caches, cache_id, package)?)
        };

        if package.memory_operation == MemoryOperation::Copyback {
            return self.treat_copyback_arrival(caches, cache_id, package, existing, ctx);
        }

        let found = caches[cache_id].find_line(addr);
        if let Some((index, way)) =
            found.filter(|&(i, w)| caches[cache_id].line(i, w).status.is_valid())
        {
            let cache = &mut caches[cache_id];
            if cache.predictor.check_sub_block_is_hit(package, index, way) {
                cache.predictor.line_hit(package, index, way);
                self.coherence_new_operation(caches, cache_id, index, way, package, true)?;
                let cache = &caches[cache_id];
                tracing::trace!(cache = %cache.label, %package, "hit");
                if package.id_owner == me && package.memory_operation == MemoryOperation::Prefetch
                {
                    package.package_ready(cache.penalty_read, now);
                    return Ok(PackageState::Ready);
                }
                if new_transaction && package.memory_operation == MemoryOperation::Write {
                    package.package_ready(cache.penalty_write, now);
                    return Ok(PackageState::Ready);
                }
                package.is_answer = true;
                package.set_src_dst(me, package.id_src);
                package.package_transmit(cache.penalty_read, now);
                return Ok(PackageState::Transmit);
            }

            cache.predictor.sub_block_miss(package, index, way);
            tracing::trace!(cache = %cache.label, %package, "sub-block miss");
            self.join_request_path(package, existing, cache_id, caches.len(), now);
            return self.forward_down(caches, cache_id, package, now);
        }

        let (index, way) = match found {
            Some(position) => position,
            None => {
                let Some((index, way)) =
                    caches[cache_id].evict_address(addr, |line| self.is_locked(line))
                else {
                    return Ok(PackageState::Untreated);
                };
                if !self.inclusiveness_new_eviction(caches, cache_id, index, way, ctx)? {
                    return Ok(PackageState::Untreated);
                }
                (index, way)
            }
        };
        let cache = &mut caches[cache_id];
        cache.change_address(index, way, addr);
        cache.predictor.line_miss(package, index, way);
        tracing::trace!(cache = %cache.label, %package, "miss");
        self.join_request_path(package, existing, cache_id, caches.len(), now);

        if package.memory_operation == MemoryOperation::Write {
            package.memory_operation = MemoryOperation::Read;
        }
        let remote = self.find_cache_line_higher_levels(caches, cache_id, addr, true);
        if remote.is_valid() {
            let cache = &mut caches[cache_id];
            cache.change_status(index, way, remote);
            self.stats.cache_to_cache += 1;
            package.is_answer = true;
            package.package_untreated(cache.penalty_read + cache.penalty_write, now);
            return Ok(PackageState::Untreated);
        }
        self.forward_down(caches, cache_id, package, now)
    }

    /// Sends a missing request to the next level as a read.
    fn forward_down(
        &self,
        caches: &[CacheMemory],
        cache_id: usize,
        package: &mut MemoryPackage,
        now: u64,
    ) -> Result<PackageState, SimError> {
        if package.memory_operation == MemoryOperation::Write {
            package.memory_operation = MemoryOperation::Read;
        }
        let next = self.find_next_obj_id(caches, cache_id, package.memory_address)?;
        package.set_src_dst(ComponentId::Cache(cache_id), next);
        package.package_transmit(caches[cache_id].penalty_read, now);
        Ok(PackageState::Transmit)
    }

    /// Places an arriving copyback into the cache as an Owned line.
    fn treat_copyback_arrival(
        &mut self,
        caches: &mut [CacheMemory],
        cache_id: usize,
        package: &mut MemoryPackage,
        existing: Option<usize>,
        ctx: &SimContext,
    ) -> Result<PackageState, SimError> {
        let addr = package.memory_address;
        let Some(position) = existing else {
            return Err(SimError::invariant(
                &caches[cache_id].label,
                addr,
                package.memory_operation,
                "copyback arrived from its own cache",
            ));
        };

        let (index, way) = match caches[cache_id].find_line(addr) {
            Some(found) => found,
            None => {
                let Some((index, way)) =
                    caches[cache_id].evict_address(addr, |line| self.is_locked(line))
                else {
                    return Ok(PackageState::Untreated);
                };
                if !self.inclusiveness_new_eviction(caches, cache_id, index, way, ctx)? {
                    return Ok(PackageState::Untreated);
                }
                caches[cache_id].change_address(index, way, addr);
                (index, way)
            }
        };

        caches[cache_id]
            .predictor
            .line_recv_copyback(package, index, way);
        self.coherence_new_operation(caches, cache_id, index, way, package, false)?;
        self.erase_line(position);
        package.package_ready(caches[cache_id].penalty_write, ctx.cycle);
        Ok(PackageState::Ready)
    }

    /// Updates the directory after a cache sent a request downstream.
    ///
    /// # Returns
    ///
    /// `Ready` for copybacks (nothing comes back), `Wait` otherwise.
    pub fn treat_cache_request_sent(
        &mut self,
        caches: &[CacheMemory],
        cache_id: usize,
        package: &MemoryPackage,
    ) -> Result<PackageState, SimError> {
        if package.memory_operation != MemoryOperation::Copyback {
            return Ok(PackageState::Wait);
        }
        if caches[cache_id].is_llc() {
            let position = self.require_directory_line(caches, cache_id, package)?;
            self.erase_line(position);
        }
        Ok(PackageState::Ready)
    }

    /// Handles an answer that reached a cache on the request path.
    ///
    /// # Returns
    ///
    /// `Ready` when the transaction ends at this cache, `Transmit` when the
    /// answer continues toward the owner.
    pub fn treat_cache_answer(
        &mut self,
        caches: &mut [CacheMemory],
        cache_id: usize,
        package: &mut MemoryPackage,
        ctx: &SimContext,
    ) -> Result<PackageState, SimError> {
        let now = ctx.cycle;
        let me = ComponentId::Cache(cache_id);
        let position = self.require_directory_line(caches, cache_id, package)?;
        let (index, way) = caches[cache_id]
            .find_line(package.memory_address)
            .ok_or_else(|| {
                SimError::invariant(
                    &caches[cache_id].label,
                    package.memory_address,
                    package.memory_operation,
                    "answer for a line that is not allocated",
                )
            })?;

        if package.id_owner == me {
            self.coherence_new_operation(caches, cache_id, index, way, package, false)?;
            self.erase_line(position);
            package.package_ready(0, now);
            return Ok(PackageState::Ready);
        }

        let line = &mut self.lines[position];
        if line.cache_request_order[cache_id] != line.cache_requested {
            return Err(SimError::invariant(
                &caches[cache_id].label,
                package.memory_address,
                package.memory_operation,
                format!(
                    "answer out of request order (cache position {}, expected {})",
                    line.cache_request_order[cache_id], line.cache_requested
                ),
            ));
        }
        line.cache_request_order[cache_id] = 0;
        line.cache_requested -= 1;

        if let Some(next) = line.last_requester() {
            package.set_src_dst(me, ComponentId::Cache(next));
            self.coherence_new_operation(caches, cache_id, index, way, package, false)?;
            package.package_transmit(0, now);
            return Ok(PackageState::Transmit);
        }

        package.memory_operation = line.initial_memory_operation;
        package.memory_address = line.initial_memory_address;
        package.memory_size = line.initial_memory_size;
        package.set_src_dst(me, line.id_owner);
        self.coherence_new_operation(caches, cache_id, index, way, package, false)?;
        self.erase_line(position);
        if package.memory_operation == MemoryOperation::Write {
            package.package_ready(0, now);
            Ok(PackageState::Ready)
        } else {
            package.package_transmit(0, now);
            Ok(PackageState::Transmit)
        }
    }

    /// Fails if a directory line stayed open longer than `max_alive_time`.
    pub fn check_age(&self, now: u64, max_alive_time: u64) -> Result<(), SimError> {
        match self
            .lines
            .iter()
            .find(|l| now.saturating_sub(l.born_cycle) > max_alive_time)
        {
            Some(line) => Err(SimError::Watchdog {
                component: "directory".to_string(),
                address: line.line_address,
                operation: line.initial_memory_operation,
                born_cycle: line.born_cycle,
                cycle: now,
            }),
            None => Ok(()),
        }
    }

    /// Fails if a line address is Modified or Exclusive in more than one cache.
    pub fn check_single_writer(&self, caches: &[CacheMemory]) -> Result<(), SimError> {
        let mut writers: HashMap<u64, usize> = HashMap::new();
        for cache in caches {
            for index in 0..cache.set_count() {
                for line in &cache.set(index).ways {
                    let Some(tag) = line.tag.filter(|_| line.status.is_exclusive()) else {
                        continue;
                    };
                    let count = writers.entry(tag).or_insert(0);
                    *count += 1;
                    if *count > 1 {
                        return Err(SimError::invariant(
                            &cache.label,
                            tag,
                            MemoryOperation::Write,
                            "line is exclusive in more than one cache",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Clears the statistics.
    pub fn reset_statistics(&mut self) {
        self.stats.reset();
    }

    /// Renders every open line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "DIRECTORY ({} open lines)", self.lines.len());
        for line in &self.lines {
            let _ = writeln!(out, "  {line}");
        }
        out
    }
}
