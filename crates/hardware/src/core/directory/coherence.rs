//! MOESI protocol transitions and inclusion enforcement.
//!
//! These routines walk the cache arena on behalf of the directory:
//! 1. **Remote lookups:** Find a valid copy above a cache (or in any last-level
//!    cache) and downgrade it so it can be shared.
//! 2. **New operations:** Apply the status change an access causes in the
//!    accessing cache and in every other cache.
//! 3. **Evictions:** Emit copybacks for dirty victims and, under an inclusive
//!    policy, evict the victim from every level above.

use super::DirectoryController;
use crate::common::error::SimError;
use crate::common::ids::ComponentId;
use crate::config::Inclusiveness;
use crate::core::package::{MemoryOperation, MemoryPackage};
use crate::core::units::cache::CacheMemory;
use crate::core::units::cache::line::ProtocolStatus;
use crate::sim::context::SimContext;

/// Rank used to merge lookup results: Owned beats Shared beats Invalid.
const fn rank(status: ProtocolStatus) -> u8 {
    match status {
        ProtocolStatus::Owned => 2,
        ProtocolStatus::Shared => 1,
        _ => 0,
    }
}

fn merge(a: ProtocolStatus, b: ProtocolStatus) -> ProtocolStatus {
    if rank(b) > rank(a) { b } else { a }
}

/// `cache_id` followed by every cache below it.
fn lower_chain(caches: &[CacheMemory], cache_id: usize) -> Vec<usize> {
    let mut chain = vec![cache_id];
    let mut next = 0;
    while next < chain.len() {
        for &lower in &caches[chain[next]].lower_level {
            if !chain.contains(&lower) {
                chain.push(lower);
            }
        }
        next += 1;
    }
    chain
}

impl DirectoryController {
    /// Searches for a valid copy of `addr` at `cache_id` and above, downgrading
    /// what it finds so the requester may share it.
    ///
    /// # Arguments
    ///
    /// * `caches` - The cache arena.
    /// * `cache_id` - Cache where the search starts.
    /// * `addr` - Address looked up.
    /// * `check_llc` - When `cache_id` is a last-level cache, search above every
    ///   last-level cache serving `addr` instead.
    ///
    /// # Returns
    ///
    /// The status the requesting line should take: `Owned` when dirty data moved
    /// to it, `Shared` when a clean copy was found, `Invalid` when none exists.
    pub fn find_cache_line_higher_levels(
        &self,
        caches: &mut [CacheMemory],
        cache_id: usize,
        addr: u64,
        check_llc: bool,
    ) -> ProtocolStatus {
        if check_llc && caches[cache_id].is_llc() {
            let llcs: Vec<usize> = self
                .llc_caches
                .iter()
                .copied()
                .filter(|&llc| caches[llc].serves(addr))
                .collect();
            return llcs.into_iter().fold(ProtocolStatus::Invalid, |acc, llc| {
                merge(acc, self.find_cache_line_higher_levels(caches, llc, addr, false))
            });
        }

        let mut result = ProtocolStatus::Invalid;
        if let Some((index, way)) = caches[cache_id].find_valid_line(addr) {
            let inclusive = self.inclusiveness != Inclusiveness::NonInclusive;
            let (remote, found) = match caches[cache_id].line(index, way).status {
                ProtocolStatus::Modified | ProtocolStatus::Owned if inclusive => {
                    (ProtocolStatus::Shared, ProtocolStatus::Owned)
                }
                ProtocolStatus::Modified | ProtocolStatus::Owned => {
                    (ProtocolStatus::Owned, ProtocolStatus::Shared)
                }
                _ => (ProtocolStatus::Shared, ProtocolStatus::Shared),
            };
            caches[cache_id].change_status(index, way, remote);
            result = found;
        }

        let higher = caches[cache_id].higher_level.clone();
        for cache in higher {
            result = merge(
                result,
                self.find_cache_line_higher_levels(caches, cache, addr, false),
            );
        }
        result
    }

    /// Pulls dirty data for `addr` down from the levels above `cache_id`.
    ///
    /// Dirty copies become Shared.
    ///
    /// # Returns
    ///
    /// `Owned` if dirty data was found, `Shared` if only clean copies, else `Invalid`.
    pub fn find_copyback_higher_levels(
        &self,
        caches: &mut [CacheMemory],
        cache_id: usize,
        addr: u64,
    ) -> ProtocolStatus {
        let mut result = ProtocolStatus::Invalid;
        let higher = caches[cache_id].higher_level.clone();
        for cache in higher {
            if let Some((index, way)) = caches[cache].find_valid_line(addr) {
                let found = if caches[cache].line(index, way).is_dirty() {
                    caches[cache].change_status(index, way, ProtocolStatus::Shared);
                    ProtocolStatus::Owned
                } else {
                    ProtocolStatus::Shared
                };
                result = merge(result, found);
            }
            result = merge(result, self.find_copyback_higher_levels(caches, cache, addr));
        }
        result
    }

    /// Removes `addr` from every level above `cache_id`.
    ///
    /// Dirty data must have been pulled down beforehand.
    pub fn coherence_evict_higher_levels(
        &self,
        caches: &mut [CacheMemory],
        cache_id: usize,
        addr: u64,
    ) -> Result<(), SimError> {
        let higher = caches[cache_id].higher_level.clone();
        for cache in higher {
            self.coherence_evict_higher_levels(caches, cache, addr)?;
            let target = &mut caches[cache];
            let Some((index, way)) = target.find_line(addr) else {
                continue;
            };
            let line = target.line(index, way);
            if line.is_dirty() {
                return Err(SimError::invariant(
                    &target.label,
                    addr,
                    MemoryOperation::Copyback,
                    "dirty line dropped by an inclusive eviction",
                ));
            }
            let was_valid = line.status.is_valid();
            target.predictor.line_eviction(index, way);
            target.clear_line(index, way);
            if was_valid {
                target.cache_invalidate();
            }
        }
        Ok(())
    }

    /// Invalidates `addr` in every cache other than `cache_id`.
    pub fn coherence_invalidate_all(&self, caches: &mut [CacheMemory], cache_id: usize, addr: u64) {
        for (id, cache) in caches.iter_mut().enumerate() {
            if id == cache_id {
                continue;
            }
            if let Some((index, way)) = cache.find_valid_line(addr) {
                cache.predictor.line_invalidation(index, way);
                cache.change_status(index, way, ProtocolStatus::Invalid);
                cache.cache_invalidate();
            }
        }
    }

    /// Applies the status change of an access to line (`index`, `way`) of
    /// `cache_id`, and records the hit or miss.
    ///
    /// # Arguments
    ///
    /// * `caches` - The cache arena.
    /// * `cache_id` - Accessing cache.
    /// * `index`, `way` - Line being accessed.
    /// * `package` - The access.
    /// * `is_hit` - Whether the access hit in this cache.
    pub fn coherence_new_operation(
        &mut self,
        caches: &mut [CacheMemory],
        cache_id: usize,
        index: usize,
        way: usize,
        package: &MemoryPackage,
        is_hit: bool,
    ) -> Result<(), SimError> {
        let addr = package.memory_address;
        let op = package.memory_operation;
        match op {
            MemoryOperation::Instruction | MemoryOperation::Read | MemoryOperation::Prefetch => {
                if caches[cache_id].line(index, way).status == ProtocolStatus::Invalid {
                    let chain = lower_chain(caches, cache_id);
                    let shared_elsewhere = caches
                        .iter()
                        .enumerate()
                        .any(|(id, c)| !chain.contains(&id) && c.find_valid_line(addr).is_some());
                    let status = if caches[cache_id].hierarchy_level == 1 && !shared_elsewhere {
                        ProtocolStatus::Exclusive
                    } else {
                        ProtocolStatus::Shared
                    };
                    caches[cache_id].change_status(index, way, status);
                }
                for (id, cache) in caches.iter_mut().enumerate() {
                    if id == cache_id {
                        continue;
                    }
                    if let Some((i, w)) = cache.find_valid_line(addr) {
                        if cache.line(i, w).status == ProtocolStatus::Exclusive {
                            cache.change_status(i, w, ProtocolStatus::Shared);
                        }
                    }
                }
                caches[cache_id].update_last_access(index, way);
            }
            MemoryOperation::Write => {
                let status = caches[cache_id].line(index, way).status;
                if is_hit && matches!(status, ProtocolStatus::Shared | ProtocolStatus::Owned) {
                    self.stats.upgrade += 1;
                }
                self.coherence_invalidate_all(caches, cache_id, addr);
                caches[cache_id].change_status(index, way, ProtocolStatus::Modified);
                caches[cache_id].update_last_access(index, way);
            }
            MemoryOperation::Copyback => {
                let cache = &mut caches[cache_id];
                let status = cache.line(index, way).status;
                if !matches!(status, ProtocolStatus::Invalid | ProtocolStatus::Shared) {
                    return Err(SimError::invariant(
                        &cache.label,
                        addr,
                        op,
                        format!("copyback received on a line in state {status}"),
                    ));
                }
                cache.change_status(index, way, ProtocolStatus::Owned);
                cache.update_last_access(index, way);
            }
        }

        if is_hit {
            caches[cache_id].cache_hit(op);
            self.stats.record_hit(op);
        } else {
            caches[cache_id].cache_miss(op);
            self.stats.record_miss(op);
        }
        Ok(())
    }

    /// Prepares line (`index`, `way`) of `cache_id` to be replaced.
    ///
    /// Emits a copyback when the victim is dirty and, under an inclusive policy,
    /// pulls dirty data from and then evicts the victim in every level above.
    ///
    /// # Returns
    ///
    /// `false` when the copyback could not be allocated; nothing was evicted and
    /// the caller retries later.
    pub fn inclusiveness_new_eviction(
        &mut self,
        caches: &mut [CacheMemory],
        cache_id: usize,
        index: usize,
        way: usize,
        ctx: &SimContext,
    ) -> Result<bool, SimError> {
        let Some(addr) = caches[cache_id].line(index, way).tag else {
            return Ok(true);
        };
        let is_llc = caches[cache_id].is_llc();
        let enforce = match self.inclusiveness {
            Inclusiveness::InclusiveAll => true,
            Inclusiveness::InclusiveLlc => is_llc,
            Inclusiveness::NonInclusive => false,
        };

        if enforce {
            let pulled = self.find_copyback_higher_levels(caches, cache_id, addr);
            let line = caches[cache_id].line(index, way);
            if pulled == ProtocolStatus::Owned && !line.is_dirty() {
                caches[cache_id].change_status(index, way, ProtocolStatus::Owned);
            }
        }

        let line = caches[cache_id].line(index, way);
        let dirty = line.is_dirty();
        let valid = line.status.is_valid();
        let need_copyback = dirty && (!is_llc || self.generate_llc_copyback);
        if need_copyback {
            if !self.create_cache_copyback(caches, cache_id, addr, ctx)? {
                return Ok(false);
            }
            caches[cache_id].predictor.line_send_copyback(index, way);
        }
        if valid {
            caches[cache_id].cache_evict(need_copyback);
        }
        if enforce {
            self.coherence_evict_higher_levels(caches, cache_id, addr)?;
        }
        caches[cache_id].predictor.line_eviction(index, way);
        tracing::debug!(cache = %caches[cache_id].label, addr, dirty, "eviction");
        Ok(true)
    }

    /// Starts a copyback of line `addr` from `cache_id` to the next level.
    ///
    /// # Returns
    ///
    /// `false` when the copyback partition is full.
    pub fn create_cache_copyback(
        &mut self,
        caches: &mut [CacheMemory],
        cache_id: usize,
        addr: u64,
        ctx: &SimContext,
    ) -> Result<bool, SimError> {
        let now = ctx.cycle;
        let me = ComponentId::Cache(cache_id);
        let next = self.find_next_obj_id(caches, cache_id, addr)?;
        let cache = &mut caches[cache_id];
        let number = cache.next_transaction_number();
        let mut package = MemoryPackage::new(
            me,
            number,
            0,
            addr,
            ctx.line_size,
            MemoryOperation::Copyback,
            now,
        );
        package.set_src_dst(me, next);
        package.package_transmit(0, now);
        if cache.allocate_copyback(package.clone()).is_none() {
            return Ok(false);
        }
        cache.stats.copyback_send += 1;

        let position = self.open_line(&package, caches.len(), now);
        self.lines[position].add_requester(cache_id);
        Ok(true)
    }
}
