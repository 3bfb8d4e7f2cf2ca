//! Miss Status Holding Registers.
//!
//! The MSHR is one array of package slots split into three reserved partitions:
//! `[request | copyback | prefetch]`. Each allocation searches only its own
//! partition, so one traffic class can never consume another's slots.
//!
//! Occupied slots are also kept in an age index sorted by ascending born cycle.
//! Every per-cycle scan walks the index, so the oldest transaction is always
//! served first, and a retried transaction that refreshed its born cycle moves to
//! the back of the line.

use std::fmt::Write as _;
use std::ops::Range;

use crate::common::ids::ComponentId;
use crate::core::package::MemoryPackage;

/// Reserved region of the MSHR.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MshrPartition {
    /// Requests received from higher levels or requesters.
    Request,
    /// Copybacks generated by this cache's evictions.
    Copyback,
    /// Prefetches generated by this cache's prefetcher.
    Prefetch,
}

/// Partitioned, age-ordered transaction buffer.
#[derive(Clone, Debug)]
pub struct Mshr {
    entries: Vec<MemoryPackage>,
    request_size: usize,
    copyback_size: usize,
    born_ordered: Vec<usize>,
}

impl Mshr {
    /// Creates an MSHR with the given partition sizes.
    ///
    /// # Arguments
    ///
    /// * `owner` - Component owning the buffer (stored in free slots).
    /// * `request_size` - Request partition slots.
    /// * `copyback_size` - Copyback partition slots.
    /// * `prefetch_size` - Prefetch partition slots.
    pub fn new(
        owner: ComponentId,
        request_size: usize,
        copyback_size: usize,
        prefetch_size: usize,
    ) -> Self {
        let total = request_size + copyback_size + prefetch_size;
        Self {
            entries: vec![MemoryPackage::free(owner); total],
            request_size,
            copyback_size,
            born_ordered: Vec::with_capacity(total),
        }
    }

    /// Total number of slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether every slot is free.
    pub fn is_empty(&self) -> bool {
        self.born_ordered.is_empty()
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.born_ordered.len()
    }

    /// Slot range of a partition.
    pub fn partition_range(&self, partition: MshrPartition) -> Range<usize> {
        let copyback_start = self.request_size;
        let prefetch_start = self.request_size + self.copyback_size;
        match partition {
            MshrPartition::Request => 0..copyback_start,
            MshrPartition::Copyback => copyback_start..prefetch_start,
            MshrPartition::Prefetch => prefetch_start..self.entries.len(),
        }
    }

    /// Partition a slot belongs to.
    pub const fn partition_of(&self, slot: usize) -> MshrPartition {
        if slot < self.request_size {
            MshrPartition::Request
        } else if slot < self.request_size + self.copyback_size {
            MshrPartition::Copyback
        } else {
            MshrPartition::Prefetch
        }
    }

    /// Free slots left in a partition.
    pub fn free_slots(&self, partition: MshrPartition) -> usize {
        self.entries[self.partition_range(partition)]
            .iter()
            .filter(|e| e.is_free())
            .count()
    }

    /// Stores `package` in the first free slot of `partition`.
    ///
    /// # Returns
    ///
    /// The slot index, or `None` when the partition is full. A full partition is
    /// backpressure, not an error.
    pub fn allocate(&mut self, partition: MshrPartition, package: MemoryPackage) -> Option<usize> {
        let slot = self
            .partition_range(partition)
            .find(|&s| self.entries[s].is_free())?;
        self.entries[slot] = package;
        self.insert_born_ordered(slot);
        Some(slot)
    }

    /// Inserts an occupied slot into the age index after every entry born at the
    /// same cycle or earlier. The scan starts at the tail, where new entries land.
    pub fn insert_born_ordered(&mut self, slot: usize) {
        let born = self.entries[slot].born_cycle;
        let position = self
            .born_ordered
            .iter()
            .rposition(|&s| self.entries[s].born_cycle <= born)
            .map_or(0, |p| p + 1);
        self.born_ordered.insert(position, slot);
    }

    /// Frees a slot and drops it from the age index.
    pub fn release(&mut self, slot: usize) {
        self.entries[slot].package_clean();
        self.born_ordered.retain(|&s| s != slot);
    }

    /// Overwrites an occupied slot, repositioning it if its born cycle changed.
    pub fn replace(&mut self, slot: usize, package: MemoryPackage) {
        let moved = self.entries[slot].born_cycle != package.born_cycle;
        self.entries[slot] = package;
        if moved {
            self.born_ordered.retain(|&s| s != slot);
            self.insert_born_ordered(slot);
        }
    }

    /// Package held in `slot`.
    pub fn get(&self, slot: usize) -> &MemoryPackage {
        &self.entries[slot]
    }

    /// Occupied slot indices, oldest first.
    pub fn born_ordered(&self) -> &[usize] {
        &self.born_ordered
    }

    /// Occupied slots with their packages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &MemoryPackage)> + '_ {
        self.born_ordered.iter().map(|&s| (s, &self.entries[s]))
    }

    /// First slot, oldest first, whose package satisfies `pred`.
    pub fn find(&self, mut pred: impl FnMut(&MemoryPackage) -> bool) -> Option<usize> {
        self.born_ordered
            .iter()
            .copied()
            .find(|&s| pred(&self.entries[s]))
    }

    /// Whether the age index is sorted by ascending born cycle.
    pub fn is_age_ordered(&self) -> bool {
        self.born_ordered
            .windows(2)
            .all(|w| self.entries[w[0]].born_cycle <= self.entries[w[1]].born_cycle)
    }

    /// Oldest package alive for more than `max_alive_time` cycles.
    pub fn check_age(&self, now: u64, max_alive_time: u64) -> Option<&MemoryPackage> {
        self.born_ordered
            .first()
            .map(|&s| &self.entries[s])
            .filter(|p| now.saturating_sub(p.born_cycle) > max_alive_time)
    }

    /// Renders every occupied slot, oldest first.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (slot, package) in self.iter() {
            let _ = writeln!(out, "  [{slot:>3}] {:?} {package}", self.partition_of(slot));
        }
        out
    }
}
