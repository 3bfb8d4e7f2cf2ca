//! Trace-driven requesters.
//!
//! A requester stands in for a processor core. It replays a memory access trace
//! into its first-level caches:
//! 1. **Issue:** One access per cycle at most, after the entry's delay has elapsed
//!    and while fewer than `max_outstanding` read-type accesses are in flight.
//! 2. **Completion:** Writes complete once the first-level cache accepts them;
//!    read-type accesses complete when their answer arrives.

use std::collections::VecDeque;
use std::fmt::Write as _;

use super::trace::TraceEntry;
use crate::common::error::SimError;
use crate::common::ids::ComponentId;
use crate::config::RequesterConfig;
use crate::core::package::{MemoryOperation, MemoryPackage};
use crate::soc::traits::{PortTimers, Transport};
use crate::stats::RequesterStats;

/// Processor stand-in replaying a trace.
#[derive(Debug)]
pub struct TraceRequester {
    /// Index in the requester arena.
    pub id: usize,
    /// Label used in reports and errors.
    pub label: String,
    data_cache: ComponentId,
    inst_cache: ComponentId,
    trace: VecDeque<TraceEntry>,
    pending: Option<MemoryPackage>,
    outstanding: Vec<MemoryPackage>,
    max_outstanding: usize,
    opcode_counter: u64,
    last_issue: u64,
    /// Link latency.
    pub interconnection_latency: u64,
    /// Link width in bytes.
    pub interconnection_width: usize,
    /// Port ready cycles.
    pub ports: PortTimers,
    /// Statistics.
    pub stats: RequesterStats,
}

impl TraceRequester {
    /// Creates an idle requester.
    ///
    /// # Arguments
    ///
    /// * `id` - Index in the requester arena.
    /// * `config` - Requester configuration.
    /// * `data_cache` - Arena index of the first-level data cache.
    /// * `inst_cache` - Arena index of the instruction cache, if separate.
    pub fn new(
        id: usize,
        config: &RequesterConfig,
        data_cache: usize,
        inst_cache: Option<usize>,
    ) -> Self {
        Self {
            id,
            label: config.label.clone(),
            data_cache: ComponentId::Cache(data_cache),
            inst_cache: ComponentId::Cache(inst_cache.unwrap_or(data_cache)),
            trace: VecDeque::new(),
            pending: None,
            outstanding: Vec::new(),
            max_outstanding: config.max_outstanding.max(1),
            opcode_counter: 0,
            last_issue: 0,
            interconnection_latency: config.interconnection_latency,
            interconnection_width: config.interconnection_width,
            ports: PortTimers::default(),
            stats: RequesterStats::default(),
        }
    }

    /// Appends accesses to the trace.
    pub fn load_trace(&mut self, entries: impl IntoIterator<Item = TraceEntry>) {
        self.trace.extend(entries);
    }

    /// Whether the trace is exhausted and nothing is in flight.
    pub fn is_finished(&self) -> bool {
        self.trace.is_empty() && self.pending.is_none() && self.outstanding.is_empty()
    }

    /// Read-type accesses waiting for their answer.
    pub fn outstanding(&self) -> &[MemoryPackage] {
        &self.outstanding
    }

    /// Access to send this cycle, if any.
    ///
    /// The access stays pending until [`request_sent`](Self::request_sent) is
    /// called, so a rejected send is retried with the same package.
    pub fn next_request(&mut self, now: u64) -> Option<MemoryPackage> {
        if self.pending.is_none() {
            if self.outstanding.len() >= self.max_outstanding {
                return None;
            }
            let entry = self.trace.front()?;
            if now < self.last_issue + entry.delay {
                return None;
            }
            let entry = self.trace.pop_front()?;
            self.opcode_counter += 1;
            let me = ComponentId::Requester(self.id);
            let target = if entry.operation == MemoryOperation::Instruction {
                self.inst_cache
            } else {
                self.data_cache
            };
            let mut package = MemoryPackage::new(
                me,
                self.opcode_counter,
                0,
                entry.address,
                entry.size,
                entry.operation,
                now,
            );
            package.opcode_address = entry.address;
            package.set_src_dst(me, target);
            package.package_transmit(0, now);
            self.pending = Some(package);
        }
        self.pending.clone()
    }

    /// Records that the pending access was accepted by its cache.
    pub fn request_sent(&mut self, now: u64) {
        let Some(mut package) = self.pending.take() else {
            return;
        };
        self.last_issue = now;
        match package.memory_operation {
            MemoryOperation::Instruction => self.stats.instructions += 1,
            MemoryOperation::Read => self.stats.reads += 1,
            MemoryOperation::Write => self.stats.writes += 1,
            MemoryOperation::Prefetch => self.stats.prefetches += 1,
            MemoryOperation::Copyback => {}
        }
        if package.memory_operation.expects_answer() {
            package.package_wait(0, now);
            self.outstanding.push(package);
        }
    }

    /// Records a cycle in which the pending access could not be sent.
    pub fn request_stalled(&mut self) {
        self.stats.stall_cycles += 1;
    }

    /// Oldest in-flight access alive for more than `max_alive_time` cycles.
    pub fn check_age(&self, now: u64, max_alive_time: u64) -> Option<&MemoryPackage> {
        self.outstanding
            .iter()
            .find(|p| now.saturating_sub(p.born_cycle) > max_alive_time)
    }

    /// Clears the statistics.
    pub fn reset_statistics(&mut self) {
        self.stats.reset();
    }
}

impl Transport for TraceRequester {
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
        if !package.is_answer {
            return Err(SimError::invariant(
                &self.label,
                package.memory_address,
                package.memory_operation,
                "requesters only receive answers",
            ));
        }
        if self.ports.recv_answer_ready > now {
            return Ok(false);
        }
        let position = self
            .outstanding
            .iter()
            .position(|p| {
                p.opcode_number == package.opcode_number && p.uop_number == package.uop_number
            })
            .ok_or_else(|| {
                SimError::invariant(
                    &self.label,
                    package.memory_address,
                    package.memory_operation,
                    "answer for an access that is not outstanding",
                )
            })?;
        let done = self.outstanding.remove(position);
        self.stats
            .latency
            .record((now + latency).saturating_sub(done.born_cycle));
        tracing::trace!(requester = %self.label, package = %done, "completed");
        self.ports.recv_answer_ready = now + latency;
        Ok(true)
    }

    fn check_token_list(&mut self, _package: &MemoryPackage) -> bool {
        true
    }

    fn remove_token_list(&mut self, _package: &MemoryPackage) {}

    fn print_structures(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "REQUESTER {} ({} trace entries left, {} outstanding)",
            self.label,
            self.trace.len(),
            self.outstanding.len()
        );
        if let Some(pending) = &self.pending {
            let _ = writeln!(out, "  pending {pending}");
        }
        for package in &self.outstanding {
            let _ = writeln!(out, "  {package}");
        }
        out
    }
}
