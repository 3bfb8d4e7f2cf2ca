//! Main Memory Controllers.
//!
//! A memory controller terminates the hierarchy below the last-level caches. It provides:
//! 1. **Buffer:** An age-ordered request buffer with token admission, like a cache MSHR.
//! 2. **Timing:** One access at a time, with latency from an [`AccessTiming`] model.
//! 3. **Answers:** Read-type requests are answered with a full line; writes and
//!    copybacks are absorbed.
//!
//! Controllers are interleaved by address: a controller serves the addresses whose
//! bank field (under its decoder) equals its controller number.

/// Access timing models (fixed latency, DRAM row buffer).
pub mod controller;

use std::fmt::Write as _;

use self::controller::AccessTiming;
use crate::common::addr::AddressDecoder;
use crate::common::error::SimError;
use crate::common::ids::ComponentId;
use crate::config::MemoryControllerConfig;
use crate::core::package::{MemoryPackage, PackageState};
use crate::core::units::cache::mshr::{Mshr, MshrPartition};
use crate::core::units::cache::token::TokenLedger;
use crate::soc::traits::{PortTimers, Transport};
use crate::stats::MemoryStats;

/// One memory controller endpoint.
#[derive(Debug)]
pub struct MemoryController {
    /// Index in the memory arena.
    pub id: usize,
    /// Label used in reports and errors.
    pub label: String,
    /// Interleaving decoder.
    pub decoder: AddressDecoder,
    /// Interleaving slot served by this controller.
    pub controller_number: usize,
    /// Pending requests.
    pub buffer: Mshr,
    /// Admission tokens of the last-level caches.
    pub tokens: TokenLedger,
    timing: Box<dyn AccessTiming>,
    busy_until: u64,
    line_size: usize,
    /// Link latency.
    pub interconnection_latency: u64,
    /// Link width in bytes.
    pub interconnection_width: usize,
    /// Port ready cycles.
    pub ports: PortTimers,
    /// Statistics.
    pub stats: MemoryStats,
}

impl MemoryController {
    /// Builds a controller from its configuration.
    ///
    /// # Arguments
    ///
    /// * `id` - Index in the memory arena.
    /// * `config` - Controller configuration.
    /// * `line_size` - Line size of the hierarchy.
    pub fn new(
        id: usize,
        config: &MemoryControllerConfig,
        line_size: usize,
    ) -> Result<Self, SimError> {
        if config.buffer_size == 0 {
            return Err(SimError::config(&config.label, "buffer size must be at least 1"));
        }
        if config.controller_number >= config.total_controllers {
            return Err(SimError::config(
                &config.label,
                format!(
                    "controller number {} out of range for {} controllers",
                    config.controller_number, config.total_controllers
                ),
            ));
        }
        let decoder = AddressDecoder::new(
            &config.label,
            config.address_mask,
            line_size,
            1,
            config.total_controllers,
        )?;
        Ok(Self {
            id,
            label: config.label.clone(),
            decoder,
            controller_number: config.controller_number,
            buffer: Mshr::new(ComponentId::Memory(id), config.buffer_size, 0, 0),
            tokens: TokenLedger::new(),
            timing: controller::build(config),
            busy_until: 0,
            line_size,
            interconnection_latency: config.interconnection_latency,
            interconnection_width: config.interconnection_width,
            ports: PortTimers::default(),
            stats: MemoryStats::default(),
        })
    }

    /// Whether this controller serves `addr`.
    pub const fn serves(&self, addr: u64) -> bool {
        self.decoder.bank(addr) == self.controller_number
    }

    /// Frees every finished entry.
    pub fn release_ready(&mut self, now: u64) {
        let done: Vec<usize> = self
            .buffer
            .iter()
            .filter(|(_, p)| p.state == PackageState::Ready && p.ready_cycle <= now)
            .map(|(slot, _)| slot)
            .collect();
        for slot in done {
            self.buffer.release(slot);
        }
    }

    /// First answer ready to leave, oldest first.
    pub fn next_answer(&self, now: u64) -> Option<usize> {
        self.buffer
            .find(|p| p.state == PackageState::Transmit && p.ready_cycle <= now)
    }

    /// Serves the oldest untreated request if the device is idle.
    ///
    /// Read-type requests become answers to their sender; writes and copybacks
    /// complete once the access latency has elapsed.
    pub fn serve_next(&mut self, now: u64) {
        if self.busy_until > now {
            return;
        }
        let Some(slot) = self
            .buffer
            .find(|p| p.state == PackageState::Untreated && p.ready_cycle <= now)
        else {
            return;
        };
        let mut package = self.buffer.get(slot).clone();
        let latency = self.timing.access_latency(package.memory_address);
        self.busy_until = now + latency;
        self.stats.accumulated_latency += latency;
        if package.memory_operation.is_read_type() {
            self.stats.reads += 1;
            package.is_answer = true;
            package.memory_size = self.line_size;
            package.set_src_dst(ComponentId::Memory(self.id), package.id_src);
            package.package_transmit(latency, now);
        } else {
            self.stats.writes += 1;
            package.package_ready(latency, now);
        }
        tracing::trace!(memory = %self.label, %package, "served");
        self.buffer.replace(slot, package);
    }

    /// Clears the statistics.
    pub fn reset_statistics(&mut self) {
        self.stats.reset();
    }

    /// Renders the configuration.
    pub fn print_configuration(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "MEMORY {} | controller {} | buffer {} | timing {:?}",
            self.label,
            self.controller_number,
            self.buffer.len(),
            self.timing
        );
        for mask in self.decoder.describe().lines() {
            let _ = writeln!(out, "  {mask}");
        }
        out
    }
}

impl Transport for MemoryController {
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
        if package.is_answer || package.hop_count.is_some() {
            return Err(SimError::invariant(
                &self.label,
                package.memory_address,
                package.memory_operation,
                "memory controllers only receive routed requests",
            ));
        }
        if !self.serves(package.memory_address) {
            return Err(SimError::invariant(
                &self.label,
                package.memory_address,
                package.memory_operation,
                "request for another memory controller",
            ));
        }
        let is_read = package.memory_operation.is_read_type();
        let ready = if is_read {
            self.ports.recv_read_ready
        } else {
            self.ports.recv_write_ready
        };
        if ready > now {
            return Ok(false);
        }

        let mut entry = package.clone();
        entry.born_cycle = now;
        entry.package_untreated(latency, now);
        if self.buffer.allocate(MshrPartition::Request, entry).is_none() {
            return Err(SimError::invariant(
                &self.label,
                package.memory_address,
                package.memory_operation,
                "request arrived with a granted token but the buffer is full",
            ));
        }
        let _ = self.tokens.remove(package);
        self.stats.max_buffered = self.stats.max_buffered.max(self.buffer.occupied() as u64);
        if is_read {
            self.ports.recv_read_ready = now + latency;
        } else {
            self.ports.recv_write_ready = now + latency;
        }
        Ok(true)
    }

    fn check_token_list(&mut self, package: &MemoryPackage) -> bool {
        let free = self.buffer.free_slots(MshrPartition::Request);
        self.tokens.check(package, MshrPartition::Request, free)
    }

    fn remove_token_list(&mut self, package: &MemoryPackage) {
        let _ = self.tokens.remove(package);
    }

    fn print_structures(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "MEMORY {} (busy until {}, {} of {} entries used)",
            self.label,
            self.busy_until,
            self.buffer.occupied(),
            self.buffer.len()
        );
        out.push_str(&self.buffer.dump());
        let _ = writeln!(out, "  TOKENS ({})", self.tokens.len());
        out.push_str(&self.tokens.dump());
        out
    }
}
