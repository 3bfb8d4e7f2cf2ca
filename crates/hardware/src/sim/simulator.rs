//! Simulator: owns the system and drives the clock.
//!
//! Each tick clocks every component once in the fixed order, advances the cycle,
//! and, every `periodic_check` cycles, runs the watchdog and single-writer checks.
//! Any error aborts the run after the internal state of every component has been
//! logged.

use super::trace::TraceEntry;
use crate::common::error::SimError;
use crate::config::Config;
use crate::soc::System;
use crate::stats::{Labeled, SimStats, StatsReport};

/// Top-level simulator.
#[derive(Debug)]
pub struct Simulator {
    /// The simulated hierarchy.
    pub system: System,
    /// Run-wide statistics.
    pub stats: SimStats,
    periodic_check: u64,
    max_cycles: u64,
}

impl Simulator {
    /// Builds the simulator for `config`.
    pub fn new(config: &Config) -> Result<Self, SimError> {
        Ok(Self {
            system: System::new(config)?,
            stats: SimStats::default(),
            periodic_check: config.general.periodic_check.max(1),
            max_cycles: config.general.max_cycles,
        })
    }

    /// Current cycle.
    pub const fn cycle(&self) -> u64 {
        self.system.ctx.cycle
    }

    /// Appends accesses to the trace of requester `requester`.
    pub fn load_trace(
        &mut self,
        requester: usize,
        entries: impl IntoIterator<Item = TraceEntry>,
    ) -> Result<(), SimError> {
        let target = self.system.requesters.get_mut(requester).ok_or_else(|| {
            SimError::config("simulator", format!("no requester with index {requester}"))
        })?;
        target.load_trace(entries);
        Ok(())
    }

    /// Advances the simulation by one cycle.
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.system.clock()?;
        self.system.ctx.cycle += 1;
        self.stats.cycles = self.system.ctx.cycle;
        if self.system.ctx.cycle % self.periodic_check == 0 {
            self.stats.periodic_checks += 1;
            self.system.check()?;
        }
        Ok(())
    }

    /// Runs until every trace is replayed and the hierarchy is drained, or until
    /// `max_cycles` (the configured limit when `None`) cycles have elapsed.
    ///
    /// # Returns
    ///
    /// The number of cycles simulated by this call. On error the state of every
    /// component is logged before the error is returned.
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<u64, SimError> {
        let limit = max_cycles.unwrap_or(self.max_cycles);
        let start = self.cycle();
        tracing::info!(start, limit, "simulation started");
        while !self.system.is_idle() && self.cycle() - start < limit {
            if let Err(error) = self.tick() {
                tracing::error!(%error, "simulation aborted");
                tracing::error!("\n{}", self.system.dump_structures());
                return Err(error);
            }
        }
        let elapsed = self.cycle() - start;
        if self.system.is_idle() {
            tracing::info!(cycles = elapsed, "simulation finished");
        } else {
            tracing::warn!(cycles = elapsed, "cycle limit reached before the hierarchy drained");
        }
        Ok(elapsed)
    }

    /// Clears every statistics block, e.g. after a warm-up period.
    pub fn reset_statistics(&mut self) {
        self.stats.reset(self.cycle());
        self.system.reset_statistics();
    }

    /// Counts the lines still resident in each cache.
    pub fn final_statistics(&mut self) {
        self.system
            .caches
            .iter_mut()
            .for_each(|cache| cache.final_statistics());
    }

    /// Collects every statistics block.
    pub fn report(&self) -> StatsReport {
        let system = &self.system;
        StatsReport {
            cycles: self.cycle(),
            measured_cycles: self.cycle() - self.stats.reset_cycle,
            caches: system
                .caches
                .iter()
                .map(|c| Labeled { label: c.label.clone(), stats: c.stats.clone() })
                .collect(),
            directory: system.directory.stats.clone(),
            memories: system
                .memories
                .iter()
                .map(|m| Labeled { label: m.label.clone(), stats: m.stats.clone() })
                .collect(),
            requesters: system
                .requesters
                .iter()
                .map(|r| Labeled { label: r.label.clone(), stats: r.stats.clone() })
                .collect(),
        }
    }

    /// Prints every statistics block to stdout.
    pub fn print_statistics(&self) {
        self.stats.print();
        for requester in &self.system.requesters {
            requester.stats.print(&requester.label);
        }
        for cache in &self.system.caches {
            cache.stats.print(&cache.label);
        }
        self.system.directory.stats.print();
        for memory in &self.system.memories {
            memory.stats.print(&memory.label);
        }
    }

    /// Renders the internal state of every component.
    pub fn dump_structures(&self) -> String {
        self.system.dump_structures()
    }
}
