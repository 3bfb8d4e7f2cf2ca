//! Access timing models for memory controllers.
//!
//! This module provides:
//! 1. **SimpleTiming:** Fixed latency per access (no row-buffer modeling).
//! 2. **DramTiming:** Row-buffer-aware latency (CAS, RAS, precharge) for DRAM-style timing.

use std::fmt;

use crate::config::{MemoryControllerConfig, MemoryTiming};

/// Latency model of a memory controller.
pub trait AccessTiming: Send + Sync + fmt::Debug {
    /// Returns the number of cycles required for an access to the given address.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address being accessed (used for row-buffer modeling).
    ///
    /// # Returns
    ///
    /// Latency in simulation cycles.
    fn access_latency(&mut self, addr: u64) -> u64;
}

/// Every access takes the same number of cycles.
#[derive(Clone, Copy, Debug)]
pub struct SimpleTiming {
    latency: u64,
}

impl SimpleTiming {
    /// Creates a fixed-latency model.
    pub const fn new(latency: u64) -> Self {
        Self { latency }
    }
}

impl AccessTiming for SimpleTiming {
    fn access_latency(&mut self, _addr: u64) -> u64 {
        self.latency
    }
}

/// Open-row DRAM model: a row hit costs CAS, a row switch adds precharge and RAS.
#[derive(Clone, Copy, Debug)]
pub struct DramTiming {
    last_row: Option<u64>,
    t_cas: u64,
    t_ras: u64,
    t_pre: u64,
    row_mask: u64,
}

impl DramTiming {
    /// Creates a DRAM model with no row open.
    ///
    /// # Arguments
    ///
    /// * `t_cas` - Column access strobe latency.
    /// * `t_ras` - Row access strobe latency.
    /// * `t_pre` - Precharge latency.
    /// * `row_size` - Bytes per DRAM row (rounded up to a power of two).
    pub fn new(t_cas: u64, t_ras: u64, t_pre: u64, row_size: usize) -> Self {
        let row_size = row_size.max(1).next_power_of_two() as u64;
        Self {
            last_row: None,
            t_cas,
            t_ras,
            t_pre,
            row_mask: !(row_size - 1),
        }
    }
}

impl AccessTiming for DramTiming {
    fn access_latency(&mut self, addr: u64) -> u64 {
        let row = addr & self.row_mask;
        match self.last_row {
            Some(open_row) if open_row == row => self.t_cas,
            Some(_) => {
                self.last_row = Some(row);
                self.t_pre + self.t_ras + self.t_cas
            }
            None => {
                self.last_row = Some(row);
                self.t_ras + self.t_cas
            }
        }
    }
}

/// Builds the timing model a controller is configured with.
pub fn build(config: &MemoryControllerConfig) -> Box<dyn AccessTiming> {
    match config.timing {
        MemoryTiming::Simple => Box::new(SimpleTiming::new(config.latency)),
        MemoryTiming::Dram => Box::new(DramTiming::new(
            config.t_cas,
            config.t_ras,
            config.t_pre,
            config.row_size,
        )),
    }
}
