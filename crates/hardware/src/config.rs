//! Configuration system for the coherence simulator.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline hardware constants (line size, MSHR partitions, latencies).
//! 2. **Structures:** General settings, directory policy, and one entry per cache,
//!    memory controller, and requester.
//! 3. **Enums:** Address mask layouts, replacement, prefetcher, line-usage predictor,
//!    inclusion, and memory timing models.
//!
//! Configuration is supplied as JSON or built with `Config::default()` for the CLI.
//! Components reference each other by label; the system builder resolves the labels
//! and validates the resulting hierarchy.

use std::path::Path;

use serde::Deserialize;

use crate::common::error::SimError;

/// Default configuration constants for the simulator.
///
/// These values define the baseline hardware when a field is not given in the
/// JSON document.
mod defaults {
    /// Line size shared by every cache in the hierarchy (bytes).
    pub const LINE_SIZE: usize = 64;

    /// Maximum age of an in-flight entry before the watchdog declares a deadlock.
    pub const MAX_ALIVE_TIME: u64 = 1_000_000;

    /// Cycles between two periodic consistency checks.
    pub const PERIODIC_CHECK: u64 = 10_000;

    /// Cycle limit for a run.
    pub const MAX_CYCLES: u64 = 100_000_000;

    /// Lines per cache (32 KiB with 64-byte lines).
    pub const LINE_NUMBER: usize = 512;

    /// Ways per set.
    pub const ASSOCIATIVITY: usize = 8;

    /// Cycles to read a line once the tag matched.
    pub const PENALTY_READ: u64 = 2;

    /// Cycles to write a line.
    pub const PENALTY_WRITE: u64 = 2;

    /// MSHR slots reserved for demand requests.
    pub const MSHR_REQUEST_SIZE: usize = 8;

    /// MSHR slots reserved for copybacks.
    pub const MSHR_COPYBACK_SIZE: usize = 4;

    /// MSHR slots reserved for prefetches.
    pub const MSHR_PREFETCH_SIZE: usize = 2;

    /// Prefetch addresses waiting for a free prefetch slot.
    pub const PREFETCH_QUEUE_SIZE: usize = 8;

    /// Lines fetched ahead by a prefetcher.
    pub const PREFETCH_DEGREE: usize = 1;

    /// Entries in the stride and stream prefetcher tables.
    pub const PREFETCH_TABLE_SIZE: usize = 16;

    /// Sub-block granularity of the sub-block line-usage predictor (bytes).
    pub const SUB_BLOCK_SIZE: usize = 16;

    /// Entries in the dead-block history table.
    pub const DEAD_BLOCK_TABLE_SIZE: usize = 256;

    /// Link latency of an endpoint (cycles).
    pub const INTERCONNECTION_LATENCY: u64 = 1;

    /// Link width of an endpoint (bytes per transfer).
    pub const INTERCONNECTION_WIDTH: usize = 32;

    /// Fixed memory latency for the simple timing model.
    pub const MEMORY_LATENCY: u64 = 100;

    /// Column access strobe latency.
    pub const T_CAS: u64 = 14;

    /// Row access strobe latency.
    pub const T_RAS: u64 = 14;

    /// Precharge latency.
    pub const T_PRE: u64 = 14;

    /// DRAM row size (bytes).
    pub const ROW_SIZE: usize = 2048;

    /// Requests queued at a memory controller.
    pub const MEMORY_BUFFER_SIZE: usize = 16;

    /// Outstanding read-type transactions per requester.
    pub const MAX_OUTSTANDING: usize = 8;
}

/// Bit-field layout used to split an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AddressMask {
    /// Tag, index, offset (single bank).
    #[default]
    TagIndexOffset,
    /// Tag, index, bank, offset (consecutive lines map to consecutive banks).
    TagIndexBankOffset,
    /// Tag, bank, index, offset (blocks of sets map to banks).
    TagBankIndexOffset,
}

/// Cache replacement policy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ReplacementPolicy {
    /// Least Recently Used.
    #[default]
    #[serde(alias = "LRU")]
    Lru,
    /// First-In, First-Out.
    #[serde(alias = "FIFO")]
    Fifo,
    /// Uniform pseudo-random pick.
    Random,
    /// First invalid way, otherwise LRU.
    InvalidOrLru,
    /// LRU among predicted-dead ways, otherwise LRU.
    DeadOrLru,
}

/// Hardware prefetcher types for cache prefetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Prefetcher {
    /// No prefetching enabled.
    #[default]
    None,
    /// Next-line prefetcher.
    ///
    /// Prefetches the next sequential cache lines after each demand access.
    NextLine,
    /// Stride prefetcher.
    ///
    /// Detects constant strides within a page and prefetches ahead of them.
    Stride,
    /// Stream prefetcher.
    ///
    /// Follows ascending or descending runs of consecutive lines within a page.
    Stream,
}

/// Line-usage predictor types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum LineUsagePredictor {
    /// Every access to a present line is a hit and no line is ever dead.
    #[default]
    Disabled,
    /// Tracks valid sub-blocks per line; a missing sub-block refetches the line.
    SubBlock,
    /// Learns per-line access counts and predicts lines that will not be reused.
    DeadBlock,
}

/// Inclusion policy enforced by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Inclusiveness {
    /// No cross-level enforcement beyond coherence.
    #[default]
    NonInclusive,
    /// Evictions from the last-level cache invalidate every higher copy.
    #[serde(alias = "InclusiveLLC")]
    InclusiveLlc,
    /// Evictions at any level invalidate every higher copy.
    InclusiveAll,
}

/// Memory timing model types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryTiming {
    /// Fixed latency per access.
    #[default]
    Simple,
    /// Row-buffer-aware DRAM timing.
    Dram,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use cohsim_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.general.line_size, 64);
/// assert_eq!(config.caches.len(), 3);
/// assert_eq!(config.requesters.len(), 2);
/// ```
///
/// Deserializing from JSON:
///
/// ```
/// use cohsim_core::config::{Config, Inclusiveness, ReplacementPolicy};
///
/// let json = r#"{
///     "general": { "line_size": 64, "max_alive_time": 50000 },
///     "directory": { "inclusiveness": "InclusiveLlc" },
///     "caches": [
///         { "label": "L1", "line_number": 64, "associativity": 2, "lower_level": ["LLC"] },
///         { "label": "LLC", "line_number": 1024, "associativity": 16,
///           "replacement_policy": "InvalidOrLru", "penalty_read": 8 }
///     ],
///     "memory_controllers": [ { "label": "MEM", "timing": "Dram" } ],
///     "requesters": [ { "label": "CPU", "data_cache": "L1" } ]
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.general.max_alive_time, 50000);
/// assert_eq!(config.directory.inclusiveness, Inclusiveness::InclusiveLlc);
/// assert_eq!(config.caches[1].replacement_policy, ReplacementPolicy::InvalidOrLru);
/// assert_eq!(config.caches[0].mshr_request_size, 8);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// General simulation settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Coherence directory policy
    #[serde(default)]
    pub directory: DirectoryConfig,
    /// Every cache in the hierarchy, in clock order
    pub caches: Vec<CacheConfig>,
    /// Memory controllers behind the last-level caches
    pub memory_controllers: Vec<MemoryControllerConfig>,
    /// Trace-driven requesters attached to first-level caches
    pub requesters: Vec<RequesterConfig>,
}

impl Config {
    /// Parses a JSON configuration document.
    ///
    /// # Arguments
    ///
    /// * `json` - The JSON text.
    ///
    /// # Returns
    ///
    /// The configuration, or `SimError::Json` when the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the file.
    ///
    /// # Returns
    ///
    /// The configuration, or the I/O or JSON error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Looks up a cache entry by label.
    pub fn cache(&self, label: &str) -> Option<&CacheConfig> {
        self.caches.iter().find(|c| c.label == label)
    }
}

impl Default for Config {
    fn default() -> Self {
        let l1 = |n: usize| CacheConfig {
            label: format!("L1D_{n}"),
            lower_level: vec!["L2".to_string()],
            ..CacheConfig::default()
        };
        Self {
            general: GeneralConfig::default(),
            directory: DirectoryConfig::default(),
            caches: vec![
                l1(0),
                l1(1),
                CacheConfig {
                    label: "L2".to_string(),
                    line_number: 4096,
                    associativity: 16,
                    penalty_read: 10,
                    penalty_write: 10,
                    mshr_request_size: 16,
                    mshr_copyback_size: 8,
                    ..CacheConfig::default()
                },
            ],
            memory_controllers: vec![MemoryControllerConfig::default()],
            requesters: (0..2)
                .map(|n| RequesterConfig {
                    label: format!("CPU{n}"),
                    data_cache: format!("L1D_{n}"),
                    ..RequesterConfig::default()
                })
                .collect(),
        }
    }
}

/// General simulation settings and options.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Line size shared by the whole hierarchy (bytes, power of two)
    #[serde(default = "GeneralConfig::default_line_size")]
    pub line_size: usize,

    /// Maximum age of an MSHR entry or directory line before the run aborts
    #[serde(default = "GeneralConfig::default_max_alive_time")]
    pub max_alive_time: u64,

    /// Cycles between watchdog and single-writer checks
    #[serde(default = "GeneralConfig::default_periodic_check")]
    pub periodic_check: u64,

    /// Cycle limit for a run
    #[serde(default = "GeneralConfig::default_max_cycles")]
    pub max_cycles: u64,
}

impl GeneralConfig {
    fn default_line_size() -> usize {
        defaults::LINE_SIZE
    }

    fn default_max_alive_time() -> u64 {
        defaults::MAX_ALIVE_TIME
    }

    fn default_periodic_check() -> u64 {
        defaults::PERIODIC_CHECK
    }

    fn default_max_cycles() -> u64 {
        defaults::MAX_CYCLES
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            line_size: defaults::LINE_SIZE,
            max_alive_time: defaults::MAX_ALIVE_TIME,
            periodic_check: defaults::PERIODIC_CHECK,
            max_cycles: defaults::MAX_CYCLES,
        }
    }
}

/// Coherence directory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Inclusion policy between cache levels
    #[serde(default)]
    pub inclusiveness: Inclusiveness,

    /// Whether dirty last-level victims are written back to memory
    #[serde(default = "DirectoryConfig::default_generate_llc_copyback")]
    pub generate_llc_copyback: bool,
}

impl DirectoryConfig {
    fn default_generate_llc_copyback() -> bool {
        true
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            inclusiveness: Inclusiveness::NonInclusive,
            generate_llc_copyback: true,
        }
    }
}

/// Configuration of one cache (or one bank of a banked cache).
///
/// A cache whose `lower_level` list is empty is a last-level cache and talks to the
/// memory controllers directly.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Unique label used in reports and wiring
    pub label: String,

    /// Total lines in this bank
    #[serde(default = "CacheConfig::default_line_number")]
    pub line_number: usize,

    /// Ways per set
    #[serde(default = "CacheConfig::default_associativity")]
    pub associativity: usize,

    /// Bank served by this cache
    #[serde(default)]
    pub bank_number: usize,

    /// Banks sharing the address space with this cache
    #[serde(default = "CacheConfig::default_total_banks")]
    pub total_banks: usize,

    /// Address bit-field layout
    #[serde(default)]
    pub address_mask: AddressMask,

    /// Victim selection policy
    #[serde(default)]
    pub replacement_policy: ReplacementPolicy,

    /// Cycles to read a line
    #[serde(default = "CacheConfig::default_penalty_read")]
    pub penalty_read: u64,

    /// Cycles to write a line
    #[serde(default = "CacheConfig::default_penalty_write")]
    pub penalty_write: u64,

    /// MSHR slots for demand requests
    #[serde(default = "CacheConfig::default_mshr_request_size")]
    pub mshr_request_size: usize,

    /// MSHR slots for copybacks
    #[serde(default = "CacheConfig::default_mshr_copyback_size")]
    pub mshr_copyback_size: usize,

    /// MSHR slots for prefetches
    #[serde(default = "CacheConfig::default_mshr_prefetch_size")]
    pub mshr_prefetch_size: usize,

    /// Labels of the next-level caches (one per bank); empty for a last-level cache
    #[serde(default)]
    pub lower_level: Vec<String>,

    /// Prefetcher attached to this cache
    #[serde(default)]
    pub prefetcher: Prefetcher,

    /// Prefetch degree
    #[serde(default = "CacheConfig::default_prefetch_degree")]
    pub prefetch_degree: usize,

    /// Stride and stream table entries
    #[serde(default = "CacheConfig::default_prefetch_table_size")]
    pub prefetch_table_size: usize,

    /// Prefetch addresses kept while the prefetch partition is full
    #[serde(default = "CacheConfig::default_prefetch_queue_size")]
    pub prefetch_queue_size: usize,

    /// Line-usage predictor attached to this cache
    #[serde(default)]
    pub line_usage_predictor: LineUsagePredictor,

    /// Sub-block size for the sub-block predictor (bytes)
    #[serde(default = "CacheConfig::default_sub_block_size")]
    pub sub_block_size: usize,

    /// History entries for the dead-block predictor
    #[serde(default = "CacheConfig::default_dead_block_table_size")]
    pub dead_block_table_size: usize,

    /// Link latency (cycles)
    #[serde(default = "CacheConfig::default_interconnection_latency")]
    pub interconnection_latency: u64,

    /// Link width (bytes)
    #[serde(default = "CacheConfig::default_interconnection_width")]
    pub interconnection_width: usize,
}

impl CacheConfig {
    fn default_line_number() -> usize {
        defaults::LINE_NUMBER
    }

    fn default_associativity() -> usize {
        defaults::ASSOCIATIVITY
    }

    fn default_total_banks() -> usize {
        1
    }

    fn default_penalty_read() -> u64 {
        defaults::PENALTY_READ
    }

    fn default_penalty_write() -> u64 {
        defaults::PENALTY_WRITE
    }

    fn default_mshr_request_size() -> usize {
        defaults::MSHR_REQUEST_SIZE
    }

    fn default_mshr_copyback_size() -> usize {
        defaults::MSHR_COPYBACK_SIZE
    }

    fn default_mshr_prefetch_size() -> usize {
        defaults::MSHR_PREFETCH_SIZE
    }

    fn default_prefetch_degree() -> usize {
        defaults::PREFETCH_DEGREE
    }

    fn default_prefetch_table_size() -> usize {
        defaults::PREFETCH_TABLE_SIZE
    }

    fn default_prefetch_queue_size() -> usize {
        defaults::PREFETCH_QUEUE_SIZE
    }

    fn default_sub_block_size() -> usize {
        defaults::SUB_BLOCK_SIZE
    }

    fn default_dead_block_table_size() -> usize {
        defaults::DEAD_BLOCK_TABLE_SIZE
    }

    fn default_interconnection_latency() -> u64 {
        defaults::INTERCONNECTION_LATENCY
    }

    fn default_interconnection_width() -> usize {
        defaults::INTERCONNECTION_WIDTH
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            label: "L1".to_string(),
            line_number: defaults::LINE_NUMBER,
            associativity: defaults::ASSOCIATIVITY,
            bank_number: 0,
            total_banks: 1,
            address_mask: AddressMask::TagIndexOffset,
            replacement_policy: ReplacementPolicy::Lru,
            penalty_read: defaults::PENALTY_READ,
            penalty_write: defaults::PENALTY_WRITE,
            mshr_request_size: defaults::MSHR_REQUEST_SIZE,
            mshr_copyback_size: defaults::MSHR_COPYBACK_SIZE,
            mshr_prefetch_size: defaults::MSHR_PREFETCH_SIZE,
            lower_level: Vec::new(),
            prefetcher: Prefetcher::None,
            prefetch_degree: defaults::PREFETCH_DEGREE,
            prefetch_table_size: defaults::PREFETCH_TABLE_SIZE,
            prefetch_queue_size: defaults::PREFETCH_QUEUE_SIZE,
            line_usage_predictor: LineUsagePredictor::Disabled,
            sub_block_size: defaults::SUB_BLOCK_SIZE,
            dead_block_table_size: defaults::DEAD_BLOCK_TABLE_SIZE,
            interconnection_latency: defaults::INTERCONNECTION_LATENCY,
            interconnection_width: defaults::INTERCONNECTION_WIDTH,
        }
    }
}

/// Configuration of one memory controller.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryControllerConfig {
    /// Unique label used in reports
    pub label: String,

    /// Channel served by this controller
    #[serde(default)]
    pub controller_number: usize,

    /// Controllers interleaved over the address space
    #[serde(default = "MemoryControllerConfig::default_total_controllers")]
    pub total_controllers: usize,

    /// Address layout used to pick the controller (the bank field)
    #[serde(default)]
    pub address_mask: AddressMask,

    /// Request buffer entries
    #[serde(default = "MemoryControllerConfig::default_buffer_size")]
    pub buffer_size: usize,

    /// Timing model
    #[serde(default)]
    pub timing: MemoryTiming,

    /// Fixed latency for the simple model
    #[serde(default = "MemoryControllerConfig::default_latency")]
    pub latency: u64,

    /// Column access strobe latency
    #[serde(default = "MemoryControllerConfig::default_t_cas")]
    pub t_cas: u64,

    /// Row access strobe latency
    #[serde(default = "MemoryControllerConfig::default_t_ras")]
    pub t_ras: u64,

    /// Precharge latency
    #[serde(default = "MemoryControllerConfig::default_t_pre")]
    pub t_pre: u64,

    /// DRAM row size (bytes, power of two)
    #[serde(default = "MemoryControllerConfig::default_row_size")]
    pub row_size: usize,

    /// Link latency (cycles)
    #[serde(default = "MemoryControllerConfig::default_interconnection_latency")]
    pub interconnection_latency: u64,

    /// Link width (bytes)
    #[serde(default = "MemoryControllerConfig::default_interconnection_width")]
    pub interconnection_width: usize,
}

impl MemoryControllerConfig {
    fn default_total_controllers() -> usize {
        1
    }

    fn default_buffer_size() -> usize {
        defaults::MEMORY_BUFFER_SIZE
    }

    fn default_latency() -> u64 {
        defaults::MEMORY_LATENCY
    }

    fn default_t_cas() -> u64 {
        defaults::T_CAS
    }

    fn default_t_ras() -> u64 {
        defaults::T_RAS
    }

    fn default_t_pre() -> u64 {
        defaults::T_PRE
    }

    fn default_row_size() -> usize {
        defaults::ROW_SIZE
    }

    fn default_interconnection_latency() -> u64 {
        defaults::INTERCONNECTION_LATENCY
    }

    fn default_interconnection_width() -> usize {
        defaults::INTERCONNECTION_WIDTH
    }
}

impl Default for MemoryControllerConfig {
    fn default() -> Self {
        Self {
            label: "MEM0".to_string(),
            controller_number: 0,
            total_controllers: 1,
            address_mask: AddressMask::TagIndexOffset,
            buffer_size: defaults::MEMORY_BUFFER_SIZE,
            timing: MemoryTiming::Simple,
            latency: defaults::MEMORY_LATENCY,
            t_cas: defaults::T_CAS,
            t_ras: defaults::T_RAS,
            t_pre: defaults::T_PRE,
            row_size: defaults::ROW_SIZE,
            interconnection_latency: defaults::INTERCONNECTION_LATENCY,
            interconnection_width: defaults::INTERCONNECTION_WIDTH,
        }
    }
}

/// Configuration of one trace-driven requester.
#[derive(Debug, Clone, Deserialize)]
pub struct RequesterConfig {
    /// Unique label used in reports
    pub label: String,

    /// First-level cache receiving reads, writes, and prefetches
    pub data_cache: String,

    /// First-level cache receiving instruction fetches (defaults to `data_cache`)
    #[serde(default)]
    pub inst_cache: Option<String>,

    /// Read-type transactions allowed in flight
    #[serde(default = "RequesterConfig::default_max_outstanding")]
    pub max_outstanding: usize,

    /// Link latency (cycles)
    #[serde(default = "RequesterConfig::default_interconnection_latency")]
    pub interconnection_latency: u64,

    /// Link width (bytes)
    #[serde(default = "RequesterConfig::default_interconnection_width")]
    pub interconnection_width: usize,
}

impl RequesterConfig {
    fn default_max_outstanding() -> usize {
        defaults::MAX_OUTSTANDING
    }

    fn default_interconnection_latency() -> u64 {
        defaults::INTERCONNECTION_LATENCY
    }

    fn default_interconnection_width() -> usize {
        defaults::INTERCONNECTION_WIDTH
    }
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            label: "CPU0".to_string(),
            data_cache: "L1D_0".to_string(),
            inst_cache: None,
            max_outstanding: defaults::MAX_OUTSTANDING,
            interconnection_latency: defaults::INTERCONNECTION_LATENCY,
            interconnection_width: defaults::INTERCONNECTION_WIDTH,
        }
    }
}
