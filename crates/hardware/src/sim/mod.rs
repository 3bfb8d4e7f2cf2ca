//! Simulation driver.
//!
//! Provides the shared context, trace loading, trace-driven requesters, and the
//! simulator loop that clocks the system.

/// Cycle and global parameters shared by every component.
pub mod context;

/// Trace-driven requesters.
pub mod requester;

/// Simulator loop, checks, and statistics.
pub mod simulator;

/// Trace file parsing.
pub mod trace;

pub use self::simulator::Simulator;
pub use self::trace::{TraceEntry, load_trace_file, parse_trace};
