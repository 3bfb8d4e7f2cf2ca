//! Memory access traces.
//!
//! A trace is a text file with one access per line:
//!
//! ```text
//! # op  address     [size] [delay]
//! R     0x1000
//! W     0x1040      8      2
//! I     4096
//! ```
//!
//! 1. **Operation:** `R` (read), `W` (write), `I` (instruction fetch), or `P` (prefetch).
//! 2. **Address:** Hexadecimal with a `0x` prefix, or decimal.
//! 3. **Size:** Bytes accessed; defaults to 8.
//! 4. **Delay:** Cycles to wait after the previous access was issued; defaults to 0.
//!
//! Blank lines and text after `#` are ignored.

use std::fs;
use std::path::Path;

use crate::common::error::SimError;
use crate::core::package::MemoryOperation;

/// Bytes accessed when a trace line gives no size.
pub const DEFAULT_ACCESS_SIZE: usize = 8;

/// One access of a trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    /// Operation kind.
    pub operation: MemoryOperation,
    /// Target address.
    pub address: u64,
    /// Bytes accessed.
    pub size: usize,
    /// Cycles after the previous issue before this access may be issued.
    pub delay: u64,
}

impl TraceEntry {
    /// A read of `size` bytes at `address` with no delay.
    pub const fn read(address: u64, size: usize) -> Self {
        Self { operation: MemoryOperation::Read, address, size, delay: 0 }
    }

    /// A write of `size` bytes at `address` with no delay.
    pub const fn write(address: u64, size: usize) -> Self {
        Self { operation: MemoryOperation::Write, address, size, delay: 0 }
    }
}

fn parse_number(token: &str, line: usize, what: &str) -> Result<u64, SimError> {
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => token.parse::<u64>(),
    };
    parsed.map_err(|e| SimError::Trace {
        line,
        reason: format!("invalid {what} '{token}': {e}"),
    })
}

/// Parses a trace from text.
///
/// # Arguments
///
/// * `text` - Trace contents.
///
/// # Returns
///
/// The accesses in file order, or `SimError::Trace` naming the first bad line.
pub fn parse_trace(text: &str) -> Result<Vec<TraceEntry>, SimError> {
    let mut entries = Vec::new();
    for (number, raw) in text.lines().enumerate() {
        let line = number + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let mut fields = content.split_whitespace();
        let operation = match fields.next() {
            Some("R" | "r") => MemoryOperation::Read,
            Some("W" | "w") => MemoryOperation::Write,
            Some("I" | "i") => MemoryOperation::Instruction,
            Some("P" | "p") => MemoryOperation::Prefetch,
            Some(other) => {
                return Err(SimError::Trace {
                    line,
                    reason: format!("unknown operation '{other}'"),
                });
            }
            None => continue,
        };
        let address = match fields.next() {
            Some(token) => parse_number(token, line, "address")?,
            None => {
                return Err(SimError::Trace {
                    line,
                    reason: "missing address".to_string(),
                });
            }
        };
        let size = match fields.next() {
            Some(token) => parse_number(token, line, "size")? as usize,
            None => DEFAULT_ACCESS_SIZE,
        };
        if size == 0 {
            return Err(SimError::Trace {
                line,
                reason: "access size must be at least 1".to_string(),
            });
        }
        let delay = match fields.next() {
            Some(token) => parse_number(token, line, "delay")?,
            None => 0,
        };
        if let Some(extra) = fields.next() {
            return Err(SimError::Trace {
                line,
                reason: format!("unexpected field '{extra}'"),
            });
        }
        entries.push(TraceEntry { operation, address, size, delay });
    }
    Ok(entries)
}

/// Reads and parses a trace file.
pub fn load_trace_file(path: impl AsRef<Path>) -> Result<Vec<TraceEntry>, SimError> {
    let text = fs::read_to_string(path)?;
    parse_trace(&text)
}
