//! Stream Prefetcher.
//!
//! Detects ascending or descending runs of consecutive cache lines and
//! prefetches ahead in the direction of the run. Streams are tracked per 4 KiB
//! page, so interleaved sequential walks over different arrays train
//! independently.
//!
//! Each stream keeps:
//! 1. **Last line:** The line of the previous request to the page.
//! 2. **Direction:** Ascending, descending, or none yet.
//! 3. **Confidence:** A saturating counter; prefetching starts at 2.

use super::Prefetcher;
use crate::core::package::MemoryPackage;

const PAGE_SHIFT: u32 = 12;
const MAX_CONFIDENCE: u8 = 3;
const PREFETCH_CONFIDENCE: u8 = 2;

/// Direction of a detected stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Direction {
    #[default]
    None,
    Ascending,
    Descending,
}

/// Entry in the stream table.
#[derive(Debug, Default, Clone, Copy)]
struct StreamEntry {
    /// Page this entry currently tracks.
    page: u64,
    /// Line number of the last request.
    last_line: u64,
    /// Direction of the stream.
    direction: Direction,
    /// Confidence counter (2-bit saturating).
    confidence: u8,
    /// Whether the entry has seen a request.
    valid: bool,
}

/// Stream Prefetcher state.
#[derive(Debug, Clone)]
pub struct StreamPrefetcher {
    /// Stream table indexed by page.
    table: Vec<StreamEntry>,
    /// Size of a cache line in bytes.
    line_bytes: u64,
    /// Mask used to index the table.
    table_mask: usize,
    /// Number of lines to prefetch ahead.
    degree: usize,
}

impl StreamPrefetcher {
    /// Creates a new Stream prefetcher.
    ///
    /// # Arguments
    ///
    /// * `line_bytes` - The size of a cache line in bytes.
    /// * `table_size` - Number of streams tracked (rounded up to a power of 2).
    /// * `degree` - The number of lines to prefetch ahead.
    pub fn new(line_bytes: usize, table_size: usize, degree: usize) -> Self {
        let size = table_size.max(1).next_power_of_two();
        Self {
            table: vec![StreamEntry::default(); size],
            line_bytes: line_bytes as u64,
            table_mask: size - 1,
            degree: degree.max(1),
        }
    }
}

impl Prefetcher for StreamPrefetcher {
    fn treat_prefetch(&mut self, package: &MemoryPackage) -> Vec<u64> {
        let addr = package.memory_address;
        let page = addr >> PAGE_SHIFT;
        let line = addr / self.line_bytes;
        let idx = (page as usize) & self.table_mask;
        let entry = &mut self.table[idx];

        if !entry.valid || entry.page != page {
            *entry = StreamEntry {
                page,
                last_line: line,
                valid: true,
                ..StreamEntry::default()
            };
            return Vec::new();
        }

        // Further accesses inside the last line neither train nor break the stream.
        if line == entry.last_line {
            return Vec::new();
        }

        let observed = if line == entry.last_line.wrapping_add(1) {
            Direction::Ascending
        } else if line == entry.last_line.wrapping_sub(1) {
            Direction::Descending
        } else {
            Direction::None
        };

        if observed == Direction::None {
            if entry.confidence > 0 {
                entry.confidence -= 1;
            } else {
                entry.direction = Direction::None;
            }
        } else if observed == entry.direction {
            entry.confidence = (entry.confidence + 1).min(MAX_CONFIDENCE);
        } else {
            entry.direction = observed;
            entry.confidence = 1;
        }
        entry.last_line = line;

        if entry.confidence < PREFETCH_CONFIDENCE {
            return Vec::new();
        }
        let direction = entry.direction;
        (1..=self.degree as u64)
            .filter_map(|k| match direction {
                Direction::Ascending => line.checked_add(k),
                Direction::Descending => line.checked_sub(k),
                Direction::None => None,
            })
            .map(|target| target * self.line_bytes)
            .collect()
    }
}
