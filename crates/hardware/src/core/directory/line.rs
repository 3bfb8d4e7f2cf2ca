//! Directory lines.
//!
//! A directory line exists for every line address with an open miss or copyback
//! transaction. It records:
//! 1. **Identity:** The owner, opcode, and micro-op of the transaction holding the lock.
//! 2. **Request order:** The order in which caches forwarded the miss, so the
//!    answer can retrace the path back toward the owner.
//! 3. **Initial request:** The operation, address, and size the owner asked for,
//!    restored on the package once the answer reaches the first cache.

use std::fmt;

use crate::common::ids::ComponentId;
use crate::core::package::{MemoryOperation, MemoryPackage};

/// Kind of lock a directory line holds on its address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockKind {
    /// Read-type transaction.
    Read,
    /// Write or copyback transaction.
    Write,
}

impl LockKind {
    /// Lock taken by a transaction of `op`.
    pub const fn for_operation(op: MemoryOperation) -> Self {
        if op.is_read_type() { Self::Read } else { Self::Write }
    }
}

/// Record of one open transaction on a line address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryLine {
    /// Component that started the transaction.
    pub id_owner: ComponentId,
    /// Owner's sequence number.
    pub opcode_number: u64,
    /// Instruction address of the access.
    pub opcode_address: u64,
    /// Micro-operation number.
    pub uop_number: u64,
    /// Line address under transaction.
    pub line_address: u64,
    /// Lock kind.
    pub lock: LockKind,
    /// Per cache, the position at which it joined the request path (0 = not on it).
    pub cache_request_order: Vec<usize>,
    /// Number of caches still on the request path.
    pub cache_requested: usize,
    /// Operation the owner asked for.
    pub initial_memory_operation: MemoryOperation,
    /// Address the owner asked for.
    pub initial_memory_address: u64,
    /// Size the owner asked for.
    pub initial_memory_size: usize,
    /// Cycle the line was opened.
    pub born_cycle: u64,
}

impl DirectoryLine {
    /// Opens a line for the transaction of `package`.
    ///
    /// # Arguments
    ///
    /// * `package` - The package starting the transaction.
    /// * `line_address` - Line-aligned address of the package.
    /// * `cache_count` - Number of caches in the arena.
    /// * `now` - Current cycle.
    pub fn open(package: &MemoryPackage, line_address: u64, cache_count: usize, now: u64) -> Self {
        Self {
            id_owner: package.id_owner,
            opcode_number: package.opcode_number,
            opcode_address: package.opcode_address,
            uop_number: package.uop_number,
            line_address,
            lock: LockKind::for_operation(package.memory_operation),
            cache_request_order: vec![0; cache_count],
            cache_requested: 0,
            initial_memory_operation: package.memory_operation,
            initial_memory_address: package.memory_address,
            initial_memory_size: package.memory_size,
            born_cycle: now,
        }
    }

    /// Whether this line belongs to the transaction of `package`.
    pub fn matches(&self, package: &MemoryPackage, line_address: u64) -> bool {
        self.id_owner == package.id_owner
            && self.opcode_number == package.opcode_number
            && self.uop_number == package.uop_number
            && self.line_address == line_address
    }

    /// Appends `cache` to the request path.
    pub fn add_requester(&mut self, cache: usize) {
        self.cache_requested += 1;
        self.cache_request_order[cache] = self.cache_requested;
    }

    /// Cache that joined the path at position `cache_requested`.
    pub fn last_requester(&self) -> Option<usize> {
        if self.cache_requested == 0 {
            return None;
        }
        self.cache_request_order
            .iter()
            .position(|&order| order == self.cache_requested)
    }
}

impl fmt::Display for DirectoryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[OWNER:{} OPCODE:{} UOP:{} LINE:{:#x} LOCK:{:?} OP:{} REQUESTED:{} ORDER:{:?} BORN:{}]",
            self.id_owner,
            self.opcode_number,
            self.uop_number,
            self.line_address,
            self.lock,
            self.initial_memory_operation,
            self.cache_requested,
            self.cache_request_order,
            self.born_cycle,
        )
    }
}
