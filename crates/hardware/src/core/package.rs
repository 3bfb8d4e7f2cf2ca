//! Memory transaction packages.
//!
//! A [`MemoryPackage`] is the message exchanged between requesters, caches, and
//! memory controllers, and also the record an MSHR slot keeps for an in-flight
//! transaction. Payload data is never modeled: only addresses, sizes, and operation
//! kinds travel through the hierarchy.

use std::fmt;

use crate::common::ids::ComponentId;

/// Kind of memory operation carried by a package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryOperation {
    /// Instruction fetch.
    Instruction,
    /// Data load.
    Read,
    /// Data store.
    Write,
    /// Speculative fetch issued by a prefetcher.
    Prefetch,
    /// Dirty line travelling toward memory.
    Copyback,
}

impl MemoryOperation {
    /// Whether the operation expects an answer carrying a line.
    pub const fn is_read_type(self) -> bool {
        matches!(self, Self::Instruction | Self::Read | Self::Prefetch)
    }

    /// Whether the requester waits for an answer.
    pub const fn expects_answer(self) -> bool {
        self.is_read_type()
    }
}

impl fmt::Display for MemoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Instruction => "INST",
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Prefetch => "PREFETCH",
            Self::Copyback => "COPYBACK",
        };
        f.write_str(name)
    }
}

/// Life-cycle state of a package inside an MSHR or a memory buffer.
///
/// `Free → Untreated → {Wait | Transmit} → Ready → Free`. `Untreated` loops on
/// itself with a refreshed born cycle while a downstream resource is busy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PackageState {
    /// Slot unused.
    #[default]
    Free,
    /// Waiting to be processed by the owning component.
    Untreated,
    /// Sent downstream; waiting for the answer.
    Wait,
    /// Waiting for an output port.
    Transmit,
    /// Done; released once `ready_cycle` is reached.
    Ready,
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Free => "FREE",
            Self::Untreated => "UNTREATED",
            Self::Wait => "WAIT",
            Self::Transmit => "TRANSMIT",
            Self::Ready => "READY",
        };
        f.write_str(name)
    }
}

/// One memory transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryPackage {
    /// Component that started the transaction.
    pub id_owner: ComponentId,
    /// Sequence number assigned by the owner.
    pub opcode_number: u64,
    /// Address of the instruction that issued the access (informational).
    pub opcode_address: u64,
    /// Micro-operation number within the opcode.
    pub uop_number: u64,
    /// Target address.
    pub memory_address: u64,
    /// Bytes accessed.
    pub memory_size: usize,
    /// Operation kind.
    pub memory_operation: MemoryOperation,
    /// Current state.
    pub state: PackageState,
    /// Cycle the package entered (or re-entered) its current buffer.
    pub born_cycle: u64,
    /// Cycle at which the current wait period ends.
    pub ready_cycle: u64,
    /// Whether the package travels back toward the owner.
    pub is_answer: bool,
    /// Sending endpoint of the current hop.
    pub id_src: ComponentId,
    /// Receiving endpoint of the current hop.
    pub id_dst: ComponentId,
    /// Output ports of the precomputed route.
    pub hops: Vec<usize>,
    /// Next hop to take; `None` once the route has been consumed.
    pub hop_count: Option<usize>,
}

impl MemoryPackage {
    /// Creates a package for a new transaction.
    ///
    /// # Arguments
    ///
    /// * `owner` - Component starting the transaction; also the first source.
    /// * `opcode_number` - Owner-assigned sequence number.
    /// * `uop_number` - Micro-operation number.
    /// * `address` - Target address.
    /// * `size` - Bytes accessed.
    /// * `operation` - Operation kind.
    /// * `now` - Current cycle; becomes the born and ready cycle.
    pub const fn new(
        owner: ComponentId,
        opcode_number: u64,
        uop_number: u64,
        address: u64,
        size: usize,
        operation: MemoryOperation,
        now: u64,
    ) -> Self {
        Self {
            id_owner: owner,
            opcode_number,
            opcode_address: 0,
            uop_number,
            memory_address: address,
            memory_size: size,
            memory_operation: operation,
            state: PackageState::Free,
            born_cycle: now,
            ready_cycle: now,
            is_answer: false,
            id_src: owner,
            id_dst: owner,
            hops: Vec::new(),
            hop_count: None,
        }
    }

    /// Returns an empty slot value.
    pub const fn free(owner: ComponentId) -> Self {
        Self::new(owner, 0, 0, 0, 0, MemoryOperation::Read, 0)
    }

    /// Whether the slot holding this package is unused.
    pub fn is_free(&self) -> bool {
        self.state == PackageState::Free
    }

    /// Sets the endpoints of the next hop.
    pub const fn set_src_dst(&mut self, src: ComponentId, dst: ComponentId) {
        self.id_src = src;
        self.id_dst = dst;
    }

    /// Marks the package untreated for `stall` cycles.
    pub fn package_untreated(&mut self, stall: u64, now: u64) {
        self.state = PackageState::Untreated;
        self.ready_cycle = now + stall;
    }

    /// Marks the package as waiting for an answer.
    pub fn package_wait(&mut self, stall: u64, now: u64) {
        self.state = PackageState::Wait;
        self.ready_cycle = now + stall;
    }

    /// Marks the package as waiting for an output port.
    pub fn package_transmit(&mut self, stall: u64, now: u64) {
        self.state = PackageState::Transmit;
        self.ready_cycle = now + stall;
    }

    /// Marks the package as finished; it is released after `stall` cycles.
    pub fn package_ready(&mut self, stall: u64, now: u64) {
        self.state = PackageState::Ready;
        self.ready_cycle = now + stall;
    }

    /// Resets the slot to `Free`.
    pub fn package_clean(&mut self) {
        let owner = self.id_owner;
        *self = Self::free(owner);
    }
}

impl fmt::Display for MemoryPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[OWNER:{} OPCODE:{} UOP:{} ADDR:{:#x} SIZE:{} OP:{} STATE:{} BORN:{} READY:{} ANSWER:{} SRC:{} DST:{} HOP:{:?}]",
            self.id_owner,
            self.opcode_number,
            self.uop_number,
            self.memory_address,
            self.memory_size,
            self.memory_operation,
            self.state,
            self.born_cycle,
            self.ready_cycle,
            u8::from(self.is_answer),
            self.id_src,
            self.id_dst,
            self.hop_count,
        )
    }
}
