//! Token ledger for admission control.
//!
//! Before a producer hands a request to a cache or memory controller it asks for a
//! token. The ledger keeps one token per asking transaction, in the order the
//! asks first arrived. A token is granted when the number of tokens of the same
//! partition queued ahead of it is smaller than the number of free slots in that
//! partition, and fewer tokens of that partition are granted than there are free
//! slots. Granted tokens keep their place until the package arrives, so they keep
//! counting against later askers, and a partition never promises more slots than
//! it has.
//!
//! Producers are clocked in a fixed order, so two asks in the same cycle are
//! ordered by that clock order and every tie resolves the same way on every run.

use std::fmt::Write as _;

use crate::common::ids::ComponentId;
use crate::core::package::{MemoryOperation, MemoryPackage};
use crate::core::units::cache::mshr::MshrPartition;

/// One admission reservation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// Owner of the asking transaction.
    pub id_owner: ComponentId,
    /// Opcode number of the asking transaction.
    pub opcode_number: u64,
    /// Micro-operation number of the asking transaction.
    pub uop_number: u64,
    /// Address of the asking transaction.
    pub memory_address: u64,
    /// Operation of the asking transaction.
    pub memory_operation: MemoryOperation,
    /// Partition the package will occupy on arrival.
    pub partition: MshrPartition,
    /// Whether the token was granted and the package is on its way.
    pub is_coming: bool,
}

impl Token {
    fn matches(&self, package: &MemoryPackage) -> bool {
        self.id_owner == package.id_owner
            && self.opcode_number == package.opcode_number
            && self.uop_number == package.uop_number
            && self.memory_address == package.memory_address
            && self.memory_operation == package.memory_operation
    }
}

/// Arrival-ordered token list of one receiver.
#[derive(Clone, Debug, Default)]
pub struct TokenLedger {
    tokens: Vec<Token>,
}

impl TokenLedger {
    /// Creates an empty ledger.
    pub const fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Asks for (or re-asks for) admission of `package`.
    ///
    /// # Arguments
    ///
    /// * `package` - The request about to be sent.
    /// * `partition` - Partition the request will occupy.
    /// * `free_slots` - Slots of that partition tokens may currently be granted against.
    ///
    /// # Returns
    ///
    /// `true` if the package may be sent.
    pub fn check(
        &mut self,
        package: &MemoryPackage,
        partition: MshrPartition,
        free_slots: usize,
    ) -> bool {
        let position = match self.tokens.iter().position(|t| t.matches(package)) {
            Some(position) => position,
            None => {
                self.tokens.push(Token {
                    id_owner: package.id_owner,
                    opcode_number: package.opcode_number,
                    uop_number: package.uop_number,
                    memory_address: package.memory_address,
                    memory_operation: package.memory_operation,
                    partition,
                    is_coming: false,
                });
                self.tokens.len() - 1
            }
        };

        if self.tokens[position].is_coming {
            return true;
        }

        let pending = self.tokens[..position]
            .iter()
            .filter(|t| t.partition == partition)
            .count();
        if pending < free_slots && self.granted(partition) < free_slots {
            self.tokens[position].is_coming = true;
            true
        } else {
            false
        }
    }

    /// Drops the token of an arrived package.
    ///
    /// # Returns
    ///
    /// Whether a token was found.
    pub fn remove(&mut self, package: &MemoryPackage) -> bool {
        match self.tokens.iter().position(|t| t.matches(package)) {
            Some(position) => {
                let _ = self.tokens.remove(position);
                true
            }
            None => false,
        }
    }

    /// Granted tokens whose packages have not arrived yet.
    pub fn granted(&self, partition: MshrPartition) -> usize {
        self.tokens
            .iter()
            .filter(|t| t.partition == partition && t.is_coming)
            .count()
    }

    /// Tokens of a partition, granted or not.
    pub fn pending(&self, partition: MshrPartition) -> usize {
        self.tokens.iter().filter(|t| t.partition == partition).count()
    }

    /// Number of tokens held.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Renders every token in arrival order.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            let _ = writeln!(
                out,
                "  [TOKEN OWNER:{} OPCODE:{} UOP:{} ADDR:{:#x} OP:{} {:?} COMING:{}]",
                token.id_owner,
                token.opcode_number,
                token.uop_number,
                token.memory_address,
                token.memory_operation,
                token.partition,
                u8::from(token.is_coming)
            );
        }
        out
    }
}
