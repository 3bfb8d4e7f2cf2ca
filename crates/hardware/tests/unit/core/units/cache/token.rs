//! Token Ledger Tests.
//!
//! Verifies arrival-ordered admission: tokens are granted while fewer tokens of the
//! same partition wait ahead than there are free slots, granted tokens stay granted,
//! and removal on arrival frees the place.

use cohsim_core::common::ids::ComponentId;
use cohsim_core::core::package::{MemoryOperation, MemoryPackage};
use cohsim_core::core::units::cache::mshr::MshrPartition;
use cohsim_core::core::units::cache::token::TokenLedger;
use proptest::prelude::*;

fn ask(owner: usize, opcode_number: u64) -> MemoryPackage {
    MemoryPackage::new(
        ComponentId::Cache(owner),
        opcode_number,
        0,
        opcode_number * 64,
        64,
        MemoryOperation::Read,
        0,
    )
}

/// The first asks up to the free slot count are granted; later asks wait.
#[test]
fn grants_up_to_free_slots() {
    let mut ledger = TokenLedger::new();
    assert!(ledger.check(&ask(0, 1), MshrPartition::Request, 2));
    assert!(ledger.check(&ask(1, 1), MshrPartition::Request, 2));
    assert!(!ledger.check(&ask(0, 2), MshrPartition::Request, 2));
    assert_eq!(ledger.granted(MshrPartition::Request), 2);
    assert_eq!(ledger.pending(MshrPartition::Request), 3);
}

/// Re-asking a granted token succeeds even after the slots filled up.
#[test]
fn granted_token_stays_granted() {
    let mut ledger = TokenLedger::new();
    let package = ask(0, 1);
    assert!(ledger.check(&package, MshrPartition::Request, 1));
    assert!(ledger.check(&package, MshrPartition::Request, 0));
    assert_eq!(ledger.len(), 1);
}

/// A waiting token keeps its place: younger askers cannot overtake it.
#[test]
fn waiting_token_keeps_its_place() {
    let mut ledger = TokenLedger::new();
    let first = ask(0, 1);
    let second = ask(1, 1);
    let third = ask(2, 1);
    assert!(ledger.check(&first, MshrPartition::Request, 1));
    assert!(!ledger.check(&second, MshrPartition::Request, 1));

    assert!(ledger.remove(&first));
    assert!(!ledger.check(&third, MshrPartition::Request, 1));
    assert!(ledger.check(&second, MshrPartition::Request, 1));
    assert!(!ledger.check(&third, MshrPartition::Request, 1));
}

/// Tokens of another partition do not count against a request.
#[test]
fn partitions_do_not_interfere() {
    let mut ledger = TokenLedger::new();
    assert!(ledger.check(&ask(0, 1), MshrPartition::Copyback, 1));
    assert!(ledger.check(&ask(1, 1), MshrPartition::Request, 1));
    assert_eq!(ledger.granted(MshrPartition::Copyback), 1);
    assert_eq!(ledger.granted(MshrPartition::Request), 1);
}

/// Removing an unknown package reports that nothing was removed.
#[test]
fn remove_unknown() {
    let mut ledger = TokenLedger::new();
    assert!(!ledger.remove(&ask(3, 3)));
    assert!(ledger.is_empty());
}

proptest! {
    /// With a fixed number of free slots, no more tokens than slots are ever
    /// outstanding, and they go to the earliest askers.
    #[test]
    fn grants_never_exceed_free_slots(free in 0usize..6, askers in 1usize..16, rounds in 1usize..4) {
        let mut ledger = TokenLedger::new();
        let packages: Vec<MemoryPackage> = (0..askers).map(|n| ask(n, 1)).collect();
        for _ in 0..rounds {
            for package in &packages {
                let _ = ledger.check(package, MshrPartition::Request, free);
            }
            prop_assert!(ledger.granted(MshrPartition::Request) <= free);
        }
        prop_assert_eq!(ledger.granted(MshrPartition::Request), free.min(askers));
        for package in packages.iter().take(free) {
            prop_assert!(ledger.check(package, MshrPartition::Request, 0));
        }
    }
}
