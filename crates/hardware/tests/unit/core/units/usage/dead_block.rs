//! Dead-Block Predictor Tests.
//!
//! Verifies that the predictor learns per-address touch counts at eviction and
//! flags a resident line as dead once it reaches the learned count.

use cohsim_core::common::ids::ComponentId;
use cohsim_core::core::package::{MemoryOperation, MemoryPackage};
use cohsim_core::core::units::usage::{DeadBlockPredictor, DisabledPredictor, LineUsagePredictor};

fn access(addr: u64) -> MemoryPackage {
    MemoryPackage::new(ComponentId::Requester(0), 1, 0, addr, 8, MemoryOperation::Read, 0)
}

/// Nothing is dead before any eviction has been observed.
#[test]
fn untrained_lines_are_live() {
    let mut predictor = DeadBlockPredictor::new(4, 2, 64, 256);
    predictor.line_miss(&access(0x1000), 0, 0);
    for _ in 0..10 {
        predictor.line_hit(&access(0x1000), 0, 0);
    }
    assert!(!predictor.check_line_is_dead(0, 0));
}

/// The touch count at eviction becomes the prediction for the next residency.
#[test]
fn learns_count_at_eviction() {
    let mut predictor = DeadBlockPredictor::new(4, 2, 64, 256);
    predictor.line_miss(&access(0x1000), 0, 0);
    predictor.line_hit(&access(0x1000), 0, 0);
    predictor.line_hit(&access(0x1008), 0, 0);
    predictor.line_eviction(0, 0);
    assert_eq!(predictor.learned(0x1000), 3);

    predictor.line_miss(&access(0x1000), 0, 1);
    predictor.line_hit(&access(0x1000), 0, 1);
    assert!(!predictor.check_line_is_dead(0, 1));
    predictor.line_hit(&access(0x1000), 0, 1);
    assert!(predictor.check_line_is_dead(0, 1));
}

/// Invalidations reset the count without training.
#[test]
fn invalidation_does_not_train() {
    let mut predictor = DeadBlockPredictor::new(4, 2, 64, 256);
    predictor.line_miss(&access(0x2000), 1, 0);
    predictor.line_hit(&access(0x2000), 1, 0);
    predictor.line_invalidation(1, 0);
    assert_eq!(predictor.learned(0x2000), 0);
    predictor.line_eviction(1, 0);
    assert_eq!(predictor.learned(0x2000), 0);
}

/// The disabled predictor reports every present line as fully usable and live.
#[test]
fn disabled_predictor_is_neutral() {
    let mut predictor = DisabledPredictor;
    assert!(predictor.check_sub_block_is_hit(&access(0x40), 0, 0));
    assert!(!predictor.check_line_is_dead(0, 0));
}
