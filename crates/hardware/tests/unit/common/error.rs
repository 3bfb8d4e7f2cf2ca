//! Error Type Tests.
//!
//! Verifies the constructors and the rendered messages of `SimError`.

use cohsim_core::common::error::SimError;
use cohsim_core::core::package::MemoryOperation;

/// Configuration errors name the component and the reason.
#[test]
fn config_error_message() {
    let error = SimError::config("L2", "line number is zero");
    assert_eq!(
        error.to_string(),
        "invalid configuration for L2: line number is zero"
    );
}

/// Invariant errors carry the address in hex and the operation name.
#[test]
fn invariant_error_message() {
    let error = SimError::invariant("L1_0", 0x1040, MemoryOperation::Copyback, "dirty drop");
    assert_eq!(
        error.to_string(),
        "L1_0: dirty drop (address 0x1040, operation COPYBACK)"
    );
}

/// Watchdog errors report both the born cycle and the current cycle.
#[test]
fn watchdog_error_message() {
    let error = SimError::Watchdog {
        component: "MEM0".to_string(),
        address: 0x80,
        operation: MemoryOperation::Read,
        born_cycle: 10,
        cycle: 5000,
    };
    let text = error.to_string();
    assert!(text.starts_with("MEM0: READ to 0x80"));
    assert!(text.contains("born at cycle 10"));
    assert!(text.ends_with("alive at cycle 5000"));
}

/// Trace errors use one-based line numbers.
#[test]
fn trace_error_message() {
    let error = SimError::Trace {
        line: 3,
        reason: "missing address".to_string(),
    };
    assert_eq!(error.to_string(), "trace line 3: missing address");
}

/// Malformed JSON converts through `?`.
#[test]
fn json_error_converts() {
    let parsed: Result<serde_json::Value, SimError> =
        serde_json::from_str::<serde_json::Value>("{").map_err(SimError::from);
    assert!(matches!(parsed, Err(SimError::Json(_))));
}
