//! Common utilities and types used throughout the coherence simulator.
//!
//! This module provides the building blocks shared by every component. It includes:
//! 1. **Address Decoding:** Tag/index/bank/offset extraction for configurable mask layouts.
//! 2. **Identifiers:** Typed handles for requesters, caches, and memory controllers.
//! 3. **Error Handling:** The crate-wide fatal error type.

/// Address decomposition (tag, index, bank, offset).
pub mod addr;

/// Fatal simulator errors.
pub mod error;

/// Component identifiers used for routing and ownership.
pub mod ids;

pub use addr::AddressDecoder;
pub use error::SimError;
pub use ids::ComponentId;
