//! Cache hierarchy core.
//!
//! This module contains the memory-side building blocks of the simulator:
//! 1. **Packages:** The transaction record exchanged between components.
//! 2. **Units:** Caches, MSHRs, token ledgers, replacement policies, prefetchers,
//!    and line-usage predictors.
//! 3. **Directory:** The coherence directory that orders concurrent transactions
//!    and keeps the MOESI state of every cache consistent.

/// Coherence directory and MOESI protocol.
pub mod directory;

/// Memory transaction packages and their life-cycle states.
pub mod package;

/// Cache units, prefetchers, and line-usage predictors.
pub mod units;

pub use self::directory::DirectoryController;
pub use self::package::{MemoryOperation, MemoryPackage, PackageState};
pub use self::units::cache::CacheMemory;
