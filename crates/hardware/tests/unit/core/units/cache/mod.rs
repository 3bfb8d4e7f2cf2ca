/// Lookup, victim selection, MSHR allocation, and prefetch issue of `CacheMemory`.
pub mod cache_memory;



/// Token ledger admission control.
pub mod token;
