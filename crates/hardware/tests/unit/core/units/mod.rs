/// Cache storage, MSHR, token ledger, and replacement policies.
pub mod cache;


/// Sub-block and dead-block line-usage predictors.
pub mod usage;
