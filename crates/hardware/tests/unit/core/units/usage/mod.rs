/// Dead-block predictor tests.
pub mod dead_block;

/// Sub-block predictor tests.
pub mod sub_block;
