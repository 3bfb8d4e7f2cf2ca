
/// Whole-run behavior of the simulator loop.
pub mod simulator;
