//! Transport trait for interconnect endpoints.
//!
//! This module defines the contract every endpoint (requester, cache, memory
//! controller) offers to the interconnect. It provides:
//! 1. **Receiving:** `receive_package` accepts or rejects an arriving package.
//! 2. **Admission control:** `check_token_list` / `remove_token_list` implement the
//!    token handshake an upstream sender performs before sending a request.
//! 3. **Ports:** Per-endpoint ready cycles of the send and receive ports.
//! 4. **Diagnostics:** `print_structures` renders the internal state for fatal dumps.

use crate::common::error::SimError;
use crate::core::package::MemoryPackage;

/// Ready cycles of an endpoint's ports. A port is free once `now >= ready`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortTimers {
    /// Output port for answers.
    pub send_answer_ready: u64,
    /// Output port for requests.
    pub send_request_ready: u64,
    /// Input port for answers.
    pub recv_answer_ready: u64,
    /// Input port for read-type requests.
    pub recv_read_ready: u64,
    /// Input port for writes and copybacks.
    pub recv_write_ready: u64,
}

/// Contract between the interconnect and an endpoint.
pub trait Transport {
    /// Label used in reports and fatal errors.
    fn label(&self) -> &str;

    /// Mutable access to the endpoint's port timers.
    fn ports(&mut self) -> &mut PortTimers;

    /// Delivers a package that finished its route.
    ///
    /// # Arguments
    ///
    /// * `package` - The arriving package; its route must be consumed.
    /// * `input_port` - Port of this endpoint the package arrives on.
    /// * `latency` - Transmission latency of the hop.
    /// * `now` - Current cycle.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if accepted, `Ok(false)` if the input port is busy, or an error if
    /// the package violates an invariant of the receiver.
    fn receive_package(
        &mut self,
        package: &MemoryPackage,
        input_port: usize,
        latency: u64,
        now: u64,
    ) -> Result<bool, SimError>;

    /// Asks for a token for `package`; `true` means the sender may send it.
    fn check_token_list(&mut self, package: &MemoryPackage) -> bool;

    /// Drops the token of `package`.
    fn remove_token_list(&mut self, package: &MemoryPackage);

    /// Renders the endpoint's internal state.
    fn print_structures(&self) -> String;
}
