//! Point-to-point interconnect between hierarchy endpoints.
//!
//! This module routes packages between requesters, caches, and memory controllers. It provides:
//! 1. **Endpoint registration:** Each endpoint declares its link latency and width.
//! 2. **Routing:** Every connected pair is one hop; the route stores the sender's output port.
//! 3. **Transit time:** Control-only packages pay the base latency; packages carrying a line
//!    pay it once per link-width transfer.

use std::collections::HashMap;

use crate::common::error::SimError;
use crate::common::ids::ComponentId;
use crate::core::package::{MemoryOperation, MemoryPackage};

/// Link parameters of one endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// Base cycles per transfer.
    pub latency: u64,
    /// Bytes per transfer.
    pub width: usize,
}

/// Connection graph of the simulated system.
#[derive(Clone, Debug)]
pub struct Interconnect {
    endpoints: HashMap<ComponentId, Endpoint>,
    /// Output ports of each endpoint; port `p` leads to `ports[id][p]`.
    ports: HashMap<ComponentId, Vec<ComponentId>>,
    line_size: usize,
}

impl Interconnect {
    /// Creates an interconnect with no endpoints.
    ///
    /// # Arguments
    ///
    /// * `line_size` - Bytes carried by a package holding a whole line.
    pub fn new(line_size: usize) -> Self {
        Self {
            endpoints: HashMap::new(),
            ports: HashMap::new(),
            line_size,
        }
    }

    /// Registers an endpoint with its link parameters.
    pub fn add_endpoint(&mut self, id: ComponentId, latency: u64, width: usize) {
        let _ = self.endpoints.insert(id, Endpoint { latency, width: width.max(1) });
        let _ = self.ports.entry(id).or_default();
    }

    /// Connects two endpoints in both directions.
    pub fn connect(&mut self, a: ComponentId, b: ComponentId) {
        for (from, to) in [(a, b), (b, a)] {
            let ports = self.ports.entry(from).or_default();
            if !ports.contains(&to) {
                ports.push(to);
            }
        }
    }

    /// Whether `a` can send directly to `b`.
    pub fn is_connected(&self, a: ComponentId, b: ComponentId) -> bool {
        self.ports.get(&a).is_some_and(|ports| ports.contains(&b))
    }

    /// Writes the route from `id_src` to `id_dst` into `package`.
    ///
    /// # Returns
    ///
    /// An error if the two endpoints are not connected.
    pub fn find_package_route(&self, package: &mut MemoryPackage) -> Result<(), SimError> {
        let port = self
            .ports
            .get(&package.id_src)
            .and_then(|ports| ports.iter().position(|&to| to == package.id_dst))
            .ok_or_else(|| {
                SimError::invariant(
                    package.id_src.to_string(),
                    package.memory_address,
                    package.memory_operation,
                    format!("no route to {}", package.id_dst),
                )
            })?;
        package.hops = vec![port];
        package.hop_count = Some(0);
        Ok(())
    }

    /// Consumes the next hop of the route.
    ///
    /// # Returns
    ///
    /// The output port taken.
    pub fn take_hop(&self, package: &mut MemoryPackage) -> Result<usize, SimError> {
        let port = package
            .hop_count
            .and_then(|hop| package.hops.get(hop).copied())
            .ok_or_else(|| {
                SimError::invariant(
                    package.id_src.to_string(),
                    package.memory_address,
                    package.memory_operation,
                    "package has no hop left to take",
                )
            })?;
        let next = package.hop_count.map_or(0, |hop| hop + 1);
        package.hop_count = (next < package.hops.len()).then_some(next);
        Ok(port)
    }

    /// Input port of `dst` on which packages from `src` arrive.
    pub fn input_port(&self, src: ComponentId, dst: ComponentId) -> usize {
        self.ports
            .get(&dst)
            .and_then(|ports| ports.iter().position(|&from| from == src))
            .unwrap_or(0)
    }

    /// Cycles `package` spends on the link between its source and destination.
    ///
    /// Read-type requests and answers to writes carry no line and pay the base
    /// latency (the larger of the two endpoints). Writes, copybacks, and answers
    /// to read-type requests carry a line and pay the base latency once per
    /// transfer of the narrower link.
    pub fn transit_time(&self, package: &MemoryPackage) -> u64 {
        let (Some(src), Some(dst)) = (
            self.endpoints.get(&package.id_src),
            self.endpoints.get(&package.id_dst),
        ) else {
            return 1;
        };
        let low = src.latency.max(dst.latency);
        let width = src.width.min(dst.width);
        let transfers = self.line_size.div_ceil(width) as u64;
        let high = low * transfers.max(1);

        let carries_line = if package.is_answer {
            package.memory_operation.is_read_type()
        } else {
            matches!(
                package.memory_operation,
                MemoryOperation::Write | MemoryOperation::Copyback
            )
        };
        if carries_line { high } else { low }
    }
}
