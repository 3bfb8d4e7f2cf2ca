//! System construction and the per-cycle component clocks.
//!
//! This module builds the simulated hierarchy from configuration and moves packages
//! through it. It performs:
//! 1. **Topology:** Resolves cache labels into arena indices, rejects cycles, computes
//!    hierarchy levels, and checks that every level covers all banks below it.
//! 2. **Wiring:** Registers every endpoint on the interconnect and connects requesters to
//!    first-level caches, caches to their lower levels, and last-level caches to memory.
//! 3. **Sending:** Port, token, route, and latency handling for one package hop.
//! 4. **Clocking:** The fixed per-cycle order of requesters, caches, and memory controllers.
//! 5. **Checks:** Watchdog ages and the single-writer invariant.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

use crate::common::error::SimError;
use crate::common::ids::ComponentId;
use crate::config::Config;
use crate::core::directory::{DirectoryController, MemoryRoute};
use crate::core::package::{MemoryPackage, PackageState};
use crate::core::units::cache::CacheMemory;
use crate::sim::context::SimContext;
use crate::sim::requester::TraceRequester;
use crate::soc::interconnect::Interconnect;
use crate::soc::memory::MemoryController;
use crate::soc::traits::Transport;

/// The simulated system: every component plus the directory and interconnect.
#[derive(Debug)]
pub struct System {
    /// Cycle and global parameters.
    pub ctx: SimContext,
    /// Cache arena, in configuration (and clock) order.
    pub caches: Vec<CacheMemory>,
    /// Coherence directory.
    pub directory: DirectoryController,
    /// Memory controllers.
    pub memories: Vec<MemoryController>,
    /// Trace-driven requesters.
    pub requesters: Vec<TraceRequester>,
    /// Connection graph.
    pub interconnect: Interconnect,
}

/// Rejects a lower-level graph with a cycle.
fn check_acyclic(caches: &[CacheMemory]) -> Result<(), SimError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(caches: &[CacheMemory], marks: &mut [Mark], id: usize) -> Result<(), SimError> {
        match marks[id] {
            Mark::Done => return Ok(()),
            Mark::Active => {
                return Err(SimError::config(
                    &caches[id].label,
                    "the lower-level graph contains a cycle",
                ));
            }
            Mark::New => {}
        }
        marks[id] = Mark::Active;
        for &lower in &caches[id].lower_level {
            visit(caches, marks, lower)?;
        }
        marks[id] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::New; caches.len()];
    for id in 0..caches.len() {
        visit(caches, &mut marks, id)?;
    }
    Ok(())
}

/// Level of `id`: 1 without higher levels, otherwise one more than the deepest higher level.
fn hierarchy_level(caches: &[CacheMemory], levels: &mut [usize], id: usize) -> usize {
    if levels[id] == 0 {
        let above = caches[id]
            .higher_level
            .clone()
            .into_iter()
            .map(|h| hierarchy_level(caches, levels, h))
            .max()
            .unwrap_or(0);
        levels[id] = above + 1;
    }
    levels[id]
}

/// Checks that `banks` (bank number, total banks) cover every bank exactly once.
fn check_bank_coverage(component: &str, what: &str, banks: &[(usize, usize)]) -> Result<(), SimError> {
    let Some(&(_, total)) = banks.first() else {
        return Err(SimError::config(component, format!("no {what} configured")));
    };
    if banks.iter().any(|&(_, t)| t != total) {
        return Err(SimError::config(
            component,
            format!("{what} disagree on the number of banks"),
        ));
    }
    let covered: BTreeSet<usize> = banks.iter().map(|&(bank, _)| bank).collect();
    if covered.len() != banks.len() || covered.len() != total {
        return Err(SimError::config(
            component,
            format!("{what} do not cover each of the {total} banks exactly once"),
        ));
    }
    Ok(())
}

impl System {
    /// Builds the system described by `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Full simulator configuration.
    ///
    /// # Returns
    ///
    /// The wired system at cycle 0, or `SimError::InvalidConfig` when the
    /// configuration describes hardware that cannot be built.
    pub fn new(config: &Config) -> Result<Self, SimError> {
        let line_size = config.general.line_size;
        if line_size == 0 || !line_size.is_power_of_two() {
            return Err(SimError::config(
                "general",
                format!("line size must be a power of two (got {line_size})"),
            ));
        }
        if config.caches.is_empty() {
            return Err(SimError::config("system", "no caches configured"));
        }

        let mut labels: HashMap<String, ComponentId> = HashMap::new();
        let mut register = |label: &str, id: ComponentId| -> Result<(), SimError> {
            if labels.insert(label.to_string(), id).is_some() {
                return Err(SimError::config(label, "duplicate component label"));
            }
            Ok(())
        };
        for (id, cache) in config.caches.iter().enumerate() {
            register(&cache.label, ComponentId::Cache(id))?;
        }
        for (id, memory) in config.memory_controllers.iter().enumerate() {
            register(&memory.label, ComponentId::Memory(id))?;
        }
        for (id, requester) in config.requesters.iter().enumerate() {
            register(&requester.label, ComponentId::Requester(id))?;
        }
        let cache_index = |owner: &str, label: &str| -> Result<usize, SimError> {
            labels
                .get(label)
                .and_then(|id| id.cache())
                .ok_or_else(|| SimError::config(owner, format!("unknown cache '{label}'")))
        };

        let mut caches = config
            .caches
            .iter()
            .enumerate()
            .map(|(id, cfg)| CacheMemory::new(id, cfg, line_size))
            .collect::<Result<Vec<_>, _>>()?;
        for (id, cfg) in config.caches.iter().enumerate() {
            for lower in &cfg.lower_level {
                let lower = cache_index(&cfg.label, lower)?;
                if lower == id {
                    return Err(SimError::config(&cfg.label, "a cache cannot be its own lower level"));
                }
                caches[id].lower_level.push(lower);
                caches[lower].higher_level.push(id);
            }
        }
        check_acyclic(&caches)?;

        let mut levels = vec![0; caches.len()];
        for id in 0..caches.len() {
            let level = hierarchy_level(&caches, &mut levels, id);
            caches[id].hierarchy_level = level;
        }
        for cache in &caches {
            if cache.is_llc() {
                continue;
            }
            let banks: Vec<(usize, usize)> = cache
                .lower_level
                .iter()
                .map(|&l| (caches[l].bank_number, config.caches[l].total_banks))
                .collect();
            check_bank_coverage(&cache.label, "lower-level caches", &banks)?;
        }

        let memories = config
            .memory_controllers
            .iter()
            .enumerate()
            .map(|(id, cfg)| MemoryController::new(id, cfg, line_size))
            .collect::<Result<Vec<_>, _>>()?;
        let banks: Vec<(usize, usize)> = config
            .memory_controllers
            .iter()
            .map(|m| (m.controller_number, m.total_controllers))
            .collect();
        check_bank_coverage("system", "memory controllers", &banks)?;

        let mut directory = DirectoryController::new(&config.directory, line_size);
        let llc_caches: Vec<usize> = caches
            .iter()
            .filter(|c| c.is_llc())
            .map(|c| c.id)
            .collect();
        directory.set_llc_caches(llc_caches.clone());
        for memory in &memories {
            directory.add_memory_route(MemoryRoute {
                memory: memory.id,
                decoder: memory.decoder,
                controller_number: memory.controller_number,
            });
        }

        let mut requesters = Vec::with_capacity(config.requesters.len());
        for (id, cfg) in config.requesters.iter().enumerate() {
            let data = cache_index(&cfg.label, &cfg.data_cache)?;
            let inst = cfg
                .inst_cache
                .as_deref()
                .map(|label| cache_index(&cfg.label, label))
                .transpose()?;
            requesters.push(TraceRequester::new(id, cfg, data, inst));
        }

        let mut interconnect = Interconnect::new(line_size);
        for cache in &caches {
            interconnect.add_endpoint(
                ComponentId::Cache(cache.id),
                cache.interconnection_latency,
                cache.interconnection_width,
            );
        }
        for memory in &memories {
            interconnect.add_endpoint(
                ComponentId::Memory(memory.id),
                memory.interconnection_latency,
                memory.interconnection_width,
            );
        }
        for (id, cfg) in config.requesters.iter().enumerate() {
            let me = ComponentId::Requester(id);
            interconnect.add_endpoint(me, cfg.interconnection_latency, cfg.interconnection_width);
            interconnect.connect(me, ComponentId::Cache(cache_index(&cfg.label, &cfg.data_cache)?));
            if let Some(inst) = cfg.inst_cache.as_deref() {
                interconnect.connect(me, ComponentId::Cache(cache_index(&cfg.label, inst)?));
            }
        }
        for cache in &caches {
            for &lower in &cache.lower_level {
                interconnect.connect(ComponentId::Cache(cache.id), ComponentId::Cache(lower));
            }
        }
        for &llc in &llc_caches {
            for memory in &memories {
                interconnect.connect(ComponentId::Cache(llc), ComponentId::Memory(memory.id));
            }
        }

        tracing::info!(
            caches = caches.len(),
            llc = llc_caches.len(),
            memories = memories.len(),
            requesters = requesters.len(),
            "system built"
        );

        Ok(Self {
            ctx: SimContext::new(&config.general),
            caches,
            directory,
            memories,
            requesters,
            interconnect,
        })
    }

    /// The endpoint named by `id`.
    pub fn component_mut(&mut self, id: ComponentId) -> Result<&mut dyn Transport, SimError> {
        let component: Option<&mut dyn Transport> = match id {
            ComponentId::Requester(i) => self.requesters.get_mut(i).map(|c| c as &mut dyn Transport),
            ComponentId::Cache(i) => self.caches.get_mut(i).map(|c| c as &mut dyn Transport),
            ComponentId::Memory(i) => self.memories.get_mut(i).map(|c| c as &mut dyn Transport),
        };
        component.ok_or_else(|| SimError::config(id.to_string(), "unknown component"))
    }

    /// Sends `package` from `src` to its destination over one hop.
    ///
    /// # Arguments
    ///
    /// * `src` - Sending endpoint.
    /// * `package` - The package; its `id_dst` names the receiver.
    ///
    /// # Returns
    ///
    /// `Some(latency)` when the receiver accepted the package, `None` when the
    /// sender's port is busy, the receiver denied the token, or its input port is busy.
    pub fn send_package(
        &mut self,
        src: ComponentId,
        package: &mut MemoryPackage,
    ) -> Result<Option<u64>, SimError> {
        let now = self.ctx.cycle;
        let dst = package.id_dst;
        let ports = *self.component_mut(src)?.ports();
        let port_ready = if package.is_answer {
            ports.send_answer_ready
        } else {
            ports.send_request_ready
        };
        if port_ready > now {
            return Ok(None);
        }
        if !package.is_answer && !self.component_mut(dst)?.check_token_list(package) {
            return Ok(None);
        }

        self.interconnect.find_package_route(package)?;
        let _ = self.interconnect.take_hop(package)?;
        let latency = self.interconnect.transit_time(package);
        let input = self.interconnect.input_port(src, dst);
        if !self
            .component_mut(dst)?
            .receive_package(package, input, latency, now)?
        {
            package.hop_count = Some(0);
            return Ok(None);
        }

        tracing::trace!(%src, %dst, latency, %package, "sent");
        let ports = self.component_mut(src)?.ports();
        if package.is_answer {
            ports.send_answer_ready = now + latency;
        } else {
            ports.send_request_ready = now + latency;
        }
        Ok(Some(latency))
    }

    /// Runs one cycle of every component in the fixed order: requesters, caches
    /// (arena order), then memory controllers.
    pub fn clock(&mut self) -> Result<(), SimError> {
        for id in 0..self.requesters.len() {
            self.clock_requester(id)?;
        }
        for id in 0..self.caches.len() {
            self.clock_cache(id)?;
        }
        for id in 0..self.memories.len() {
            self.clock_memory(id)?;
        }
        Ok(())
    }

    fn clock_requester(&mut self, id: usize) -> Result<(), SimError> {
        let now = self.ctx.cycle;
        let Some(mut package) = self.requesters[id].next_request(now) else {
            return Ok(());
        };
        match self.send_package(ComponentId::Requester(id), &mut package)? {
            Some(_) => self.requesters[id].request_sent(now),
            None => self.requesters[id].request_stalled(),
        }
        Ok(())
    }

    /// One cycle of a cache: release, send one answer, send the oldest request the
    /// receiver admits, treat one answer, treat one request, then issue one prefetch.
    fn clock_cache(&mut self, id: usize) -> Result<(), SimError> {
        let now = self.ctx.cycle;
        let me = ComponentId::Cache(id);
        self.caches[id].release_ready(now);

        let ready = |state: PackageState, answer: bool| {
            move |p: &MemoryPackage| p.state == state && p.is_answer == answer && p.ready_cycle <= now
        };

        if let Some(slot) = self.caches[id].mshr.find(ready(PackageState::Transmit, true)) {
            let mut package = self.caches[id].mshr.get(slot).clone();
            if let Some(latency) = self.send_package(me, &mut package)? {
                package.package_ready(latency, now);
                self.caches[id].mshr.replace(slot, package);
            }
        }

        // A denied request must not block younger ones: their tokens may be the
        // ones standing ahead of it in the receiver's ledger.
        let sendable: Vec<usize> = self.caches[id]
            .mshr
            .iter()
            .filter(|&(_, p)| ready(PackageState::Transmit, false)(p))
            .map(|(slot, _)| slot)
            .collect();
        for slot in sendable {
            let mut package = self.caches[id].mshr.get(slot).clone();
            if let Some(latency) = self.send_package(me, &mut package)? {
                match self
                    .directory
                    .treat_cache_request_sent(&self.caches, id, &package)?
                {
                    PackageState::Ready => package.package_ready(latency, now),
                    _ => package.package_wait(latency, now),
                }
                self.caches[id].mshr.replace(slot, package);
                break;
            }
            if self.caches[id].ports.send_request_ready > now {
                break;
            }
        }

        if let Some(slot) = self.caches[id].mshr.find(ready(PackageState::Untreated, true)) {
            let mut package = self.caches[id].mshr.get(slot).clone();
            let _ = self
                .directory
                .treat_cache_answer(&mut self.caches, id, &mut package, &self.ctx)?;
            self.caches[id].mshr.replace(slot, package);
        }

        if let Some(slot) = self.caches[id].mshr.find(ready(PackageState::Untreated, false)) {
            let mut package = self.caches[id].mshr.get(slot).clone();
            let state = self
                .directory
                .treat_cache_request(&mut self.caches, id, &mut package, &self.ctx)?;
            if state == PackageState::Untreated && !package.is_answer {
                package.born_cycle = now;
            }
            self.caches[id].mshr.replace(slot, package);
        }

        self.caches[id].issue_prefetch(now);
        Ok(())
    }

    /// One cycle of a memory controller: release, send one answer, serve one request.
    fn clock_memory(&mut self, id: usize) -> Result<(), SimError> {
        let now = self.ctx.cycle;
        self.memories[id].release_ready(now);
        if let Some(slot) = self.memories[id].next_answer(now) {
            let mut package = self.memories[id].buffer.get(slot).clone();
            if self
                .send_package(ComponentId::Memory(id), &mut package)?
                .is_some()
            {
                self.memories[id].buffer.release(slot);
            }
        }
        self.memories[id].serve_next(now);
        Ok(())
    }

    /// Fails on any entry older than `max_alive_time`, or on two writers of one line.
    pub fn check(&self) -> Result<(), SimError> {
        let now = self.ctx.cycle;
        let max = self.ctx.max_alive_time;
        let watchdog = |component: &str, package: &MemoryPackage| {
            tracing::warn!(component, %package, "watchdog expired");
            SimError::Watchdog {
                component: component.to_string(),
                address: package.memory_address,
                operation: package.memory_operation,
                born_cycle: package.born_cycle,
                cycle: now,
            }
        };
        for requester in &self.requesters {
            if let Some(package) = requester.check_age(now, max) {
                return Err(watchdog(&requester.label, package));
            }
        }
        for cache in &self.caches {
            if let Some(package) = cache.mshr.check_age(now, max) {
                return Err(watchdog(&cache.label, package));
            }
        }
        for memory in &self.memories {
            if let Some(package) = memory.buffer.check_age(now, max) {
                return Err(watchdog(&memory.label, package));
            }
        }
        self.directory.check_age(now, max)?;
        self.directory.check_single_writer(&self.caches)
    }

    /// Whether every trace is replayed and no transaction is in flight.
    pub fn is_idle(&self) -> bool {
        self.requesters.iter().all(TraceRequester::is_finished)
            && self
                .caches
                .iter()
                .all(|c| c.mshr.is_empty() && c.queued_prefetches() == 0)
            && self.memories.iter().all(|m| m.buffer.is_empty())
            && self.directory.open_lines() == 0
    }

    /// Clears every statistics block.
    pub fn reset_statistics(&mut self) {
        self.caches.iter_mut().for_each(CacheMemory::reset_statistics);
        self.memories
            .iter_mut()
            .for_each(MemoryController::reset_statistics);
        self.requesters
            .iter_mut()
            .for_each(TraceRequester::reset_statistics);
        self.directory.reset_statistics();
    }

    /// Renders the configuration of every component.
    pub fn print_configuration(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "SYSTEM line_size {} | inclusiveness {:?} | llc {:?}",
            self.ctx.line_size,
            self.directory.inclusiveness(),
            self.directory.llc_caches()
        );
        for cache in &self.caches {
            out.push_str(&cache.print_configuration());
        }
        for memory in &self.memories {
            out.push_str(&memory.print_configuration());
        }
        out
    }

    /// Renders the internal state of every component and the directory.
    pub fn dump_structures(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "CYCLE {}", self.ctx.cycle);
        for requester in &self.requesters {
            out.push_str(&requester.print_structures());
        }
        for cache in &self.caches {
            out.push_str(&cache.print_structures());
        }
        for memory in &self.memories {
            out.push_str(&memory.print_structures());
        }
        out.push_str(&self.directory.dump());
        out
    }
}
