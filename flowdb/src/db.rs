// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The installed flow groups of one tenant.

use ahash::RandomState;
use model::{MacVlan, NodeId, PortVlan, SwitchPort, VNodePath};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracectl::trace_target;
use tracing::{debug, trace, warn};

use crate::{FlowCollector, FlowEntry, FlowGroupId, FlowKey, FlowModQueue, FlowModTask, VtnFlow};
use crate::fix_broken_ovs_flow;

trace_target!("flow-db", tracectl::LevelFilter::INFO, &["flowdb"]);

struct FlowIndex {
    next_group: u64,
    groups: BTreeMap<FlowGroupId, VtnFlow>,
    ingress: HashMap<FlowKey, FlowGroupId, RandomState>,
    nodes: HashMap<NodeId, BTreeSet<FlowGroupId>, RandomState>,
    ports: HashMap<SwitchPort, BTreeSet<FlowGroupId>, RandomState>,
}

fn unlink<K: Eq + std::hash::Hash>(
    index: &mut HashMap<K, BTreeSet<FlowGroupId>, RandomState>,
    key: &K,
    group: FlowGroupId,
) {
    if let Some(groups) = index.get_mut(key) {
        groups.remove(&group);
        if groups.is_empty() {
            index.remove(key);
        }
    }
}

// Rules are indexed as switches report them back.
fn ingress_key(entry: &FlowEntry) -> FlowKey {
    fix_broken_ovs_flow(entry).key()
}

impl FlowIndex {
    fn new() -> Self {
        Self {
            next_group: 1,
            groups: BTreeMap::new(),
            ingress: HashMap::with_hasher(RandomState::with_seed(0)),
            nodes: HashMap::with_hasher(RandomState::with_seed(0)),
            ports: HashMap::with_hasher(RandomState::with_seed(0)),
        }
    }

    fn allocate(&mut self) -> FlowGroupId {
        loop {
            let group = FlowGroupId(self.next_group);
            self.next_group = self.next_group.wrapping_add(1).max(1);
            if !self.groups.contains_key(&group) {
                return group;
            }
        }
    }

    fn insert(&mut self, flow: VtnFlow) -> bool {
        let Some(ingress) = flow.ingress().map(ingress_key) else {
            return false;
        };
        if self.ingress.contains_key(&ingress) || self.groups.contains_key(&flow.group()) {
            return false;
        }
        let group = flow.group();
        self.ingress.insert(ingress, group);
        for node in flow.nodes() {
            self.nodes.entry(node).or_default().insert(group);
        }
        for port in flow.ports() {
            self.ports.entry(port).or_default().insert(group);
        }
        self.groups.insert(group, flow);
        true
    }

    fn remove(&mut self, group: FlowGroupId) -> Option<VtnFlow> {
        let flow = self.groups.remove(&group)?;
        if let Some(ingress) = flow.ingress() {
            self.ingress.remove(&ingress_key(ingress));
        }
        for node in flow.nodes() {
            unlink(&mut self.nodes, &node, group);
        }
        for port in flow.ports() {
            unlink(&mut self.ports, &port, group);
        }
        Some(flow)
    }

    fn remove_all<I: IntoIterator<Item = FlowGroupId>>(&mut self, groups: I) -> Vec<VtnFlow> {
        groups.into_iter().filter_map(|g| self.remove(g)).collect()
    }

    fn candidates_by_port(&self, port: &SwitchPort) -> Vec<FlowGroupId> {
        self.ports
            .get(port)
            .map(|g| g.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// The flow groups of one tenant, indexed by ingress rule, group, switch and
/// switch port.
///
/// Switch programming is handed to the flow-mod worker once the index lock is
/// released.
pub struct FlowDatabase {
    tenant: String,
    index: Mutex<FlowIndex>,
    queue: FlowModQueue,
}

impl std::fmt::Debug for FlowDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowDatabase")
            .field("tenant", &self.tenant)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl FlowDatabase {
    #[must_use]
    pub fn new(tenant: &str, queue: FlowModQueue) -> Self {
        Self {
            tenant: tenant.to_string(),
            index: Mutex::new(FlowIndex::new()),
            queue,
        }
    }

    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// A new empty flow group with an unused identifier.
    pub fn create(&self) -> VtnFlow {
        VtnFlow::new(self.index.lock().allocate())
    }

    /// Index `flow` and have its rules installed. Returns false, and installs
    /// nothing, if its ingress rule is already indexed.
    pub fn install(&self, flow: VtnFlow) -> bool {
        let group = flow.group();
        let entries = flow.entries().to_vec();
        if !self.index.lock().insert(flow) {
            debug!("Not installing {group} of {}: duplicate or empty", self.tenant);
            return false;
        }
        trace!("Indexed {group} of {}", self.tenant);
        self.queue.submit(FlowModTask::Install { group, entries });
        true
    }

    fn uninstall(&self, flows: &[VtnFlow]) {
        let mut collector = FlowCollector::new();
        for flow in flows {
            collector.collect(flow);
        }
        if let Some(task) = collector.into_task() {
            self.queue.submit(task);
        }
    }

    fn remove_groups<F>(&self, what: &str, select: F) -> Vec<VtnFlow>
    where
        F: FnOnce(&FlowIndex) -> Vec<FlowGroupId>,
    {
        let removed = {
            let mut index = self.index.lock();
            let groups = select(&index);
            index.remove_all(groups)
        };
        if !removed.is_empty() {
            debug!("Removing {} flows of {} ({what})", removed.len(), self.tenant);
            self.uninstall(&removed);
        }
        removed
    }

    /// Remove the flows that pass through `node`.
    pub fn remove_flows_by_node(&self, node: NodeId) -> Vec<VtnFlow> {
        self.remove_groups(&format!("switch {node}"), |index| {
            index
                .nodes
                .get(&node)
                .map(|g| g.iter().copied().collect())
                .unwrap_or_default()
        })
    }

    /// Remove the flows that use `port`.
    pub fn remove_flows_by_port(&self, port: SwitchPort) -> Vec<VtnFlow> {
        self.remove_groups(&format!("port {port}"), |index| {
            index.candidates_by_port(&port)
        })
    }

    /// Remove the flows that enter or leave the physical network at `pv`.
    pub fn remove_flows_by_port_vlan(&self, pv: PortVlan) -> Vec<VtnFlow> {
        let tenant = self.tenant.as_str();
        self.remove_groups(&pv.to_string(), |index| {
            index
                .candidates_by_port(&pv.port)
                .into_iter()
                .filter(|group| {
                    let Some(flow) = index.groups.get(group) else {
                        return false;
                    };
                    if flow.incoming_network() == Some(pv) {
                        trace!("{group} of {tenant}: incoming network {pv}");
                        true
                    } else if flow.outgoing_network() == Some(pv) {
                        trace!("{group} of {tenant}: outgoing network {pv}");
                        true
                    } else {
                        false
                    }
                })
                .collect()
        })
    }

    /// Remove the flows that pass through the virtual node `path` or a node
    /// below it.
    pub fn remove_flows_by_path(&self, path: &VNodePath) -> Vec<VtnFlow> {
        self.remove_flows_where(&format!("path {path}"), |flow| flow.depends_on(path))
    }

    /// Remove the flows from or to `host`. With a port, only the flows that
    /// reach the host through that port.
    pub fn remove_flows_by_host(&self, host: MacVlan, port: Option<SwitchPort>) -> Vec<VtnFlow> {
        let at_port = |pv: Option<PortVlan>| port.is_none_or(|p| pv.is_some_and(|pv| pv.port == p));
        self.remove_flows_where(&format!("host {host}"), |flow| {
            (flow.source() == Some(host) && at_port(flow.incoming_network()))
                || (flow.destination() == Some(host) && at_port(flow.outgoing_network()))
        })
    }

    /// Remove the given flow groups.
    pub fn remove_flows(&self, groups: &[FlowGroupId]) -> Vec<VtnFlow> {
        self.remove_groups("list", |_| groups.to_vec())
    }

    /// Remove the flows selected by `pred`.
    pub fn remove_flows_where<P>(&self, what: &str, mut pred: P) -> Vec<VtnFlow>
    where
        P: FnMut(&VtnFlow) -> bool,
    {
        self.remove_groups(what, |index| {
            index
                .groups
                .values()
                .filter(|flow| {
                    if flow.is_empty() {
                        warn!("Empty flow group {} in {}", flow.group(), self.tenant);
                        return false;
                    }
                    pred(flow)
                })
                .map(VtnFlow::group)
                .collect()
        })
    }

    /// A switch reported that `entry` expired. The group it is the ingress rule
    /// of is dropped and its downstream rules uninstalled. The ingress rule is
    /// uninstalled too if `also_remove_ingress`.
    pub fn flow_removed(&self, entry: &FlowEntry, also_remove_ingress: bool) -> Option<VtnFlow> {
        let key = ingress_key(entry);
        let flow = {
            let mut index = self.index.lock();
            let group = index.ingress.get(&key).copied()?;
            index.remove(group)?
        };
        debug!("{} of {} expired", flow.group(), self.tenant);
        let mut collector = FlowCollector::new();
        if also_remove_ingress {
            collector.collect(&flow);
        } else {
            collector.collect_downstream(&flow);
        }
        if let Some(task) = collector.into_task() {
            self.queue.submit(task);
        }
        Some(flow)
    }

    #[must_use]
    pub fn contains_ingress_flow(&self, entry: &FlowEntry) -> bool {
        let key = ingress_key(entry);
        self.index.lock().ingress.contains_key(&key)
    }

    #[must_use]
    pub fn get_flow(&self, group: FlowGroupId) -> Option<VtnFlow> {
        self.index.lock().groups.get(&group).cloned()
    }

    #[must_use]
    pub fn flows(&self) -> Vec<VtnFlow> {
        self.index.lock().groups.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.lock().groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.lock().groups.is_empty()
    }

    /// Remove every flow group.
    pub fn clear(&self) -> Vec<VtnFlow> {
        self.remove_groups("all", |index| index.groups.keys().copied().collect())
    }

    /// Whether some index still refers to `group`.
    #[cfg(test)]
    pub(crate) fn is_referenced(&self, group: FlowGroupId) -> bool {
        let index = self.index.lock();
        index.groups.contains_key(&group)
            || index.ingress.values().any(|g| *g == group)
            || index.nodes.values().any(|g| g.contains(&group))
            || index.ports.values().any(|g| g.contains(&group))
    }
}
