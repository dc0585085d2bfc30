// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow groups: the rules implementing one virtual packet path.

use model::{MacVlan, NodeId, PortVlan, SwitchPort, VNodePath};
use std::collections::BTreeSet;
use std::fmt::Display;

use crate::FlowEntry;

/// Identifier of a flow group, unique within a tenant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowGroupId(pub u64);

impl Display for FlowGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group-{:x}", self.0)
    }
}

/// A flow group. The first entry is the ingress rule, the others are the
/// downstream rules in path order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VtnFlow {
    group: FlowGroupId,
    entries: Vec<FlowEntry>,
    paths: BTreeSet<VNodePath>,
    source: Option<MacVlan>,
    destination: Option<MacVlan>,
}

impl VtnFlow {
    #[must_use]
    pub fn new(group: FlowGroupId) -> Self {
        Self {
            group,
            entries: Vec::new(),
            paths: BTreeSet::new(),
            source: None,
            destination: None,
        }
    }

    #[must_use]
    pub fn group(&self) -> FlowGroupId {
        self.group
    }

    pub fn add_entry(&mut self, entry: FlowEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Record a virtual node the packets of this flow pass through.
    pub fn add_path(&mut self, path: VNodePath) -> &mut Self {
        self.paths.insert(path);
        self
    }

    /// Record the hosts at both ends.
    pub fn set_hosts(&mut self, source: MacVlan, destination: MacVlan) -> &mut Self {
        self.source = Some(source);
        self.destination = Some(destination);
        self
    }

    #[must_use]
    pub fn entries(&self) -> &[FlowEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn ingress(&self) -> Option<&FlowEntry> {
        self.entries.first()
    }

    #[must_use]
    pub fn downstream(&self) -> &[FlowEntry] {
        self.entries.get(1..).unwrap_or_default()
    }

    #[must_use]
    pub fn paths(&self) -> &BTreeSet<VNodePath> {
        &self.paths
    }

    #[must_use]
    pub fn source(&self) -> Option<MacVlan> {
        self.source
    }

    #[must_use]
    pub fn destination(&self) -> Option<MacVlan> {
        self.destination
    }

    #[must_use]
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        self.entries.iter().map(|e| e.node).collect()
    }

    #[must_use]
    pub fn ports(&self) -> BTreeSet<SwitchPort> {
        self.entries.iter().flat_map(FlowEntry::ports).collect()
    }

    /// Where packets enter the physical network.
    #[must_use]
    pub fn incoming_network(&self) -> Option<PortVlan> {
        let ingress = self.ingress()?;
        Some(PortVlan::new(ingress.matches.in_port?, ingress.matches.vlan?))
    }

    /// Where packets leave the physical network.
    #[must_use]
    pub fn outgoing_network(&self) -> Option<PortVlan> {
        let last = self.entries.last()?;
        Some(PortVlan::new(last.output_ports().next()?, last.output_vlan()?))
    }

    /// Whether the packets of this flow pass through `path` or a node below it.
    #[must_use]
    pub fn depends_on(&self, path: &VNodePath) -> bool {
        self.paths.iter().any(|p| p.is_within(path))
    }
}

impl Display for VtnFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} ({} entries)", self.group, self.entries.len())?;
        for entry in &self.entries {
            writeln!(f, "  {entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FlowAction, FlowMatch};
    use model::{BridgePath, VlanId};

    #[test]
    fn networks_and_paths() {
        let vlan = VlanId::new(7).unwrap();
        let p1 = SwitchPort::new(NodeId(1), 1);
        let p2 = SwitchPort::new(NodeId(1), 2);
        let p3 = SwitchPort::new(NodeId(2), 3);
        let mut flow = VtnFlow::new(FlowGroupId(1));
        assert_eq!(flow.incoming_network(), None);
        flow.add_entry(
            FlowEntry::new(NodeId(1), 10, FlowMatch::new().in_port(p1).vlan(vlan))
                .action(FlowAction::Output(p2)),
        )
        .add_entry(
            FlowEntry::new(NodeId(2), 10, FlowMatch::new().vlan(vlan))
                .action(FlowAction::StripVlan)
                .action(FlowAction::Output(p3)),
        )
        .add_path(VNodePath::Interface {
            bridge: BridgePath::new("t1", "b1"),
            interface: "if1".to_string(),
        });

        assert_eq!(flow.incoming_network(), Some(PortVlan::new(p1, vlan)));
        assert_eq!(
            flow.outgoing_network(),
            Some(PortVlan::new(p3, VlanId::UNTAGGED))
        );
        assert_eq!(flow.nodes(), BTreeSet::from([NodeId(1), NodeId(2)]));
        assert_eq!(flow.ports(), BTreeSet::from([p1, p2, p3]));
        assert_eq!(flow.downstream().len(), 1);
        assert!(flow.depends_on(&VNodePath::Bridge(BridgePath::new("t1", "b1"))));
        assert!(!flow.depends_on(&VNodePath::Bridge(BridgePath::new("t1", "b2"))));
    }
}
