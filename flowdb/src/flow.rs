// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Forwarding rules as programmed into a switch.

use model::{Mac, NodeId, SwitchPort, VlanId};
use std::fmt::Display;

/// Match fields of a rule. `None` is a wildcard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowMatch {
    pub in_port: Option<SwitchPort>,
    pub src: Option<Mac>,
    pub dst: Option<Mac>,
    /// [`VlanId::UNTAGGED`] matches frames without a VLAN tag.
    pub vlan: Option<VlanId>,
    pub vlan_pcp: Option<u8>,
}

impl FlowMatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn in_port(mut self, port: SwitchPort) -> Self {
        self.in_port = Some(port);
        self
    }

    #[must_use]
    pub fn src(mut self, mac: Mac) -> Self {
        self.src = Some(mac);
        self
    }

    #[must_use]
    pub fn dst(mut self, mac: Mac) -> Self {
        self.dst = Some(mac);
        self
    }

    #[must_use]
    pub fn vlan(mut self, vlan: VlanId) -> Self {
        self.vlan = Some(vlan);
        self
    }

    #[must_use]
    pub fn vlan_pcp(mut self, pcp: u8) -> Self {
        self.vlan_pcp = Some(pcp);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowAction {
    SetVlan(VlanId),
    StripVlan,
    Output(SwitchPort),
    Drop,
}

/// Identity of a rule within a switch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub node: NodeId,
    pub priority: u16,
    pub matches: FlowMatch,
}

/// One rule of a flow group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlowEntry {
    pub node: NodeId,
    pub priority: u16,
    pub matches: FlowMatch,
    pub actions: Vec<FlowAction>,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
}

impl FlowEntry {
    #[must_use]
    pub fn new(node: NodeId, priority: u16, matches: FlowMatch) -> Self {
        Self {
            node,
            priority,
            matches,
            actions: Vec::new(),
            idle_timeout: 0,
            hard_timeout: 0,
        }
    }

    #[must_use]
    pub fn action(mut self, action: FlowAction) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn timeouts(mut self, idle: u16, hard: u16) -> Self {
        self.idle_timeout = idle;
        self.hard_timeout = hard;
        self
    }

    #[must_use]
    pub fn key(&self) -> FlowKey {
        FlowKey {
            node: self.node,
            priority: self.priority,
            matches: self.matches.clone(),
        }
    }

    /// The ports output to by this rule.
    pub fn output_ports(&self) -> impl Iterator<Item = SwitchPort> + '_ {
        self.actions.iter().filter_map(|a| match a {
            FlowAction::Output(port) => Some(*port),
            _ => None,
        })
    }

    /// The input port followed by the output ports.
    pub fn ports(&self) -> impl Iterator<Item = SwitchPort> + '_ {
        self.matches.in_port.into_iter().chain(self.output_ports())
    }

    /// The VLAN of frames leaving this rule.
    #[must_use]
    pub fn output_vlan(&self) -> Option<VlanId> {
        self.actions.iter().fold(self.matches.vlan, |vlan, a| match a {
            FlowAction::SetVlan(v) => Some(*v),
            FlowAction::StripVlan => Some(VlanId::UNTAGGED),
            _ => vlan,
        })
    }
}

/// Some Open vSwitch releases report a VLAN priority in the match of a removed
/// rule that matched untagged frames. Drop it so the rule can be found again.
#[must_use]
pub fn fix_broken_ovs_flow(entry: &FlowEntry) -> FlowEntry {
    let mut fixed = entry.clone();
    if fixed.matches.vlan.is_some_and(VlanId::is_untagged) {
        fixed.matches.vlan_pcp = None;
    }
    fixed
}

impl Display for FlowMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        if let Some(port) = &self.in_port {
            write!(f, "in_port={port}")?;
            sep = ",";
        }
        if let Some(src) = &self.src {
            write!(f, "{sep}dl_src={src}")?;
            sep = ",";
        }
        if let Some(dst) = &self.dst {
            write!(f, "{sep}dl_dst={dst}")?;
            sep = ",";
        }
        if let Some(vlan) = &self.vlan {
            write!(f, "{sep}dl_vlan={vlan}")?;
            sep = ",";
        }
        if let Some(pcp) = &self.vlan_pcp {
            write!(f, "{sep}dl_vlan_pcp={pcp}")?;
        }
        Ok(())
    }
}

impl Display for FlowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowAction::SetVlan(vlan) => write!(f, "set_vlan:{vlan}"),
            FlowAction::StripVlan => write!(f, "strip_vlan"),
            FlowAction::Output(port) => write!(f, "output:{port}"),
            FlowAction::Drop => write!(f, "drop"),
        }
    }
}

impl Display for FlowEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "node {} priority {} [{}] actions=",
            self.node, self.priority, self.matches
        )?;
        for (n, action) in self.actions.iter().enumerate() {
            if n > 0 {
                write!(f, ",")?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(n: u32) -> SwitchPort {
        SwitchPort::new(NodeId(1), n)
    }

    #[test]
    fn ovs_pcp_quirk() {
        let reported = FlowEntry::new(
            NodeId(1),
            10,
            FlowMatch::new()
                .in_port(port(1))
                .vlan(VlanId::UNTAGGED)
                .vlan_pcp(0),
        );
        let fixed = fix_broken_ovs_flow(&reported);
        assert_eq!(fixed.matches.vlan_pcp, None);
        assert_ne!(fixed.key(), reported.key());

        let tagged = FlowEntry::new(
            NodeId(1),
            10,
            FlowMatch::new().vlan(VlanId::new(10).unwrap()).vlan_pcp(3),
        );
        assert_eq!(fix_broken_ovs_flow(&tagged), tagged);
    }

    #[test]
    fn output_vlan_follows_actions() {
        let vlan10 = VlanId::new(10).unwrap();
        let entry = FlowEntry::new(NodeId(1), 10, FlowMatch::new().in_port(port(1)).vlan(vlan10))
            .action(FlowAction::StripVlan)
            .action(FlowAction::Output(port(2)));
        assert_eq!(entry.output_vlan(), Some(VlanId::UNTAGGED));
        assert_eq!(entry.ports().collect::<Vec<_>>(), vec![port(1), port(2)]);
        assert_eq!(
            entry.to_string(),
            "node OF|0000000000000001 priority 10 [in_port=OF|0000000000000001/1,dl_vlan=10] \
             actions=strip_vlan,output:OF|0000000000000001/2"
        );
    }
}
