// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Keys of the mapping tables.

use crate::{Mac, NodeId, SwitchPort, VlanId};
use std::fmt::Display;

/// A physical broadcast domain: a VLAN on a switch port.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct PortVlan {
    pub port: SwitchPort,
    pub vlan: VlanId,
}

/// Scope of a VLAN mapping: a VLAN on one switch, or on all switches if `node`
/// is `None`.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct NodeVlan {
    pub node: Option<NodeId>,
    pub vlan: VlanId,
}

/// A host on a VLAN. A `None` address is the VLAN-wide wildcard of a MAC mapping.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct MacVlan {
    pub mac: Option<Mac>,
    pub vlan: VlanId,
}

impl PortVlan {
    #[must_use]
    pub fn new(port: SwitchPort, vlan: VlanId) -> Self {
        Self { port, vlan }
    }
    /// The node-specific VLAN mapping scope covering this port.
    #[must_use]
    pub fn node_vlan(&self) -> NodeVlan {
        NodeVlan::node(self.port.node, self.vlan)
    }
}

impl NodeVlan {
    #[must_use]
    pub fn node(node: NodeId, vlan: VlanId) -> Self {
        Self {
            node: Some(node),
            vlan,
        }
    }
    #[must_use]
    pub fn any_node(vlan: VlanId) -> Self {
        Self { node: None, vlan }
    }
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.node.is_none()
    }
    #[must_use]
    pub fn contains(&self, pv: &PortVlan) -> bool {
        self.vlan == pv.vlan && self.node.is_none_or(|n| n == pv.port.node)
    }
}

impl MacVlan {
    #[must_use]
    pub fn host(mac: Mac, vlan: VlanId) -> Self {
        Self {
            mac: Some(mac),
            vlan,
        }
    }
    #[must_use]
    pub fn wildcard(vlan: VlanId) -> Self {
        Self { mac: None, vlan }
    }
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.mac.is_none()
    }
    /// The wildcard entry covering this host's VLAN.
    #[must_use]
    pub fn as_wildcard(&self) -> Self {
        Self::wildcard(self.vlan)
    }
}

impl Display for PortVlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@vlan={}", self.port, self.vlan)
    }
}

impl Display for NodeVlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.node {
            Some(node) => write!(f, "{node}@vlan={}", self.vlan),
            None => write!(f, "ANY@vlan={}", self.vlan),
        }
    }
}

impl Display for MacVlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mac {
            Some(mac) => write!(f, "{mac}@vlan={}", self.vlan),
            None => write!(f, "ANY@vlan={}", self.vlan),
        }
    }
}
