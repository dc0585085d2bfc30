// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Physical switches and switch ports.

use std::fmt::Display;

/// Identifier of a switch (its datapath id).
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// A port number, local to a switch.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct PortNumber(pub u32);

/// A port of a physical switch.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct SwitchPort {
    pub node: NodeId,
    pub port: PortNumber,
}

impl SwitchPort {
    #[must_use]
    pub fn new(node: NodeId, port: u32) -> Self {
        Self {
            node,
            port: PortNumber(port),
        }
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OF|{:016x}", self.0)
    }
}

impl Display for PortNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for SwitchPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.node, self.port)
    }
}

/// Selects switch ports, e.g. the ports whose hosts must be inactivated after a
/// topology change.
pub trait PortFilter {
    fn accept(&self, port: &SwitchPort) -> bool;
}

impl<F> PortFilter for F
where
    F: Fn(&SwitchPort) -> bool,
{
    fn accept(&self, port: &SwitchPort) -> bool {
        self(port)
    }
}

/// Accepts every port of a switch.
#[derive(Debug, Clone, Copy)]
pub struct NodePortFilter(pub NodeId);

impl PortFilter for NodePortFilter {
    fn accept(&self, port: &SwitchPort) -> bool {
        port.node == self.0
    }
}

/// Accepts a single port.
#[derive(Debug, Clone, Copy)]
pub struct SpecificPortFilter(pub SwitchPort);

impl PortFilter for SpecificPortFilter {
    fn accept(&self, port: &SwitchPort) -> bool {
        *port == self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters() {
        let p1 = SwitchPort::new(NodeId(1), 1);
        let p2 = SwitchPort::new(NodeId(1), 2);
        let p3 = SwitchPort::new(NodeId(2), 1);

        let node = NodePortFilter(NodeId(1));
        assert!(node.accept(&p1) && node.accept(&p2) && !node.accept(&p3));

        let one = SpecificPortFilter(p2);
        assert!(!one.accept(&p1) && one.accept(&p2));

        let closure = |p: &SwitchPort| p.port.0 == 1;
        assert!(closure.accept(&p1) && closure.accept(&p3) && !closure.accept(&p2));
        assert_eq!(p1.to_string(), "OF|0000000000000001/1");
    }
}
