// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! References to the virtual nodes that own a mapping.

use std::fmt::Display;

/// The kind of a mapping.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum MapType {
    Port,
    Vlan,
    Mac,
}

/// Path to a virtual bridge.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct BridgePath {
    pub tenant: String,
    pub bridge: String,
}

impl BridgePath {
    #[must_use]
    pub fn new(tenant: &str, bridge: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            bridge: bridge.to_string(),
        }
    }
}

/// Path to a virtual node that can own a mapping or a flow.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum VNodePath {
    Bridge(BridgePath),
    Interface { bridge: BridgePath, interface: String },
    VlanMap { bridge: BridgePath, map_id: String },
}

impl VNodePath {
    #[must_use]
    pub fn bridge(&self) -> &BridgePath {
        match self {
            VNodePath::Bridge(bridge)
            | VNodePath::Interface { bridge, .. }
            | VNodePath::VlanMap { bridge, .. } => bridge,
        }
    }

    /// Whether this path is `other` or lies below it.
    #[must_use]
    pub fn is_within(&self, other: &VNodePath) -> bool {
        match other {
            VNodePath::Bridge(b) => self.bridge() == b,
            _ => self == other,
        }
    }
}

/// Value-compared pointer to the owner of a mapping.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct MapReference {
    pub map_type: MapType,
    pub container: String,
    pub path: VNodePath,
}

impl MapReference {
    /// Reference to the port mapping of a virtual interface.
    #[must_use]
    pub fn port(container: &str, bridge: BridgePath, interface: &str) -> Self {
        Self {
            map_type: MapType::Port,
            container: container.to_string(),
            path: VNodePath::Interface {
                bridge,
                interface: interface.to_string(),
            },
        }
    }

    /// Reference to a VLAN mapping of a virtual bridge.
    #[must_use]
    pub fn vlan(container: &str, bridge: BridgePath, map_id: &str) -> Self {
        Self {
            map_type: MapType::Vlan,
            container: container.to_string(),
            path: VNodePath::VlanMap {
                bridge,
                map_id: map_id.to_string(),
            },
        }
    }

    /// Reference to the MAC mapping of a virtual bridge.
    #[must_use]
    pub fn mac(container: &str, bridge: BridgePath) -> Self {
        Self {
            map_type: MapType::Mac,
            container: container.to_string(),
            path: VNodePath::Bridge(bridge),
        }
    }

    #[must_use]
    pub fn bridge(&self) -> &BridgePath {
        self.path.bridge()
    }

    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.path.bridge().tenant
    }
}

impl Display for BridgePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.tenant, self.bridge)
    }
}

impl Display for VNodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VNodePath::Bridge(b) => write!(f, "{b}"),
            VNodePath::Interface { bridge, interface } => write!(f, "{bridge}.{interface}"),
            VNodePath::VlanMap { bridge, map_id } => write!(f, "{bridge}.vlanmap:{map_id}"),
        }
    }
}

impl Display for MapReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.map_type, self.container, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn references_compare_by_value() {
        let b = BridgePath::new("t1", "b1");
        let r1 = MapReference::mac("default", b.clone());
        let r2 = MapReference::mac("default", BridgePath::new("t1", "b1"));
        assert_eq!(r1, r2);
        assert_ne!(r1, MapReference::mac("other", b.clone()));
        assert_eq!(r1.to_string(), "MAC:default:t1.b1");

        let p = MapReference::port("default", b.clone(), "if1");
        assert_eq!(p.bridge(), &b);
        assert!(p.path.is_within(&VNodePath::Bridge(b.clone())));
        assert!(!p.path.is_within(&VNodePath::Bridge(BridgePath::new("t1", "b2"))));
    }

    #[test]
    fn references_survive_serialization() {
        let r = MapReference::vlan("default", BridgePath::new("t1", "b1"), "ANY.0");
        let yaml = serde_yaml_ng::to_string(&r).unwrap();
        let back: MapReference = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(back, r);
    }
}
