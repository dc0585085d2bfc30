// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Value types shared by the VTN controller core: layer-2 addresses, switch ports,
//! the keys of the mapping tables and the references to the virtual nodes that own
//! a mapping.

#![deny(clippy::all, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod frame;
pub mod keys;
pub mod mac;
pub mod port;
pub mod reference;
pub mod vlan;

pub use frame::{EtherType, ParsedFrame};
pub use keys::{MacVlan, NodeVlan, PortVlan};
pub use mac::{Mac, MacParseError};
pub use port::{NodeId, NodePortFilter, PortFilter, PortNumber, SpecificPortFilter, SwitchPort};
pub use reference::{BridgePath, MapReference, MapType, VNodePath};
pub use vlan::{InvalidVlan, VlanId};
