// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Collaborators notified by the MAC address table.

use model::{Mac, SwitchPort, VlanId};
use std::net::IpAddr;

use crate::MacTableEntry;

/// Receives the hosts discovered by the table: new entries and entries that
/// learned a new address.
pub trait HostListener: Send + Sync {
    fn notify_host(&self, mac: Mac, ip: Option<IpAddr>, port: SwitchPort, vlan: VlanId);
}

/// Sends a unicast ARP request to confirm the address of a host.
pub trait AddressProber: Send + Sync {
    fn probe(&self, entry: &MacTableEntry, target: IpAddr);
}
