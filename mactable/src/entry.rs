// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Entries of the MAC address table.

use model::{BridgePath, Mac, SwitchPort, VNodePath, VlanId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cluster-wide identifier of a learned entry. It embeds the address of the
/// controller that learned the entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacTableEntryId {
    pub controller: IpAddr,
    pub seq: u64,
}

/// Allocates the entry ids of one controller.
#[derive(Debug)]
pub struct EntryIdGenerator {
    controller: IpAddr,
    next: AtomicU64,
}

impl EntryIdGenerator {
    #[must_use]
    pub fn new(controller: IpAddr) -> Self {
        Self::resume(controller, 0)
    }

    /// A generator whose first id follows sequence number `last`.
    #[must_use]
    pub fn resume(controller: IpAddr, last: u64) -> Self {
        Self {
            controller,
            next: AtomicU64::new(last.saturating_add(1)),
        }
    }

    #[must_use]
    pub fn controller(&self) -> IpAddr {
        self.controller
    }

    pub fn next_id(&self) -> MacTableEntryId {
        MacTableEntryId {
            controller: self.controller,
            seq: self.next.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// A host learned on a virtual bridge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MacTableEntry {
    pub id: MacTableEntryId,
    /// The virtual node that mapped the host's traffic.
    pub path: VNodePath,
    pub mac: Mac,
    pub port: SwitchPort,
    pub vlan: VlanId,
    pub ips: BTreeSet<IpAddr>,
    /// Set when the host is seen, cleared by each aging sweep.
    #[serde(skip)]
    pub used: bool,
}

// `used` is local bookkeeping and never replicated
impl PartialEq for MacTableEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.path == other.path
            && self.mac == other.mac
            && self.port == other.port
            && self.vlan == other.vlan
            && self.ips == other.ips
    }
}

impl Eq for MacTableEntry {}

impl MacTableEntry {
    #[must_use]
    pub fn new(
        id: MacTableEntryId,
        path: VNodePath,
        mac: Mac,
        port: SwitchPort,
        vlan: VlanId,
        ip: Option<IpAddr>,
    ) -> Self {
        Self {
            id,
            path,
            mac,
            port,
            vlan,
            ips: ip.into_iter().collect(),
            used: true,
        }
    }

    #[must_use]
    pub fn bridge(&self) -> &BridgePath {
        self.path.bridge()
    }

    /// Whether the host is now seen at another location.
    #[must_use]
    pub fn has_moved(&self, port: SwitchPort, vlan: VlanId, path: &VNodePath) -> bool {
        self.port != port || self.vlan != vlan || self.path != *path
    }

    #[must_use]
    pub fn is_local(&self, controller: &IpAddr) -> bool {
        self.id.controller == *controller
    }
}

impl Display for MacTableEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.controller, self.seq)
    }
}

impl Display for MacTableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} on {} vlan={} ({})",
            self.id, self.mac, self.port, self.vlan, self.path
        )?;
        if !self.ips.is_empty() {
            let ips: Vec<String> = self.ips.iter().map(ToString::to_string).collect();
            write!(f, " ips={}", ips.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::NodeId;
    use pretty_assertions::assert_eq;

    #[test]
    fn replicated_form_drops_used_flag() {
        let ids = EntryIdGenerator::new("10.0.0.1".parse().unwrap());
        let mut entry = MacTableEntry::new(
            ids.next_id(),
            VNodePath::Bridge(BridgePath::new("t1", "b1")),
            Mac([0, 0, 0, 0, 0, 1]),
            SwitchPort::new(NodeId(1), 1),
            VlanId::UNTAGGED,
            Some("192.168.0.1".parse().unwrap()),
        );
        entry.used = true;
        let yaml = serde_yaml_ng::to_string(&entry).unwrap();
        let back: MacTableEntry = serde_yaml_ng::from_str(&yaml).unwrap();
        assert!(!back.used);
        assert_eq!(back, entry);
        assert_eq!(ids.next_id().seq, 2);
    }
}
