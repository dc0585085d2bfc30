// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Predicates selecting the entries to remove from a MAC address table.

use model::{MacVlan, NodeId, PortFilter, PortVlan, SwitchPort, VNodePath, VlanId};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::net::IpAddr;

use crate::MacTableEntry;

type Matcher = Box<dyn FnMut(&mut MacTableEntry) -> bool + Send>;

/// A named predicate over table entries. The predicate may update the entry it
/// is given, as the aging predicate does with the used flag.
pub struct EntryRemover {
    name: String,
    matcher: Matcher,
}

impl EntryRemover {
    pub fn new<F>(name: impl Into<String>, matcher: F) -> Self
    where
        F: FnMut(&mut MacTableEntry) -> bool + Send + 'static,
    {
        Self {
            name: name.into(),
            matcher: Box::new(matcher),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&mut self, entry: &mut MacTableEntry) -> bool {
        (self.matcher)(entry)
    }

    #[must_use]
    pub fn all() -> Self {
        Self::new("all", |_| true)
    }

    #[must_use]
    pub fn by_node(node: NodeId) -> Self {
        Self::new(format!("node {node}"), move |e| e.port.node == node)
    }

    #[must_use]
    pub fn by_node_vlan(node: NodeId, vlan: VlanId) -> Self {
        Self::new(format!("node {node} vlan {vlan}"), move |e| {
            e.port.node == node && e.vlan == vlan
        })
    }

    #[must_use]
    pub fn by_port(port: SwitchPort) -> Self {
        Self::new(format!("port {port}"), move |e| e.port == port)
    }

    #[must_use]
    pub fn by_port_vlan(pv: PortVlan) -> Self {
        Self::new(format!("{pv}"), move |e| e.port == pv.port && e.vlan == pv.vlan)
    }

    pub fn by_port_filter<F>(filter: F) -> Self
    where
        F: PortFilter + Send + 'static,
    {
        Self::new("port filter", move |e| filter.accept(&e.port))
    }

    pub fn by_port_filter_vlan<F>(filter: F, vlan: VlanId) -> Self
    where
        F: PortFilter + Send + 'static,
    {
        Self::new(format!("port filter vlan {vlan}"), move |e| {
            e.vlan == vlan && filter.accept(&e.port)
        })
    }

    /// Entries learned by `local` that were not used since the previous call.
    /// Clears the used flag of the entries it keeps.
    #[must_use]
    pub fn aged(local: IpAddr) -> Self {
        Self::new("aged", move |e| {
            if !e.is_local(&local) {
                return false;
            }
            let used = e.used;
            e.used = false;
            !used
        })
    }

    /// Entries learned by any of `controllers`.
    #[must_use]
    pub fn by_controllers(controllers: BTreeSet<IpAddr>) -> Self {
        Self::new("controllers", move |e| {
            controllers.contains(&e.id.controller)
        })
    }

    /// Entries learned through `path` or any node below it.
    #[must_use]
    pub fn by_path(path: VNodePath) -> Self {
        Self::new(format!("path {path}"), move |e| e.path.is_within(&path))
    }

    /// Entries of `host`, or of any host on its VLAN if it is a wildcard.
    #[must_use]
    pub fn by_host(host: MacVlan) -> Self {
        Self::new(format!("host {host}"), move |e| {
            e.vlan == host.vlan && host.mac.is_none_or(|mac| mac == e.mac)
        })
    }

    pub fn by_filter<F>(filter: F) -> Self
    where
        F: Fn(&MacTableEntry) -> bool + Send + 'static,
    {
        Self::new("filter", move |e| filter(e))
    }
}

impl Display for EntryRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl std::fmt::Debug for EntryRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryRemover")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
