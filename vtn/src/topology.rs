// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Reactions to changes of the physical topology

use model::{NodeId, NodePortFilter, PortFilter, SpecificPortFilter, SwitchPort};
use std::fmt::Display;
use tracectl::trace_target;
use tracing::{debug, info};

use mactable::EntryRemover;

use crate::VtnManager;

trace_target!("vtn-topology", tracectl::LevelFilter::INFO, &["vtn"]);

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum UpdateType {
    Added,
    Changed,
    Removed,
}

/// A link between two switch ports. Ports at either end of a link are internal
/// to the physical network, and frames received there are never learned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Link {
    pub src: SwitchPort,
    pub dst: SwitchPort,
}

impl Link {
    #[must_use]
    pub fn new(src: SwitchPort, dst: SwitchPort) -> Self {
        Self { src, dst }
    }
}

impl Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

impl VtnManager {
    // Hosts of MAC mappings bound to the ports accepted by `filter` lose their
    // binding.
    fn inactivate_mac_maps<F: PortFilter>(&self, what: &str, filter: &F) {
        for reference in self.resolver.active_mac_maps() {
            match self.resolver.inactivate_mac_map(&reference, filter) {
                Ok(done) => self.execute_cleanup(&done.cleanup),
                Err(e) => self.log_failure(&format!("Inactivating {reference} on {what}"), &e),
            }
        }
    }

    pub fn on_node_changed(&self, node: NodeId, update: UpdateType) {
        if update != UpdateType::Removed {
            debug!("Switch {node} {update}");
            return;
        }
        info!("Switch {node} removed");
        self.inactivate_mac_maps(&format!("switch {node}"), &NodePortFilter(node));
        self.mac_tables.remove_where(&mut EntryRemover::by_node(node));
        for db in self.tenants.all_flows() {
            db.remove_flows_by_node(node);
        }
        self.internal_ports.write().retain(|p| p.node != node);
    }

    /// `up` is the link state of the port after the update.
    pub fn on_port_changed(&self, port: SwitchPort, update: UpdateType, up: bool) {
        if update != UpdateType::Removed && up {
            debug!("Port {port} {update}");
            return;
        }
        info!(
            "Port {port} {}",
            if update == UpdateType::Removed { "removed" } else { "down" }
        );
        self.inactivate_mac_maps(&format!("port {port}"), &SpecificPortFilter(port));
        self.mac_tables.remove_where(&mut EntryRemover::by_port(port));
        for db in self.tenants.all_flows() {
            db.remove_flows_by_port(port);
        }
        if update == UpdateType::Removed {
            self.internal_ports.write().remove(&port);
        }
    }

    pub fn on_link_changed(&self, link: Link, update: UpdateType) {
        match update {
            UpdateType::Added => {
                info!("Link {link} added");
                {
                    let mut internal = self.internal_ports.write();
                    internal.insert(link.src);
                    internal.insert(link.dst);
                }
                // what was learned there came through another switch
                for port in [link.src, link.dst] {
                    self.inactivate_mac_maps(&format!("port {port}"), &SpecificPortFilter(port));
                    self.mac_tables.remove_where(&mut EntryRemover::by_port(port));
                }
            }
            UpdateType::Removed => {
                info!("Link {link} removed");
                {
                    let mut internal = self.internal_ports.write();
                    internal.remove(&link.src);
                    internal.remove(&link.dst);
                }
                for db in self.tenants.all_flows() {
                    db.remove_flows_by_port(link.src);
                    db.remove_flows_by_port(link.dst);
                }
            }
            UpdateType::Changed => debug!("Link {link} changed"),
        }
    }

    /// Whether `port` is an end of a known inter-switch link.
    #[must_use]
    pub fn is_internal_port(&self, port: &SwitchPort) -> bool {
        self.internal_ports.read().contains(port)
    }
}
