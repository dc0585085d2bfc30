// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Execution of the cleanup produced by committed mapping changes.

use flowdb::VtnFlow;
use mactable::{EntryRemover, MacTableEntry};
use model::{MacVlan, MapReference, PortVlan};
use resolver::{CleanupAction, PurgeScope};
use tracing::debug;

use crate::VtnManager;

fn host_matches(host: &MacVlan, other: Option<MacVlan>) -> bool {
    other.is_some_and(|o| o.vlan == host.vlan && host.mac.is_none_or(|mac| o.mac == Some(mac)))
}

fn entry_in_scope(scope: &PurgeScope, entry: &MacTableEntry) -> bool {
    let pv = PortVlan::new(entry.port, entry.vlan);
    match scope {
        PurgeScope::NodeVlan(nv) => nv.contains(&pv),
        PurgeScope::PortVlan(scoped) => *scoped == pv,
        PurgeScope::Host(host) => host_matches(host, Some(MacVlan::host(entry.mac, entry.vlan))),
    }
}

fn flow_in_scope(scope: &PurgeScope, flow: &VtnFlow) -> bool {
    let edges = [flow.incoming_network(), flow.outgoing_network()];
    match scope {
        PurgeScope::NodeVlan(nv) => edges.iter().flatten().any(|pv| nv.contains(pv)),
        PurgeScope::PortVlan(pv) => edges.contains(&Some(*pv)),
        PurgeScope::Host(host) => {
            host_matches(host, flow.source()) || host_matches(host, flow.destination())
        }
    }
}

impl VtnManager {
    /// Flush the MAC entries and flows made stale by a committed mapping change.
    /// Failures are logged and never stop the remaining actions.
    pub fn execute_cleanup(&self, actions: &[CleanupAction]) {
        for action in actions {
            debug!("Cleanup: {action}");
            match action {
                CleanupAction::PurgeMapping { owner, scope } => self.purge_mapping(owner, *scope),
                CleanupAction::PurgeHost { container, host } => {
                    if *container == self.container() {
                        self.purge_host(*host);
                    }
                }
            }
        }
    }

    fn purge_mapping(&self, owner: &MapReference, scope: PurgeScope) {
        if let Some(table) = self.mac_tables.get(owner.bridge()) {
            let path = owner.path.clone();
            let mut remover =
                EntryRemover::by_filter(move |e| e.path.is_within(&path) && entry_in_scope(&scope, e));
            table.remove_where(&mut remover);
        }
        match self.tenants.flows(owner.tenant()) {
            Some(db) => {
                db.remove_flows_where(&format!("{owner} on {scope}"), |flow| {
                    flow.depends_on(&owner.path) && flow_in_scope(&scope, flow)
                });
            }
            None => debug!("No flows to purge for {owner}: tenant {} is gone", owner.tenant()),
        }
    }

    fn purge_host(&self, host: MacVlan) {
        self.mac_tables.remove_where(&mut EntryRemover::by_host(host));
        for db in self.tenants.all_flows() {
            db.remove_flows_where(&format!("host {host}"), |flow| {
                host_matches(&host, flow.source()) || host_matches(&host, flow.destination())
            });
        }
    }
}
