// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Conflict-checked registration of mappings, MAC mapping activation and frame
//! resolution.

use config::RetryPolicy;
use model::{
    Mac, MacVlan, MapReference, MapType, NodeVlan, PortFilter, PortVlan, SwitchPort, VlanId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracectl::trace_target;
use tracing::{debug, info, trace};

use crate::change::MacMapChange;
use crate::cleanup::{CleanupAction, Committed, PurgeScope};
use crate::mapping::{MappingStore, MappingTxn};
use crate::state::{Activation, Inactivated, MacMapState};
use crate::ResolverError;

trace_target!("resolver", tracectl::LevelFilter::INFO, &["resolver"]);

/// Owns the mapping tables of one controller and every operation that reads or
/// mutates them.
#[derive(Debug)]
pub struct ResourceResolver {
    store: Arc<MappingStore>,
}

fn log_refusal<T>(what: &str, result: &Result<T, ResolverError>) {
    if let Err(e) = result
        && e.is_contention()
    {
        debug!("{what}: {e}");
    }
}

/// Account for a host inactivated by `owner`.
fn drop_host(
    txn: &mut MappingTxn<'_>,
    owner: &MapReference,
    gone: Inactivated,
    cleanup: &mut Vec<CleanupAction>,
) -> Result<(), ResolverError> {
    if let Some(pv) = gone.released {
        txn.release_port(owner, &pv)?;
    }
    cleanup.push(CleanupAction::PurgeMapping {
        owner: owner.clone(),
        scope: PurgeScope::Host(gone.host),
    });
    Ok(())
}

/// A port mapping takes `pv` over from the MAC mapping `owner`.
fn supersede_mac_map(
    txn: &mut MappingTxn<'_>,
    owner: &MapReference,
    pv: &PortVlan,
    reference: &MapReference,
    cleanup: &mut Vec<CleanupAction>,
) -> Result<(), ResolverError> {
    let mut state = txn.mac_map_state(owner);
    if !state.has_port(pv) {
        return Err(ResolverError::internal(format!(
            "{pv} is reserved by {owner}, which has no host there"
        )));
    }
    let hosts = state.inactivate_port(pv);
    trace!(
        "{reference} supersedes {owner} on {pv}, inactivated {} host(s)",
        hosts.len()
    );
    txn.set_mac_map_state(owner, state);
    cleanup.push(CleanupAction::PurgeMapping {
        owner: owner.clone(),
        scope: PurgeScope::PortVlan(*pv),
    });
    Ok(())
}

/// Apply `change` to the access lists of `reference`, in a fixed order: removed
/// allowed hosts, added allowed hosts, removed denied hosts, added denied hosts,
/// then the hosts that lost a wildcard.
fn apply_mac_map_change(
    txn: &mut MappingTxn<'_>,
    reference: &MapReference,
    change: &MacMapChange,
) -> Result<Vec<CleanupAction>, ResolverError> {
    let none = BTreeSet::new();
    let (remove_allowed, remove_denied, add_allowed, add_denied) = if change.remove_all {
        let allowed: BTreeSet<MacVlan> = txn
            .mac_allowed
            .collect_where(|_, owner| owner == reference)
            .into_iter()
            .map(|(host, _)| host)
            .collect();
        let denied: BTreeSet<MacVlan> = txn
            .mac_denied
            .collect_where(|_, refs| refs.contains(reference))
            .into_iter()
            .map(|(host, _)| host)
            .collect();
        (allowed, denied, &none, &none)
    } else {
        (
            change.remove_allowed.clone(),
            change.remove_denied.clone(),
            &change.add_allowed,
            &change.add_denied,
        )
    };

    // hosts whose resolution does not change, evaluated before anything is removed
    let already_mapped: BTreeSet<MacVlan> = add_allowed
        .iter()
        .filter(|host| txn.mac_map_reference(host).as_ref() == Some(reference))
        .copied()
        .collect();

    let container = &reference.container;
    let mut state = txn.mac_map_state(reference);
    let mut cleanup = Vec::new();
    let mut unmapped_vlans: BTreeSet<VlanId> = BTreeSet::new();

    for host in &remove_allowed {
        if txn.mac_allowed.get(host).as_ref() != Some(reference) {
            debug!("{host} is not allowed by {reference}, nothing to remove");
            continue;
        }
        txn.mac_allowed.remove(host);
        if host.is_wildcard() {
            unmapped_vlans.insert(host.vlan);
        } else if let Some(gone) = state.inactivate(host) {
            drop_host(txn, reference, gone, &mut cleanup)?;
        }
    }

    for host in add_allowed {
        match txn.mac_allowed.get(host) {
            Some(owner) if owner == *reference => continue,
            Some(owner) => {
                return Err(ResolverError::MacMapConflict { host: *host, owner });
            }
            None => {
                txn.mac_allowed.put(*host, reference.clone());
            }
        }
        // a concrete entry beats a foreign wildcard
        if !host.is_wildcard()
            && let Some(other) = txn.mac_allowed.get(&host.as_wildcard())
            && other != *reference
        {
            let mut other_state = txn.mac_map_state(&other);
            if let Some(gone) = other_state.inactivate(host) {
                drop_host(txn, &other, gone, &mut cleanup)?;
                txn.set_mac_map_state(&other, other_state);
            }
        }
        if !already_mapped.contains(host) {
            cleanup.push(CleanupAction::PurgeHost {
                container: container.clone(),
                host: *host,
            });
        }
    }

    for host in &remove_denied {
        let Some(mut refs) = txn.mac_denied.get(host) else {
            continue;
        };
        if !refs.remove(reference) {
            continue;
        }
        if refs.is_empty() {
            txn.mac_denied.remove(host);
        } else {
            txn.mac_denied.put(*host, refs);
        }
        if txn.mac_map_reference(host).as_ref() == Some(reference) {
            cleanup.push(CleanupAction::PurgeHost {
                container: container.clone(),
                host: *host,
            });
        }
    }

    for host in add_denied {
        let mut refs = txn.mac_denied.get(host).unwrap_or_default();
        if !refs.insert(reference.clone()) {
            continue;
        }
        txn.mac_denied.put(*host, refs);
        if let Some(gone) = state.inactivate(host) {
            drop_host(txn, reference, gone, &mut cleanup)?;
        }
    }

    for vlan in unmapped_vlans {
        let gone = state.inactivate_where(|host, _| {
            host.vlan == vlan && txn.mac_map_reference(host).as_ref() != Some(reference)
        });
        for g in gone {
            drop_host(txn, reference, g, &mut cleanup)?;
        }
    }

    if change.remove_all {
        for g in state.inactivate_where(|_, _| true) {
            drop_host(txn, reference, g, &mut cleanup)?;
        }
    }

    txn.set_mac_map_state(reference, state);
    cleanup.sort();
    cleanup.dedup();
    Ok(cleanup)
}

impl ResourceResolver {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_store(Arc::new(MappingStore::new(policy)))
    }

    /// A resolver over mapping tables shared with other resolvers. Their
    /// commits are serialized by the revision of `store`.
    #[must_use]
    pub fn with_store(store: Arc<MappingStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<MappingStore> {
        &self.store
    }

    /// The current configuration revision.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.store.revision().current()
    }

    fn check_type(reference: &MapReference, expected: MapType) -> Result<(), ResolverError> {
        if reference.map_type == expected {
            Ok(())
        } else {
            Err(ResolverError::Invalid(format!(
                "{reference} is not a {expected} mapping"
            )))
        }
    }

    /// Map the VLAN `scope` to `reference`.
    ///
    /// If `purge` is set and `scope` is node-specific, the wildcard mapping of the
    /// same VLAN loses that node and its state there is purged.
    ///
    /// # Errors
    ///
    /// [`ResolverError::Conflict`] with the current owner if `scope` is mapped.
    pub fn register_vlan_map(
        &self,
        scope: NodeVlan,
        reference: &MapReference,
        purge: bool,
    ) -> Result<Vec<CleanupAction>, ResolverError> {
        Self::check_type(reference, MapType::Vlan)?;
        let result = self.store.transact("register-vlan-map", |txn| {
            if let Some(owner) = txn.vlan_maps.get(&scope) {
                return Err(ResolverError::Conflict(owner));
            }
            txn.vlan_maps.put(scope, reference.clone());
            let mut cleanup = Vec::new();
            if purge
                && !scope.is_wildcard()
                && let Some(wildcard) = txn.vlan_maps.get(&NodeVlan::any_node(scope.vlan))
            {
                cleanup.push(CleanupAction::PurgeMapping {
                    owner: wildcard,
                    scope: PurgeScope::NodeVlan(scope),
                });
            }
            Ok(cleanup)
        });
        log_refusal(&format!("VLAN mapping {scope} by {reference}"), &result);
        if result.is_ok() {
            info!("Mapped {scope} to {reference}");
        }
        result
    }

    /// # Errors
    ///
    /// [`ResolverError::NotFound`] if `scope` is not mapped to `reference`.
    pub fn unregister_vlan_map(
        &self,
        scope: NodeVlan,
        reference: &MapReference,
    ) -> Result<Vec<CleanupAction>, ResolverError> {
        let result = self.store.transact("unregister-vlan-map", |txn| {
            match txn.vlan_maps.get(&scope) {
                Some(owner) if owner == *reference => {
                    txn.vlan_maps.remove(&scope);
                    Ok(vec![CleanupAction::PurgeMapping {
                        owner: reference.clone(),
                        scope: PurgeScope::NodeVlan(scope),
                    }])
                }
                _ => Err(ResolverError::NotFound(format!(
                    "VLAN mapping {scope} of {reference}"
                ))),
            }
        });
        if result.is_ok() {
            info!("Unmapped {scope} from {reference}");
        }
        result
    }

    /// Move the port mapping `reference` from `old` to `new`. Either may be `None`.
    ///
    /// A MAC mapping reserving `new` is superseded: its hosts on `new` are
    /// inactivated. If `purge` is set, the state of the VLAN mapping that covered
    /// `new` is purged there.
    ///
    /// # Errors
    ///
    /// [`ResolverError::Conflict`] if another port mapping holds `new`, or
    /// [`ResolverError::NotFound`] if `old` is not held by `reference`.
    pub fn register_port_map(
        &self,
        reference: &MapReference,
        new: Option<PortVlan>,
        old: Option<PortVlan>,
        purge: bool,
    ) -> Result<Vec<CleanupAction>, ResolverError> {
        Self::check_type(reference, MapType::Port)?;
        let result = self.store.transact("register-port-map", |txn| {
            let mut cleanup = Vec::new();
            if let Some(old) = old
                && Some(old) != new
            {
                match txn.port_maps.get(&old) {
                    Some(owner) if owner == *reference => {
                        txn.port_maps.remove(&old);
                        cleanup.push(CleanupAction::PurgeMapping {
                            owner: reference.clone(),
                            scope: PurgeScope::PortVlan(old),
                        });
                    }
                    _ => {
                        return Err(ResolverError::NotFound(format!(
                            "port mapping {old} of {reference}"
                        )));
                    }
                }
            }
            let Some(new) = new else {
                return Ok(cleanup);
            };
            match txn.port_maps.get(&new) {
                Some(owner) if owner == *reference => return Ok(cleanup),
                Some(owner) if owner.map_type == MapType::Port => {
                    return Err(ResolverError::Conflict(owner));
                }
                Some(owner) => supersede_mac_map(txn, &owner, &new, reference, &mut cleanup)?,
                None => {}
            }
            txn.port_maps.put(new, reference.clone());
            if purge && let Some(vlan_map) = txn.vlan_map_for(&new) {
                cleanup.push(CleanupAction::PurgeMapping {
                    owner: vlan_map,
                    scope: PurgeScope::PortVlan(new),
                });
            }
            Ok(cleanup)
        });
        log_refusal(&format!("port mapping by {reference}"), &result);
        if result.is_ok() {
            match (old, new) {
                (_, Some(new)) => info!("Mapped {new} to {reference}"),
                (Some(old), None) => info!("Unmapped {old} from {reference}"),
                (None, None) => {}
            }
        }
        result
    }

    /// # Errors
    ///
    /// [`ResolverError::NotFound`] if `scope` is not held by `reference`.
    pub fn unregister_port_map(
        &self,
        reference: &MapReference,
        scope: PortVlan,
    ) -> Result<Vec<CleanupAction>, ResolverError> {
        self.register_port_map(reference, None, Some(scope), false)
    }

    /// Change the access lists of the MAC mapping `reference`.
    ///
    /// # Errors
    ///
    /// [`ResolverError::MacMapConflict`] if a host to allow is allowed by another
    /// mapping. Nothing is changed in that case.
    pub fn register_mac_map(
        &self,
        reference: &MapReference,
        change: &MacMapChange,
    ) -> Result<Vec<CleanupAction>, ResolverError> {
        Self::check_type(reference, MapType::Mac)?;
        if let Some(host) = change.denied_wildcard() {
            return Err(ResolverError::Invalid(format!(
                "{host} cannot be denied by {reference}"
            )));
        }
        let result = self.store.transact("register-mac-map", |txn| {
            apply_mac_map_change(txn, reference, change)
        });
        log_refusal(&format!("MAC mapping change by {reference}"), &result);
        if result.is_ok() {
            info!("Applied MAC mapping change to {reference}: {change}");
        }
        result
    }

    /// Bind `host` to `port` for the MAC mapping `reference`, reserving the port's
    /// VLAN. Returns `None` if the host was already bound there.
    ///
    /// # Errors
    ///
    /// [`ResolverError::Gone`] if `host` is no longer mapped by `reference`,
    /// [`ResolverError::Busy`] if another mapping reserves the port's VLAN, and
    /// [`ResolverError::Duplicate`] if the address is active on another VLAN.
    pub fn activate_mac_map(
        &self,
        reference: &MapReference,
        host: MacVlan,
        port: SwitchPort,
    ) -> Result<Option<Vec<CleanupAction>>, ResolverError> {
        if host.is_wildcard() {
            return Err(ResolverError::Invalid(format!("cannot activate {host}")));
        }
        let result = self.store.transact("activate-mac-map", |txn| {
            if txn.mac_map_reference(&host).as_ref() != Some(reference) {
                return Err(ResolverError::Gone {
                    reference: reference.clone(),
                    host,
                });
            }
            let pv = PortVlan::new(port, host.vlan);
            let mut cleanup = Vec::new();
            match txn.port_maps.get(&pv) {
                Some(owner) if owner == *reference => {}
                Some(owner) => {
                    return Err(ResolverError::Busy {
                        reference: reference.clone(),
                        host,
                        port: pv,
                        owner,
                    });
                }
                None => {
                    txn.port_maps.put(pv, reference.clone());
                    if let Some(vlan_map) = txn.vlan_map_for(&pv) {
                        cleanup.push(CleanupAction::PurgeMapping {
                            owner: vlan_map,
                            scope: PurgeScope::PortVlan(pv),
                        });
                    }
                }
            }

            let mut state = txn.mac_map_state(reference);
            let moved = state.port(&host).is_some();
            match state.activate(host, port) {
                Err(active) => Err(ResolverError::Duplicate {
                    reference: reference.clone(),
                    host,
                    active,
                }),
                Ok(Activation::Unchanged) => Ok(None),
                Ok(Activation::Activated { released }) => {
                    if let Some(old) = released {
                        txn.release_port(reference, &old)?;
                    }
                    if moved {
                        cleanup.push(CleanupAction::PurgeMapping {
                            owner: reference.clone(),
                            scope: PurgeScope::Host(host),
                        });
                    }
                    txn.set_mac_map_state(reference, state);
                    Ok(Some(cleanup))
                }
            }
        });
        log_refusal(&format!("activation of {host} on {port}"), &result);
        if let Ok(Some(_)) = result {
            debug!("Activated {host} on {port} for {reference}");
        }
        result
    }

    /// Inactivate the hosts of `reference` bound to ports accepted by `filter`.
    /// The value is whether the mapping still has active hosts.
    ///
    /// # Errors
    ///
    /// Fails on a broken reservation or when the retry budget runs out.
    pub fn inactivate_mac_map<F: PortFilter>(
        &self,
        reference: &MapReference,
        filter: &F,
    ) -> Result<Committed<bool>, ResolverError> {
        self.store.transact("inactivate-mac-map", |txn| {
            let mut state = txn.mac_map_state(reference);
            let mut cleanup = Vec::new();
            for gone in state.inactivate_where(|_, port| filter.accept(port)) {
                drop_host(txn, reference, gone, &mut cleanup)?;
            }
            let active = !state.is_empty();
            txn.set_mac_map_state(reference, state);
            Ok(Committed::new(active, cleanup))
        })
    }

    /// Remove every mapping owned by `container`.
    ///
    /// # Errors
    ///
    /// Fails only when the retry budget runs out.
    pub fn clean_up(&self, container: &str) -> Result<Vec<CleanupAction>, ResolverError> {
        let result = self.store.transact("clean-up", |txn| {
            let owned = |r: &MapReference| r.container == container;
            let mut cleanup = Vec::new();
            for (scope, owner) in txn.vlan_maps.collect_where(|_, r| owned(r)) {
                txn.vlan_maps.remove(&scope);
                cleanup.push(CleanupAction::PurgeMapping {
                    owner,
                    scope: PurgeScope::NodeVlan(scope),
                });
            }
            for (pv, owner) in txn.port_maps.collect_where(|_, r| owned(r)) {
                txn.port_maps.remove(&pv);
                cleanup.push(CleanupAction::PurgeMapping {
                    owner,
                    scope: PurgeScope::PortVlan(pv),
                });
            }
            for (host, owner) in txn.mac_allowed.collect_where(|_, r| owned(r)) {
                txn.mac_allowed.remove(&host);
                cleanup.push(CleanupAction::PurgeMapping {
                    owner,
                    scope: PurgeScope::Host(host),
                });
            }
            for (host, refs) in txn
                .mac_denied
                .collect_where(|_, refs| refs.iter().any(owned))
            {
                let kept: BTreeSet<MapReference> =
                    refs.into_iter().filter(|r| !owned(r)).collect();
                if kept.is_empty() {
                    txn.mac_denied.remove(&host);
                } else {
                    txn.mac_denied.put(host, kept);
                }
            }
            for (reference, _) in txn.mac_states.collect_where(|r, _| owned(r)) {
                txn.mac_states.remove(&reference);
            }
            cleanup.sort();
            Ok(cleanup)
        });
        if let Ok(cleanup) = &result {
            info!(
                "Removed the mappings of container {container}, {} purge(s) pending",
                cleanup.len()
            );
        }
        result
    }

    /// The mapping owning a frame from `mac` received on `port` in `vlan`.
    ///
    /// # Errors
    ///
    /// Fails if no stable view of the tables could be read.
    pub fn lookup(
        &self,
        mac: Mac,
        port: SwitchPort,
        vlan: VlanId,
    ) -> Result<Option<MapReference>, ResolverError> {
        let host = MacVlan::host(mac, vlan);
        Ok(self.store.read(|txn| txn.lookup(&host, port))?)
    }

    #[must_use]
    pub fn get_vlan_map_reference(&self, scope: &NodeVlan) -> Option<MapReference> {
        self.store.vlan_maps.get(scope)
    }

    #[must_use]
    pub fn get_port_map_reference(&self, pv: &PortVlan) -> Option<MapReference> {
        self.store.port_maps.get(pv)
    }

    /// The MAC mapping that the access lists assign `host` to.
    ///
    /// # Errors
    ///
    /// Fails if no stable view of the tables could be read.
    pub fn get_mac_map_reference(
        &self,
        host: &MacVlan,
    ) -> Result<Option<MapReference>, ResolverError> {
        Ok(self.store.read(|txn| txn.mac_map_reference(host))?)
    }

    /// Whether `host` is active in the MAC mapping `reference`.
    #[must_use]
    pub fn is_mac_mapped(&self, reference: &MapReference, host: &MacVlan) -> bool {
        self.get_mac_mapped_port(reference, host).is_some()
    }

    #[must_use]
    pub fn get_mac_mapped_port(
        &self,
        reference: &MapReference,
        host: &MacVlan,
    ) -> Option<SwitchPort> {
        self.store
            .mac_states
            .get(reference)
            .and_then(|state| state.port(host))
    }

    #[must_use]
    pub fn get_mac_mapped_hosts(&self, reference: &MapReference) -> BTreeMap<MacVlan, SwitchPort> {
        self.store
            .mac_states
            .get(reference)
            .map(|state| state.active_hosts().clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get_mac_map_state(&self, reference: &MapReference) -> Option<MacMapState> {
        self.store.mac_states.get(reference)
    }

    /// MAC mappings with at least one active host.
    #[must_use]
    pub fn active_mac_maps(&self) -> Vec<MapReference> {
        self.store
            .mac_states
            .snapshot()
            .into_iter()
            .map(|(reference, _)| reference)
            .collect()
    }
}
