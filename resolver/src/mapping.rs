// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The cluster-wide mapping tables and the transactions that mutate them.

use config::RetryPolicy;
use model::{MacVlan, MapReference, MapType, NodeVlan, PortVlan, SwitchPort};
use std::collections::BTreeSet;
use store::{ClusterMap, ConfigRevision, StoreError, WriteBatch, WriteSet};

use crate::ResolverError;
use crate::state::MacMapState;

/// The five mapping tables plus the revision guarding them.
#[derive(Debug)]
pub struct MappingStore {
    pub vlan_maps: ClusterMap<NodeVlan, MapReference>,
    pub port_maps: ClusterMap<PortVlan, MapReference>,
    pub mac_allowed: ClusterMap<MacVlan, MapReference>,
    pub mac_denied: ClusterMap<MacVlan, BTreeSet<MapReference>>,
    pub mac_states: ClusterMap<MapReference, MacMapState>,
    revision: ConfigRevision,
}

impl MappingStore {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            vlan_maps: ClusterMap::new("vlan-maps"),
            port_maps: ClusterMap::new("port-maps"),
            mac_allowed: ClusterMap::new("mac-map-allowed"),
            mac_denied: ClusterMap::new("mac-map-denied"),
            mac_states: ClusterMap::new("mac-map-states"),
            revision: ConfigRevision::new(policy),
        }
    }

    #[must_use]
    pub fn revision(&self) -> &ConfigRevision {
        &self.revision
    }

    /// A transaction over the committed tables. Without writes, it is a read view.
    #[must_use]
    pub fn txn(&self) -> MappingTxn<'_> {
        MappingTxn {
            vlan_maps: WriteSet::new(&self.vlan_maps),
            port_maps: WriteSet::new(&self.port_maps),
            mac_allowed: WriteSet::new(&self.mac_allowed),
            mac_denied: WriteSet::new(&self.mac_denied),
            mac_states: WriteSet::new(&self.mac_states),
        }
    }

    /// Run `body` as an optimistic transaction. See [`ConfigRevision::transact`].
    ///
    /// # Errors
    ///
    /// Returns the error of the body, or a [`StoreError`] if the retry budget runs out.
    pub fn transact<'s, T, F>(&'s self, name: &str, mut body: F) -> Result<T, ResolverError>
    where
        F: FnMut(&mut MappingTxn<'s>) -> Result<T, ResolverError>,
    {
        self.revision.transact(name, || {
            let mut txn = self.txn();
            let value = body(&mut txn)?;
            Ok((value, txn))
        })
    }

    /// Run `read` against a view no commit interfered with.
    ///
    /// # Errors
    ///
    /// Fails if no stable view could be obtained within the retry budget.
    pub fn read<T, F>(&self, mut read: F) -> Result<T, StoreError>
    where
        F: FnMut(&MappingTxn<'_>) -> T,
    {
        self.revision.read_consistent(|| read(&self.txn()))
    }
}

/// Staged writes to the mapping tables.
pub struct MappingTxn<'a> {
    pub vlan_maps: WriteSet<'a, NodeVlan, MapReference>,
    pub port_maps: WriteSet<'a, PortVlan, MapReference>,
    pub mac_allowed: WriteSet<'a, MacVlan, MapReference>,
    pub mac_denied: WriteSet<'a, MacVlan, BTreeSet<MapReference>>,
    pub mac_states: WriteSet<'a, MapReference, MacMapState>,
}

impl WriteBatch for MappingTxn<'_> {
    fn is_empty(&self) -> bool {
        !(self.vlan_maps.is_dirty()
            || self.port_maps.is_dirty()
            || self.mac_allowed.is_dirty()
            || self.mac_denied.is_dirty()
            || self.mac_states.is_dirty())
    }

    fn apply(self) {
        self.vlan_maps.apply();
        self.port_maps.apply();
        self.mac_allowed.apply();
        self.mac_denied.apply();
        self.mac_states.apply();
    }
}

impl MappingTxn<'_> {
    /// The VLAN mapping covering `pv`: node-specific first, then the wildcard.
    #[must_use]
    pub fn vlan_map_for(&self, pv: &PortVlan) -> Option<MapReference> {
        self.vlan_maps
            .get(&pv.node_vlan())
            .or_else(|| self.vlan_maps.get(&NodeVlan::any_node(pv.vlan)))
    }

    /// The MAC mapping `host` resolves to from the access lists alone.
    ///
    /// For a wildcard, this is the owner of the VLAN-wide entry.
    #[must_use]
    pub fn mac_map_reference(&self, host: &MacVlan) -> Option<MapReference> {
        if host.is_wildcard() {
            return self.mac_allowed.get(host);
        }
        let owner = self
            .mac_allowed
            .get(host)
            .or_else(|| self.mac_allowed.get(&host.as_wildcard()))?;
        let denied = self
            .mac_denied
            .get(host)
            .is_some_and(|refs| refs.contains(&owner));
        (!denied).then_some(owner)
    }

    #[must_use]
    pub fn mac_map_state(&self, reference: &MapReference) -> MacMapState {
        self.mac_states.get(reference).unwrap_or_default()
    }

    /// Stage `state` as the runtime state of `reference`.
    pub fn set_mac_map_state(&mut self, reference: &MapReference, state: MacMapState) {
        if state.is_empty() {
            self.mac_states.remove(reference);
        } else {
            self.mac_states.put(reference.clone(), state);
        }
    }

    /// Whether the MAC mapping `reference` may take a frame of `host`, given
    /// `reserved`, the current claimant of the port the frame came in on.
    fn check_mac_mapping(
        &self,
        reference: &MapReference,
        host: &MacVlan,
        reserved: Option<&MapReference>,
    ) -> bool {
        if reserved.is_some_and(|r| r != reference) {
            return false;
        }
        self.mac_states
            .get(reference)
            .is_none_or(|state| state.get_duplicate(host).is_none())
    }

    /// Resolve the mapping owning a frame. Port mappings take precedence over MAC
    /// mappings, which take precedence over VLAN mappings. A port claimed by any
    /// mapping is never subject to VLAN mapping.
    #[must_use]
    pub fn lookup(&self, host: &MacVlan, port: SwitchPort) -> Option<MapReference> {
        let pv = PortVlan::new(port, host.vlan);
        let reserved = self.port_maps.get(&pv);
        if let Some(r) = &reserved
            && r.map_type == MapType::Port
        {
            return reserved;
        }
        if !host.is_wildcard()
            && let Some(mref) = self.mac_map_reference(host)
            && self.check_mac_mapping(&mref, host, reserved.as_ref())
        {
            return Some(mref);
        }
        if reserved.is_some() {
            return None;
        }
        self.vlan_map_for(&pv)
    }

    /// Release the reservation of `pv` held by `reference`.
    ///
    /// # Errors
    ///
    /// Fails if `pv` is not reserved by `reference`.
    pub fn release_port(
        &mut self,
        reference: &MapReference,
        pv: &PortVlan,
    ) -> Result<(), ResolverError> {
        match self.port_maps.get(pv) {
            Some(owner) if owner == *reference => {
                self.port_maps.remove(pv);
                Ok(())
            }
            Some(owner) => Err(ResolverError::internal(format!(
                "{reference} releasing {pv}, which is reserved by {owner}"
            ))),
            None => Err(ResolverError::internal(format!(
                "{reference} releasing {pv}, which is not reserved"
            ))),
        }
    }
}
