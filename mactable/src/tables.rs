// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The MAC address tables of all bridges, and their link to the shared cache.

use ahash::RandomState;
use dashmap::DashMap;
use model::BridgePath;
use std::net::IpAddr;
use std::sync::{Arc, Weak};
use store::{CacheListener, EventOrigin};
use tracing::{debug, info};

use crate::{AddressProber, EntryIdGenerator, EntryRemover, HostListener, MacAddressTable};
use crate::{MacEntryCache, MacTableEntry, MacTableEntryId};

/// One [`MacAddressTable`] per bridge. Entries learned by peers reach the
/// table of their bridge through the shared cache.
pub struct MacTables {
    ids: Arc<EntryIdGenerator>,
    cache: Arc<MacEntryCache>,
    tables: DashMap<BridgePath, Arc<MacAddressTable>, RandomState>,
    listener: Option<Arc<dyn HostListener>>,
    prober: Option<Arc<dyn AddressProber>>,
}

impl MacTables {
    /// Create the registry and subscribe it to `cache`. Entry ids continue
    /// after those `controller` already published in `cache`.
    #[must_use]
    pub fn new(
        controller: IpAddr,
        cache: Arc<MacEntryCache>,
        listener: Option<Arc<dyn HostListener>>,
        prober: Option<Arc<dyn AddressProber>>,
    ) -> Arc<Self> {
        let last = cache
            .collect_where(|id, _| id.controller == controller)
            .iter()
            .map(|(id, _)| id.seq)
            .max()
            .unwrap_or_default();
        if last > 0 {
            debug!("Resuming entry ids of {controller} after {last}");
        }
        let tables = Arc::new(Self {
            ids: Arc::new(EntryIdGenerator::resume(controller, last)),
            cache: cache.clone(),
            tables: DashMap::with_hasher(RandomState::with_seed(0)),
            listener,
            prober,
        });
        cache.add_listener(Arc::new(RemoteEntrySync(Arc::downgrade(&tables))));
        tables
    }

    #[must_use]
    pub fn controller(&self) -> IpAddr {
        self.ids.controller()
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<MacEntryCache> {
        &self.cache
    }

    /// The table of `bridge`, created and loaded from the cache if missing.
    pub fn create(&self, bridge: &BridgePath) -> Arc<MacAddressTable> {
        self.tables
            .entry(bridge.clone())
            .or_insert_with(|| {
                let table =
                    MacAddressTable::new(bridge.clone(), self.ids.clone(), self.cache.clone())
                        .with_host_listener(self.listener.clone())
                        .with_prober(self.prober.clone());
                let loaded = table.reload_from_cache();
                info!("Created MAC table of {bridge} with {loaded} shared entries");
                Arc::new(table)
            })
            .clone()
    }

    #[must_use]
    pub fn get(&self, bridge: &BridgePath) -> Option<Arc<MacAddressTable>> {
        self.tables.get(bridge).map(|t| t.value().clone())
    }

    /// Drop the table of `bridge`. Returns its entries.
    pub fn remove(&self, bridge: &BridgePath) -> Vec<MacTableEntry> {
        match self.tables.remove(bridge) {
            Some((_, table)) => {
                debug!("Removing MAC table of {bridge}");
                table.flush()
            }
            None => vec![],
        }
    }

    #[must_use]
    pub fn bridges(&self) -> Vec<BridgePath> {
        let mut bridges: Vec<BridgePath> = self.tables.iter().map(|t| t.key().clone()).collect();
        bridges.sort();
        bridges
    }

    fn tables(&self) -> Vec<Arc<MacAddressTable>> {
        self.tables.iter().map(|t| t.value().clone()).collect()
    }

    /// Apply `remover` to every table.
    pub fn remove_where(&self, remover: &mut EntryRemover) -> Vec<MacTableEntry> {
        self.tables()
            .iter()
            .flat_map(|table| table.remove_where(remover))
            .collect()
    }

    /// One aging sweep over every table.
    pub fn age(&self) -> Vec<MacTableEntry> {
        self.tables().iter().flat_map(|table| table.age()).collect()
    }
}

struct RemoteEntrySync(Weak<MacTables>);

impl RemoteEntrySync {
    fn table_of(&self, entry: &MacTableEntry) -> Option<Arc<MacAddressTable>> {
        self.0.upgrade()?.get(entry.bridge())
    }
}

impl CacheListener<MacTableEntryId, MacTableEntry> for RemoteEntrySync {
    fn entry_created(&self, _: &MacTableEntryId, value: &MacTableEntry, origin: EventOrigin) {
        if origin == EventOrigin::Remote
            && let Some(table) = self.table_of(value)
        {
            table.apply_remote_put(value.clone());
        }
    }

    fn entry_updated(
        &self,
        _: &MacTableEntryId,
        _: &MacTableEntry,
        new: &MacTableEntry,
        origin: EventOrigin,
    ) {
        if origin == EventOrigin::Remote
            && let Some(table) = self.table_of(new)
        {
            table.apply_remote_put(new.clone());
        }
    }

    fn entry_deleted(&self, _: &MacTableEntryId, old: &MacTableEntry, origin: EventOrigin) {
        if origin == EventOrigin::Remote
            && let Some(table) = self.table_of(old)
        {
            table.apply_remote_remove(old);
        }
    }
}
