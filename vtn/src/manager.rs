// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The controller context object

use config::{RetryPolicy, VtnConfig, validate_age_interval};
use flowdb::{FlowDatabase, FlowModQueue, FlowModWorker, SwitchProgrammer};
use mactable::{AddressProber, EntryRemover, HostListener, MacAddressTable, MacEntryCache};
use mactable::{MacTableAger, MacTables};
use model::{BridgePath, MacVlan, SwitchPort, VNodePath};
use parking_lot::{Mutex, RwLock};
use resolver::{CleanupAction, MappingStore, ResolverError, ResourceResolver};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use store::{ClusterMap, ClusterMembership};
use tracectl::trace_target;
use tracing::{debug, error, info, warn};

use crate::VtnError;
use crate::tenant::Tenants;

trace_target!("vtn-manager", tracectl::LevelFilter::INFO, &["vtn"]);

/// The state a controller shares with its peers, and that outlives it: the
/// mapping tables and the learned MAC entries.
#[derive(Clone, Debug)]
pub struct ClusterState {
    pub mappings: Arc<MappingStore>,
    pub mac_entries: Arc<MacEntryCache>,
}

impl ClusterState {
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            mappings: Arc::new(MappingStore::new(retry)),
            mac_entries: Arc::new(ClusterMap::new("mac-entries")),
        }
    }
}

/// Everything one controller container knows: its mappings, the MAC tables of
/// its bridges and the flows of its tenants.
///
/// Built once at startup and shared by the event callbacks. Dropping it stops
/// the MAC table ager and the flow-mod worker.
pub struct VtnManager {
    pub(crate) config: RwLock<VtnConfig>,
    pub(crate) membership: Arc<dyn ClusterMembership>,
    pub(crate) resolver: ResourceResolver,
    pub(crate) mac_tables: Arc<MacTables>,
    pub(crate) tenants: Arc<Tenants>,
    pub(crate) internal_ports: RwLock<BTreeSet<SwitchPort>>,
    flow_queue: FlowModQueue,
    worker: Mutex<FlowModWorker>,
    ager: Mutex<Option<MacTableAger>>,
}

// One aging sweep. Flows of the hosts that aged out are stale too.
fn age(mac_tables: &MacTables, tenants: &Tenants) -> usize {
    let aged = mac_tables.age();
    for entry in &aged {
        if let Some(db) = tenants.flows(&entry.bridge().tenant) {
            db.remove_flows_by_host(MacVlan::host(entry.mac, entry.vlan), Some(entry.port));
        }
    }
    aged.len()
}

impl VtnManager {
    /// Start a controller core.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or a background thread cannot be
    /// spawned.
    pub fn new(
        config: VtnConfig,
        membership: Arc<dyn ClusterMembership>,
        programmer: Arc<dyn SwitchProgrammer>,
    ) -> Result<Self, VtnError> {
        Self::with_collaborators(config, membership, programmer, None, None)
    }

    /// Start a controller core that reports discovered hosts to `listener` and
    /// confirms host addresses through `prober`.
    ///
    /// # Errors
    ///
    /// Same as [`VtnManager::new`].
    pub fn with_collaborators(
        config: VtnConfig,
        membership: Arc<dyn ClusterMembership>,
        programmer: Arc<dyn SwitchProgrammer>,
        listener: Option<Arc<dyn HostListener>>,
        prober: Option<Arc<dyn AddressProber>>,
    ) -> Result<Self, VtnError> {
        let cluster = ClusterState::new(config.retry);
        Self::join(config, membership, programmer, &cluster, listener, prober)
    }

    /// Start a controller core over `cluster`. Mappings committed by the cores
    /// sharing it are seen by all of them, and MAC tables are loaded from the
    /// shared entries when their bridge is added. The retry policy in effect is
    /// the one `cluster` was created with.
    ///
    /// # Errors
    ///
    /// Same as [`VtnManager::new`].
    pub fn join(
        config: VtnConfig,
        membership: Arc<dyn ClusterMembership>,
        programmer: Arc<dyn SwitchProgrammer>,
        cluster: &ClusterState,
        listener: Option<Arc<dyn HostListener>>,
        prober: Option<Arc<dyn AddressProber>>,
    ) -> Result<Self, VtnError> {
        config.validate()?;
        let name = config.container.clone();
        debug!("{name}: Initializing...");

        let local = membership.local_address();
        if local != config.controller_address {
            warn!(
                "{name}: configured address {} differs from cluster address {local}, using the latter",
                config.controller_address
            );
        }

        debug!("{name}: Starting flow-mod worker...");
        let worker = FlowModWorker::start(programmer, config.flow_queue_capacity)?;
        let flow_queue = worker.queue();

        debug!("{name}: Creating MAC tables...");
        let mac_tables = MacTables::new(local, cluster.mac_entries.clone(), listener, prober);
        let tenants = Arc::new(Tenants::default());

        debug!("{name}: Starting MAC table ager...");
        let ager = {
            let mac_tables = mac_tables.clone();
            let tenants = tenants.clone();
            MacTableAger::start(config.mac_age_interval(), move || {
                let aged = age(&mac_tables, &tenants);
                if aged > 0 {
                    debug!("Aged out {aged} MAC entries");
                }
            })?
        };

        let resolver = ResourceResolver::with_store(cluster.mappings.clone());
        info!("{name}: Successfully started with parameters:\n{config}");
        Ok(Self {
            config: RwLock::new(config),
            membership,
            resolver,
            mac_tables,
            tenants,
            internal_ports: RwLock::new(BTreeSet::new()),
            flow_queue,
            worker: Mutex::new(worker),
            ager: Mutex::new(Some(ager)),
        })
    }

    /// The name of the container this core serves.
    #[must_use]
    pub fn container(&self) -> String {
        self.config.read().container.clone()
    }

    /// The shared state this core runs over.
    #[must_use]
    pub fn cluster_state(&self) -> ClusterState {
        ClusterState {
            mappings: self.resolver.store().clone(),
            mac_entries: self.mac_tables.cache().clone(),
        }
    }

    #[must_use]
    pub fn config(&self) -> VtnConfig {
        self.config.read().clone()
    }

    #[must_use]
    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    #[must_use]
    pub fn mac_tables(&self) -> &Arc<MacTables> {
        &self.mac_tables
    }

    #[must_use]
    pub fn membership(&self) -> &Arc<dyn ClusterMembership> {
        &self.membership
    }

    /// # Errors
    ///
    /// [`VtnError::TenantExists`] if the name is taken.
    pub fn add_tenant(&self, name: &str) -> Result<(), VtnError> {
        self.tenants
            .add(name, FlowDatabase::new(name, self.flow_queue.clone()))?;
        info!("Added tenant {name}");
        Ok(())
    }

    /// Remove a tenant along with the MAC tables of its bridges and its flows.
    ///
    /// # Errors
    ///
    /// [`VtnError::NoSuchTenant`] if there is no such tenant.
    pub fn remove_tenant(&self, name: &str) -> Result<(), VtnError> {
        let tenant = self.tenants.remove(name)?;
        for bridge in &tenant.bridges {
            self.mac_tables.remove(&BridgePath::new(name, bridge));
        }
        let flows = tenant.flows.clear();
        info!("Removed tenant {name} and {} flows", flows.len());
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if the tenant does not exist or already has the bridge.
    pub fn add_bridge(&self, bridge: &BridgePath) -> Result<Arc<MacAddressTable>, VtnError> {
        self.tenants.add_bridge(bridge)?;
        info!("Added bridge {bridge}");
        Ok(self.mac_tables.create(bridge))
    }

    /// Remove a bridge, its MAC table and the flows through it.
    ///
    /// # Errors
    ///
    /// [`VtnError::NoSuchBridge`] if there is no such bridge.
    pub fn remove_bridge(&self, bridge: &BridgePath) -> Result<(), VtnError> {
        self.tenants.remove_bridge(bridge)?;
        let entries = self.mac_tables.remove(bridge);
        let flows = self
            .tenants
            .flows(&bridge.tenant)
            .map(|db| db.remove_flows_by_path(&VNodePath::Bridge(bridge.clone())))
            .unwrap_or_default();
        info!(
            "Removed bridge {bridge}, {} MAC entries and {} flows",
            entries.len(),
            flows.len()
        );
        Ok(())
    }

    #[must_use]
    pub fn tenants(&self) -> Vec<String> {
        self.tenants.names()
    }

    #[must_use]
    pub fn bridges(&self, tenant: &str) -> Option<Vec<BridgePath>> {
        self.tenants.bridges(tenant)
    }

    #[must_use]
    pub fn flow_database(&self, tenant: &str) -> Option<Arc<FlowDatabase>> {
        self.tenants.flows(tenant)
    }

    #[must_use]
    pub fn mac_table(&self, bridge: &BridgePath) -> Option<Arc<MacAddressTable>> {
        if self.tenants.has_bridge(bridge) {
            self.mac_tables.get(bridge)
        } else {
            None
        }
    }

    /// Run a mapping change and execute the cleanup it produced.
    ///
    /// # Errors
    ///
    /// Returns the resolver's refusal. Nothing is cleaned up then.
    pub fn change_mappings<F>(&self, change: F) -> Result<Vec<CleanupAction>, VtnError>
    where
        F: FnOnce(&ResourceResolver) -> Result<Vec<CleanupAction>, ResolverError>,
    {
        let cleanup = change(&self.resolver)?;
        self.execute_cleanup(&cleanup);
        Ok(cleanup)
    }

    /// Remove every mapping owned by this container and purge what they learned.
    ///
    /// # Errors
    ///
    /// Fails only when the retry budget runs out.
    pub fn remove_container_mappings(&self) -> Result<usize, VtnError> {
        let container = self.container();
        let cleanup = self.resolver.clean_up(&container)?;
        self.execute_cleanup(&cleanup);
        Ok(cleanup.len())
    }

    /// One aging sweep over every MAC table, as the ager does periodically.
    /// Returns the number of entries that aged out.
    pub fn age_mac_tables(&self) -> usize {
        age(&self.mac_tables, &self.tenants)
    }

    /// Change the MAC aging interval and reschedule the ager.
    ///
    /// # Errors
    ///
    /// [`VtnError::Config`] if the interval is out of range.
    pub fn set_mac_age_interval(&self, secs: u64) -> Result<(), VtnError> {
        validate_age_interval(secs)?;
        self.config.write().mac_age_interval_secs = secs;
        if let Some(ager) = self.ager.lock().as_ref() {
            ager.set_interval(Duration::from_secs(secs));
        }
        info!("MAC age interval set to {secs}s");
        Ok(())
    }

    /// Purge the shared MAC entries nobody can own anymore: entries of unknown
    /// bridges and entries learned by controllers that left the cluster.
    /// Returns the number of entries purged.
    pub fn reconcile(&self) -> usize {
        let live = self.membership.controllers();
        let mut departed = {
            let live = live.clone();
            EntryRemover::by_filter(move |e| !live.contains(&e.id.controller))
        };
        let mut purged = self.mac_tables.remove_where(&mut departed).len();

        let cache = self.mac_tables.cache();
        let orphans = cache.collect_where(|_, entry| {
            !self.tenants.has_bridge(entry.bridge()) || !live.contains(&entry.id.controller)
        });
        for (id, entry) in &orphans {
            if cache.remove_if(id, entry) {
                debug!("Purged orphan MAC entry {entry}");
                purged += 1;
            }
        }
        if purged > 0 {
            info!("Reconciliation purged {purged} MAC entries");
        }
        purged
    }

    /// Wait until every flow-mod task queued so far has been handed to the
    /// switches. Returns false on timeout.
    pub fn sync_flows(&self, timeout: Duration) -> bool {
        self.flow_queue.sync(timeout)
    }

    /// Stop the background threads. Queued flow-mod tasks are still executed.
    pub fn shutdown(&self) {
        let name = self.container();
        if let Some(mut ager) = self.ager.lock().take() {
            ager.stop();
        }
        self.worker.lock().stop();
        debug!("{name}: Stopped");
    }

    // The store logs exhausted retries itself.
    pub(crate) fn log_failure(&self, what: &str, err: &ResolverError) {
        if err.is_contention() || matches!(err, ResolverError::Store(_)) {
            debug!("{what}: {err}");
        } else {
            error!("{what}: {err}");
        }
    }
}

impl Drop for VtnManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
