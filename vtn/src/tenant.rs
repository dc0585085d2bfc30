// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tenants and their bridges, as far as the controller core needs them.

use flowdb::FlowDatabase;
use model::BridgePath;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::VtnError;

pub(crate) struct Tenant {
    pub(crate) bridges: BTreeSet<String>,
    pub(crate) flows: Arc<FlowDatabase>,
}

#[derive(Default)]
pub(crate) struct Tenants(RwLock<BTreeMap<String, Tenant>>);

impl Tenants {
    pub(crate) fn add(&self, name: &str, flows: FlowDatabase) -> Result<(), VtnError> {
        let mut tenants = self.0.write();
        if tenants.contains_key(name) {
            return Err(VtnError::TenantExists(name.to_string()));
        }
        tenants.insert(
            name.to_string(),
            Tenant {
                bridges: BTreeSet::new(),
                flows: Arc::new(flows),
            },
        );
        Ok(())
    }

    pub(crate) fn remove(&self, name: &str) -> Result<Tenant, VtnError> {
        self.0
            .write()
            .remove(name)
            .ok_or_else(|| VtnError::NoSuchTenant(name.to_string()))
    }

    pub(crate) fn add_bridge(&self, bridge: &BridgePath) -> Result<(), VtnError> {
        let mut tenants = self.0.write();
        let tenant = tenants
            .get_mut(&bridge.tenant)
            .ok_or_else(|| VtnError::NoSuchTenant(bridge.tenant.clone()))?;
        if !tenant.bridges.insert(bridge.bridge.clone()) {
            return Err(VtnError::BridgeExists(bridge.clone()));
        }
        Ok(())
    }

    pub(crate) fn remove_bridge(&self, bridge: &BridgePath) -> Result<(), VtnError> {
        let mut tenants = self.0.write();
        match tenants
            .get_mut(&bridge.tenant)
            .map(|tenant| tenant.bridges.remove(&bridge.bridge))
        {
            Some(true) => Ok(()),
            _ => Err(VtnError::NoSuchBridge(bridge.clone())),
        }
    }

    pub(crate) fn has_bridge(&self, bridge: &BridgePath) -> bool {
        self.0
            .read()
            .get(&bridge.tenant)
            .is_some_and(|t| t.bridges.contains(&bridge.bridge))
    }

    pub(crate) fn flows(&self, tenant: &str) -> Option<Arc<FlowDatabase>> {
        self.0.read().get(tenant).map(|t| t.flows.clone())
    }

    pub(crate) fn all_flows(&self) -> Vec<Arc<FlowDatabase>> {
        self.0.read().values().map(|t| t.flows.clone()).collect()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.0.read().keys().cloned().collect()
    }

    pub(crate) fn bridges(&self, tenant: &str) -> Option<Vec<BridgePath>> {
        self.0.read().get(tenant).map(|t| {
            t.bridges
                .iter()
                .map(|b| BridgePath::new(tenant, b))
                .collect()
        })
    }
}
