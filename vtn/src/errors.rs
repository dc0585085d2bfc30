// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use config::ConfigError;
use flowdb::FlowDbError;
use mactable::MacTableError;
use model::BridgePath;
use resolver::ResolverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VtnError {
    #[error("Tenant {0} already exists")]
    TenantExists(String),
    #[error("No such tenant: {0}")]
    NoSuchTenant(String),
    #[error("Bridge {0} already exists")]
    BridgeExists(BridgePath),
    #[error("No such bridge: {0}")]
    NoSuchBridge(BridgePath),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    #[error(transparent)]
    MacTable(#[from] MacTableError),
    #[error(transparent)]
    FlowDb(#[from] FlowDbError),
}
