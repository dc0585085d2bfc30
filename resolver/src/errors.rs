// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Resolver errors

use model::{MacVlan, MapReference, PortVlan};
use store::StoreError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("Resource is already mapped by {0}")]
    Conflict(MapReference),
    #[error("Host {host} is already allowed by {owner}")]
    MacMapConflict { host: MacVlan, owner: MapReference },
    #[error("Host {host} is no longer mapped by {reference}")]
    Gone {
        reference: MapReference,
        host: MacVlan,
    },
    #[error("{reference} cannot map {host}: {port} is reserved by {owner}")]
    Busy {
        reference: MapReference,
        host: MacVlan,
        port: PortVlan,
        owner: MapReference,
    },
    #[error("{reference} cannot map {host}: the same address is active as {active}")]
    Duplicate {
        reference: MapReference,
        host: MacVlan,
        active: MacVlan,
    },
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResolverError {
    /// Whether the error is one of the expected outcomes of contention, as opposed
    /// to a broken invariant or a bad request.
    #[must_use]
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            ResolverError::Conflict(_)
                | ResolverError::MacMapConflict { .. }
                | ResolverError::Gone { .. }
                | ResolverError::Busy { .. }
                | ResolverError::Duplicate { .. }
        )
    }

    pub(crate) fn internal(msg: String) -> Self {
        error!("{msg}");
        ResolverError::Internal(msg)
    }
}
