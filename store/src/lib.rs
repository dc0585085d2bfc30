// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The cluster cache abstraction the controller core is written against.
//!
//! A [`ClusterMap`] is a linearizable map with compare-and-swap primitives and
//! change notifications. The replication transport is out of scope: changes made
//! by peers are injected with the `apply_remote_*` methods. On top of the maps,
//! [`ConfigRevision`] provides the optimistic transactions used to mutate mapping
//! state and the snapshot reads used to resolve it.

#![deny(clippy::all, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod cache;
pub mod membership;
pub mod revision;
pub mod writeset;

pub use cache::{CacheListener, ClusterMap, EventOrigin};
pub use membership::{ClusterMembership, StaticMembership};
pub use revision::{ConfigRevision, RevisionKey, WriteBatch};
pub use writeset::WriteSet;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Transaction gave up after {attempts} attempts")]
    RetryExhausted { attempts: u32 },
    #[error("Snapshot read gave up after {attempts} attempts")]
    SnapshotUnstable { attempts: u32 },
}
