// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Deferred cleanup produced by committed mapping changes.
//!
//! A transaction never touches forwarding state. It reports what became stale as
//! [`CleanupAction`]s, which the caller executes once the change is committed.

use model::{MacVlan, MapReference, NodeVlan, PortVlan};
use std::fmt::Display;

/// The part of the network whose cached state is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PurgeScope {
    NodeVlan(NodeVlan),
    PortVlan(PortVlan),
    /// A host, or a whole VLAN if the host is a wildcard.
    Host(MacVlan),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CleanupAction {
    /// Flush what the mapping `owner` learned and installed within `scope`.
    PurgeMapping { owner: MapReference, scope: PurgeScope },
    /// Flush what any bridge of `container` learned and installed for `host`.
    PurgeHost { container: String, host: MacVlan },
}

/// The result of a committed change along with the cleanup it requires.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Committed<T> {
    pub value: T,
    pub cleanup: Vec<CleanupAction>,
}

impl<T> Committed<T> {
    pub fn new(value: T, cleanup: Vec<CleanupAction>) -> Self {
        Self { value, cleanup }
    }
}

impl Display for PurgeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurgeScope::NodeVlan(nv) => write!(f, "{nv}"),
            PurgeScope::PortVlan(pv) => write!(f, "{pv}"),
            PurgeScope::Host(mv) => write!(f, "{mv}"),
        }
    }
}

impl Display for CleanupAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupAction::PurgeMapping { owner, scope } => write!(f, "purge {owner} on {scope}"),
            CleanupAction::PurgeHost { container, host } => {
                write!(f, "purge host {host} in {container}")
            }
        }
    }
}
