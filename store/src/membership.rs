// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Cluster membership

use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::net::IpAddr;
use tracing::info;

/// Which controllers form the cluster and which one is this one.
pub trait ClusterMembership: Send + Sync {
    fn local_address(&self) -> IpAddr;
    /// All live controllers, including this one.
    fn controllers(&self) -> BTreeSet<IpAddr>;

    fn is_local(&self, addr: &IpAddr) -> bool {
        *addr == self.local_address()
    }
}

/// Membership maintained by hand.
#[derive(Debug)]
pub struct StaticMembership {
    local: IpAddr,
    peers: RwLock<BTreeSet<IpAddr>>,
}

impl StaticMembership {
    #[must_use]
    pub fn new(local: IpAddr) -> Self {
        Self {
            local,
            peers: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn add_peer(&self, peer: IpAddr) {
        if peer != self.local && self.peers.write().insert(peer) {
            info!("Controller {peer} joined the cluster");
        }
    }

    /// Returns true if the peer was a member.
    pub fn remove_peer(&self, peer: &IpAddr) -> bool {
        let removed = self.peers.write().remove(peer);
        if removed {
            info!("Controller {peer} left the cluster");
        }
        removed
    }
}

impl ClusterMembership for StaticMembership {
    fn local_address(&self) -> IpAddr {
        self.local
    }

    fn controllers(&self) -> BTreeSet<IpAddr> {
        let mut all = self.peers.read().clone();
        all.insert(self.local);
        all
    }
}
