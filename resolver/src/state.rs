// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Runtime state of a MAC mapping: the hosts it currently binds to switch ports.
//!
//! The state is a plain value. Transactions clone it, mutate the clone and
//! stage the clone for commit, so a rejected attempt just drops its copy.

use model::{MacVlan, PortVlan, SwitchPort};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MacMapState {
    /// Active hosts and the port each one was last seen on.
    active: BTreeMap<MacVlan, SwitchPort>,
    /// Reserved broadcast domains and the active hosts using each of them.
    ports: BTreeMap<PortVlan, BTreeSet<MacVlan>>,
}

/// Outcome of [`MacMapState::activate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    /// The host was already active on that port.
    Unchanged,
    /// The host was bound to the port. If it moved, the domain it left may no
    /// longer be used by any host and is returned in `released`.
    Activated { released: Option<PortVlan> },
}

/// A host removed from the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inactivated {
    pub host: MacVlan,
    pub port: SwitchPort,
    /// Set if the host was the last user of its domain.
    pub released: Option<PortVlan>,
}

impl MacMapState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Port the host is bound to, if active.
    #[must_use]
    pub fn port(&self, host: &MacVlan) -> Option<SwitchPort> {
        self.active.get(host).copied()
    }

    #[must_use]
    pub fn active_hosts(&self) -> &BTreeMap<MacVlan, SwitchPort> {
        &self.active
    }

    pub fn reserved_ports(&self) -> impl Iterator<Item = &PortVlan> {
        self.ports.keys()
    }

    #[must_use]
    pub fn has_port(&self, pv: &PortVlan) -> bool {
        self.ports.contains_key(pv)
    }

    /// An active host with the same address as `host` but on another VLAN.
    #[must_use]
    pub fn get_duplicate(&self, host: &MacVlan) -> Option<MacVlan> {
        let mac = host.mac?;
        self.active
            .keys()
            .find(|h| h.mac == Some(mac) && h.vlan != host.vlan)
            .copied()
    }

    /// Bind `host` to `port`.
    ///
    /// # Errors
    ///
    /// Returns the active duplicate of `host` if there is one, leaving the state untouched.
    pub fn activate(&mut self, host: MacVlan, port: SwitchPort) -> Result<Activation, MacVlan> {
        if let Some(dup) = self.get_duplicate(&host) {
            return Err(dup);
        }
        let released = match self.active.insert(host, port) {
            Some(old) if old == port => return Ok(Activation::Unchanged),
            Some(old) => self.detach(host, PortVlan::new(old, host.vlan)),
            None => None,
        };
        self.ports
            .entry(PortVlan::new(port, host.vlan))
            .or_default()
            .insert(host);
        Ok(Activation::Activated { released })
    }

    fn detach(&mut self, host: MacVlan, pv: PortVlan) -> Option<PortVlan> {
        let hosts = self.ports.get_mut(&pv)?;
        hosts.remove(&host);
        if hosts.is_empty() {
            self.ports.remove(&pv);
            Some(pv)
        } else {
            None
        }
    }

    pub fn inactivate(&mut self, host: &MacVlan) -> Option<Inactivated> {
        let port = self.active.remove(host)?;
        let released = self.detach(*host, PortVlan::new(port, host.vlan));
        Some(Inactivated {
            host: *host,
            port,
            released,
        })
    }

    /// Drop the reservation of `pv` along with every host using it.
    pub fn inactivate_port(&mut self, pv: &PortVlan) -> Vec<MacVlan> {
        let hosts = self.ports.remove(pv).unwrap_or_default();
        for host in &hosts {
            self.active.remove(host);
        }
        hosts.into_iter().collect()
    }

    pub fn inactivate_where<F>(&mut self, mut filter: F) -> Vec<Inactivated>
    where
        F: FnMut(&MacVlan, &SwitchPort) -> bool,
    {
        let hosts: Vec<MacVlan> = self
            .active
            .iter()
            .filter(|(host, port)| filter(host, port))
            .map(|(host, _)| *host)
            .collect();
        hosts.iter().filter_map(|h| self.inactivate(h)).collect()
    }
}
