// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A change to the access lists of a MAC mapping.

use model::MacVlan;
use std::collections::BTreeSet;
use std::fmt::Display;

/// Hosts to add to or remove from the allow and deny lists of one MAC mapping.
///
/// Allowed hosts may be wildcards, covering a whole VLAN. Denied hosts must be
/// concrete.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MacMapChange {
    pub add_allowed: BTreeSet<MacVlan>,
    pub remove_allowed: BTreeSet<MacVlan>,
    pub add_denied: BTreeSet<MacVlan>,
    pub remove_denied: BTreeSet<MacVlan>,
    /// Remove the whole mapping. The host sets are ignored.
    pub remove_all: bool,
}

impl MacMapChange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A change removing the mapping altogether.
    #[must_use]
    pub fn remove_all() -> Self {
        Self {
            remove_all: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn allow(mut self, host: MacVlan) -> Self {
        self.add_allowed.insert(host);
        self
    }

    #[must_use]
    pub fn disallow(mut self, host: MacVlan) -> Self {
        self.remove_allowed.insert(host);
        self
    }

    #[must_use]
    pub fn deny(mut self, host: MacVlan) -> Self {
        self.add_denied.insert(host);
        self
    }

    #[must_use]
    pub fn undeny(mut self, host: MacVlan) -> Self {
        self.remove_denied.insert(host);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.remove_all
            && self.add_allowed.is_empty()
            && self.remove_allowed.is_empty()
            && self.add_denied.is_empty()
            && self.remove_denied.is_empty()
    }

    /// The first wildcard found in the deny lists.
    pub(crate) fn denied_wildcard(&self) -> Option<&MacVlan> {
        self.add_denied
            .iter()
            .chain(self.remove_denied.iter())
            .find(|h| h.is_wildcard())
    }
}

impl Display for MacMapChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.remove_all {
            return write!(f, "remove all");
        }
        write!(
            f,
            "allow +{} -{}, deny +{} -{}",
            self.add_allowed.len(),
            self.remove_allowed.len(),
            self.add_denied.len(),
            self.remove_denied.len()
        )
    }
}
