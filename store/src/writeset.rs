// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Staged changes to a [`ClusterMap`]

use ahash::RandomState;
use std::collections::HashMap;
use std::hash::Hash;

use crate::ClusterMap;

/// Writes of a transaction against one map. Reads see the staged writes first,
/// then the committed map. Nothing reaches the map before [`WriteSet::apply`].
pub struct WriteSet<'a, K, V> {
    base: &'a ClusterMap<K, V>,
    staged: HashMap<K, Option<V>, RandomState>,
}

impl<'a, K, V> WriteSet<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    #[must_use]
    pub fn new(base: &'a ClusterMap<K, V>) -> Self {
        Self {
            base,
            staged: HashMap::with_hasher(RandomState::with_seed(0)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        match self.staged.get(key) {
            Some(staged) => staged.clone(),
            None => self.base.get(key),
        }
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        match self.staged.get(key) {
            Some(staged) => staged.is_some(),
            None => self.base.contains_key(key),
        }
    }

    /// Returns the previous value as seen by this transaction.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let old = self.get(&key);
        self.staged.insert(key, Some(value));
        old
    }

    /// Returns the removed value as seen by this transaction.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let old = self.get(key);
        if old.is_some() {
            self.staged.insert(key.clone(), None);
        }
        old
    }

    /// Entries matching `pred`, with the staged writes applied.
    pub fn collect_where<P>(&self, mut pred: P) -> Vec<(K, V)>
    where
        P: FnMut(&K, &V) -> bool,
    {
        let mut out: Vec<(K, V)> = self
            .base
            .collect_where(|k, v| !self.staged.contains_key(k) && pred(k, v));
        out.extend(
            self.staged
                .iter()
                .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
                .filter(|(k, v)| pred(*k, *v))
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        out
    }

    /// The staged writes that differ from the committed map.
    fn changes(&self) -> impl Iterator<Item = (&K, &Option<V>)> {
        self.staged
            .iter()
            .filter(|(k, v)| self.base.get(k).as_ref() != v.as_ref())
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.changes().next().is_some()
    }

    /// Publish the staged writes to the map.
    pub fn apply(self) {
        let base = self.base;
        let changes: Vec<(K, Option<V>)> = self
            .changes()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in changes {
            match value {
                Some(v) => {
                    base.put(key, v);
                }
                None => {
                    base.remove(&key);
                }
            }
        }
    }
}
