// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Cluster-wide key-value maps

use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tracectl::trace_target;
use tracing::trace;

trace_target!("cluster-cache", tracectl::LevelFilter::INFO, &["store"]);

/// Whether a change was made by this controller or propagated from a peer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventOrigin {
    Local,
    Remote,
}

/// Receives the changes made to a [`ClusterMap`]. Callbacks run after the change
/// is visible and without any map lock held, so they may access the map.
pub trait CacheListener<K, V>: Send + Sync {
    fn entry_created(&self, _key: &K, _value: &V, _origin: EventOrigin) {}
    fn entry_updated(&self, _key: &K, _old: &V, _new: &V, _origin: EventOrigin) {}
    fn entry_deleted(&self, _key: &K, _old: &V, _origin: EventOrigin) {}
}

enum Change<V> {
    Created(V),
    Updated(V, V),
    Deleted(V),
}

/// A linearizable map with per-key atomic operations.
pub struct ClusterMap<K, V> {
    name: &'static str,
    map: DashMap<K, V, RandomState>,
    listeners: RwLock<Vec<Arc<dyn CacheListener<K, V>>>>,
}

impl<K: Eq + Hash, V> Debug for ClusterMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterMap")
            .field("name", &self.name)
            .field("len", &self.map.len())
            .finish_non_exhaustive()
    }
}

impl<K, V> ClusterMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            map: DashMap::with_hasher(RandomState::with_seed(0)),
            listeners: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn add_listener(&self, listener: Arc<dyn CacheListener<K, V>>) {
        self.listeners.write().push(listener);
    }

    fn notify(&self, key: &K, change: &Change<V>, origin: EventOrigin) {
        let listeners = self.listeners.read().clone();
        for l in &listeners {
            match change {
                Change::Created(v) => l.entry_created(key, v, origin),
                Change::Updated(old, new) => l.entry_updated(key, old, new, origin),
                Change::Deleted(old) => l.entry_deleted(key, old, origin),
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).map(|v| v.value().clone())
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Insert `value` unless the key is present. Returns the present value, if any.
    pub fn put_if_absent(&self, key: K, value: V) -> Option<V> {
        let created = match self.map.entry(key.clone()) {
            Entry::Occupied(e) => return Some(e.get().clone()),
            Entry::Vacant(e) => {
                e.insert(value.clone());
                value
            }
        };
        trace!("{}: created entry", self.name);
        self.notify(&key, &Change::Created(created), EventOrigin::Local);
        None
    }

    /// Insert or overwrite. Returns the previous value.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.put_with_origin(key, value, EventOrigin::Local)
    }

    fn put_with_origin(&self, key: K, value: V, origin: EventOrigin) -> Option<V> {
        let old = self.map.insert(key.clone(), value.clone());
        let change = match &old {
            Some(old) if *old == value => return Some(value),
            Some(old) => Change::Updated(old.clone(), value),
            None => Change::Created(value),
        };
        self.notify(&key, &change, origin);
        old
    }

    /// Replace the value of `key` only if it currently equals `expected`.
    pub fn replace(&self, key: &K, expected: &V, value: V) -> bool {
        let old = match self.map.get_mut(key) {
            Some(mut current) if current.value() == expected => {
                std::mem::replace(current.value_mut(), value.clone())
            }
            _ => return false,
        };
        if old != value {
            self.notify(key, &Change::Updated(old, value), EventOrigin::Local);
        }
        true
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.remove_with_origin(key, EventOrigin::Local)
    }

    fn remove_with_origin(&self, key: &K, origin: EventOrigin) -> Option<V> {
        let (_, old) = self.map.remove(key)?;
        self.notify(key, &Change::Deleted(old.clone()), origin);
        Some(old)
    }

    /// Remove `key` only if its value equals `expected`.
    pub fn remove_if(&self, key: &K, expected: &V) -> bool {
        match self.map.remove_if(key, |_, v| v == expected) {
            Some((_, old)) => {
                self.notify(key, &Change::Deleted(old), EventOrigin::Local);
                true
            }
            None => false,
        }
    }

    /// Copy of all entries. Not atomic with respect to concurrent writers.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.map
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Copy of the entries matching `pred`.
    pub fn collect_where<P>(&self, mut pred: P) -> Vec<(K, V)>
    where
        P: FnMut(&K, &V) -> bool,
    {
        self.map
            .iter()
            .filter(|e| pred(e.key(), e.value()))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// A peer created or updated an entry.
    pub fn apply_remote_put(&self, key: K, value: V) -> Option<V> {
        self.put_with_origin(key, value, EventOrigin::Remote)
    }

    /// A peer removed an entry.
    pub fn apply_remote_remove(&self, key: &K) -> Option<V> {
        self.remove_with_origin(key, EventOrigin::Remote)
    }
}
