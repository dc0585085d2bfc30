// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The MAC address table of one virtual bridge.

use ahash::RandomState;
use model::{BridgePath, EtherType, Mac, ParsedFrame, VNodePath};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use store::ClusterMap;
use tracectl::trace_target;
use tracing::{debug, error, trace};

use crate::{AddressProber, EntryIdGenerator, EntryRemover, HostListener};
use crate::{MacTableEntry, MacTableEntryId};

trace_target!("mac-table", tracectl::LevelFilter::INFO, &["mactable"]);

/// The cluster-wide copy of all learned entries.
pub type MacEntryCache = ClusterMap<MacTableEntryId, MacTableEntry>;

/// What [`MacAddressTable::add`] did besides learning.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Entries whose flows may be stale: a new entry, and on a host move the
    /// replaced entry as well.
    pub obsolete: Vec<MacTableEntry>,
    /// Address probed to confirm the host.
    pub probed: Option<IpAddr>,
}

/// Hosts learned on one bridge, keyed by MAC address.
///
/// One lock serializes every access to the table. It is never held while the
/// shared cache is updated.
pub struct MacAddressTable {
    bridge: BridgePath,
    ids: Arc<EntryIdGenerator>,
    cache: Arc<MacEntryCache>,
    entries: Mutex<HashMap<u64, MacTableEntry, RandomState>>,
    listener: Option<Arc<dyn HostListener>>,
    prober: Option<Arc<dyn AddressProber>>,
}

impl std::fmt::Debug for MacAddressTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacAddressTable")
            .field("bridge", &self.bridge)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl MacAddressTable {
    #[must_use]
    pub fn new(bridge: BridgePath, ids: Arc<EntryIdGenerator>, cache: Arc<MacEntryCache>) -> Self {
        Self {
            bridge,
            ids,
            cache,
            entries: Mutex::new(HashMap::with_hasher(RandomState::with_seed(0))),
            listener: None,
            prober: None,
        }
    }

    #[must_use]
    pub fn with_host_listener(mut self, listener: Option<Arc<dyn HostListener>>) -> Self {
        self.listener = listener;
        self
    }

    #[must_use]
    pub fn with_prober(mut self, prober: Option<Arc<dyn AddressProber>>) -> Self {
        self.prober = prober;
        self
    }

    #[must_use]
    pub fn bridge(&self) -> &BridgePath {
        &self.bridge
    }

    /// Learn the source of `frame`, mapped to this bridge through `path`.
    pub fn add(&self, frame: &ParsedFrame, path: &VNodePath) -> AddOutcome {
        let mut outcome = AddOutcome::default();
        if !frame.src.is_learnable() {
            return outcome;
        }
        if path.bridge() != &self.bridge {
            error!(
                "Frame from {} mapped by {path} offered to the table of {}",
                frame.src, self.bridge
            );
            return outcome;
        }
        let learned = match frame.ether_type {
            EtherType::Arp => frame.learnable_ip(),
            _ => None,
        };

        let mut publish = None;
        let mut retire = None;
        let mut probe = None;
        {
            let mut entries = self.entries.lock();
            let key = frame.src.as_u64();
            if let Some(current) = entries.get_mut(&key)
                && !current.has_moved(frame.in_port, frame.vlan, path)
            {
                current.used = true;
                if let Some(ip) = learned {
                    if current.ips.insert(ip) {
                        publish = Some(current.clone());
                    }
                } else if current.ips.is_empty() && frame.is_ipv4() {
                    probe = frame.learnable_ip().map(|ip| (current.clone(), ip));
                }
            } else {
                let entry = MacTableEntry::new(
                    self.ids.next_id(),
                    path.clone(),
                    frame.src,
                    frame.in_port,
                    frame.vlan,
                    learned,
                );
                if let Some(old) = entries.insert(key, entry.clone()) {
                    debug!("Host moved: {old} -> {entry}");
                    outcome.obsolete.push(old.clone());
                    retire = Some(old);
                }
                if entry.ips.is_empty() && frame.is_ipv4() {
                    probe = frame.learnable_ip().map(|ip| (entry.clone(), ip));
                }
                outcome.obsolete.push(entry.clone());
                publish = Some(entry);
            }
        }

        if let Some(old) = retire {
            self.cache.remove(&old.id);
        }
        if let Some(entry) = publish {
            trace!("Learned {entry}");
            if let Some(listener) = &self.listener {
                listener.notify_host(entry.mac, learned, entry.port, entry.vlan);
            }
            self.cache.put(entry.id, entry);
        }
        if let Some((entry, ip)) = probe
            && let Some(prober) = &self.prober
        {
            prober.probe(&entry, ip);
            outcome.probed = Some(ip);
        }
        outcome
    }

    #[must_use]
    pub fn get(&self, mac: Mac) -> Option<MacTableEntry> {
        self.entries.lock().get(&mac.as_u64()).cloned()
    }

    /// All entries, ordered by address.
    #[must_use]
    pub fn entries(&self) -> Vec<MacTableEntry> {
        let mut all: Vec<MacTableEntry> = self.entries.lock().values().cloned().collect();
        all.sort_by_key(|e| e.mac);
        all
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn remove(&self, mac: Mac) -> Option<MacTableEntry> {
        let removed = self.entries.lock().remove(&mac.as_u64())?;
        self.cache.remove(&removed.id);
        Some(removed)
    }

    /// Remove the entries matched by `remover`.
    pub fn remove_where(&self, remover: &mut EntryRemover) -> Vec<MacTableEntry> {
        let removed: Vec<MacTableEntry> = {
            let mut entries = self.entries.lock();
            let keys: Vec<u64> = entries
                .iter_mut()
                .filter_map(|(key, entry)| remover.matches(entry).then_some(*key))
                .collect();
            keys.iter().filter_map(|key| entries.remove(key)).collect()
        };
        for entry in &removed {
            self.cache.remove(&entry.id);
        }
        if !removed.is_empty() {
            debug!(
                "Removed {} entries of {} ({remover})",
                removed.len(),
                self.bridge
            );
        }
        removed
    }

    pub fn flush(&self) -> Vec<MacTableEntry> {
        self.remove_where(&mut EntryRemover::all())
    }

    /// One aging sweep: drop the local entries unused since the previous sweep.
    pub fn age(&self) -> Vec<MacTableEntry> {
        self.remove_where(&mut EntryRemover::aged(self.ids.controller()))
    }

    /// A peer learned `entry`.
    pub fn apply_remote_put(&self, entry: MacTableEntry) {
        if entry.bridge() != &self.bridge {
            return;
        }
        trace!("Peer learned {entry}");
        self.entries.lock().insert(entry.mac.as_u64(), entry);
    }

    /// A peer removed `entry`.
    pub fn apply_remote_remove(&self, entry: &MacTableEntry) {
        let mut entries = self.entries.lock();
        let key = entry.mac.as_u64();
        if entries.get(&key).is_some_and(|e| e.id == entry.id) {
            entries.remove(&key);
        }
    }

    /// Load the entries of this bridge from the shared cache. Returns how many
    /// were loaded.
    pub fn reload_from_cache(&self) -> usize {
        let shared = self
            .cache
            .collect_where(|_, entry| entry.bridge() == &self.bridge);
        let count = shared.len();
        let mut entries = self.entries.lock();
        for (_, entry) in shared {
            entries.insert(entry.mac.as_u64(), entry);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{NodeId, SwitchPort, VlanId};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    const LOCAL: &str = "10.0.0.1";

    #[derive(Default)]
    struct Counter {
        hosts: AtomicUsize,
        probes: AtomicUsize,
    }

    impl HostListener for Counter {
        fn notify_host(&self, _: Mac, _: Option<IpAddr>, _: SwitchPort, _: VlanId) {
            self.hosts.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl AddressProber for Counter {
        fn probe(&self, _: &MacTableEntry, _: IpAddr) {
            self.probes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn bridge_path() -> VNodePath {
        VNodePath::Bridge(BridgePath::new("t1", "b1"))
    }

    fn table(counter: &Arc<Counter>) -> MacAddressTable {
        let ids = Arc::new(EntryIdGenerator::new(LOCAL.parse().unwrap()));
        MacAddressTable::new(
            BridgePath::new("t1", "b1"),
            ids,
            Arc::new(ClusterMap::new("mac-entries")),
        )
        .with_host_listener(Some(counter.clone()))
        .with_prober(Some(counter.clone()))
    }

    fn frame(last: u8, port: u32, vlan: u16) -> ParsedFrame {
        ParsedFrame::new(
            Mac([0x00, 0x00, 0x5e, 0x00, 0x53, last]),
            Mac::BROADCAST,
            SwitchPort::new(NodeId(1), port),
            VlanId::new(vlan).unwrap(),
        )
    }

    #[test]
    fn host_move_replaces_entry() {
        let counter = Arc::new(Counter::default());
        let table = table(&counter);
        let path = bridge_path();

        let first = table.add(&frame(1, 1, 10), &path);
        assert_eq!(first.obsolete.len(), 1);
        let old = first.obsolete[0].clone();

        let moved = table.add(&frame(1, 2, 20), &path);
        assert_eq!(moved.obsolete.len(), 2);
        assert_eq!(moved.obsolete[0], old);
        assert_eq!(moved.obsolete[1].port, SwitchPort::new(NodeId(1), 2));

        assert_eq!(table.len(), 1);
        let entry = table.get(old.mac).unwrap();
        assert_eq!(entry.port, SwitchPort::new(NodeId(1), 2));
        assert_eq!(entry.vlan, VlanId::new(20).unwrap());
        assert!(table.cache.get(&old.id).is_none());
        assert_eq!(table.cache.get(&entry.id), Some(entry));
        assert_eq!(counter.hosts.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn addresses_are_appended() {
        let counter = Arc::new(Counter::default());
        let table = table(&counter);
        let path = bridge_path();
        let ip1: IpAddr = "192.168.0.1".parse().unwrap();
        let ip2: IpAddr = "192.168.0.2".parse().unwrap();

        // an IPv4 frame from an unknown address is probed
        let out = table.add(&frame(1, 1, 0).with_ipv4(Some(ip1)), &path);
        assert_eq!(out.probed, Some(ip1));
        assert!(table.get(frame(1, 1, 0).src).unwrap().ips.is_empty());

        let out = table.add(&frame(1, 1, 0).with_arp(ip1), &path);
        assert!(out.obsolete.is_empty());
        let out = table.add(&frame(1, 1, 0).with_arp(ip2), &path);
        assert!(out.obsolete.is_empty());
        let entry = table.get(frame(1, 1, 0).src).unwrap();
        assert_eq!(entry.ips.len(), 2);

        // known address, nothing to probe
        let out = table.add(&frame(1, 1, 0).with_ipv4(Some(ip1)), &path);
        assert_eq!(out.probed, None);
        assert_eq!(counter.probes.load(Ordering::Relaxed), 1);
        // the entry and both augmentations
        assert_eq!(counter.hosts.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn ignores_unlearnable_sources() {
        let counter = Arc::new(Counter::default());
        let table = table(&counter);
        let mut f = frame(1, 1, 0);
        f.src = Mac([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]);
        assert_eq!(table.add(&f, &bridge_path()), AddOutcome::default());
        f.src = Mac::ZERO;
        assert_eq!(table.add(&f, &bridge_path()), AddOutcome::default());
        assert!(table.is_empty());
    }

    #[traced_test]
    #[test]
    fn aging_takes_two_sweeps() {
        let counter = Arc::new(Counter::default());
        let table = table(&counter);
        let path = bridge_path();
        table.add(&frame(1, 1, 0), &path);
        table.add(&frame(2, 1, 0), &path);

        // the first sweep only clears the used flags
        assert!(table.age().is_empty());
        // host 2 keeps talking
        table.add(&frame(2, 1, 0), &path);
        let aged = table.age();
        assert_eq!(aged.len(), 1);
        assert_eq!(aged[0].mac, frame(1, 1, 0).src);
        assert!(table.get(frame(1, 1, 0).src).is_none());
        assert!(table.get(frame(2, 1, 0).src).is_some());
        assert!(logs_contain("Removed 1 entries"));
    }

    #[test]
    fn remote_entries_are_not_aged() {
        let counter = Arc::new(Counter::default());
        let table = table(&counter);
        let peer = EntryIdGenerator::new("10.0.0.2".parse().unwrap());
        let mut entry = MacTableEntry::new(
            peer.next_id(),
            bridge_path(),
            Mac([0, 0, 0, 0, 0, 9]),
            SwitchPort::new(NodeId(2), 1),
            VlanId::UNTAGGED,
            None,
        );
        entry.used = false;
        table.apply_remote_put(entry.clone());
        assert!(table.age().is_empty());
        assert!(table.age().is_empty());
        assert_eq!(table.len(), 1);

        table.apply_remote_remove(&entry);
        assert!(table.is_empty());
    }

    #[test]
    fn removal_and_reload() {
        let counter = Arc::new(Counter::default());
        let table = table(&counter);
        let path = bridge_path();
        for i in 1..=4 {
            table.add(&frame(i, u32::from(i % 2), 0), &path);
        }
        let removed =
            table.remove_where(&mut EntryRemover::by_port(SwitchPort::new(NodeId(1), 1)));
        assert_eq!(removed.len(), 2);
        assert_eq!(table.cache.len(), 2);

        let again = MacAddressTable::new(
            table.bridge.clone(),
            table.ids.clone(),
            table.cache.clone(),
        );
        assert_eq!(again.reload_from_cache(), 2);
        assert_eq!(again.entries(), table.entries());

        assert!(table.remove(frame(2, 0, 0).src).is_some());
        assert_eq!(table.flush().len(), 1);
        assert!(table.cache.is_empty());
    }
}
