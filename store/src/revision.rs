// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The global configuration revision and the optimistic transactions built on it.
//!
//! Every committed transaction advances `configRevision[ALL]` by exactly one.
//! A transaction body runs without locks against the committed maps, staging its
//! writes; the commit succeeds only if the revision did not move meanwhile,
//! otherwise the whole body runs again. Readers that need a consistent view run
//! between two observations of the revision and of a local write sequence.

use config::RetryPolicy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use tracing::{debug, error};

use crate::{ClusterMap, StoreError};

/// Key of the single revision counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RevisionKey {
    All,
}

/// The writes produced by one attempt of a transaction body.
pub trait WriteBatch {
    fn is_empty(&self) -> bool;
    fn apply(self);
}

/// A view of the local write sequence and of the revision.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Stamp {
    seq: u64,
    revision: u64,
}

#[derive(Debug)]
pub struct ConfigRevision {
    revisions: ClusterMap<RevisionKey, u64>,
    commit_lock: Mutex<()>,
    // odd while a commit is being applied
    seq: AtomicU64,
    policy: RetryPolicy,
}

impl ConfigRevision {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        let revisions = ClusterMap::new("config-revision");
        revisions.put(RevisionKey::All, 0);
        Self {
            revisions,
            commit_lock: Mutex::new(()),
            seq: AtomicU64::new(0),
            policy,
        }
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.revisions.get(&RevisionKey::All).unwrap_or(0)
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Wait for any local commit to finish and stamp the current state.
    fn stamp(&self) -> Stamp {
        loop {
            let revision = self.current();
            let seq = self.seq.load(Ordering::SeqCst);
            if seq % 2 == 0 {
                return Stamp { seq, revision };
            }
            thread::yield_now();
        }
    }

    fn unchanged_since(&self, stamp: Stamp) -> bool {
        // sequence first: a commit finishing in between is caught by the revision
        let seq = self.seq.load(Ordering::SeqCst);
        let revision = self.current();
        seq == stamp.seq && revision == stamp.revision
    }

    /// Run `read` until it observes a state no commit interfered with.
    ///
    /// # Errors
    ///
    /// Gives up once the retry policy is exhausted.
    pub fn read_consistent<T, F>(&self, mut read: F) -> Result<T, StoreError>
    where
        F: FnMut() -> T,
    {
        for _ in 0..self.policy.max_attempts {
            let stamp = self.stamp();
            let value = read();
            if self.unchanged_since(stamp) {
                return Ok(value);
            }
            thread::yield_now();
        }
        Err(StoreError::SnapshotUnstable {
            attempts: self.policy.max_attempts,
        })
    }

    /// Run a transaction body until its writes commit.
    ///
    /// The body must be a pure function of the committed state: it is run again
    /// from scratch whenever another commit raced with it. An error returned by
    /// the body aborts the transaction, unless the body may have observed a
    /// commit in progress, in which case it is retried. A body that stages no net
    /// change commits nothing and leaves the revision untouched.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or [`StoreError::RetryExhausted`] converted into `E`.
    pub fn transact<T, B, E, F>(&self, name: &str, mut body: F) -> Result<T, E>
    where
        B: WriteBatch,
        E: From<StoreError>,
        F: FnMut() -> Result<(T, B), E>,
    {
        for attempt in 1..=self.policy.max_attempts {
            let stamp = self.stamp();
            match body() {
                Ok((value, batch)) if batch.is_empty() => {
                    if self.unchanged_since(stamp) {
                        return Ok(value);
                    }
                }
                Ok((value, batch)) => {
                    if let Some(revision) = self.try_commit(stamp.revision, batch) {
                        debug!("{name}: committed revision {revision}");
                        return Ok(value);
                    }
                }
                Err(e) => {
                    if self.unchanged_since(stamp) {
                        return Err(e);
                    }
                }
            }
            debug!("{name}: state changed during attempt {attempt}, retrying");
            thread::sleep(self.policy.backoff(attempt));
        }
        error!(
            "{name}: giving up after {} attempts",
            self.policy.max_attempts
        );
        Err(StoreError::RetryExhausted {
            attempts: self.policy.max_attempts,
        }
        .into())
    }

    fn try_commit<B: WriteBatch>(&self, expected: u64, batch: B) -> Option<u64> {
        let _guard = self.commit_lock.lock();
        if self.current() != expected {
            return None;
        }
        self.seq.fetch_add(1, Ordering::SeqCst);
        batch.apply();
        let next = expected + 1;
        if !self.revisions.replace(&RevisionKey::All, &expected, next) {
            // a peer revision landed while applying; keep the counter moving forward
            error!("Revision moved during commit of revision {next}");
            self.revisions.put(RevisionKey::All, self.current().max(next));
        }
        self.seq.fetch_add(1, Ordering::SeqCst);
        Some(next)
    }

    /// A peer committed `revision`.
    pub fn apply_remote(&self, revision: u64) {
        let _guard = self.commit_lock.lock();
        self.seq.fetch_add(1, Ordering::SeqCst);
        if revision > self.current() {
            self.revisions.apply_remote_put(RevisionKey::All, revision);
        }
        self.seq.fetch_add(1, Ordering::SeqCst);
    }
}
