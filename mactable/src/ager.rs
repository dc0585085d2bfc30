// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Periodic aging of the MAC address tables.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::MacTableError;

enum AgerCommand {
    SetInterval(Duration),
    Stop,
}

/// A thread that calls a sweep function at a fixed interval. The interval can
/// be changed while it runs; the pending sweep is then rescheduled.
pub struct MacTableAger {
    tx: Sender<AgerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl MacTableAger {
    /// Start the ager thread.
    ///
    /// # Errors
    ///
    /// Fails if the thread cannot be spawned.
    pub fn start<F>(interval: Duration, mut sweep: F) -> Result<Self, MacTableError>
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = bounded(4);
        let handle = thread::Builder::new()
            .name("mac-ager".to_string())
            .spawn(move || Self::run(&rx, interval, &mut sweep))
            .map_err(|e| MacTableError::Spawn(e.to_string()))?;
        info!("MAC table ager started, interval {interval:?}");
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    fn run(rx: &Receiver<AgerCommand>, mut interval: Duration, sweep: &mut dyn FnMut()) {
        let mut deadline = Instant::now() + interval;
        loop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => {
                    sweep();
                    deadline = Instant::now() + interval;
                }
                Ok(AgerCommand::SetInterval(new)) => {
                    debug!("Aging interval changed to {new:?}");
                    interval = new;
                    deadline = Instant::now() + interval;
                }
                Ok(AgerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("MAC table ager exiting");
    }

    /// Reschedule aging with a new interval.
    pub fn set_interval(&self, interval: Duration) {
        if self.tx.send(AgerCommand::SetInterval(interval)).is_err() {
            warn!("MAC table ager is not running");
        }
    }

    /// Stop the ager and wait for its thread to exit.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Stopping MAC table ager...");
            let _ = self.tx.send(AgerCommand::Stop);
            if handle.join().is_err() {
                warn!("MAC table ager panicked");
            }
        }
    }
}

impl Drop for MacTableAger {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn sweeps_until_stopped() {
        let (done_tx, done_rx) = bounded(16);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut ager = MacTableAger::start(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::Relaxed);
            let _ = done_tx.try_send(());
        })
        .unwrap();

        for _ in 0..3 {
            done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        ager.stop();
        let swept = count.load(Ordering::Relaxed);
        assert!(swept >= 3);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::Relaxed), swept);
    }

    #[test]
    fn interval_change_reschedules() {
        let (done_tx, done_rx) = bounded(16);
        let ager = MacTableAger::start(Duration::from_secs(3600), move || {
            let _ = done_tx.try_send(());
        })
        .unwrap();
        assert!(done_rx.recv_timeout(Duration::from_millis(20)).is_err());
        ager.set_interval(Duration::from_millis(5));
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
}
