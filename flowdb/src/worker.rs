// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Background programming of switches.

use crossbeam_channel::{Receiver, Sender, bounded};
use model::NodeId;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracectl::trace_target;
use tracing::{debug, info, warn};

use crate::{FlowDbError, FlowEntry, FlowGroupId};

trace_target!("flow-mod", tracectl::LevelFilter::INFO, &["flowdb"]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    #[error("Switch {0} is not connected")]
    NodeDown(NodeId),
    #[error("Switch {node} rejected the request: {reason}")]
    Rejected { node: NodeId, reason: String },
    #[error("Switch {0} did not answer in time")]
    Timeout(NodeId),
}

/// Programs rules into switches.
pub trait SwitchProgrammer: Send + Sync {
    /// # Errors
    ///
    /// Fails if the switch did not accept the rule.
    fn install(&self, entry: &FlowEntry) -> Result<(), ProgramError>;

    /// # Errors
    ///
    /// Fails if the switch did not remove the rule.
    fn uninstall(&self, entry: &FlowEntry) -> Result<(), ProgramError>;
}

/// Work for the flow-mod thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowModTask {
    Install {
        group: FlowGroupId,
        entries: Vec<FlowEntry>,
    },
    /// Ingress rules are removed before downstream rules.
    Uninstall {
        ingress: Vec<FlowEntry>,
        downstream: Vec<FlowEntry>,
    },
}

enum Message {
    Task(FlowModTask),
    Barrier(Sender<()>),
    Stop,
}

/// The sending side of the flow-mod queue.
#[derive(Clone)]
pub struct FlowModQueue {
    tx: Sender<Message>,
}

impl FlowModQueue {
    /// Queue a task. Blocks while the queue is full.
    pub fn submit(&self, task: FlowModTask) {
        if self.tx.send(Message::Task(task)).is_err() {
            warn!("Flow-mod worker is gone, task dropped");
        }
    }

    /// Wait until the tasks queued so far are done. Returns false on timeout.
    pub fn sync(&self, timeout: Duration) -> bool {
        let (tx, rx) = bounded(1);
        if self.tx.send(Message::Barrier(tx)).is_err() {
            return false;
        }
        rx.recv_timeout(timeout).is_ok()
    }
}

/// The flow-mod thread.
pub struct FlowModWorker {
    queue: FlowModQueue,
    handle: Option<JoinHandle<()>>,
}

impl FlowModWorker {
    /// Start the worker with a queue of `capacity` tasks.
    ///
    /// # Errors
    ///
    /// Fails if the thread cannot be spawned.
    pub fn start(
        programmer: Arc<dyn SwitchProgrammer>,
        capacity: usize,
    ) -> Result<Self, FlowDbError> {
        let (tx, rx) = bounded(capacity);
        let handle = thread::Builder::new()
            .name("flow-mod".to_string())
            .spawn(move || Self::run(&rx, programmer.as_ref()))
            .map_err(|e| FlowDbError::Spawn(e.to_string()))?;
        info!("Flow-mod worker started, queue capacity {capacity}");
        Ok(Self {
            queue: FlowModQueue { tx },
            handle: Some(handle),
        })
    }

    #[must_use]
    pub fn queue(&self) -> FlowModQueue {
        self.queue.clone()
    }

    fn run(rx: &Receiver<Message>, programmer: &dyn SwitchProgrammer) {
        while let Ok(msg) = rx.recv() {
            match msg {
                Message::Task(task) => execute(programmer, &task),
                Message::Barrier(done) => {
                    let _ = done.send(());
                }
                Message::Stop => break,
            }
        }
        debug!("Flow-mod worker exiting");
    }

    /// Stop the worker once the queued tasks are done.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Stopping flow-mod worker...");
            let _ = self.queue.tx.send(Message::Stop);
            if handle.join().is_err() {
                warn!("Flow-mod worker panicked");
            }
        }
    }
}

impl Drop for FlowModWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn execute(programmer: &dyn SwitchProgrammer, task: &FlowModTask) {
    match task {
        FlowModTask::Install { group, entries } => {
            debug!("Installing {group}: {} entries", entries.len());
            for entry in entries {
                if let Err(e) = programmer.install(entry) {
                    warn!("Failed to install {entry} of {group}: {e}");
                }
            }
        }
        FlowModTask::Uninstall {
            ingress,
            downstream,
        } => {
            debug!(
                "Uninstalling {} ingress and {} downstream entries",
                ingress.len(),
                downstream.len()
            );
            for entry in ingress.iter().chain(downstream) {
                if let Err(e) = programmer.uninstall(entry) {
                    warn!("Failed to uninstall {entry}: {e}");
                }
            }
        }
    }
}
