// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A switch programmer that records requests instead of sending them.

use model::NodeId;
use parking_lot::Mutex;
use std::collections::BTreeSet;

use crate::{FlowEntry, ProgramError, SwitchProgrammer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowMod {
    Install(FlowEntry),
    Uninstall(FlowEntry),
}

#[derive(Debug, Default)]
pub struct RecordingProgrammer {
    mods: Mutex<Vec<FlowMod>>,
    down: Mutex<BTreeSet<NodeId>>,
}

impl RecordingProgrammer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make requests to `node` fail.
    pub fn set_down(&self, node: NodeId) {
        self.down.lock().insert(node);
    }

    /// The requests received so far, in order.
    pub fn take(&self) -> Vec<FlowMod> {
        std::mem::take(&mut *self.mods.lock())
    }

    fn record(&self, entry: &FlowEntry, m: FlowMod) -> Result<(), ProgramError> {
        if self.down.lock().contains(&entry.node) {
            return Err(ProgramError::NodeDown(entry.node));
        }
        self.mods.lock().push(m);
        Ok(())
    }
}

impl SwitchProgrammer for RecordingProgrammer {
    fn install(&self, entry: &FlowEntry) -> Result<(), ProgramError> {
        self.record(entry, FlowMod::Install(entry.clone()))
    }

    fn uninstall(&self, entry: &FlowEntry) -> Result<(), ProgramError> {
        self.record(entry, FlowMod::Uninstall(entry.clone()))
    }
}
