// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Gathers the rules of removed flow groups into one uninstall task.

use tracing::warn;

use crate::{FlowEntry, FlowModTask, VtnFlow};

#[derive(Debug, Default)]
pub struct FlowCollector {
    ingress: Vec<FlowEntry>,
    downstream: Vec<FlowEntry>,
    groups: usize,
}

impl FlowCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every rule of `flow`. An empty group is skipped.
    pub fn collect(&mut self, flow: &VtnFlow) {
        let Some(ingress) = flow.ingress() else {
            warn!("Flow group {} has no entries", flow.group());
            return;
        };
        self.ingress.push(ingress.clone());
        self.collect_downstream(flow);
    }

    /// Collect the rules of `flow` except the ingress rule.
    pub fn collect_downstream(&mut self, flow: &VtnFlow) {
        self.downstream.extend_from_slice(flow.downstream());
        self.groups += 1;
    }

    #[must_use]
    pub fn groups(&self) -> usize {
        self.groups
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ingress.is_empty() && self.downstream.is_empty()
    }

    /// The uninstall task, if anything was collected.
    #[must_use]
    pub fn into_task(self) -> Option<FlowModTask> {
        if self.is_empty() {
            return None;
        }
        Some(FlowModTask::Uninstall {
            ingress: self.ingress,
            downstream: self.downstream,
        })
    }
}
