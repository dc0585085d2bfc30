// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Installed forwarding rules and their lifecycle.
//!
//! A [`FlowDatabase`] indexes the flow groups of one tenant so they can be
//! invalidated by switch, port, virtual node or host. Rules are programmed by a
//! [`FlowModWorker`] thread; callers never wait for a switch.

#![deny(clippy::all, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod collector;
pub mod db;
pub mod flow;
pub mod vflow;
pub mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod test;

pub use collector::FlowCollector;
pub use db::FlowDatabase;
pub use flow::{FlowAction, FlowEntry, FlowKey, FlowMatch, fix_broken_ovs_flow};
pub use vflow::{FlowGroupId, VtnFlow};
pub use worker::{FlowModQueue, FlowModTask, FlowModWorker, ProgramError, SwitchProgrammer};

#[derive(Debug, thiserror::Error)]
pub enum FlowDbError {
    #[error("Failed to spawn flow-mod worker: {0}")]
    Spawn(String),
}
