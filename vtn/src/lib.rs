// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The core of a VTN controller container.
//!
//! A [`VtnManager`] owns the mapping resolver, the MAC address tables of the
//! virtual bridges and the flow databases of the tenants. Switch events enter
//! through its callbacks: [`VtnManager::on_frame_received`] for frames and
//! [`VtnManager::on_node_changed`], [`VtnManager::on_port_changed`] and
//! [`VtnManager::on_link_changed`] for topology changes.

#![deny(clippy::all, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod cleanup;
pub mod errors;
pub mod manager;
pub mod packet;
mod tenant;
pub mod topology;

pub use errors::VtnError;
pub use manager::{ClusterState, VtnManager};
pub use packet::FrameDisposition;
pub use topology::{Link, UpdateType};
