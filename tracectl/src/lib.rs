// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Runtime control of the logging of the VTN controller core.
//!
//! Every module declares the target it logs to with [`trace_target!`]. Targets are
//! collected at link time and can be tuned individually, by tag, or all at once,
//! without restarting the controller.

pub mod control;
pub mod display;
pub mod targets;

pub use control::{TraceCtlError, TracingControl, get_trace_ctl};
pub use tracing_subscriber::filter::LevelFilter;
