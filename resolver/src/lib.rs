// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Resolution of the virtual mapping that owns a frame.
//!
//! Three kinds of mappings bind physical traffic to virtual bridges: VLAN
//! mappings (a VLAN on one or all switches), port mappings (a VLAN on a switch
//! port) and MAC mappings (hosts, bound to a port when first seen). The
//! [`ResourceResolver`] keeps them from overlapping and resolves frames with
//! port mappings first, then MAC mappings, then VLAN mappings.

#![deny(clippy::all, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod change;
pub mod cleanup;
pub mod errors;
pub mod mapping;
pub mod resolver;
pub mod state;


pub use change::MacMapChange;
pub use cleanup::{CleanupAction, Committed, PurgeScope};
pub use errors::ResolverError;
pub use mapping::{MappingStore, MappingTxn};
pub use resolver::ResourceResolver;
pub use state::{Activation, Inactivated, MacMapState};
