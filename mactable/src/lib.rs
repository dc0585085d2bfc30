// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! MAC address learning for virtual bridges.
//!
//! Each bridge has a [`MacAddressTable`] of the hosts seen on it. Entries are
//! shared with peer controllers through a cluster cache and aged out by a
//! [`MacTableAger`] when their host stays silent for two sweeps.

#![deny(clippy::all, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod ager;
pub mod entry;
pub mod listener;
pub mod remover;
pub mod table;
pub mod tables;

pub use ager::MacTableAger;
pub use entry::{EntryIdGenerator, MacTableEntry, MacTableEntryId};
pub use listener::{AddressProber, HostListener};
pub use remover::EntryRemover;
pub use table::{AddOutcome, MacAddressTable, MacEntryCache};
pub use tables::MacTables;

#[derive(Debug, thiserror::Error)]
pub enum MacTableError {
    #[error("Failed to spawn MAC table ager: {0}")]
    Spawn(String),
}
