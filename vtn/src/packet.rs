// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Frames received from the switches

use model::{MacVlan, MapReference, MapType, ParsedFrame};
use tracectl::trace_target;
use tracing::{debug, trace};

use crate::VtnManager;

trace_target!("vtn-packet", tracectl::LevelFilter::INFO, &["vtn"]);

/// What the caller should do with a received frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameDisposition {
    /// The frame belongs to the virtual network of this mapping and should be
    /// forwarded by it.
    Process(MapReference),
    /// No mapping of this container owns the frame.
    Ignore,
}

impl VtnManager {
    /// Resolve the mapping owning `frame`, activate the host if it is MAC
    /// mapped and learn its source. Flows of hosts that moved are purged.
    pub fn on_frame_received(&self, frame: &ParsedFrame) -> FrameDisposition {
        if !frame.src.is_learnable() {
            trace!("Ignoring frame from {}", frame.src);
            return FrameDisposition::Ignore;
        }
        if self.internal_ports.read().contains(&frame.in_port) {
            trace!("Ignoring frame from {} on inter-switch port {}", frame.src, frame.in_port);
            return FrameDisposition::Ignore;
        }

        let owner = match self.resolver.lookup(frame.src, frame.in_port, frame.vlan) {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                trace!("No mapping for {} on {}", frame.src, frame.port_vlan());
                return FrameDisposition::Ignore;
            }
            Err(e) => {
                debug!("Lookup of {} failed: {e}", frame.src);
                return FrameDisposition::Ignore;
            }
        };

        if owner.map_type == MapType::Mac {
            let host = MacVlan::host(frame.src, frame.vlan);
            match self.resolver.activate_mac_map(&owner, host, frame.in_port) {
                Ok(Some(cleanup)) => self.execute_cleanup(&cleanup),
                Ok(None) => {}
                Err(e) => {
                    self.log_failure(&format!("Dropping frame from {host}"), &e);
                    return FrameDisposition::Ignore;
                }
            }
        }

        let Some(table) = self.mac_table(owner.bridge()) else {
            debug!("No bridge {} for frame from {}", owner.bridge(), frame.src);
            return FrameDisposition::Ignore;
        };
        let outcome = table.add(frame, &owner.path);
        if let Some(db) = self.flow_database(owner.tenant()) {
            for entry in &outcome.obsolete {
                db.remove_flows_by_host(MacVlan::host(entry.mac, entry.vlan), Some(entry.port));
            }
        }
        FrameDisposition::Process(owner)
    }
}
