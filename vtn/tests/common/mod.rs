// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![allow(dead_code)]

use config::VtnConfigBuilder;
use flowdb::testing::RecordingProgrammer;
use flowdb::{FlowAction, FlowEntry, FlowMatch, VtnFlow};
use model::{BridgePath, Mac, MacVlan, MapReference, NodeId, ParsedFrame, PortVlan, SwitchPort};
use model::VlanId;
use std::sync::Arc;
use std::time::Duration;
use store::StaticMembership;
use vtn_manager::{ClusterState, VtnManager};

pub const CONTAINER: &str = "default";
pub const TENANT: &str = "t1";
pub const LOCAL: &str = "10.0.0.1";
pub const PEER: &str = "10.0.0.2";
pub const SERVER: u8 = 200;

pub struct Fixture {
    pub vtn: VtnManager,
    pub switches: Arc<RecordingProgrammer>,
    pub membership: Arc<StaticMembership>,
}

impl Fixture {
    /// A controller with tenant `t1` and bridges `b1` and `b2`. The ager is
    /// left at its default interval so that it never sweeps during a test.
    pub fn new() -> Self {
        let config = VtnConfigBuilder::default().build().unwrap();
        Self::join(&ClusterState::new(config.retry), LOCAL)
    }

    /// Same as [`Fixture::new`], for a controller at `address` running over
    /// `cluster`.
    pub fn join(cluster: &ClusterState, address: &str) -> Self {
        let config = VtnConfigBuilder::default()
            .controller_address(address.parse().unwrap())
            .build()
            .unwrap();
        let membership = Arc::new(StaticMembership::new(address.parse().unwrap()));
        let switches = Arc::new(RecordingProgrammer::new());
        let vtn = VtnManager::join(
            config,
            membership.clone(),
            switches.clone(),
            cluster,
            None,
            None,
        )
        .unwrap();
        vtn.add_tenant(TENANT).unwrap();
        vtn.add_bridge(&bridge("b1")).unwrap();
        vtn.add_bridge(&bridge("b2")).unwrap();
        Self {
            vtn,
            switches,
            membership,
        }
    }

    pub fn sync(&self) {
        assert!(self.vtn.sync_flows(Duration::from_secs(5)));
    }

    /// Install a one-hop flow from host `src` entering at `input` to the
    /// server behind `output`, through `path`.
    pub fn install_flow(
        &self,
        path: &MapReference,
        src: MacVlan,
        input: SwitchPort,
        output: SwitchPort,
    ) -> VtnFlow {
        let db = self.vtn.flow_database(TENANT).unwrap();
        let mut flow = db.create();
        let mut matches = FlowMatch::new().in_port(input).dst(mac(SERVER)).vlan(src.vlan);
        if let Some(m) = src.mac {
            matches = matches.src(m);
        }
        flow.add_entry(
            FlowEntry::new(input.node, 100, matches).action(FlowAction::Output(output)),
        )
        .add_path(path.path.clone())
        .set_hosts(src, MacVlan::host(mac(SERVER), src.vlan));
        assert!(db.install(flow.clone()));
        flow
    }

    pub fn flows(&self) -> usize {
        self.vtn.flow_database(TENANT).unwrap().len()
    }
}

pub fn vlan(id: u16) -> VlanId {
    VlanId::new(id).unwrap()
}

pub fn mac(last: u8) -> Mac {
    Mac([0x00, 0x00, 0x5e, 0x00, 0x53, last])
}

pub fn host(last: u8, id: u16) -> MacVlan {
    MacVlan::host(mac(last), vlan(id))
}

pub fn port(node: u64, num: u32) -> SwitchPort {
    SwitchPort::new(NodeId(node), num)
}

pub fn pv(node: u64, num: u32, id: u16) -> PortVlan {
    PortVlan::new(port(node, num), vlan(id))
}

pub fn bridge(name: &str) -> BridgePath {
    BridgePath::new(TENANT, name)
}

pub fn vlan_map(b: &str, id: &str) -> MapReference {
    MapReference::vlan(CONTAINER, bridge(b), id)
}

pub fn port_map(b: &str, iface: &str) -> MapReference {
    MapReference::port(CONTAINER, bridge(b), iface)
}

pub fn mac_map(b: &str) -> MapReference {
    MapReference::mac(CONTAINER, bridge(b))
}

pub fn frame(last: u8, at: SwitchPort, id: u16) -> ParsedFrame {
    ParsedFrame::new(mac(last), mac(SERVER), at, vlan(id))
}
