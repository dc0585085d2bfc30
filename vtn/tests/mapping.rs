// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

mod common;

use common::*;
use model::{MacVlan, NodeId, NodeVlan};
use pretty_assertions::assert_eq;
use resolver::{CleanupAction, MacMapChange, PurgeScope};
use vtn_manager::FrameDisposition;

#[test]
fn frames_follow_mapping_priority() {
    let fx = Fixture::new();
    let vref = vlan_map("b1", "ANY.10");
    let mref = mac_map("b2");
    let pref = port_map("b1", "if1");
    fx.vtn
        .change_mappings(|r| r.register_vlan_map(NodeVlan::any_node(vlan(10)), &vref, true))
        .unwrap();
    fx.vtn
        .change_mappings(|r| {
            r.register_mac_map(&mref, &MacMapChange::new().allow(MacVlan::wildcard(vlan(10))))
        })
        .unwrap();
    fx.vtn
        .change_mappings(|r| r.register_port_map(&pref, Some(pv(1, 1, 10)), None, true))
        .unwrap();

    assert_eq!(
        fx.vtn.on_frame_received(&frame(1, port(1, 1), 10)),
        FrameDisposition::Process(pref)
    );
    assert_eq!(
        fx.vtn.on_frame_received(&frame(2, port(1, 2), 10)),
        FrameDisposition::Process(mref.clone())
    );
    assert_eq!(
        fx.vtn.on_frame_received(&frame(3, port(1, 3), 20)),
        FrameDisposition::Ignore
    );

    // the MAC mapped host is active and reserves its port
    assert_eq!(
        fx.vtn.resolver().get_mac_mapped_port(&mref, &host(2, 10)),
        Some(port(1, 2))
    );
    assert_eq!(
        fx.vtn.resolver().get_port_map_reference(&pv(1, 2, 10)),
        Some(mref)
    );
    let b1 = fx.vtn.mac_table(&bridge("b1")).unwrap();
    let b2 = fx.vtn.mac_table(&bridge("b2")).unwrap();
    assert!(b1.get(mac(1)).is_some());
    assert!(b2.get(mac(2)).is_some());
    assert!(b1.get(mac(3)).is_none());
}

#[test]
fn port_mapping_supersedes_active_mac_host() {
    let fx = Fixture::new();
    let mref = mac_map("b2");
    let pref = port_map("b1", "if1");
    fx.vtn
        .change_mappings(|r| r.register_mac_map(&mref, &MacMapChange::new().allow(host(1, 10))))
        .unwrap();
    assert_eq!(
        fx.vtn.on_frame_received(&frame(1, port(1, 1), 10)),
        FrameDisposition::Process(mref.clone())
    );
    fx.install_flow(&mref, host(1, 10), port(1, 1), port(1, 9));
    assert_eq!(fx.flows(), 1);

    let cleanup = fx
        .vtn
        .change_mappings(|r| r.register_port_map(&pref, Some(pv(1, 1, 10)), None, true))
        .unwrap();
    assert_eq!(
        cleanup,
        vec![CleanupAction::PurgeMapping {
            owner: mref.clone(),
            scope: PurgeScope::PortVlan(pv(1, 1, 10)),
        }]
    );
    assert!(!fx.vtn.resolver().is_mac_mapped(&mref, &host(1, 10)));
    assert!(fx.vtn.mac_table(&bridge("b2")).unwrap().is_empty());
    assert_eq!(fx.flows(), 0);

    assert_eq!(
        fx.vtn.on_frame_received(&frame(1, port(1, 1), 10)),
        FrameDisposition::Process(pref)
    );
    assert!(fx.vtn.mac_table(&bridge("b1")).unwrap().get(mac(1)).is_some());
}

#[test]
fn disallowed_host_is_purged() {
    let fx = Fixture::new();
    let mref = mac_map("b2");
    fx.vtn
        .change_mappings(|r| {
            r.register_mac_map(&mref, &MacMapChange::new().allow(host(1, 10)).allow(host(2, 10)))
        })
        .unwrap();
    fx.vtn.on_frame_received(&frame(1, port(1, 1), 10));
    fx.vtn.on_frame_received(&frame(2, port(1, 2), 10));
    fx.install_flow(&mref, host(1, 10), port(1, 1), port(1, 9));
    fx.install_flow(&mref, host(2, 10), port(1, 2), port(1, 9));

    fx.vtn
        .change_mappings(|r| r.register_mac_map(&mref, &MacMapChange::new().disallow(host(1, 10))))
        .unwrap();
    assert_eq!(fx.vtn.resolver().get_port_map_reference(&pv(1, 1, 10)), None);
    let b2 = fx.vtn.mac_table(&bridge("b2")).unwrap();
    assert!(b2.get(mac(1)).is_none());
    assert!(b2.get(mac(2)).is_some());
    assert_eq!(fx.flows(), 1);
    assert_eq!(
        fx.vtn.on_frame_received(&frame(1, port(1, 1), 10)),
        FrameDisposition::Ignore
    );
}

#[test]
fn deny_overrides_wildcard_allow() {
    let fx = Fixture::new();
    let mref = mac_map("b2");
    fx.vtn
        .change_mappings(|r| {
            r.register_mac_map(
                &mref,
                &MacMapChange::new()
                    .allow(MacVlan::wildcard(vlan(10)))
                    .deny(host(2, 10)),
            )
        })
        .unwrap();
    assert_eq!(
        fx.vtn.on_frame_received(&frame(2, port(1, 1), 10)),
        FrameDisposition::Ignore
    );
    assert_eq!(
        fx.vtn.on_frame_received(&frame(3, port(1, 1), 10)),
        FrameDisposition::Process(mref.clone())
    );
    assert_eq!(
        fx.vtn.resolver().get_mac_map_reference(&host(2, 10)).unwrap(),
        None
    );
    assert!(!fx.vtn.resolver().is_mac_mapped(&mref, &host(2, 10)));
}

#[test]
fn node_vlan_mapping_takes_node_from_wildcard() {
    let fx = Fixture::new();
    let any = vlan_map("b1", "ANY.10");
    let node1 = vlan_map("b2", "OF1.10");
    fx.vtn
        .change_mappings(|r| r.register_vlan_map(NodeVlan::any_node(vlan(10)), &any, true))
        .unwrap();
    fx.vtn.on_frame_received(&frame(1, port(1, 1), 10));
    fx.vtn.on_frame_received(&frame(2, port(2, 1), 10));
    fx.install_flow(&any, host(1, 10), port(1, 1), port(1, 9));
    fx.install_flow(&any, host(2, 10), port(2, 1), port(2, 9));

    fx.vtn
        .change_mappings(|r| r.register_vlan_map(NodeVlan::node(NodeId(1), vlan(10)), &node1, true))
        .unwrap();
    let b1 = fx.vtn.mac_table(&bridge("b1")).unwrap();
    assert!(b1.get(mac(1)).is_none());
    assert!(b1.get(mac(2)).is_some());
    assert_eq!(fx.flows(), 1);
    assert_eq!(
        fx.vtn.on_frame_received(&frame(1, port(1, 1), 10)),
        FrameDisposition::Process(node1)
    );
}

#[test]
fn revision_counts_committed_changes() {
    let fx = Fixture::new();
    let first = vlan_map("b1", "OF1.10");
    let second = vlan_map("b2", "OF1.10");
    let scope = NodeVlan::node(NodeId(1), vlan(10));
    let resolver = fx.vtn.resolver();
    let start = resolver.revision();

    fx.vtn
        .change_mappings(|r| r.register_vlan_map(scope, &first, false))
        .unwrap();
    assert_eq!(resolver.revision(), start + 1);
    assert!(
        fx.vtn
            .change_mappings(|r| r.register_vlan_map(scope, &second, false))
            .is_err()
    );
    assert_eq!(resolver.get_vlan_map_reference(&scope), Some(first.clone()));
    assert_eq!(resolver.revision(), start + 1);

    // a change with no net effect commits nothing
    fx.vtn
        .change_mappings(|r| r.register_mac_map(&mac_map("b1"), &MacMapChange::new()))
        .unwrap();
    assert_eq!(resolver.revision(), start + 1);

    fx.vtn
        .change_mappings(|r| r.unregister_vlan_map(scope, &first))
        .unwrap();
    fx.vtn
        .change_mappings(|r| r.register_vlan_map(scope, &first, false))
        .unwrap();
    assert_eq!(resolver.revision(), start + 3);
    assert_eq!(
        fx.vtn.on_frame_received(&frame(1, port(1, 1), 10)),
        FrameDisposition::Process(first)
    );
}

#[test]
fn container_removal_purges_everything() {
    let fx = Fixture::new();
    let vref = vlan_map("b1", "ANY.10");
    let mref = mac_map("b2");
    fx.vtn
        .change_mappings(|r| r.register_vlan_map(NodeVlan::any_node(vlan(10)), &vref, true))
        .unwrap();
    fx.vtn
        .change_mappings(|r| r.register_mac_map(&mref, &MacMapChange::new().allow(host(2, 20))))
        .unwrap();
    fx.vtn.on_frame_received(&frame(1, port(1, 1), 10));
    fx.vtn.on_frame_received(&frame(2, port(1, 2), 20));
    fx.install_flow(&vref, host(1, 10), port(1, 1), port(1, 9));
    fx.install_flow(&mref, host(2, 20), port(1, 2), port(1, 9));

    assert!(fx.vtn.remove_container_mappings().unwrap() > 0);
    assert_eq!(fx.flows(), 0);
    assert!(fx.vtn.mac_table(&bridge("b1")).unwrap().is_empty());
    assert!(fx.vtn.mac_table(&bridge("b2")).unwrap().is_empty());
    assert_eq!(
        fx.vtn.on_frame_received(&frame(1, port(1, 1), 10)),
        FrameDisposition::Ignore
    );
}

#[test]
fn frames_of_unknown_bridges_are_ignored() {
    let fx = Fixture::new();
    let orphan = port_map("b9", "if1");
    fx.vtn
        .change_mappings(|r| r.register_port_map(&orphan, Some(pv(1, 1, 0)), None, false))
        .unwrap();
    assert_eq!(
        fx.vtn.on_frame_received(&frame(1, port(1, 1), 0)),
        FrameDisposition::Ignore
    );
    assert_eq!(
        fx.vtn.on_frame_received(&model::ParsedFrame::new(
            model::Mac::BROADCAST,
            mac(SERVER),
            port(1, 1),
            vlan(0)
        )),
        FrameDisposition::Ignore
    );
}
