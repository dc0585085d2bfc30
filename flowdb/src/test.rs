// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#[cfg(test)]
mod tests {
    use crate::testing::{FlowMod, RecordingProgrammer};
    use crate::{FlowAction, FlowDatabase, FlowEntry, FlowMatch, FlowModWorker, VtnFlow};
    use model::{BridgePath, Mac, MacVlan, NodeId, PortVlan, SwitchPort, VNodePath, VlanId};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_test::traced_test;

    const VLAN: u16 = 10;
    const SERVER: u8 = 200;

    fn vlan() -> VlanId {
        VlanId::new(VLAN).unwrap()
    }

    fn p(node: u64, port: u32) -> SwitchPort {
        SwitchPort::new(NodeId(node), port)
    }

    fn mac(n: u8) -> Mac {
        Mac([0x00, 0x00, 0x5e, 0x00, 0x53, n])
    }

    fn setup() -> (Arc<RecordingProgrammer>, FlowModWorker, FlowDatabase) {
        let programmer = Arc::new(RecordingProgrammer::new());
        let worker = FlowModWorker::start(programmer.clone(), 64).unwrap();
        let db = FlowDatabase::new("tenant1", worker.queue());
        (programmer, worker, db)
    }

    fn sync(worker: &FlowModWorker) {
        assert!(worker.queue().sync(Duration::from_secs(5)));
    }

    /// A flow from host `src` to the server, through `(node, in, out)` hops.
    fn path_flow(db: &FlowDatabase, src: u8, hops: &[(u64, u32, u32)]) -> VtnFlow {
        let mut flow = db.create();
        for (node, input, output) in hops {
            let matches = FlowMatch::new()
                .in_port(p(*node, *input))
                .src(mac(src))
                .dst(mac(SERVER))
                .vlan(vlan());
            flow.add_entry(
                FlowEntry::new(NodeId(*node), 100, matches)
                    .action(FlowAction::Output(p(*node, *output))),
            );
        }
        flow.add_path(VNodePath::Bridge(BridgePath::new("tenant1", "b1")))
            .set_hosts(
                MacVlan::host(mac(src), vlan()),
                MacVlan::host(mac(SERVER), vlan()),
            );
        flow
    }

    #[test]
    fn node_removal_clears_every_index() {
        let (programmer, worker, db) = setup();
        let flow = path_flow(&db, 1, &[(1, 1, 2), (2, 1, 2)]);
        let ingress = flow.ingress().unwrap().clone();
        let downstream = flow.downstream()[0].clone();
        let group = flow.group();
        assert!(db.install(flow));
        assert!(db.contains_ingress_flow(&ingress));
        assert!(db.get_flow(group).is_some());

        assert_eq!(db.remove_flows_by_node(NodeId(1)).len(), 1);
        assert!(!db.contains_ingress_flow(&ingress));
        assert!(!db.is_referenced(group));
        assert!(db.remove_flows_by_node(NodeId(2)).is_empty());

        sync(&worker);
        let mods = programmer.take();
        assert_eq!(
            mods[2..],
            [FlowMod::Uninstall(ingress), FlowMod::Uninstall(downstream)]
        );
    }

    #[test]
    fn indices_stay_consistent() {
        bolero::check!()
            .with_type::<(Vec<Vec<(u8, u8, u8)>>, u8)>()
            .for_each(|(flows, victim)| {
                let (_programmer, _worker, db) = setup();
                let mut installed = vec![];
                for (n, hops) in flows.iter().take(16).enumerate() {
                    let hops: Vec<(u64, u32, u32)> = hops
                        .iter()
                        .take(4)
                        .map(|(a, b, c)| (u64::from(a % 4), u32::from(b % 4), u32::from(c % 4)))
                        .collect();
                    if hops.is_empty() {
                        continue;
                    }
                    let flow = path_flow(&db, u8::try_from(n).unwrap(), &hops);
                    let group = flow.group();
                    let nodes = flow.nodes();
                    assert!(db.install(flow));
                    installed.push((group, nodes));
                }
                let victim = NodeId(u64::from(victim % 4));
                let removed: BTreeSet<_> = db
                    .remove_flows_by_node(victim)
                    .iter()
                    .map(VtnFlow::group)
                    .collect();
                for (group, nodes) in &installed {
                    assert_eq!(removed.contains(group), nodes.contains(&victim));
                    assert_eq!(db.is_referenced(*group), !nodes.contains(&victim));
                }
                assert!(db.remove_flows_by_node(victim).is_empty());
                assert_eq!(db.len(), installed.len() - removed.len());
            });
    }

    #[test]
    fn untagged_ingress_is_found_without_its_priority() {
        let (_programmer, _worker, db) = setup();
        let matches = FlowMatch::new().in_port(p(1, 1)).vlan(VlanId::UNTAGGED);
        let mut flow = db.create();
        flow.add_entry(
            FlowEntry::new(NodeId(1), 100, matches.clone().vlan_pcp(3))
                .action(FlowAction::Output(p(1, 2))),
        );
        let installed = flow.ingress().unwrap().clone();
        let group = flow.group();
        assert!(db.install(flow));

        let reported =
            FlowEntry::new(NodeId(1), 100, matches).action(FlowAction::Output(p(1, 2)));
        assert!(db.contains_ingress_flow(&installed));
        assert!(db.contains_ingress_flow(&reported));
        assert_eq!(db.flow_removed(&reported, true).map(|f| f.group()), Some(group));
        assert!(!db.contains_ingress_flow(&installed));
        assert!(db.is_empty());
    }

    #[test]
    fn duplicate_ingress_is_not_installed() {
        let (programmer, worker, db) = setup();
        assert!(db.install(path_flow(&db, 1, &[(1, 1, 2)])));
        let twin = path_flow(&db, 1, &[(1, 1, 3)]);
        let group = twin.group();
        assert!(!db.install(twin));
        assert!(db.get_flow(group).is_none());
        assert!(!db.install(db.create()));

        sync(&worker);
        assert_eq!(programmer.take().len(), 1);
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn expired_ingress_uninstalls_downstream() {
        let (programmer, worker, db) = setup();
        let flow = path_flow(&db, 1, &[(1, 1, 2), (2, 1, 2), (3, 1, 2)]);
        let ingress = flow.ingress().unwrap().clone();
        let downstream = flow.downstream().to_vec();
        assert!(db.install(flow));
        sync(&worker);
        programmer.take();

        assert!(db.flow_removed(&ingress, false).is_some());
        assert!(db.flow_removed(&ingress, false).is_none());
        sync(&worker);
        let expected: Vec<FlowMod> = downstream.into_iter().map(FlowMod::Uninstall).collect();
        assert_eq!(programmer.take(), expected);
        assert!(db.is_empty());
    }

    #[test]
    fn expired_untagged_flow_with_reported_priority() {
        let (programmer, worker, db) = setup();
        let mut flow = db.create();
        let matches = FlowMatch::new()
            .in_port(p(1, 1))
            .src(mac(1))
            .vlan(VlanId::UNTAGGED);
        let ingress =
            FlowEntry::new(NodeId(1), 100, matches).action(FlowAction::Output(p(1, 2)));
        flow.add_entry(ingress.clone());
        assert!(db.install(flow));

        let mut reported = ingress.clone();
        reported.matches.vlan_pcp = Some(0);
        assert!(db.contains_ingress_flow(&reported));
        assert!(db.flow_removed(&reported, true).is_some());

        sync(&worker);
        assert_eq!(
            programmer.take(),
            vec![FlowMod::Install(ingress.clone()), FlowMod::Uninstall(ingress)]
        );
    }

    #[traced_test]
    #[test]
    fn port_vlan_removal_matches_network_edges() {
        let (_programmer, _worker, db) = setup();
        let entering = path_flow(&db, 1, &[(1, 1, 2)]);
        let leaving = path_flow(&db, 2, &[(4, 1, 2), (3, 1, 2)]);
        // crosses port 1/1 without entering or leaving there
        let crossing = path_flow(&db, 3, &[(2, 1, 2), (1, 1, 4)]);
        let (entering_group, leaving_group, crossing_group) =
            (entering.group(), leaving.group(), crossing.group());
        for flow in [entering, leaving, crossing] {
            assert!(db.install(flow));
        }

        let removed = db.remove_flows_by_port_vlan(PortVlan::new(p(1, 1), vlan()));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].group(), entering_group);
        assert!(logs_contain("incoming network"));

        let removed = db.remove_flows_by_port_vlan(PortVlan::new(p(3, 2), vlan()));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].group(), leaving_group);
        assert!(logs_contain("outgoing network"));

        assert!(
            db.remove_flows_by_port_vlan(PortVlan::new(p(1, 1), VlanId::UNTAGGED))
                .is_empty()
        );
        assert_eq!(db.remove_flows_by_port(p(1, 1))[0].group(), crossing_group);
    }

    #[test]
    fn removal_by_host_path_and_list() {
        let (_programmer, _worker, db) = setup();
        let flows: Vec<VtnFlow> = (1..=4).map(|n| path_flow(&db, n, &[(1, u32::from(n), 9)])).collect();
        let groups: Vec<_> = flows.iter().map(VtnFlow::group).collect();
        for flow in flows {
            assert!(db.install(flow));
        }

        let host1 = MacVlan::host(mac(1), vlan());
        assert!(db.remove_flows_by_host(host1, Some(p(1, 2))).is_empty());
        assert_eq!(db.remove_flows_by_host(host1, Some(p(1, 1))).len(), 1);
        assert_eq!(db.remove_flows(&groups[1..2]).len(), 1);
        assert_eq!(
            db.remove_flows_where("odd ports", |f| f.incoming_network().is_some_and(|pv| pv.port == p(1, 3)))
                .len(),
            1
        );
        assert!(db.remove_flows_by_path(&VNodePath::Bridge(BridgePath::new("tenant1", "b2"))).is_empty());
        assert_eq!(
            db.remove_flows_by_path(&VNodePath::Bridge(BridgePath::new("tenant1", "b1")))
                .len(),
            1
        );
        assert!(db.is_empty());

        assert!(db.install(path_flow(&db, 5, &[(1, 5, 9)])));
        let server = MacVlan::host(mac(SERVER), vlan());
        assert_eq!(db.remove_flows_by_host(server, Some(p(1, 9))).len(), 1);
        assert!(db.install(path_flow(&db, 6, &[(1, 6, 9)])));
        assert_eq!(db.clear().len(), 1);
    }

    #[test]
    fn switch_failures_do_not_stop_the_worker() {
        let (programmer, worker, db) = setup();
        programmer.set_down(NodeId(2));
        let flow = path_flow(&db, 1, &[(1, 1, 2), (2, 1, 2)]);
        let ingress = flow.ingress().unwrap().clone();
        assert!(db.install(flow));
        sync(&worker);
        assert_eq!(programmer.take(), vec![FlowMod::Install(ingress)]);
        // the database does not depend on the switch
        assert_eq!(db.len(), 1);

        let other = path_flow(&db, 2, &[(1, 3, 4)]);
        let other_ingress = other.ingress().unwrap().clone();
        assert!(db.install(other));
        sync(&worker);
        assert_eq!(programmer.take(), vec![FlowMod::Install(other_ingress)]);
    }
}
