// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

mod common;

use common::*;
use serial_test::serial;
use tracectl::{LevelFilter, get_trace_ctl};

#[test]
#[serial]
fn log_levels_by_component() {
    let fx = Fixture::new();
    let tctl = get_trace_ctl();
    assert!(!tctl.targets_by_tag("vtn").is_empty());
    assert!(!tctl.targets_by_tag("flowdb").is_empty());

    tctl.setup_from_string("vtn=debug, flowdb=warn").unwrap();
    assert_eq!(
        tctl.target("vtn_manager::manager").unwrap().level(),
        LevelFilter::DEBUG
    );
    for setting in tctl.targets_by_tag("flowdb") {
        assert_eq!(setting.level(), LevelFilter::WARN);
    }
    assert!(tctl.as_config_string().contains("vtn-manager=debug"));

    // the core keeps working whatever the levels
    fx.vtn.set_mac_age_interval(60).unwrap();
    assert_eq!(fx.vtn.age_mac_tables(), 0);
    tctl.setup_from_string("vtn=info, flowdb=info").unwrap();
}
