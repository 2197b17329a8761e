// Path: crates/ipc/src/tests.rs

use crate::control::StatusResponse;
use holomush_types::Component;

#[test]
fn status_component_round_trips() {
    let status = StatusResponse {
        running: true,
        pid: 4242,
        uptime_seconds: 7,
        component: Component::Gateway.name().to_string(),
    };
    assert_eq!(status.component_kind(), Some(Component::Gateway));
}

#[test]
fn status_component_rejects_unknown_names() {
    let status = StatusResponse {
        running: false,
        pid: 0,
        uptime_seconds: 0,
        component: "plugin-host".to_string(),
    };
    assert_eq!(status.component_kind(), None);
}
