// Path: crates/control/tests/control_rpc.rs

//! Loopback round trips over the real mTLS control plane.

use holomush_control::{ControlClient, ControlServer};
use holomush_identity::ensure;
use holomush_ipc::SHUTDOWN_INITIATED;
use holomush_types::Component;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DIAL_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn status_round_trip_over_mtls() {
    let dir = tempfile::tempdir().unwrap();
    let core = ensure(dir.path(), Component::Core, Some("limbo")).unwrap();
    let gateway = ensure(dir.path(), Component::Gateway, Some("limbo")).unwrap();

    let cancel = CancellationToken::new();
    let server = ControlServer::new(Component::Core, core.game_id.clone(), cancel.clone());
    let (handle, _error_rx) = server.start("127.0.0.1:0", core.server).await.unwrap();

    let addr = handle.local_addr.to_string();
    let mut client = ControlClient::connect(&addr, gateway.client, DIAL_TIMEOUT)
        .await
        .unwrap();

    let status = client.status().await.unwrap();
    assert!(status.running);
    assert_eq!(status.component, "core");
    assert_ne!(status.pid, 0);

    // Uptime never goes backwards between successive calls.
    let later = client.status().await.unwrap();
    assert!(later.uptime_seconds >= status.uptime_seconds);

    handle.stop(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn shutdown_acknowledges_then_cancels() {
    let dir = tempfile::tempdir().unwrap();
    let gateway_tls = ensure(dir.path(), Component::Gateway, Some("limbo")).unwrap();
    let core_tls = ensure(dir.path(), Component::Core, Some("limbo")).unwrap();

    let cancel = CancellationToken::new();
    let server = ControlServer::new(Component::Gateway, "limbo".into(), cancel.clone());
    let (handle, _error_rx) = server
        .start("127.0.0.1:0", gateway_tls.server)
        .await
        .unwrap();

    let addr = handle.local_addr.to_string();
    let mut client = ControlClient::connect(&addr, core_tls.client, DIAL_TIMEOUT)
        .await
        .unwrap();

    let message = client.shutdown(true).await.unwrap();
    assert_eq!(message, SHUTDOWN_INITIATED);

    // The response races the cancel on purpose; the cancel must land.
    tokio::time::timeout(Duration::from_secs(2), cancel.cancelled())
        .await
        .expect("shutdown must trip the process cancel");

    // Shutdown is idempotent: a second call still acknowledges.
    let again = client.shutdown(true).await.unwrap();
    assert_eq!(again, SHUTDOWN_INITIATED);

    handle.stop(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn dead_server_fails_within_dial_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = ensure(dir.path(), Component::Gateway, Some("limbo")).unwrap();

    // Nothing listens here; the connect must fail, bounded by the timeout.
    let started = std::time::Instant::now();
    let result = ControlClient::connect("127.0.0.1:1", bundle.client, DIAL_TIMEOUT).await;
    assert!(result.is_err());
    assert!(started.elapsed() < DIAL_TIMEOUT + Duration::from_secs(1));
}
