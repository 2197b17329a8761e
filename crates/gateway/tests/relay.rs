// Path: crates/gateway/tests/relay.rs

//! End-to-end: a telnet client talking through the gateway to a real core
//! game service over mTLS, with the database swapped for a lazy pool.

use holomush_core::game::start_game_service;
use holomush_gateway::{run, GatewayDeps};
use holomush_store::EventStore;
use holomush_types::config::GatewayConfig;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

async fn free_addr() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

fn lazy_store() -> Arc<EventStore> {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/holomush_test")
        .unwrap();
    Arc::new(EventStore::from_pool(pool))
}

#[tokio::test]
async fn telnet_lines_relay_through_the_core() {
    let certs = tempfile::tempdir().unwrap();
    let core_tls =
        holomush_identity::ensure(certs.path(), holomush_types::Component::Core, Some("limbo"))
            .unwrap();

    // A real game service on a loopback port, minus the real database.
    let (game, _game_errors) = start_game_service(
        "127.0.0.1:0",
        core_tls.server,
        core_tls.game_id.clone(),
        lazy_store(),
    )
    .await
    .unwrap();

    let telnet_addr = free_addr().await;
    let config = GatewayConfig {
        telnet_addr: telnet_addr.clone(),
        core_addr: game.local_addr.to_string(),
        control_addr: free_addr().await,
        metrics_addr: String::new(),
        ..GatewayConfig::default()
    };

    let cancel = CancellationToken::new();
    let deps = GatewayDeps {
        certs_dir: certs.path().to_path_buf(),
        ..GatewayDeps::default()
    };
    let gateway = tokio::spawn(run(config, deps, cancel.clone()));

    // Wait for the telnet listener, then hold a session.
    let stream = connect_with_retry(&telnet_addr).await;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let banner = lines.next_line().await.unwrap().unwrap();
    assert!(banner.contains("HoloMUSH"), "unexpected banner: {banner}");
    // Skip the rest of the banner block.
    let _ = lines.next_line().await.unwrap();

    write_half.write_all(b"say hello\r\n").await.unwrap();
    let reply = lines.next_line().await.unwrap().unwrap();
    assert_eq!(reply, "You say, \"hello\"");

    write_half.write_all(b"quit\r\n").await.unwrap();
    let goodbye = lines.next_line().await.unwrap().unwrap();
    assert_eq!(goodbye, "Goodbye.");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(6), gateway)
        .await
        .expect("gateway must shut down within the deadline")
        .unwrap()
        .unwrap();

    game.stop(Duration::from_secs(5)).await;

    // Both addresses are released after shutdown.
    tokio::net::TcpListener::bind(telnet_addr.parse::<std::net::SocketAddr>().unwrap())
        .await
        .unwrap();
}

async fn connect_with_retry(addr: &str) -> TcpStream {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return stream,
            Err(e) => {
                if std::time::Instant::now() >= deadline {
                    panic!("telnet listener at {addr} never came up: {e}");
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        }
    }
}
