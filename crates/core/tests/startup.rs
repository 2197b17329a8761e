// Path: crates/core/tests/startup.rs

//! Startup-order and partial-startup-cleanup coverage for the core
//! runtime, with the database factories swapped for test doubles.

use holomush_core::{run, CoreDeps};
use holomush_store::EventStore;
use holomush_types::config::CoreConfig;
use holomush_types::error::{ErrorCode, StartupError};
use sqlx::postgres::PgPoolOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Deps whose store factories never touch a real database.
fn test_deps(certs_dir: &std::path::Path, migrated: Arc<AtomicBool>) -> CoreDeps {
    CoreDeps {
        certs_dir: certs_dir.to_path_buf(),
        auto_migrate: Arc::new(move |_| {
            let migrated = migrated.clone();
            Box::pin(async move {
                migrated.store(true, Ordering::SeqCst);
                Ok(())
            })
        }),
        connect_store: Arc::new(|_| {
            Box::pin(async {
                let pool = PgPoolOptions::new()
                    .connect_lazy("postgres://localhost/holomush_test")
                    .map_err(|e| holomush_types::error::StoreError::Pool(e.to_string()))?;
                Ok(EventStore::from_pool(pool))
            })
        }),
        ..CoreDeps::default()
    }
}

async fn reserved_addr() -> (tokio::net::TcpListener, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

async fn free_addr() -> String {
    let (listener, addr) = reserved_addr().await;
    drop(listener);
    addr
}

fn config(grpc: String, control: String, metrics: String) -> CoreConfig {
    CoreConfig {
        grpc_addr: grpc,
        control_addr: control,
        metrics_addr: metrics,
        database_url: "postgres://localhost/holomush_test".to_string(),
        game_id: Some("limbo".to_string()),
        data_dir: Some(std::env::temp_dir().join("holomush-startup-tests")),
        ..CoreConfig::default()
    }
}

#[tokio::test]
async fn cold_start_runs_migration_then_shuts_down_cleanly() {
    let certs = tempfile::tempdir().unwrap();
    let migrated = Arc::new(AtomicBool::new(false));
    let deps = test_deps(certs.path(), migrated.clone());

    let control_addr = free_addr().await;
    let cfg = config("127.0.0.1:0".into(), control_addr.clone(), "127.0.0.1:0".into());

    let cancel = CancellationToken::new();
    let runner = tokio::spawn(run(cfg, deps, cancel.clone()));

    // Wait until the control listener answers, then signal shutdown.
    wait_for_listener(&control_addr).await;
    assert!(migrated.load(Ordering::SeqCst), "auto-migration must run first");

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(6), runner)
        .await
        .expect("shutdown must finish within the deadline")
        .unwrap();
    assert!(result.is_ok(), "{result:?}");

    // Every listener is gone: the control address binds again.
    tokio::net::TcpListener::bind(control_addr.parse::<std::net::SocketAddr>().unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn auto_migrate_disabled_never_constructs_the_driver() {
    let certs = tempfile::tempdir().unwrap();
    let migrated = Arc::new(AtomicBool::new(false));
    let deps = test_deps(certs.path(), migrated.clone());

    let control_addr = free_addr().await;
    let mut cfg = config("127.0.0.1:0".into(), control_addr.clone(), String::new());
    cfg.db_auto_migrate = false;

    let cancel = CancellationToken::new();
    let runner = tokio::spawn(run(cfg, deps, cancel.clone()));

    wait_for_listener(&control_addr).await;
    assert!(!migrated.load(Ordering::SeqCst));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(6), runner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn listener_failure_releases_the_control_address() {
    let certs = tempfile::tempdir().unwrap();
    let deps = test_deps(certs.path(), Arc::new(AtomicBool::new(false)));

    // Keep the game port occupied so step 5 fails after the control server
    // is already up.
    let (occupied, game_addr) = reserved_addr().await;
    let control_addr = free_addr().await;
    let cfg = config(game_addr, control_addr.clone(), String::new());

    let cancel = CancellationToken::new();
    let err = run(cfg, deps, cancel).await.unwrap_err();
    assert_eq!(err.code(), "LISTEN_FAILED", "{err}");

    // Partial-startup cleanup must have released the control listener.
    tokio::net::TcpListener::bind(control_addr.parse::<std::net::SocketAddr>().unwrap())
        .await
        .expect("control address must be bindable after a failed start");
    drop(occupied);
}

#[tokio::test]
async fn control_address_in_use_fails_with_stable_code() {
    let certs = tempfile::tempdir().unwrap();
    let deps = test_deps(certs.path(), Arc::new(AtomicBool::new(false)));

    let (_occupied, control_addr) = reserved_addr().await;
    let cfg = config("127.0.0.1:0".into(), control_addr, String::new());

    let err = run(cfg, deps, CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.code(), "CONTROL_SERVER_START_FAILED", "{err}");
}

#[tokio::test]
async fn empty_database_url_is_config_invalid() {
    let certs = tempfile::tempdir().unwrap();
    let deps = test_deps(certs.path(), Arc::new(AtomicBool::new(false)));

    let mut cfg = config("127.0.0.1:0".into(), free_addr().await, String::new());
    cfg.database_url = String::new();

    let err = run(cfg, deps, CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, StartupError::Config(_)));
    assert_eq!(err.code(), "CONFIG_INVALID");
}

#[tokio::test]
async fn failed_migration_blocks_all_listeners() {
    let certs = tempfile::tempdir().unwrap();
    let deps = CoreDeps {
        certs_dir: certs.path().to_path_buf(),
        auto_migrate: Arc::new(|_| {
            Box::pin(async {
                Err(holomush_types::error::StoreError::AutoMigration(
                    "relation already exists".to_string(),
                ))
            })
        }),
        ..CoreDeps::default()
    };

    let control_addr = free_addr().await;
    let cfg = config("127.0.0.1:0".into(), control_addr.clone(), String::new());

    let err = run(cfg, deps, CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.code(), "AUTO_MIGRATION_FAILED");

    // The failure happened before any bind.
    tokio::net::TcpListener::bind(control_addr.parse::<std::net::SocketAddr>().unwrap())
        .await
        .unwrap();
}

async fn wait_for_listener(addr: &str) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return,
            Err(_) if std::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            Err(e) => panic!("listener at {addr} never came up: {e}"),
        }
    }
}
