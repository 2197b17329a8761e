// Path: crates/core/src/runtime.rs

//! The core process runtime: strictly ordered startup, supervision, and
//! bounded orderly shutdown.
//!
//! Startup order (each step a precondition for the next): TLS identity →
//! auto-migration → event-store pool → control server → game listener →
//! observability. Shutdown unwinds in reverse inside the 5-second
//! deadline. If startup fails after a listener is bound, everything
//! acquired so far is released, in reverse order, before the error is
//! returned; a failed start must leave every address bindable.

use crate::game::{start_game_service, GameHandle};
use futures::future::BoxFuture;
use holomush_control::server::ControlHandle;
use holomush_control::{install_signal_handlers, spawn_monitor, ControlServer, PidFile};
use holomush_identity::bootstrap::TlsBundle;
use holomush_store::EventStore;
use holomush_telemetry::http::ReadinessProbe;
use holomush_types::config::CoreConfig;
use holomush_types::error::{IdentityError, RuntimeError, StartupError, StoreError};
use holomush_types::{Component, SHUTDOWN_DEADLINE};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Factory callables for everything the runtime acquires.
///
/// Defaults point at the production implementations; tests supply
/// alternatives to cover startup and shutdown paths without real
/// certificates or a real database.
pub struct CoreDeps {
    /// Where the CA and leaf certificates live.
    pub certs_dir: PathBuf,
    /// Produces the TLS bundle for a component.
    pub ensure_tls: Arc<
        dyn Fn(&Path, Component, Option<&str>) -> Result<TlsBundle, IdentityError> + Send + Sync,
    >,
    /// Runs the startup auto-migration against the database URL.
    pub auto_migrate:
        Arc<dyn Fn(&str) -> BoxFuture<'static, Result<(), StoreError>> + Send + Sync>,
    /// Connects the event-store pool.
    pub connect_store:
        Arc<dyn Fn(&str) -> BoxFuture<'static, Result<EventStore, StoreError>> + Send + Sync>,
}

async fn run_auto_migrate(url: String) -> Result<(), StoreError> {
    holomush_store::auto_migrate(&url).await
}

async fn run_connect_store(url: String) -> Result<EventStore, StoreError> {
    EventStore::connect(&url).await
}

impl Default for CoreDeps {
    fn default() -> Self {
        Self {
            certs_dir: holomush_types::paths::certs_dir(),
            ensure_tls: Arc::new(holomush_identity::ensure),
            auto_migrate: Arc::new(|url| Box::pin(run_auto_migrate(url.to_string()))),
            connect_store: Arc::new(|url| Box::pin(run_connect_store(url.to_string()))),
        }
    }
}

fn remaining(deadline: Instant) -> std::time::Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Runs the core process until the process-wide cancel fires, then tears
/// everything down in reverse order.
pub async fn run(
    config: CoreConfig,
    deps: CoreDeps,
    cancel: CancellationToken,
) -> Result<(), StartupError> {
    config.validate()?;

    // The data directory exists before anything writes under it.
    let data_dir = config
        .data_dir
        .clone()
        .unwrap_or_else(holomush_types::paths::data_dir);
    std::fs::create_dir_all(&data_dir).map_err(|e| {
        StartupError::Config(holomush_types::error::ConfigError::Invalid {
            option: "data-dir",
            reason: format!("{}: {e}", data_dir.display()),
        })
    })?;

    // Pid file under the state directory; removed when the process exits.
    let _pidfile = match PidFile::write(Component::Core) {
        Ok(pidfile) => Some(pidfile),
        Err(e) => {
            tracing::warn!(error = %e, "failed to write pid file");
            None
        }
    };

    // 1. Identity. Everything after this step speaks mTLS.
    let bundle = (deps.ensure_tls)(
        &deps.certs_dir,
        Component::Core,
        config.game_id.as_deref(),
    )?;
    let game_id = bundle.game_id.clone();
    tracing::info!(game_id = %game_id, data_dir = %data_dir.display(), "core identity ready");

    // 2. Schema. Success is a precondition for binding any listener.
    if config.db_auto_migrate {
        (deps.auto_migrate)(&config.database_url).await?;
    } else {
        tracing::info!("automatic migration disabled, skipping");
    }

    // 3. Event store pool, closed last during shutdown.
    let store = Arc::new((deps.connect_store)(&config.database_url).await?);

    // 4. Control server.
    let control = ControlServer::new(Component::Core, game_id.clone(), cancel.clone());
    let (control_handle, control_errors) =
        match control.start(&config.control_addr, bundle.server.clone()).await {
            Ok(started) => started,
            Err(e) => {
                store.close().await;
                return Err(e.into());
            }
        };

    // 5. Primary game service.
    let (game_handle, game_errors) = match start_game_service(
        &config.grpc_addr,
        bundle.server.clone(),
        game_id.clone(),
        store.clone(),
    )
    .await
    {
        Ok(started) => started,
        Err(e) => {
            cleanup_after_failed_start(None, Some(control_handle), &control, &store).await;
            return Err(e.into());
        }
    };

    // 6. Observability, optional. Ready once DB is connected and both
    // listeners are bound.
    let ready = Arc::new(AtomicBool::new(false));
    let observability = if config.metrics_addr.is_empty() {
        None
    } else {
        let probe_store = store.clone();
        let probe_flag = ready.clone();
        let probe: ReadinessProbe = Arc::new(move || {
            probe_flag.load(Ordering::SeqCst) && probe_store.is_connected()
        });
        match holomush_telemetry::http::start(&config.metrics_addr, probe).await {
            Ok(started) => Some(started),
            Err(e) => {
                cleanup_after_failed_start(Some(game_handle), Some(control_handle), &control, &store)
                    .await;
                return Err(RuntimeError::ObservabilityStart {
                    addr: config.metrics_addr.clone(),
                    reason: e.to_string(),
                }
                .into());
            }
        }
    };
    ready.store(true, Ordering::SeqCst);

    // 7. Supervision: fan every error channel into the one cancel.
    let _signals = install_signal_handlers(cancel.clone());
    let _ = spawn_monitor("control-server", control_errors, cancel.clone());
    let _ = spawn_monitor("game-service", game_errors, cancel.clone());
    let observability = observability.map(|(handle, error_rx)| {
        let _ = spawn_monitor("observability", error_rx, cancel.clone());
        handle
    });

    tracing::info!(component = "core", "startup complete");
    cancel.cancelled().await;

    // Orderly shutdown, reverse order, bounded as a whole.
    tracing::info!("shutting down");
    let deadline = Instant::now() + SHUTDOWN_DEADLINE;
    control.mark_stopping();
    game_handle.stop(remaining(deadline)).await;
    if let Some(observability) = observability {
        observability.stop(remaining(deadline)).await;
    }
    control_handle.stop(remaining(deadline)).await;
    store.close().await;
    tracing::info!("shutdown complete");

    Ok(())
}

/// Releases resources acquired before a failed startup step, newest first.
async fn cleanup_after_failed_start(
    game: Option<GameHandle>,
    control_handle: Option<ControlHandle>,
    control: &ControlServer,
    store: &EventStore,
) {
    let deadline = Instant::now() + SHUTDOWN_DEADLINE;
    control.mark_stopping();
    if let Some(handle) = game {
        handle.stop(remaining(deadline)).await;
    }
    if let Some(handle) = control_handle {
        handle.stop(remaining(deadline)).await;
    }
    store.close().await;
}
