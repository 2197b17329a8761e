// Path: crates/gateway/src/runtime.rs

//! The gateway runtime: ordered startup, supervision, bounded shutdown.
//!
//! Order: TLS identity → control server → core RPC client → telnet
//! listener and accept loop → observability. The core client is lazy, so
//! the gateway comes up and stays up while the core restarts; sessions see
//! a notice until the channel reconnects.

use crate::accept::spawn_accept_loop;
use crate::session::handle_connection;
use holomush_control::{install_signal_handlers, spawn_monitor, ControlServer, PidFile};
use holomush_identity::bootstrap::TlsBundle;
use holomush_ipc::game::game_session_client::GameSessionClient;
use holomush_telemetry::http::ReadinessProbe;
use holomush_types::config::GatewayConfig;
use holomush_types::error::{IdentityError, RuntimeError, StartupError};
use holomush_types::{Component, SHUTDOWN_DEADLINE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tonic::transport::Endpoint;

/// Factory callables for what the gateway runtime acquires. Defaults are
/// the production implementations; tests substitute their own.
pub struct GatewayDeps {
    /// Where the CA and leaf certificates live.
    pub certs_dir: PathBuf,
    /// Produces the TLS bundle for a component.
    pub ensure_tls: Arc<
        dyn Fn(&Path, Component, Option<&str>) -> Result<TlsBundle, IdentityError> + Send + Sync,
    >,
}

impl Default for GatewayDeps {
    fn default() -> Self {
        Self {
            certs_dir: holomush_types::paths::certs_dir(),
            ensure_tls: Arc::new(holomush_identity::ensure),
        }
    }
}

fn remaining(deadline: Instant) -> std::time::Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Runs the gateway process until the process-wide cancel fires, then
/// tears everything down in reverse order.
pub async fn run(
    config: GatewayConfig,
    deps: GatewayDeps,
    cancel: CancellationToken,
) -> Result<(), StartupError> {
    config.validate()?;

    // Pid file under the state directory; removed when the process exits.
    let _pidfile = match PidFile::write(Component::Gateway) {
        Ok(pidfile) => Some(pidfile),
        Err(e) => {
            tracing::warn!(error = %e, "failed to write pid file");
            None
        }
    };

    // 1. Identity. The gateway never generates a game id of its own; the
    // CA either exists already or is created with a generated id.
    let bundle = (deps.ensure_tls)(&deps.certs_dir, Component::Gateway, None)?;
    let game_id = bundle.game_id.clone();
    tracing::info!(game_id = %game_id, "gateway identity ready");

    // 2. Control server.
    let control = ControlServer::new(Component::Gateway, game_id.clone(), cancel.clone());
    let (control_handle, control_errors) = control
        .start(&config.control_addr, bundle.server.clone())
        .await?;

    // 3. Core RPC client, lazy: the channel dials on first use and
    // reconnects on its own.
    let endpoint = Endpoint::from_shared(format!("https://{}", config.core_addr))
        .map_err(|e| client_create_error(&config.core_addr, e.to_string()))
        .and_then(|endpoint| {
            endpoint
                .tls_config(bundle.client.clone())
                .map_err(|e| client_create_error(&config.core_addr, e.to_string()))
        });
    let channel = match endpoint {
        Ok(endpoint) => endpoint.connect_lazy(),
        Err(e) => {
            cleanup_after_failed_start(None, Some(control_handle), &control).await;
            return Err(e.into());
        }
    };
    let core_client = GameSessionClient::new(channel);

    // 4. Telnet listener and accept loop.
    let listener = match tokio::net::TcpListener::bind(&config.telnet_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            cleanup_after_failed_start(None, Some(control_handle), &control).await;
            return Err(RuntimeError::Listen {
                addr: config.telnet_addr.clone(),
                reason: e.to_string(),
            }
            .into());
        }
    };
    let telnet_addr = listener.local_addr().map(|a| a.to_string());
    tracing::info!(addr = ?telnet_addr, "telnet listening");

    let sessions = TaskTracker::new();
    let accept_cancel = cancel.child_token();
    let accept_task = spawn_accept_loop(listener, cancel.clone(), {
        let sessions = sessions.clone();
        let session_cancel = accept_cancel.clone();
        move |stream, peer| {
            let client = core_client.clone();
            let cancel = session_cancel.clone();
            let _ = sessions.spawn(handle_connection(stream, peer, client, cancel));
        }
    });

    // 5. Observability, optional. The gateway is ready once telnet is bound,
    // which by this point it is.
    let observability = if config.metrics_addr.is_empty() {
        None
    } else {
        let probe: ReadinessProbe = Arc::new(|| true);
        match holomush_telemetry::http::start(&config.metrics_addr, probe).await {
            Ok(started) => Some(started),
            Err(e) => {
                cancel.cancel();
                let _ = accept_task.await;
                cleanup_after_failed_start(None, Some(control_handle), &control).await;
                return Err(RuntimeError::ObservabilityStart {
                    addr: config.metrics_addr.clone(),
                    reason: e.to_string(),
                }
                .into());
            }
        }
    };

    // 6. Supervision.
    let _signals = install_signal_handlers(cancel.clone());
    let _ = spawn_monitor("control-server", control_errors, cancel.clone());
    let observability = observability.map(|(handle, error_rx)| {
        let _ = spawn_monitor("observability", error_rx, cancel.clone());
        handle
    });

    tracing::info!(component = "gateway", "startup complete");
    cancel.cancelled().await;

    // Orderly shutdown: stop accepting, drain sessions, then the rest in
    // reverse order, all inside the one deadline.
    tracing::info!("shutting down");
    let deadline = Instant::now() + SHUTDOWN_DEADLINE;
    control.mark_stopping();
    if tokio::time::timeout(remaining(deadline), accept_task)
        .await
        .is_err()
    {
        tracing::warn!("accept loop did not stop within the shutdown deadline");
    }
    sessions.close();
    if tokio::time::timeout(remaining(deadline), sessions.wait())
        .await
        .is_err()
    {
        tracing::warn!("sessions still draining at the shutdown deadline");
    }
    if let Some(observability) = observability {
        observability.stop(remaining(deadline)).await;
    }
    control_handle.stop(remaining(deadline)).await;
    tracing::info!("shutdown complete");

    Ok(())
}

fn client_create_error(addr: &str, reason: String) -> RuntimeError {
    RuntimeError::GrpcClientCreate {
        addr: addr.to_string(),
        reason,
    }
}

/// Releases resources acquired before a failed startup step, newest first.
async fn cleanup_after_failed_start(
    accept_task: Option<tokio::task::JoinHandle<()>>,
    control_handle: Option<holomush_control::server::ControlHandle>,
    control: &ControlServer,
) {
    let deadline = Instant::now() + SHUTDOWN_DEADLINE;
    control.mark_stopping();
    if let Some(task) = accept_task {
        task.abort();
        let _ = task.await;
    }
    if let Some(handle) = control_handle {
        handle.stop(remaining(deadline)).await;
    }
}
