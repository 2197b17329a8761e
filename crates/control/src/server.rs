// Path: crates/control/src/server.rs

//! The control RPC server embedded in both the core and the gateway.

use holomush_identity::verify_peer;
use holomush_ipc::control::control_server::{Control, ControlServer as ControlTonicServer};
use holomush_ipc::control::{
    ShutdownRequest, ShutdownResponse, StatusRequest, StatusResponse,
};
use holomush_ipc::SHUTDOWN_INITIATED;
use holomush_types::error::ControlError;
use holomush_types::Component;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Server, ServerTlsConfig};
use tonic::{Request, Response, Status};

/// Shared state behind the RPC handlers.
///
/// `running` is the only hot atomic in the process; everything else the
/// handlers touch is immutable after construction.
struct ControlState {
    component: Component,
    game_id: String,
    running: AtomicBool,
    started: Instant,
    pid: u32,
    shutdown: CancellationToken,
}

/// Implementation of the `Control` gRPC service.
#[derive(Clone)]
struct ControlService {
    state: Arc<ControlState>,
}

#[tonic::async_trait]
impl Control for ControlService {
    async fn status(
        &self,
        request: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        verify_peer(&request, &self.state.game_id)?;
        Ok(Response::new(StatusResponse {
            running: self.state.running.load(Ordering::SeqCst),
            pid: self.state.pid,
            uptime_seconds: self.state.started.elapsed().as_secs(),
            component: self.state.component.name().to_string(),
        }))
    }

    async fn shutdown(
        &self,
        request: Request<ShutdownRequest>,
    ) -> Result<Response<ShutdownResponse>, Status> {
        verify_peer(&request, &self.state.game_id)?;
        let graceful = request.into_inner().graceful;
        tracing::info!(
            component = self.state.component.name(),
            graceful,
            "shutdown requested over control plane"
        );

        // Respond before the teardown starts; the caller is never blocked
        // on the actual shutdown. Repeated calls reinitiate the (idempotent)
        // cancel.
        let state = self.state.clone();
        tokio::spawn(async move {
            state.running.store(false, Ordering::SeqCst);
            state.shutdown.cancel();
        });

        Ok(Response::new(ShutdownResponse {
            message: SHUTDOWN_INITIATED.to_string(),
        }))
    }
}

/// A started control server, ready to be supervised and later stopped.
///
/// The serve loop's single-slot error channel is handed back separately by
/// [`ControlServer::start`] so supervision can own it outright.
pub struct ControlHandle {
    /// The bound address (useful when the configured port was 0).
    pub local_addr: std::net::SocketAddr,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl ControlHandle {
    /// Gracefully drains the server, waiting no longer than `deadline`.
    pub async fn stop(self, deadline: Duration) {
        self.stop.cancel();
        if tokio::time::timeout(deadline, self.task).await.is_err() {
            tracing::warn!("control server did not drain within the shutdown deadline");
        }
    }
}

/// The embedding host for the control service.
pub struct ControlServer {
    state: Arc<ControlState>,
}

impl ControlServer {
    /// Creates the server for `component`, wiring remote shutdowns to the
    /// process-wide cancel token.
    pub fn new(component: Component, game_id: String, shutdown: CancellationToken) -> Self {
        Self {
            state: Arc::new(ControlState {
                component,
                game_id,
                running: AtomicBool::new(true),
                started: Instant::now(),
                pid: std::process::id(),
                shutdown,
            }),
        }
    }

    /// Marks the process as no longer running, without touching the listener.
    pub fn mark_stopping(&self) {
        self.state.running.store(false, Ordering::SeqCst);
    }

    /// Binds the control listener and starts serving.
    ///
    /// Binding happens here so an in-use address fails startup immediately
    /// with `CONTROL_SERVER_START_FAILED`.
    pub async fn start(
        &self,
        addr: &str,
        tls: ServerTlsConfig,
    ) -> Result<(ControlHandle, mpsc::Receiver<anyhow::Error>), ControlError> {
        let socket_addr: std::net::SocketAddr = addr.parse().map_err(|e| ControlError::Start {
            addr: addr.to_string(),
            reason: format!("invalid address: {e}"),
        })?;
        let listener = tokio::net::TcpListener::bind(socket_addr)
            .await
            .map_err(|e| ControlError::Start {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ControlError::Start {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        let router = Server::builder()
            .tls_config(tls)
            .map_err(|e| ControlError::Tls(e.to_string()))?
            .add_service(ControlTonicServer::new(ControlService {
                state: self.state.clone(),
            }));

        tracing::info!(
            component = self.state.component.name(),
            addr = %local_addr,
            "control server listening"
        );

        let stop = CancellationToken::new();
        let drain = stop.clone();
        let (error_tx, error_rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let incoming = TcpListenerStream::new(listener);
            let served = router
                .serve_with_incoming_shutdown(incoming, drain.cancelled_owned())
                .await;
            if let Err(e) = served {
                let _ = error_tx.send(anyhow::Error::from(e)).await;
            }
        });

        Ok((
            ControlHandle {
                local_addr,
                stop,
                task,
            },
            error_rx,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_server_reports_running() {
        let cancel = CancellationToken::new();
        let server = ControlServer::new(Component::Core, "limbo".into(), cancel);
        assert!(server.state.running.load(Ordering::SeqCst));

        server.mark_stopping();
        assert!(!server.state.running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn start_rejects_address_in_use() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let cancel = CancellationToken::new();
        let server = ControlServer::new(Component::Core, "limbo".into(), cancel);
        let tls = tls_for_test();
        let err = server.start(&addr, tls).await.unwrap_err();
        match err {
            ControlError::Start { addr: a, .. } => assert_eq!(a, addr),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn stop_releases_the_address() {
        let cancel = CancellationToken::new();
        let server = ControlServer::new(Component::Gateway, "limbo".into(), cancel);
        let (handle, _error_rx) = server.start("127.0.0.1:0", tls_for_test()).await.unwrap();
        let addr = handle.local_addr;

        handle.stop(Duration::from_secs(5)).await;

        // The port must be bindable again immediately after a drain.
        tokio::net::TcpListener::bind(addr).await.unwrap();
    }

    fn tls_for_test() -> ServerTlsConfig {
        let dir = tempfile::tempdir().unwrap();
        let bundle =
            holomush_identity::ensure(dir.path(), Component::Core, Some("limbo")).unwrap();
        bundle.server
    }
}
