// Path: crates/telemetry/src/http.rs
use axum::{
    body::Bytes,
    error_handling::HandleErrorLayer,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderName, StatusCode},
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

/// Decides whether the embedding process should be considered ready to
/// serve. The core supplies "DB connected and listeners bound"; the gateway
/// supplies "telnet bound".
pub type ReadinessProbe = Arc<dyn Fn() -> bool + Send + Sync>;

/// A running observability endpoint.
///
/// The endpoint owns its own stop token so the embedder can drain it at
/// its exact slot in the orderly-shutdown sequence, after the primary
/// listener and before the control server. The serve loop's single-slot
/// error channel is handed back separately by [`start`] so supervision can
/// own it outright; it closes without a value on graceful shutdown.
pub struct Observability {
    /// The bound address (useful when the configured port was 0).
    pub local_addr: SocketAddr,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl Observability {
    /// Gracefully drains the endpoint, waiting no longer than `deadline`.
    pub async fn stop(self, deadline: Duration) {
        self.stop.cancel();
        if tokio::time::timeout(deadline, self.task).await.is_err() {
            tracing::warn!("observability endpoint did not drain within the shutdown deadline");
        }
    }
}

async fn metrics_handler() -> ([(HeaderName, String); 1], Bytes) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = Vec::with_capacity(1 << 20);
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::error!(error = %e, "failed to encode prometheus metrics");
    }
    (
        [(CONTENT_TYPE, encoder.format_type().to_string())],
        buf.into(),
    )
}

async fn healthz_handler() -> &'static str {
    "OK"
}

async fn readyz_handler(State(ready): State<ReadinessProbe>) -> (StatusCode, &'static str) {
    if ready() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn handle_service_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unhandled internal error: {}", err),
        )
    }
}

/// Binds the observability listener and spawns the serve loop.
///
/// Binding happens here, synchronously in the startup sequence, so an
/// in-use address fails startup rather than surfacing later.
pub async fn start(
    addr: &str,
    ready: ReadinessProbe,
) -> std::io::Result<(Observability, mpsc::Receiver<anyhow::Error>)> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(ready)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_service_error))
                .layer(TraceLayer::new_for_http())
                .load_shed()
                .concurrency_limit(8)
                .timeout(Duration::from_secs(2)),
        );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(target: "telemetry", addr = %local_addr, "observability endpoint listening");

    let stop = CancellationToken::new();
    let drain = stop.clone();
    let (error_tx, error_rx) = mpsc::channel(1);
    let task = tokio::spawn(async move {
        let graceful = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(drain.cancelled_owned());
        if let Err(e) = graceful.await {
            let _ = error_tx.send(anyhow::Error::from(e)).await;
        }
        // Dropping the sender closes the channel; supervision treats a
        // closed channel as a graceful exit.
    });

    Ok((
        Observability {
            local_addr,
            stop,
            task,
        },
        error_rx,
    ))
}
