// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling the server
//! processes from the Prometheus backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns the configured RPC metrics sink, or a no-op sink before install.
pub fn rpc_metrics() -> &'static dyn RpcMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured gateway metrics sink, or a no-op sink before install.
pub fn gateway_metrics() -> &'static dyn GatewayMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured error metrics sink, or a no-op sink before install.
pub fn error_metrics() -> &'static dyn ErrorMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// A sink for metrics describing the RPC surfaces (control and game planes).
pub trait RpcMetricsSink: Send + Sync + std::fmt::Debug {
    /// Observes the latency of one handled request, labeled by route.
    fn observe_request_duration(&self, route: &str, duration_secs: f64);
    /// Increments the request counter, labeled by route and gRPC status code.
    fn inc_requests_total(&self, route: &str, status: &str);
}
impl RpcMetricsSink for NopSink {
    fn observe_request_duration(&self, _route: &str, _duration_secs: f64) {}
    fn inc_requests_total(&self, _route: &str, _status: &str) {}
}

/// A sink for metrics describing the gateway's connection handling.
pub trait GatewayMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the gauge of currently connected players.
    fn inc_connected(&self);
    /// Decrements the gauge of currently connected players.
    fn dec_connected(&self);
    /// Increments the total of accepted connections.
    fn inc_accepted(&self);
    /// Increments the total of accept-loop errors.
    fn inc_accept_error(&self);
}
impl GatewayMetricsSink for NopSink {
    fn inc_connected(&self) {}
    fn dec_connected(&self) {}
    fn inc_accepted(&self) {}
    fn inc_accept_error(&self) {}
}

/// A sink counting errors by origin, without terminating anything.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the error counter for a (kind, variant) pair.
    fn inc_error(&self, kind: &'static str, variant: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _kind: &'static str, _variant: &'static str) {}
}

/// The composite sink installed once at startup.
pub trait MetricsSink:
    RpcMetricsSink + GatewayMetricsSink + ErrorMetricsSink + Send + Sync + std::fmt::Debug
{
}
impl MetricsSink for NopSink {}
