// Path: crates/telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

// --- Metric Statics ---
// OnceCell holds the collectors; they are initialized exactly once by
// `install`.

static GATEWAY_CONNECTED: OnceCell<IntGauge> = OnceCell::new();
static GATEWAY_ACCEPTED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static GATEWAY_ACCEPT_ERRORS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static RPC_REQUESTS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static RPC_REQUEST_DURATION_SECONDS: OnceCell<HistogramVec> = OnceCell::new();
static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Helper macro to reduce boilerplate for getting a metric from OnceCell.
/// This will panic if `install()` has not been called, which is intentional
/// as it indicates a critical application setup error.
macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("Prometheus sink not initialized. Call telemetry::prometheus::install() first.")
    };
}

impl RpcMetricsSink for PrometheusSink {
    fn observe_request_duration(&self, route: &str, duration_secs: f64) {
        get_metric!(RPC_REQUEST_DURATION_SECONDS)
            .with_label_values(&[route])
            .observe(duration_secs);
    }
    fn inc_requests_total(&self, route: &str, status: &str) {
        get_metric!(RPC_REQUESTS_TOTAL)
            .with_label_values(&[route, status])
            .inc();
    }
}

impl GatewayMetricsSink for PrometheusSink {
    fn inc_connected(&self) {
        get_metric!(GATEWAY_CONNECTED).inc();
    }
    fn dec_connected(&self) {
        get_metric!(GATEWAY_CONNECTED).dec();
    }
    fn inc_accepted(&self) {
        get_metric!(GATEWAY_ACCEPTED_TOTAL).inc();
    }
    fn inc_accept_error(&self) {
        get_metric!(GATEWAY_ACCEPT_ERRORS_TOTAL).inc();
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, kind: &'static str, variant: &'static str) {
        get_metric!(ERRORS_TOTAL)
            .with_label_values(&[kind, variant])
            .inc();
    }
}

impl MetricsSink for PrometheusSink {}

/// Initializes all Prometheus collectors and returns a static reference to
/// the sink. Must be called only once at application startup.
#[allow(clippy::expect_used)]
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    GATEWAY_CONNECTED
        .set(register_int_gauge!(
            "holomush_gateway_connected",
            "Current number of connected player sockets."
        )?)
        .expect("static already initialized");
    GATEWAY_ACCEPTED_TOTAL
        .set(register_int_counter!(
            "holomush_gateway_accepted_total",
            "Total player connections accepted."
        )?)
        .expect("static already initialized");
    GATEWAY_ACCEPT_ERRORS_TOTAL
        .set(register_int_counter!(
            "holomush_gateway_accept_errors_total",
            "Total accept-loop errors, including those absorbed by backoff."
        )?)
        .expect("static already initialized");
    RPC_REQUESTS_TOTAL
        .set(register_int_counter_vec!(
            "holomush_rpc_requests_total",
            "Total RPC requests handled.",
            &["route", "status"]
        )?)
        .expect("static already initialized");
    RPC_REQUEST_DURATION_SECONDS
        .set(register_histogram_vec!(
            "holomush_rpc_request_duration_seconds",
            "Latency of handled RPC requests.",
            &["route"],
            exponential_buckets(0.001, 2.0, 15)?
        )?)
        .expect("static already initialized");
    ERRORS_TOTAL
        .set(register_int_counter_vec!(
            "holomush_errors_total",
            "Total number of errors, categorized by origin and variant.",
            &["kind", "variant"]
        )?)
        .expect("static already initialized");

    static SINK_IMPL: PrometheusSink = PrometheusSink;
    let _ = SINK.set(&SINK_IMPL);
    Ok(&SINK_IMPL)
}
