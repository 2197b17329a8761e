// Path: crates/telemetry/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # HoloMUSH Telemetry
//!
//! This crate provides the observability infrastructure for both server
//! processes: structured logging initialization, a Prometheus metrics
//! endpoint with embedder-supplied readiness, and abstract sinks for
//! decoupling metric instrumentation from the backend.

/// The optional HTTP server exposing `/metrics`, `/healthz`, and `/readyz`.
pub mod http;
/// The initialization routine for global structured logging.
pub mod init;
/// The concrete implementation of metrics sinks using the `prometheus` crate.
pub mod prometheus;
/// Abstract traits (`*MetricsSink`) that define the contract for metrics reporting.
pub mod sinks;

// Re-export the public helper functions for easy access to the global sinks.
pub use sinks::{error_metrics, gateway_metrics, rpc_metrics};
