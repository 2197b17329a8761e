// Path: crates/gateway/src/lib.rs
#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]

//! # HoloMUSH Gateway
//!
//! The user-facing process: terminates telnet connections and relays every
//! input line to the core over the mTLS game RPC. The accept loop is the
//! adversarial surface: it backs off multiplicatively on repeated accept
//! failures, never crashes the process on a panic, and exits promptly on
//! the process-wide cancel.

/// The accept loop and its backoff schedule.
pub mod accept;
/// The gateway runtime: startup order, supervision, shutdown.
pub mod runtime;
/// Per-connection session handlers relaying through the core RPC.
pub mod session;

pub use accept::AcceptBackoff;
pub use runtime::{run, GatewayDeps};
