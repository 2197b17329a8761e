// Path: crates/control/src/lib.rs
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

//! # HoloMUSH Control
//!
//! The uniform local control surface embedded in both server processes,
//! plus the supervision primitives that tie every background subsystem to
//! the single process-wide cancel.
//!
//! The control server answers `Status` and `Shutdown` over mTLS. `Shutdown`
//! responds immediately and then fires the in-process cancel token; the
//! actual teardown is the embedder's orderly-shutdown sequence.

/// The mTLS control client used by the `status` subcommand and tests.
pub mod client;
/// The embedded control RPC server.
pub mod server;
/// Signal handling, error fan-in monitors, and the shutdown deadline.
pub mod supervise;

pub use client::ControlClient;
pub use server::ControlServer;
pub use supervise::{install_signal_handlers, spawn_monitor, PidFile};
