// Path: crates/core/src/lib.rs
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

//! # HoloMUSH Core
//!
//! The authoritative game process. This crate owns the strictly ordered
//! startup sequence (TLS identity, auto-migration, control server, game
//! listener, observability), the supervision of every background
//! subsystem, and the bounded orderly shutdown that unwinds them in
//! reverse.
//!
//! The domain engine itself (world model, command dispatcher, plugin
//! runtime) hangs off the [`game`] seam and is intentionally thin here.

/// The player-session service the gateway relays into.
pub mod game;
/// The ordered startup/shutdown runtime.
pub mod runtime;

pub use runtime::{run, CoreDeps};
