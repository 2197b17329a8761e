// Path: crates/identity/src/lib.rs
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

//! # HoloMUSH Identity
//!
//! Produces the TLS material binding both server processes to one game
//! instance. A self-signed CA whose subject common name carries the game id
//! (`holomush-<id>`) issues one leaf per component; every mTLS peer across
//! the control and game planes is then verified against that single name.
//!
//! The on-disk certificate set is all-or-nothing: if any expected file
//! exists the set is authoritative and is only ever loaded, never repaired
//! or regenerated. The operator clears the certs directory to force a new
//! identity.

/// Generation, loading, and game-id extraction for the certificate set.
pub mod bootstrap;
/// Peer-identity assertion for mTLS request handlers.
pub mod peer;

pub use bootstrap::{ensure, extract_game_id, load_existing, TlsBundle};
pub use peer::{expected_peer_name, verify_peer};
