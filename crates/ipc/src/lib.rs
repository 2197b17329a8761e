// Path: crates/ipc/src/lib.rs
//! # HoloMUSH IPC
//!
//! RPC schemas for the two wire surfaces shared by the core and gateway:
//! 1. **Control plane**: gRPC via `tonic`, the `Status`/`Shutdown` pair
//!    every process embeds for supervision.
//! 2. **Game plane**: the core's player-session service the gateway relays
//!    telnet connections through.
//!
//! Both surfaces are served over mTLS only; peer identity is asserted
//! against the game id by the embedding servers.

use holomush_types::Component;

// Re-export the generated Protobuf/Tonic code.

/// The supervision control plane, identical for both components.
pub mod control {
    tonic::include_proto!("holomush.control.v1");
}

/// The core's primary game-session service.
pub mod game {
    tonic::include_proto!("holomush.game.v1");
}

impl control::StatusResponse {
    /// Parses the `component` field back into a [`Component`], if it names one.
    pub fn component_kind(&self) -> Option<Component> {
        self.component.parse().ok()
    }
}

/// The fixed response line for `Shutdown`; the caller is never blocked on
/// the actual teardown.
pub const SHUTDOWN_INITIATED: &str = "shutdown initiated";

#[cfg(test)]
mod tests;
