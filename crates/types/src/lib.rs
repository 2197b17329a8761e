// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # HoloMUSH Types
//!
//! This crate is the foundational library for the HoloMUSH control plane,
//! containing the shared data structures, configuration objects, and error
//! types used by every other crate in the workspace.
//!
//! ## Architectural Role
//!
//! As the base crate, `holomush-types` has minimal dependencies and is itself
//! a dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like [`Component`], the configuration structs, and the
//! error enums with their stable machine-readable codes.

/// The deadline applied to the whole orderly-shutdown sequence of a process.
pub const SHUTDOWN_DEADLINE: std::time::Duration = std::time::Duration::from_secs(5);

/// The per-component dial timeout used by the `status` subcommand.
pub const STATUS_DIAL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::StartupError> = std::result::Result<T, E>;

/// Process component identities and their certificate bindings.
pub mod component;
/// Shared configuration structures for the core and gateway processes.
pub mod config;
/// A unified set of all error types used across the workspace.
pub mod error;
/// Resolution of the per-user certs/data/state directories.
pub mod paths;

pub use component::Component;
