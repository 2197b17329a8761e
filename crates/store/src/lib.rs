// Path: crates/store/src/lib.rs
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

//! # HoloMUSH Store
//!
//! The persistence layer of the core process: the event-store connection
//! pool, the idempotent schema migration driver that gates startup, and the
//! world seeds with their attribute verification.
//!
//! The pool is owned by the core's event store and closed exactly once at
//! shutdown. The migration driver takes its own dedicated connection and
//! closes it independently, so a dirty migration can never hold the pool
//! hostage.

/// The event-store connection pool.
pub mod db;
/// The idempotent schema migration driver.
pub mod migrate;
/// Embedded world seeds, their application and verification.
pub mod seed;

pub use db::EventStore;
pub use migrate::{auto_migrate, Migration, Migrator, MIGRATIONS};
pub use seed::{validate_seeds, SeedOutcome, Seeder};
