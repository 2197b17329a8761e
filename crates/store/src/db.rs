// Path: crates/store/src/db.rs

//! The event-store connection pool owned by the core process.
//!
//! The event schema itself is domain territory; this module only owns the
//! pool lifecycle: connect at startup, hand out references while running,
//! close exactly once during orderly shutdown.

use holomush_types::error::StoreError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_CONNECTIONS: u32 = 8;

/// The core's handle to the persistent event store.
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    /// Connects the pool and verifies the database is reachable.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        // One round trip up front so a bad pool fails startup, not the
        // first in-game query.
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool. Used by tests to inject a lazy pool that
    /// never dials anything.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for the domain layers built on top.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// True while the pool can produce connections; feeds the readiness probe.
    pub fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    /// Closes every pooled connection. Called once, in shutdown step 4.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
