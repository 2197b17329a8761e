// Path: crates/store/src/migrate.rs

//! The idempotent schema migration driver.
//!
//! Version state lives in a single-row `schema_migrations (version, dirty)`
//! table. Before a script runs, the row is moved to the target version with
//! `dirty = true`; only a clean finish clears the flag. A dirty row makes
//! every operation refuse until the operator runs `force`, which is the
//! sole recovery path.
//!
//! The driver owns a dedicated connection, independent of the event-store
//! pool, and is re-entered identically on every core start when
//! auto-migration is enabled: running `up` against an already-current
//! schema is a success, not an error.

use holomush_types::error::StoreError;
use sqlx::{Connection, PgConnection, Row};

/// One embedded schema migration.
#[derive(Debug)]
pub struct Migration {
    /// Monotonic schema version this migration raises the store to.
    pub version: u64,
    /// Human-readable name, shown by dry runs and `migrate status`.
    pub name: &'static str,
    /// Forward SQL.
    pub up: &'static str,
    /// Rollback SQL.
    pub down: &'static str,
}

/// The full embedded migration set, ordered by version.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "event_store",
        up: include_str!("../migrations/0001_event_store.up.sql"),
        down: include_str!("../migrations/0001_event_store.down.sql"),
    },
    Migration {
        version: 2,
        name: "world_objects",
        up: include_str!("../migrations/0002_world_objects.up.sql"),
        down: include_str!("../migrations/0002_world_objects.down.sql"),
    },
    Migration {
        version: 3,
        name: "object_attributes",
        up: include_str!("../migrations/0003_object_attributes.up.sql"),
        down: include_str!("../migrations/0003_object_attributes.down.sql"),
    },
];

/// The migrations still pending above `version`, in application order.
pub fn pending_after(version: u64) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version > version)
}

/// The migrations applied at or below `version`, in application order.
pub fn applied_up_to(version: u64) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version <= version)
}

/// Whether `v` names a version `force` may install: zero (pre-schema) or
/// any embedded migration version.
pub fn is_valid_version(v: u64) -> bool {
    v == 0 || MIGRATIONS.iter().any(|m| m.version == v)
}

/// The schema migration driver, bound to its own database connection.
pub struct Migrator {
    conn: PgConnection,
}

impl Migrator {
    /// Connects and makes sure the version-tracking table exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let mut conn = PgConnection::connect(database_url)
            .await
            .map_err(|e| StoreError::MigrationInit(e.to_string()))?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version BIGINT  NOT NULL,
                dirty   BOOLEAN NOT NULL
            )",
        )
        .execute(&mut conn)
        .await
        .map_err(|e| StoreError::MigrationInit(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Returns `(version, dirty)`; an empty table reads as `(0, false)`.
    pub async fn version(&mut self) -> Result<(u64, bool), StoreError> {
        let row = sqlx::query("SELECT version, dirty FROM schema_migrations LIMIT 1")
            .fetch_optional(&mut self.conn)
            .await
            .map_err(|e| StoreError::VersionCheck(e.to_string()))?;
        match row {
            Some(row) => {
                let version: i64 = row
                    .try_get("version")
                    .map_err(|e| StoreError::VersionCheck(e.to_string()))?;
                let dirty: bool = row
                    .try_get("dirty")
                    .map_err(|e| StoreError::VersionCheck(e.to_string()))?;
                Ok((version.max(0) as u64, dirty))
            }
            None => Ok((0, false)),
        }
    }

    /// Applies every pending migration. Already-at-latest is a success.
    ///
    /// Returns the names of the migrations that ran.
    pub async fn up(&mut self) -> Result<Vec<&'static str>, StoreError> {
        let (current, dirty) = self.version().await?;
        if dirty {
            return Err(StoreError::Dirty(current));
        }
        let mut applied = Vec::new();
        let plan: Vec<_> = pending_after(current).collect();
        for migration in plan {
            self.run_one(migration, Direction::Up, migration.version)
                .await?;
            applied.push(migration.name);
        }
        Ok(applied)
    }

    /// Rolls back exactly one step. At version zero this is a no-op success.
    ///
    /// Returns the name of the migration rolled back, if any.
    pub async fn down(&mut self) -> Result<Option<&'static str>, StoreError> {
        let (current, dirty) = self.version().await?;
        if dirty {
            return Err(StoreError::Dirty(current));
        }
        let Some(migration) = applied_up_to(current).last() else {
            return Ok(None);
        };
        let previous = applied_up_to(current)
            .filter(|m| m.version < migration.version)
            .last()
            .map(|m| m.version)
            .unwrap_or(0);
        self.run_one(migration, Direction::Down, previous).await?;
        Ok(Some(migration.name))
    }

    /// Applies `n` up-migrations (`n > 0`) or `|n|` down-migrations
    /// (`n < 0`). Running out of migrations in either direction is a
    /// success, matching `up`'s no-op rule.
    pub async fn steps(&mut self, n: i64) -> Result<Vec<&'static str>, StoreError> {
        let mut touched = Vec::new();
        if n >= 0 {
            for _ in 0..n {
                let (current, dirty) = self.version().await?;
                if dirty {
                    return Err(StoreError::Dirty(current));
                }
                let Some(migration) = pending_after(current).next() else {
                    break;
                };
                self.run_one(migration, Direction::Up, migration.version)
                    .await?;
                touched.push(migration.name);
            }
        } else {
            for _ in 0..n.unsigned_abs() {
                match self.down().await? {
                    Some(name) => touched.push(name),
                    None => break,
                }
            }
        }
        Ok(touched)
    }

    /// Overwrites the stored version and clears the dirty flag.
    ///
    /// Recovery only: this runs no SQL scripts. Fails when `v` is not a
    /// valid migration identifier.
    pub async fn force(&mut self, v: u64) -> Result<(), StoreError> {
        if !is_valid_version(v) {
            return Err(StoreError::InvalidVersion(v));
        }
        self.set_version(v, false)
            .await
            .map_err(|e| StoreError::Migration {
                name: "force".to_string(),
                reason: e.to_string(),
            })
    }

    /// Names of the migrations `up` would run, without mutating anything.
    pub async fn up_dry_run(&mut self) -> Result<Vec<&'static str>, StoreError> {
        let (current, _) = self.version().await?;
        Ok(pending_after(current).map(|m| m.name).collect())
    }

    /// Names of the migrations a full rollback would run, newest first.
    pub async fn down_dry_run(&mut self) -> Result<Vec<&'static str>, StoreError> {
        let (current, _) = self.version().await?;
        let mut names: Vec<_> = applied_up_to(current).map(|m| m.name).collect();
        names.reverse();
        Ok(names)
    }

    /// Releases the driver's dedicated connection.
    pub async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }

    async fn run_one(
        &mut self,
        migration: &'static Migration,
        direction: Direction,
        resulting_version: u64,
    ) -> Result<(), StoreError> {
        let sql = match direction {
            Direction::Up => migration.up,
            Direction::Down => migration.down,
        };
        tracing::info!(
            name = migration.name,
            version = migration.version,
            direction = direction.as_str(),
            "running migration"
        );

        // Mark dirty first: a crash mid-script leaves the flag set and
        // blocks further runs until the operator forces a version.
        self.set_version(migration.version, true)
            .await
            .map_err(|e| StoreError::Migration {
                name: migration.name.to_string(),
                reason: e.to_string(),
            })?;

        sqlx::raw_sql(sql)
            .execute(&mut self.conn)
            .await
            .map_err(|e| StoreError::Migration {
                name: migration.name.to_string(),
                reason: e.to_string(),
            })?;

        self.set_version(resulting_version, false)
            .await
            .map_err(|e| StoreError::Migration {
                name: migration.name.to_string(),
                reason: e.to_string(),
            })
    }

    async fn set_version(&mut self, version: u64, dirty: bool) -> Result<(), sqlx::Error> {
        let mut tx = self.conn.begin().await?;
        sqlx::query("DELETE FROM schema_migrations")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO schema_migrations (version, dirty) VALUES ($1, $2)")
            .bind(version as i64)
            .bind(dirty)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Up,
    Down,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Runs `up` on a dedicated connection, closing it regardless of outcome.
///
/// This is the startup gate the core re-enters on every boot when
/// `db_auto_migrate` is enabled; its success is a precondition for binding
/// any listener.
pub async fn auto_migrate(database_url: &str) -> Result<(), StoreError> {
    let mut migrator = Migrator::connect(database_url).await?;
    let outcome = Box::pin(migrator.up()).await;
    if let Err(e) = migrator.close().await {
        // The process continues; at worst the connection leaks.
        tracing::warn!(error = %e, "failed to close migration connection");
    }
    match outcome {
        Ok(applied) if applied.is_empty() => {
            tracing::info!("schema already at latest version");
            Ok(())
        }
        Ok(applied) => {
            tracing::info!(migrations = ?applied, "schema migrated");
            Ok(())
        }
        Err(e) => Err(StoreError::AutoMigration(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_sequential_from_one() {
        for (i, m) in MIGRATIONS.iter().enumerate() {
            assert_eq!(m.version, i as u64 + 1, "{} out of order", m.name);
            assert!(!m.up.trim().is_empty());
            assert!(!m.down.trim().is_empty());
        }
    }

    #[test]
    fn migration_names_are_unique() {
        let mut names: Vec<_> = MIGRATIONS.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MIGRATIONS.len());
    }

    #[test]
    fn pending_and_applied_partition_the_set() {
        for v in 0..=MIGRATIONS.len() as u64 {
            let pending = pending_after(v).count();
            let applied = applied_up_to(v).count();
            assert_eq!(pending + applied, MIGRATIONS.len());
            assert_eq!(applied, v as usize);
        }
    }

    #[test]
    fn pending_after_latest_is_empty() {
        let latest = MIGRATIONS.last().unwrap().version;
        assert_eq!(pending_after(latest).count(), 0);
    }

    #[test]
    fn force_targets_are_zero_or_known_versions() {
        assert!(is_valid_version(0));
        for m in MIGRATIONS {
            assert!(is_valid_version(m.version));
        }
        assert!(!is_valid_version(MIGRATIONS.len() as u64 + 1));
        assert!(!is_valid_version(u64::MAX));
    }
}
