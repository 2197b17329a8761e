// Path: crates/store/src/seed.rs

//! Embedded world seeds and their verification.
//!
//! Seeding is idempotent: missing objects are inserted, present objects are
//! verified attribute-by-attribute against the embedded definition. Drift
//! in `name`, `kind`, or `description` warns per field and, in strict mode,
//! fails the run. A verification *query* failure is always fatal: it means
//! the store cannot be trusted, not that it drifted.

use holomush_types::error::StoreError;
use sqlx::{Connection, PgConnection, Row};
use std::time::Duration;

/// One seeded world object.
#[derive(Debug)]
pub struct SeedObject {
    /// Stable lookup key, unique across the seed set.
    pub key: &'static str,
    /// Object kind: `room`, `player`, `exit`, or `thing`.
    pub kind: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Long description.
    pub description: &'static str,
    /// Initial attributes, inserted once and not verified afterwards.
    pub attributes: &'static [(&'static str, &'static str)],
}

const SEED_KINDS: &[&str] = &["room", "player", "exit", "thing"];

/// The world objects every fresh game starts with.
pub const WORLD_SEEDS: &[SeedObject] = &[
    SeedObject {
        key: "room:limbo",
        kind: "room",
        name: "Limbo",
        description: "A featureless void. New arrivals drift here until the \
                      world takes shape around them.",
        attributes: &[("flags", "floating")],
    },
    SeedObject {
        key: "player:wizard",
        kind: "player",
        name: "Wizard",
        description: "The first player, keeper of the game.",
        attributes: &[("flags", "wizard"), ("home", "room:limbo")],
    },
];

/// How far the seeding run got.
#[derive(Debug, PartialEq, Eq)]
pub enum SeedOutcome {
    /// At least one object was inserted; the rest verified clean.
    Applied(usize),
    /// Everything was already present and matched.
    Verified,
    /// Everything was present; listed fields drifted but strict mode was off.
    VerifiedWithWarnings(Vec<String>),
}

/// Options for one seeding run.
#[derive(Debug, Clone)]
pub struct SeedOptions {
    /// Fail on attribute drift instead of warning.
    pub strict: bool,
    /// Overall deadline for the run.
    pub timeout: Duration,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            strict: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Applies and verifies the embedded seed set over its own connection.
pub struct Seeder {
    conn: PgConnection,
}

impl Seeder {
    /// Connects the seeder to the target database.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let conn = PgConnection::connect(database_url)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Runs the idempotent seed under `opts.timeout`.
    pub async fn apply(&mut self, opts: &SeedOptions) -> Result<SeedOutcome, StoreError> {
        match tokio::time::timeout(opts.timeout, self.apply_inner(opts)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Seed(format!(
                "timed out after {:?}",
                opts.timeout
            ))),
        }
    }

    async fn apply_inner(&mut self, opts: &SeedOptions) -> Result<SeedOutcome, StoreError> {
        let mut inserted = 0usize;
        let mut drifted: Vec<String> = Vec::new();

        for seed in WORLD_SEEDS {
            let existing = sqlx::query(
                "SELECT kind, name, description FROM objects WHERE key = $1",
            )
            .bind(seed.key)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(|e| StoreError::SeedVerify(format!("{}: {e}", seed.key)))?;

            match existing {
                None => {
                    self.insert(seed).await?;
                    inserted += 1;
                }
                Some(row) => {
                    for (field, expected) in [
                        ("kind", seed.kind),
                        ("name", seed.name),
                        ("description", seed.description),
                    ] {
                        let found: String = row
                            .try_get(field)
                            .map_err(|e| StoreError::SeedVerify(format!("{}: {e}", seed.key)))?;
                        if found != expected {
                            let detail = format!(
                                "{}.{field}: expected {expected:?}, found {found:?}",
                                seed.key
                            );
                            tracing::warn!(seed = seed.key, field, "seeded attribute drifted");
                            drifted.push(detail);
                        }
                    }
                }
            }
        }

        if !drifted.is_empty() && opts.strict {
            return Err(StoreError::SeedMismatch(drifted.join("; ")));
        }
        if inserted > 0 {
            tracing::info!(inserted, "world seed applied");
            return Ok(SeedOutcome::Applied(inserted));
        }
        if drifted.is_empty() {
            Ok(SeedOutcome::Verified)
        } else {
            Ok(SeedOutcome::VerifiedWithWarnings(drifted))
        }
    }

    async fn insert(&mut self, seed: &SeedObject) -> Result<(), StoreError> {
        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| StoreError::Seed(e.to_string()))?;

        let object_id: i64 = sqlx::query(
            "INSERT INTO objects (key, kind, name, description)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(seed.key)
        .bind(seed.kind)
        .bind(seed.name)
        .bind(seed.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::Seed(format!("{}: {e}", seed.key)))?
        .try_get("id")
        .map_err(|e| StoreError::Seed(format!("{}: {e}", seed.key)))?;

        for (name, value) in seed.attributes.iter().copied() {
            sqlx::query(
                "INSERT INTO object_attributes (object_id, name, value) VALUES ($1, $2, $3)",
            )
            .bind(object_id)
            .bind(name)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Seed(format!("{}.{name}: {e}", seed.key)))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Seed(e.to_string()))
    }

    /// Releases the seeder's connection.
    pub async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }
}

/// Structurally validates the embedded seed set without touching any
/// database. Returns every problem found.
pub fn validate_seeds() -> Result<(), Vec<String>> {
    let mut problems = Vec::new();
    let mut seen_keys = std::collections::BTreeSet::new();

    for seed in WORLD_SEEDS {
        if seed.key.is_empty() {
            problems.push("seed with empty key".to_string());
        }
        if !seen_keys.insert(seed.key) {
            problems.push(format!("duplicate seed key {:?}", seed.key));
        }
        if !SEED_KINDS.contains(&seed.kind) {
            problems.push(format!("{}: unknown kind {:?}", seed.key, seed.kind));
        }
        if seed.name.is_empty() {
            problems.push(format!("{}: empty name", seed.key));
        }
        let mut seen_attrs = std::collections::BTreeSet::new();
        for (name, _) in seed.attributes {
            if name.is_empty() {
                problems.push(format!("{}: attribute with empty name", seed.key));
            }
            if !seen_attrs.insert(*name) {
                problems.push(format!("{}: duplicate attribute {:?}", seed.key, name));
            }
        }
        // Attribute references to other seeds must resolve inside the set.
        for (name, value) in seed.attributes {
            if *name == "home" && !WORLD_SEEDS.iter().any(|s| s.key == *value) {
                problems.push(format!("{}: home {:?} is not a seeded object", seed.key, value));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_seeds_are_structurally_valid() {
        if let Err(problems) = validate_seeds() {
            panic!("invalid seed set: {problems:?}");
        }
    }

    #[test]
    fn seed_keys_are_namespaced_by_kind() {
        for seed in WORLD_SEEDS {
            let prefix = format!("{}:", seed.kind);
            assert!(
                seed.key.starts_with(&prefix),
                "{} does not start with {prefix}",
                seed.key
            );
        }
    }

    #[test]
    fn default_options_are_strict() {
        assert!(SeedOptions::default().strict);
    }
}
