// Path: crates/types/src/error/mod.rs

//! Core error types for the HoloMUSH control plane.
//!
//! Every error that can cross a process boundary carries a stable,
//! machine-readable code via [`ErrorCode`]. The codes are part of the
//! operator contract: scripts match on them, so variants may be added but
//! existing codes must never change meaning.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors produced while validating process configuration.
///
/// All configuration problems share one boundary code (`CONFIG_INVALID`)
/// because the remedy is always the same: fix the invocation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A recognized option carried an unusable value.
    #[error("invalid value for `{option}`: {reason}")]
    Invalid {
        /// The option name as spelled on the command line.
        option: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// A required environment variable was absent or empty.
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } | Self::MissingEnv(_) => "CONFIG_INVALID",
        }
    }
}

/// Errors from the identity and TLS bootstrap.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The certs directory could not be created or inspected.
    #[error("certs directory {path}: {source}")]
    CertsDir {
        /// The offending directory path.
        path: String,
        /// The underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// An expected PEM file exists but the set could not be loaded.
    ///
    /// Existing files are authoritative: this is never recovered by
    /// regeneration. The operator must clear the directory to start over.
    #[error("failed to load TLS material: {0}")]
    TlsLoad(String),
    /// The CA certificate exists but no game id could be derived from it.
    #[error("failed to extract game id from CA certificate: {0}")]
    GameIdExtract(String),
}

impl ErrorCode for IdentityError {
    fn code(&self) -> &'static str {
        match self {
            Self::CertsDir { .. } => "CERTS_DIR_FAILED",
            Self::TlsLoad(_) => "TLS_LOAD_FAILED",
            Self::GameIdExtract(_) => "GAME_ID_EXTRACT_FAILED",
        }
    }
}

/// Errors from the event store and the schema migration driver.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database was unreachable.
    #[error("failed to connect to database: {0}")]
    Connect(String),
    /// The connection pool could not be constructed.
    #[error("failed to create database pool: {0}")]
    Pool(String),
    /// The migration driver could not be constructed.
    #[error("failed to initialize migration driver: {0}")]
    MigrationInit(String),
    /// Startup auto-migration failed; the core must not proceed.
    #[error("automatic migration at startup failed: {0}")]
    AutoMigration(String),
    /// A migration script failed to apply or roll back.
    #[error("migration {name} failed: {reason}")]
    Migration {
        /// The versioned name of the failing migration.
        name: String,
        /// The database error text.
        reason: String,
    },
    /// The stored schema version could not be read.
    #[error("failed to read schema version: {0}")]
    VersionCheck(String),
    /// A `force` target did not name a known migration version.
    #[error("{0} is not a valid migration version")]
    InvalidVersion(u64),
    /// The schema is marked dirty from an interrupted migration.
    ///
    /// No migration proceeds until the operator runs `migrate force`.
    #[error("schema version {0} is dirty; run `migrate force` to recover")]
    Dirty(u64),
    /// Applying the world seed failed.
    #[error("seed failed: {0}")]
    Seed(String),
    /// The post-seed verification query itself failed (not a mismatch).
    #[error("seed verification failed: {0}")]
    SeedVerify(String),
    /// A previously seeded attribute no longer matches its definition.
    #[error("seeded attributes diverged: {0}")]
    SeedMismatch(String),
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "DB_CONNECT_FAILED",
            Self::Pool(_) => "DB_POOL_FAILED",
            Self::MigrationInit(_) => "MIGRATION_INIT_FAILED",
            Self::AutoMigration(_) => "AUTO_MIGRATION_FAILED",
            Self::Migration { .. } | Self::Dirty(_) => "MIGRATION_FAILED",
            Self::VersionCheck(_) => "MIGRATION_VERSION_CHECK_FAILED",
            Self::InvalidVersion(_) => "INVALID_VERSION",
            Self::Seed(_) => "SEED_FAILED",
            Self::SeedVerify(_) => "SEED_VERIFY_FAILED",
            Self::SeedMismatch(_) => "SEED_MISMATCH",
        }
    }
}

/// Errors from the embedded control RPC server.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The control server's TLS configuration could not be built.
    #[error("control server TLS setup failed: {0}")]
    Tls(String),
    /// The control service could not be constructed.
    #[error("failed to create control server: {0}")]
    Create(String),
    /// The control listener failed to bind or serve.
    #[error("failed to start control server on {addr}: {reason}")]
    Start {
        /// The configured control listen address.
        addr: String,
        /// The bind or serve error text.
        reason: String,
    },
}

impl ErrorCode for ControlError {
    fn code(&self) -> &'static str {
        match self {
            Self::Tls(_) => "CONTROL_TLS_FAILED",
            Self::Create(_) => "CONTROL_SERVER_CREATE_FAILED",
            Self::Start { .. } => "CONTROL_SERVER_START_FAILED",
        }
    }
}

/// Errors raised while bringing up a process's listeners and clients.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A primary service listener failed to bind.
    #[error("failed to listen on {addr}: {reason}")]
    Listen {
        /// The configured listen address.
        addr: String,
        /// The bind error text.
        reason: String,
    },
    /// The observability HTTP endpoint failed to start.
    #[error("failed to start observability endpoint on {addr}: {reason}")]
    ObservabilityStart {
        /// The configured metrics address.
        addr: String,
        /// The bind error text.
        reason: String,
    },
    /// The gateway's RPC client to the core could not be created.
    #[error("failed to create core RPC client for {addr}: {reason}")]
    GrpcClientCreate {
        /// The configured core address.
        addr: String,
        /// The connection or TLS error text.
        reason: String,
    },
}

impl ErrorCode for RuntimeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Listen { .. } => "LISTEN_FAILED",
            Self::ObservabilityStart { .. } => "OBSERVABILITY_START_FAILED",
            Self::GrpcClientCreate { .. } => "GRPC_CLIENT_CREATE_FAILED",
        }
    }
}

/// The aggregate error surfaced by a subcommand's startup path.
///
/// Exactly one of these reaches the process boundary: the subcommand prints
/// a single human-readable line plus the stable code and exits non-zero.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// TLS identity bootstrap failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),
    /// Database or migration work failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The control RPC server failed.
    #[error(transparent)]
    Control(#[from] ControlError),
    /// A listener, client, or endpoint failed to come up.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ErrorCode for StartupError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.code(),
            Self::Identity(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Control(e) => e.code(),
            Self::Runtime(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            ConfigError::MissingEnv("DATABASE_URL").code(),
            "CONFIG_INVALID"
        );
        assert_eq!(
            IdentityError::TlsLoad("bad pem".into()).code(),
            "TLS_LOAD_FAILED"
        );
        assert_eq!(
            IdentityError::GameIdExtract("no cn".into()).code(),
            "GAME_ID_EXTRACT_FAILED"
        );
        assert_eq!(StoreError::InvalidVersion(99).code(), "INVALID_VERSION");
        assert_eq!(StoreError::Dirty(3).code(), "MIGRATION_FAILED");
        assert_eq!(
            StoreError::SeedMismatch("name".into()).code(),
            "SEED_MISMATCH"
        );
        assert_eq!(
            ControlError::Start {
                addr: "127.0.0.1:9001".into(),
                reason: "in use".into()
            }
            .code(),
            "CONTROL_SERVER_START_FAILED"
        );
        assert_eq!(
            RuntimeError::ObservabilityStart {
                addr: "127.0.0.1:9100".into(),
                reason: "in use".into()
            }
            .code(),
            "OBSERVABILITY_START_FAILED"
        );
    }

    #[test]
    fn startup_error_forwards_inner_code() {
        let e = StartupError::from(StoreError::Connect("refused".into()));
        assert_eq!(e.code(), "DB_CONNECT_FAILED");
        assert!(e.to_string().contains("refused"));
    }
}
