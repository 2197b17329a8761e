// Path: crates/types/src/config/mod.rs

//! Shared configuration structures for the core and gateway processes.
//!
//! Validation is fail-fast: every run function calls `validate()` before any
//! side effect, and every rejection carries the `CONFIG_INVALID` code.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Once;

/// Environment variable carrying the database connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Environment variable toggling automatic migration at core startup.
pub const DB_AUTO_MIGRATE_ENV: &str = "HOLOMUSH_DB_AUTO_MIGRATE";

/// Selects the global log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON lines, one event per line.
    #[default]
    Json,
    /// Human-oriented text output.
    Text,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(ConfigError::Invalid {
                option: "log-format",
                reason: format!("expected \"json\" or \"text\", got {other:?}"),
            }),
        }
    }
}

/// Configuration for the core process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Listen address of the primary game service RPC (mTLS).
    pub grpc_addr: String,
    /// Listen address of the control RPC.
    pub control_addr: String,
    /// Listen address of the observability HTTP endpoint; empty disables it.
    pub metrics_addr: String,
    /// Persistent data directory. `None` resolves to the XDG data dir.
    pub data_dir: Option<PathBuf>,
    /// Overrides the game id derived from (or generated into) the CA.
    pub game_id: Option<String>,
    /// Global log output format.
    pub log_format: LogFormat,
    /// Database connection string, from `DATABASE_URL`.
    pub database_url: String,
    /// Whether `migrate up` runs automatically before any listener binds.
    pub db_auto_migrate: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            grpc_addr: "localhost:9000".to_string(),
            control_addr: "127.0.0.1:9001".to_string(),
            metrics_addr: "127.0.0.1:9100".to_string(),
            data_dir: None,
            game_id: None,
            log_format: LogFormat::default(),
            database_url: String::new(),
            db_auto_migrate: true,
        }
    }
}

impl CoreConfig {
    /// Validates the configuration for semantic correctness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("grpc-addr", &self.grpc_addr)?;
        require_non_empty("control-addr", &self.control_addr)?;
        if self.database_url.is_empty() {
            return Err(ConfigError::MissingEnv(DATABASE_URL_ENV));
        }
        Ok(())
    }
}

/// Configuration for the gateway process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listen address for inbound telnet connections.
    pub telnet_addr: String,
    /// Address of the core's primary game service RPC.
    pub core_addr: String,
    /// Listen address of the control RPC.
    pub control_addr: String,
    /// Listen address of the observability HTTP endpoint; empty disables it.
    pub metrics_addr: String,
    /// Global log output format.
    pub log_format: LogFormat,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            telnet_addr: "127.0.0.1:4201".to_string(),
            core_addr: "localhost:9000".to_string(),
            control_addr: "127.0.0.1:9002".to_string(),
            metrics_addr: "127.0.0.1:9101".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl GatewayConfig {
    /// Validates the configuration for semantic correctness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("telnet-addr", &self.telnet_addr)?;
        require_non_empty("core-addr", &self.core_addr)?;
        require_non_empty("control-addr", &self.control_addr)?;
        Ok(())
    }
}

fn require_non_empty(option: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid {
            option,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

static AUTO_MIGRATE_WARNING: Once = Once::new();

/// Parses the `HOLOMUSH_DB_AUTO_MIGRATE` toggle.
///
/// Recognized, case-insensitive: `true`/`1` enable, `false`/`0` disable.
/// Absent or empty means the default (enabled). Any other value warns once
/// per process and falls back to enabled.
pub fn parse_auto_migrate(value: Option<&str>) -> bool {
    let Some(raw) = value else { return true };
    if raw.is_empty() {
        return true;
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => true,
        "false" | "0" => false,
        other => {
            let other = other.to_string();
            AUTO_MIGRATE_WARNING.call_once(|| {
                tracing::warn!(
                    value = %other,
                    "unrecognized {} value, defaulting to enabled",
                    DB_AUTO_MIGRATE_ENV
                );
            });
            true
        }
    }
}

/// Serializes an auto-migrate flag to its canonical environment value.
pub fn serialize_auto_migrate(enabled: bool) -> &'static str {
    if enabled {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn auto_migrate_recognized_values() {
        for v in ["true", "TRUE", "True", "1"] {
            assert!(parse_auto_migrate(Some(v)), "{v} should enable");
        }
        for v in ["false", "FALSE", "False", "0"] {
            assert!(!parse_auto_migrate(Some(v)), "{v} should disable");
        }
    }

    #[test]
    fn auto_migrate_defaults_to_enabled() {
        assert!(parse_auto_migrate(None));
        assert!(parse_auto_migrate(Some("")));
        assert!(parse_auto_migrate(Some("maybe")));
    }

    #[test]
    fn auto_migrate_round_trips() {
        for b in [true, false] {
            assert_eq!(parse_auto_migrate(Some(serialize_auto_migrate(b))), b);
        }
    }

    #[test]
    fn core_config_rejects_empty_addresses() {
        let mut cfg = CoreConfig {
            database_url: "postgres://localhost/holomush".into(),
            ..CoreConfig::default()
        };
        assert!(cfg.validate().is_ok());

        cfg.grpc_addr.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("grpc-addr"));
    }

    #[test]
    fn core_config_requires_database_url() {
        let cfg = CoreConfig::default();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(DATABASE_URL_ENV)));
    }

    #[test]
    fn gateway_config_rejects_empty_addresses() {
        let mut cfg = GatewayConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.core_addr.clear();
        assert!(cfg.validate().is_err());
    }
}
