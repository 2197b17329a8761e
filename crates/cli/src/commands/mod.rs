// Path: crates/cli/src/commands/mod.rs

//! One module per subcommand.

pub mod core_cmd;
pub mod gateway_cmd;
pub mod migrate;
pub mod seed;
pub mod status;
pub mod validate_seeds;

use holomush_types::config::{LogFormat, DATABASE_URL_ENV};
use holomush_types::error::{ConfigError, StartupError};

/// Reads `DATABASE_URL`, failing fast with `CONFIG_INVALID` when unset or empty.
pub(crate) fn database_url() -> Result<String, StartupError> {
    match std::env::var(DATABASE_URL_ENV) {
        Ok(url) if !url.is_empty() => Ok(url),
        _ => Err(ConfigError::MissingEnv(DATABASE_URL_ENV).into()),
    }
}

/// Parses `--log-format` and initializes the global logger with it.
pub(crate) fn init_logging(log_format: &str) -> Result<LogFormat, StartupError> {
    let format: LogFormat = log_format.parse().map_err(StartupError::Config)?;
    if let Err(e) = holomush_telemetry::init::init_tracing(format) {
        // A second init in-process (tests) is not fatal.
        tracing::debug!(error = %e, "logger already initialized");
    }
    Ok(format)
}
