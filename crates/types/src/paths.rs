// Path: crates/types/src/paths.rs

//! Resolution of the per-user directories used by every subcommand.
//!
//! The XDG base-directory variables are honored through the `dirs` crate;
//! each falls back to the standard location under the user's home.

use std::path::PathBuf;

const APP_DIR: &str = "holomush";

/// The directory holding the CA and leaf certificates.
///
/// `<config dir>/holomush/certs`, e.g. `~/.config/holomush/certs`.
pub fn certs_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("certs")
}

/// The persistent data directory, used when `--data-dir` is not given.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// The mutable state directory (logs, pid files).
pub fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_paths_end_in_app_dir() {
        assert!(certs_dir().ends_with("holomush/certs"));
        assert!(data_dir().ends_with("holomush"));
        assert!(state_dir().ends_with("holomush"));
    }
}
