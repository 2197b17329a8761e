// Path: crates/control/src/supervise.rs

//! Supervision primitives shared by both processes.
//!
//! Every background subsystem exposes a single-slot error channel. A
//! monitor task per subsystem folds those channels into the one
//! process-wide cancel: a real error cancels everything, a closed channel
//! is a graceful exit and cancels nothing. Exactly one cancel, whether
//! from a signal, a remote shutdown, a panic, or a monitor, triggers the
//! whole orderly-shutdown sequence; repeats are harmless.

use holomush_types::Component;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Installs handlers for interrupt and termination signals.
///
/// Either signal trips the process-wide cancel. The task lives for the
/// whole process; it never needs to be joined.
pub fn install_signal_handlers(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interrupt = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                result = interrupt => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "failed to install SIGINT handler");
                        return;
                    }
                    tracing::info!(signal = "interrupt", "shutdown signal received");
                }
                _ = term.recv() => {
                    tracing::info!(signal = "terminate", "shutdown signal received");
                }
                _ = cancel.cancelled() => return,
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = interrupt => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "failed to install SIGINT handler");
                        return;
                    }
                    tracing::info!(signal = "interrupt", "shutdown signal received");
                }
                _ = cancel.cancelled() => return,
            }
        }

        cancel.cancel();
    })
}

/// Spawns the monitor for one subsystem's error channel.
///
/// - A received error: log it, count it, cancel the process, exit.
/// - Channel closed (the subsystem finished cleanly): exit, do not cancel.
/// - Process cancelled elsewhere: exit.
pub fn spawn_monitor(
    name: &'static str,
    mut error_rx: mpsc::Receiver<anyhow::Error>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            received = error_rx.recv() => {
                match received {
                    Some(error) => {
                        tracing::error!(
                            subsystem = name,
                            error = %error,
                            "background subsystem failed, shutting down"
                        );
                        holomush_telemetry::error_metrics().inc_error("subsystem", name);
                        cancel.cancel();
                    }
                    None => {
                        tracing::debug!(subsystem = name, "subsystem exited cleanly");
                    }
                }
            }
            _ = cancel.cancelled() => {}
        }
    })
}

/// A component's pid file under the per-user state directory.
///
/// Written at startup so operators and wrapper scripts can find the
/// process; removed when the value drops at the end of the run.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes `<state dir>/<component>.pid` containing this process's id.
    pub fn write(component: Component) -> std::io::Result<Self> {
        Self::write_at(&holomush_types::paths::state_dir(), component)
    }

    fn write_at(dir: &Path, component: Component) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.pid", component.name()));
        std::fs::write(&path, format!("{}\n", std::process::id()))?;
        Ok(Self { path })
    }

    /// Where the pid was written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
