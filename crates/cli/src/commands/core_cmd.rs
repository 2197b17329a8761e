// Path: crates/cli/src/commands/core_cmd.rs

//! `holomush core`: run the game core process.

use clap::Args;
use holomush_core::CoreDeps;
use holomush_types::config::{parse_auto_migrate, CoreConfig, DB_AUTO_MIGRATE_ENV};
use holomush_types::error::StartupError;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct CoreArgs {
    /// Listen address of the primary game service RPC (mTLS).
    #[clap(long, default_value = "localhost:9000")]
    grpc_addr: String,

    /// Listen address of the control RPC.
    #[clap(long, default_value = "127.0.0.1:9001")]
    control_addr: String,

    /// Listen address of the observability HTTP endpoint; empty disables it.
    #[clap(long, default_value = "127.0.0.1:9100")]
    metrics_addr: String,

    /// Persistent data directory; defaults to the XDG data dir.
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// Override the game id derived from (or generated into) the CA.
    #[clap(long)]
    game_id: Option<String>,

    /// Log output format: "json" or "text".
    #[clap(long, default_value = "json")]
    log_format: String,
}

pub async fn run(args: CoreArgs) -> Result<(), StartupError> {
    let log_format = super::init_logging(&args.log_format)?;
    if let Err(e) = holomush_telemetry::prometheus::install() {
        tracing::warn!(error = %e, "metrics collectors already registered");
    }

    let auto_migrate_env = std::env::var(DB_AUTO_MIGRATE_ENV).ok();
    let config = CoreConfig {
        grpc_addr: args.grpc_addr,
        control_addr: args.control_addr,
        metrics_addr: args.metrics_addr,
        data_dir: args.data_dir,
        game_id: args.game_id,
        log_format,
        database_url: super::database_url()?,
        db_auto_migrate: parse_auto_migrate(auto_migrate_env.as_deref()),
    };

    let cancel = CancellationToken::new();
    holomush_core::run(config, CoreDeps::default(), cancel).await
}
