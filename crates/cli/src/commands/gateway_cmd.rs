// Path: crates/cli/src/commands/gateway_cmd.rs

//! `holomush gateway`: run the connection gateway process.

use clap::Args;
use holomush_gateway::GatewayDeps;
use holomush_types::config::GatewayConfig;
use holomush_types::error::StartupError;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct GatewayArgs {
    /// Listen address for inbound telnet connections.
    #[clap(long, default_value = "127.0.0.1:4201")]
    telnet_addr: String,

    /// Address of the core's primary game service RPC.
    #[clap(long, default_value = "localhost:9000")]
    core_addr: String,

    /// Listen address of the control RPC.
    #[clap(long, default_value = "127.0.0.1:9002")]
    control_addr: String,

    /// Listen address of the observability HTTP endpoint; empty disables it.
    #[clap(long, default_value = "127.0.0.1:9101")]
    metrics_addr: String,

    /// Log output format: "json" or "text".
    #[clap(long, default_value = "json")]
    log_format: String,
}

pub async fn run(args: GatewayArgs) -> Result<(), StartupError> {
    let log_format = super::init_logging(&args.log_format)?;
    if let Err(e) = holomush_telemetry::prometheus::install() {
        tracing::warn!(error = %e, "metrics collectors already registered");
    }

    let config = GatewayConfig {
        telnet_addr: args.telnet_addr,
        core_addr: args.core_addr,
        control_addr: args.control_addr,
        metrics_addr: args.metrics_addr,
        log_format,
    };

    let cancel = CancellationToken::new();
    holomush_gateway::run(config, GatewayDeps::default(), cancel).await
}
