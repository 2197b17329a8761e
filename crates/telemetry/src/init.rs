// Path: crates/telemetry/src/init.rs
use holomush_types::config::LogFormat;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initializes the global `tracing` subscriber.
///
/// Called exactly once per process, before any subsystem starts. The format
/// is the subcommand's `log-format` option; the filter comes from
/// `RUST_LOG` and defaults to `info`.
pub fn init_tracing(format: LogFormat) -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_log::LogTracer::init()?;
    match format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339());
            let subscriber = Registry::default().with(filter).with(fmt_layer);
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Text => {
            let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
            let subscriber = Registry::default().with(filter).with(fmt_layer);
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
