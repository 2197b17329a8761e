// Path: crates/cli/src/commands/seed.rs

//! `holomush seed`: apply the idempotent world seed.

use clap::Args;
use holomush_store::seed::{SeedOptions, Seeder};
use holomush_store::SeedOutcome;
use holomush_types::error::StartupError;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Overall deadline for the run, e.g. "30s" or "2m".
    #[clap(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Downgrade seeded-attribute drift from an error to warnings.
    #[clap(long)]
    no_strict: bool,
}

pub async fn run(args: SeedArgs) -> Result<(), StartupError> {
    super::init_logging("text")?;
    let database_url = super::database_url()?;

    let mut opts = SeedOptions {
        strict: !args.no_strict,
        ..SeedOptions::default()
    };
    if let Some(timeout) = args.timeout {
        opts.timeout = timeout;
    }

    let mut seeder = Seeder::connect(&database_url).await?;
    let outcome = seeder.apply(&opts).await;
    if let Err(e) = seeder.close().await {
        tracing::warn!(error = %e, "failed to close seed connection");
    }

    match outcome? {
        SeedOutcome::Applied(count) => println!("seed applied ({count} objects inserted)"),
        SeedOutcome::Verified => println!("seed already present and matching"),
        SeedOutcome::VerifiedWithWarnings(drifted) => {
            for field in &drifted {
                eprintln!("warning: {field}");
            }
            println!("seed present with {} drifted field(s)", drifted.len());
        }
    }
    Ok(())
}
