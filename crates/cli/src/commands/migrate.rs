// Path: crates/cli/src/commands/migrate.rs

//! `holomush migrate`: schema operations against `DATABASE_URL`.

use clap::Subcommand;
use holomush_store::Migrator;
use holomush_types::error::{StartupError, StoreError};

#[derive(Subcommand, Debug)]
pub enum MigrateCommands {
    /// Apply all pending migrations; already-at-latest is a success.
    Up,
    /// Roll back one step, or everything with `--all`.
    Down {
        /// Roll back every applied migration instead of one step.
        #[clap(long)]
        all: bool,
    },
    /// Show the stored version, the dirty flag, and pending migrations.
    Status,
    /// Print the stored version.
    Version,
    /// Overwrite the stored version and clear the dirty flag. Recovery only.
    Force {
        /// The version to record; must name a known migration, or 0.
        version: u64,
    },
}

pub async fn run(command: MigrateCommands) -> Result<(), StartupError> {
    super::init_logging("text")?;
    let database_url = super::database_url()?;

    let mut migrator = Migrator::connect(&database_url).await?;
    let outcome = dispatch(&mut migrator, command).await;
    if let Err(e) = migrator.close().await {
        tracing::warn!(error = %e, "failed to close migration connection");
    }
    outcome.map_err(Into::into)
}

async fn dispatch(migrator: &mut Migrator, command: MigrateCommands) -> Result<(), StoreError> {
    match command {
        MigrateCommands::Up => {
            let applied = migrator.up().await?;
            if applied.is_empty() {
                println!("already at latest version");
            } else {
                for name in applied {
                    println!("applied {name}");
                }
            }
            Ok(())
        }
        MigrateCommands::Down { all } => {
            let mut any = false;
            loop {
                match migrator.down().await? {
                    Some(name) => {
                        println!("rolled back {name}");
                        any = true;
                    }
                    None => break,
                }
                if !all {
                    break;
                }
            }
            if !any {
                println!("nothing to roll back");
            }
            Ok(())
        }
        MigrateCommands::Status => {
            let (version, dirty) = migrator.version().await?;
            println!("version: {version}");
            println!("dirty:   {dirty}");
            let pending = migrator.up_dry_run().await?;
            if pending.is_empty() {
                println!("pending: none");
            } else {
                println!("pending: {}", pending.join(", "));
            }
            Ok(())
        }
        MigrateCommands::Version => {
            let (version, dirty) = migrator.version().await?;
            if dirty {
                println!("{version} (dirty)");
            } else {
                println!("{version}");
            }
            Ok(())
        }
        MigrateCommands::Force { version } => {
            migrator.force(version).await?;
            println!("forced version to {version}");
            Ok(())
        }
    }
}
