// Path: crates/cli/src/main.rs
#![forbid(unsafe_code)]

//! # HoloMUSH CLI
//!
//! The single executable. Long-lived subcommands (`core`, `gateway`) run a
//! server process to orderly shutdown; the rest are short-lived operator
//! tools. Every startup failure prints one human-readable line plus its
//! stable machine-readable code to stderr and exits non-zero.

use clap::{Parser, Subcommand};
use holomush_types::error::{ErrorCode, StartupError};
use std::process::ExitCode;

mod commands;

use commands::*;

#[derive(Parser, Debug)]
#[clap(
    name = "holomush",
    version,
    about = "HoloMUSH, a modern multi-process MUSH platform.",
    long_about = "HoloMUSH runs as two cooperating processes: an authoritative \
                  game core and a user-facing gateway, coordinated over a \
                  mutually-authenticated local control plane."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the game core process.
    Core(core_cmd::CoreArgs),

    /// Run the connection gateway process.
    Gateway(gateway_cmd::GatewayArgs),

    /// Operate on the database schema.
    Migrate {
        #[clap(subcommand)]
        command: migrate::MigrateCommands,
    },

    /// Apply the idempotent world seed and verify existing seed attributes.
    Seed(seed::SeedArgs),

    /// Query the remote status of both processes.
    Status(status::StatusArgs),

    /// Validate the embedded seed definitions offline; no database needed.
    ValidateSeeds(validate_seeds::ValidateSeedsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Core(args) => core_cmd::run(args).await,
        Commands::Gateway(args) => gateway_cmd::run(args).await,
        Commands::Migrate { command } => migrate::run(command).await,
        Commands::Seed(args) => seed::run(args).await,
        Commands::Status(args) => status::run(args).await,
        Commands::ValidateSeeds(args) => validate_seeds::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report(&error);
            ExitCode::FAILURE
        }
    }
}

/// The single stderr line every failed subcommand produces.
fn report(error: &StartupError) {
    eprintln!("error: {error} [{}]", error.code());
}
