// Path: crates/cli/src/commands/validate_seeds.rs

//! `holomush validate-seeds`: offline validation of the embedded seeds.

use clap::Args;
use holomush_store::seed::WORLD_SEEDS;
use holomush_store::validate_seeds;
use holomush_types::error::{StartupError, StoreError};

#[derive(Args, Debug)]
pub struct ValidateSeedsArgs {}

pub fn run(_args: ValidateSeedsArgs) -> Result<(), StartupError> {
    match validate_seeds() {
        Ok(()) => {
            println!("{} seed(s) valid", WORLD_SEEDS.len());
            Ok(())
        }
        Err(problems) => {
            for problem in &problems {
                eprintln!("invalid seed: {problem}");
            }
            Err(StoreError::Seed(format!("{} invalid seed(s)", problems.len())).into())
        }
    }
}
