//! docsynth CLI - cited documentation from a product website
//!
//! Thin entry point; everything lives in the library so integration tests
//! can reach it.

use std::process::ExitCode;

use colored::Colorize;
use docsynth_cli::error::exit_code_from_error;

#[tokio::main]
async fn main() -> ExitCode {
    match docsynth_cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code_from_error(&err))
        },
    }
}
