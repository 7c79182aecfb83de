//! docsynth CLI - cited documentation from a product website
//!
//! Command implementations live in [`commands`]; this module parses
//! arguments, sets up logging and configuration, and dispatches.
use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
pub mod error;
mod output;
mod utils;

use crate::cli::{Cli, Commands};
use crate::utils::{initialize_logging, load_config};

/// Execute the docsynth CLI with the current process arguments.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the command fails.
pub async fn run() -> Result<()> {
    // Convert Broken pipe panics into a clean exit
    std::panic::set_hook(Box::new(|info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe") || msg.contains("broken pipe") {
            std::process::exit(0);
        }
        eprintln!("{msg}");
    }));

    let cli = Cli::parse();
    initialize_logging(&cli)?;
    execute_command(cli).await
}

async fn execute_command(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    config.http.allow_private_hosts = cli.allow_private_hosts;
    match cli.command {
        Commands::Generate {
            url,
            user_id,
            dry_run,
            format,
        } => {
            commands::generate::execute(config, &url, user_id.as_deref(), dry_run, format.resolve())
                .await
        },
        Commands::Estimate { url, format } => {
            commands::estimate::execute(&config, &url, format.resolve()).await
        },
        Commands::Discover { url, format } => {
            commands::discover::execute(&config, &url, format.resolve()).await
        },
        Commands::Research {
            product,
            url,
            format,
        } => commands::research::execute(&config, &product, &url, format.resolve()).await,
    }
}
