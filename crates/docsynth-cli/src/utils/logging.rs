//! Logging initialization and configuration.
//!
//! This module handles setting up the tracing subscriber and color control
//! based on CLI flags and environment variables.

use anyhow::Result;
use colored::control as color_control;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::Cli;
use crate::output::OutputFormat;

/// Log level for the given global flags and output format.
///
/// Machine-readable output keeps stderr to errors unless verbose/debug was
/// explicitly requested.
pub const fn log_level(verbose: bool, debug: bool, quiet: bool, format: OutputFormat) -> Level {
    if verbose || debug {
        Level::DEBUG
    } else if quiet || matches!(format, OutputFormat::Json) {
        Level::ERROR
    } else {
        Level::WARN
    }
}

/// Initialize the logging subsystem based on CLI flags.
///
/// # Errors
///
/// Returns an error if the global tracing subscriber cannot be set.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let format = cli.command.format().resolve();
    let level = log_level(cli.verbose, cli.debug, cli.quiet, format);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Color control: disable when NO_COLOR is set or when emitting machine output
    let env_no_color = std::env::var_os("NO_COLOR").is_some();
    if env_no_color || matches!(format, OutputFormat::Json) {
        color_control::set_override(false);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(false, false, false, OutputFormat::Text), Level::WARN);
        assert_eq!(log_level(true, false, false, OutputFormat::Text), Level::DEBUG);
        assert_eq!(log_level(false, true, false, OutputFormat::Json), Level::DEBUG);
        assert_eq!(log_level(false, false, true, OutputFormat::Text), Level::ERROR);
        assert_eq!(log_level(false, false, false, OutputFormat::Json), Level::ERROR);
    }
}
