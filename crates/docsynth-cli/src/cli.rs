//! # CLI Structure and Argument Parsing
//!
//! `docsynth` is a command-subcommand CLI built with `clap` derive macros.
//!
//! ```bash
//! # Full run: crawl, research, synthesize and persist
//! docsynth generate https://hono.dev
//!
//! # Synthesize without writing anything to the data directory
//! docsynth generate https://hono.dev --dry-run --format json
//!
//! # Price a site without synthesizing
//! docsynth estimate https://hono.dev
//!
//! # Debugging aids
//! docsynth discover https://hono.dev
//! docsynth research Hono --url https://hono.dev
//! ```
//!
//! Every command accepts `--format text|json`. When stdout is not a
//! terminal and no format is given, JSON is emitted.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::FormatArg;

/// Main CLI structure for the `docsynth` command
#[derive(Parser, Clone, Debug)]
#[command(name = "docsynth")]
#[command(version)]
#[command(about = "Generate cited documentation from a product website", long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Read configuration from this TOML file instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only print errors
    #[arg(short = 'q', long, global = true, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Let loopback and private hosts through the URL guard (local mock servers only)
    #[arg(long, global = true, hide = true)]
    pub allow_private_hosts: bool,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Crawl, research and synthesize documentation for a site
    Generate {
        /// Product homepage or documentation root
        url: String,

        /// Owner recorded with the stored document
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,

        /// Run the full pipeline but keep the document in memory
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        format: FormatArg,
    },

    /// Quote the cost of documenting a site
    Estimate {
        /// Product homepage
        url: String,

        #[command(flatten)]
        format: FormatArg,
    },

    /// Show what discovery finds on a site
    Discover {
        /// Product homepage
        url: String,

        #[command(flatten)]
        format: FormatArg,
    },

    /// Query the research providers for a product
    Research {
        /// Product name to search for
        product: String,

        /// Product homepage, used to scope site search
        #[arg(long)]
        url: String,

        #[command(flatten)]
        format: FormatArg,
    },
}

impl Commands {
    /// Format flag of the selected command.
    pub const fn format(&self) -> &FormatArg {
        match self {
            Self::Generate { format, .. }
            | Self::Estimate { format, .. }
            | Self::Discover { format, .. }
            | Self::Research { format, .. } => format,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate_flags() {
        let cli = Cli::try_parse_from([
            "docsynth",
            "generate",
            "https://acme.io",
            "--user-id",
            "u-1",
            "--dry-run",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                url,
                user_id,
                dry_run,
                format,
            } => {
                assert_eq!(url, "https://acme.io");
                assert_eq!(user_id.as_deref(), Some("u-1"));
                assert!(dry_run);
                assert_eq!(format.format, Some(OutputFormat::Json));
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "docsynth",
            "research",
            "Acme",
            "--url",
            "https://acme.io",
            "--verbose",
            "--config",
            "/tmp/docsynth.toml",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/docsynth.toml")));
    }

    #[test]
    fn test_private_host_override_is_hidden_and_off_by_default() {
        let cli = Cli::try_parse_from(["docsynth", "estimate", "https://acme.io"]).unwrap();
        assert!(!cli.allow_private_hosts);

        let help = Cli::command().render_long_help().to_string();
        assert!(!help.contains("allow-private-hosts"));
    }

    #[test]
    fn test_research_requires_url() {
        assert!(Cli::try_parse_from(["docsynth", "research", "Acme"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(
            Cli::try_parse_from(["docsynth", "-q", "-v", "estimate", "https://acme.io"]).is_err()
        );
    }
}
