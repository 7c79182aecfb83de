//! Output format selection.
//!
//! Text is for people and uses colour; JSON is a single pretty-printed
//! object on stdout for scripts.

use anyhow::Result;
use clap::{Args, ValueEnum};
use is_terminal::IsTerminal;
use serde::Serialize;

/// Output formats supported by every command
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Shared clap argument for the `--format` flag.
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct FormatArg {
    /// Output format
    #[arg(short = 'f', long = "format", value_enum, env = "DOCSYNTH_OUTPUT_FORMAT")]
    pub format: Option<OutputFormat>,
}

impl FormatArg {
    /// The explicit format, else text on a terminal and JSON when piped.
    #[must_use]
    pub fn resolve(&self) -> OutputFormat {
        self.format.unwrap_or_else(|| {
            if std::io::stdout().is_terminal() {
                OutputFormat::Text
            } else {
                OutputFormat::Json
            }
        })
    }
}

/// Write `value` to stdout as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_format_wins() {
        let arg = FormatArg {
            format: Some(OutputFormat::Text),
        };
        assert_eq!(arg.resolve(), OutputFormat::Text);
        let arg = FormatArg {
            format: Some(OutputFormat::Json),
        };
        assert_eq!(arg.resolve(), OutputFormat::Json);
    }
}
