//! CLI error handling with semantic exit codes.
//!
//! | Code | Category | Description |
//! |------|----------|-------------|
//! | 0 | Success | Command completed successfully |
//! | 1 | `Internal` | Unexpected/internal error |
//! | 2 | `Usage` | Invalid arguments, configuration, or a blocked URL |
//! | 5 | `Network` | Network or fetch failure |
//! | 6 | `Timeout` | Operation timed out |
//! | 8 | `Synthesis` | A synthesis stage failed terminally |
//!
//! ```bash
//! docsynth generate https://acme.io
//! case $? in
//!     0) echo "stored" ;;
//!     8) echo "synthesis failed, nothing was stored" ;;
//!     *) echo "other error" ;;
//! esac
//! ```

use std::fmt;
use std::process::ExitCode;

use docsynth_core::Error as CoreError;

/// Semantic error category determining the exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Unexpected or internal error (exit code 1).
    Internal = 1,

    /// Invalid arguments or configuration (exit code 2).
    ///
    /// Also used for URLs the SSRF guard rejects and for missing
    /// generative-text credentials.
    Usage = 2,

    /// Network or fetch failure (exit code 5).
    Network = 5,

    /// Operation timed out (exit code 6).
    Timeout = 6,

    /// A synthesis stage failed after its repair budget (exit code 8).
    Synthesis = 8,
}

impl ErrorCategory {
    /// Get the exit code for this category.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        self as u8
    }

    /// Create an `ExitCode` from this category.
    #[must_use]
    pub fn as_exit_code(self) -> ExitCode {
        ExitCode::from(self.exit_code())
    }

    /// Get a short description of this error category.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Internal => "internal error",
            Self::Usage => "usage error",
            Self::Network => "network error",
            Self::Timeout => "timeout",
            Self::Synthesis => "synthesis error",
        }
    }

    /// Category for a core library error.
    #[must_use]
    pub fn from_core(err: &CoreError) -> Self {
        match err {
            CoreError::InvalidUrl(_)
            | CoreError::BlockedUrl { .. }
            | CoreError::Config(_)
            | CoreError::MissingCredential { .. } => Self::Usage,
            CoreError::Network(e) if e.is_timeout() => Self::Timeout,
            CoreError::Network(_) | CoreError::Http { .. } => Self::Network,
            CoreError::Timeout(_) => Self::Timeout,
            CoreError::Synthesis { .. } => Self::Synthesis,
            CoreError::Io(_)
            | CoreError::Parse(_)
            | CoreError::Serialization(_)
            | CoreError::Storage(_)
            | CoreError::Other(_) => Self::Internal,
        }
    }

    /// Infer the error category from an error message.
    ///
    /// Fallback for errors that carry neither a [`CliError`] nor a core
    /// error in their chain.
    #[must_use]
    pub fn infer_from_message(msg: &str) -> Self {
        let msg_lower = msg.to_lowercase();

        // Timeout before network so "connection timed out" lands here
        if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
            return Self::Timeout;
        }

        if msg_lower.contains("connection")
            || msg_lower.contains("dns")
            || msg_lower.contains("http")
            || msg_lower.contains("unreachable")
        {
            return Self::Network;
        }

        if msg_lower.contains("invalid argument")
            || msg_lower.contains("invalid url")
            || msg_lower.contains("blocked url")
        {
            return Self::Usage;
        }

        Self::Internal
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A CLI error with a semantic category for exit code mapping.
#[derive(Debug)]
pub struct CliError {
    /// The semantic category of this error.
    pub category: ErrorCategory,
    /// The underlying error with full context.
    pub source: anyhow::Error,
}

impl CliError {
    /// Create a new CLI error with explicit category.
    pub fn new(category: ErrorCategory, source: impl Into<anyhow::Error>) -> Self {
        Self {
            category,
            source: source.into(),
        }
    }

    /// Create a usage error.
    pub fn usage(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCategory::Usage, source)
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.category.exit_code()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Determine the exit code from an `anyhow::Error`.
///
/// An explicit [`CliError`] wins, then the first core error in the chain,
/// then message inference.
#[must_use]
pub fn exit_code_from_error(err: &anyhow::Error) -> u8 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }

    if let Some(core) = err.chain().find_map(|e| e.downcast_ref::<CoreError>()) {
        return ErrorCategory::from_core(core).exit_code();
    }

    ErrorCategory::infer_from_message(&err.to_string()).exit_code()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn test_exit_codes() {
        assert_eq!(ErrorCategory::Internal.exit_code(), 1);
        assert_eq!(ErrorCategory::Usage.exit_code(), 2);
        assert_eq!(ErrorCategory::Network.exit_code(), 5);
        assert_eq!(ErrorCategory::Timeout.exit_code(), 6);
        assert_eq!(ErrorCategory::Synthesis.exit_code(), 8);
    }

    #[test]
    fn test_core_error_categories() {
        let blocked = CoreError::BlockedUrl {
            url: "http://127.0.0.1/".into(),
            reason: "loopback".into(),
        };
        assert_eq!(ErrorCategory::from_core(&blocked), ErrorCategory::Usage);
        assert_eq!(
            ErrorCategory::from_core(&CoreError::Http {
                url: "https://acme.io".into(),
                status: 503
            }),
            ErrorCategory::Network
        );
        assert_eq!(
            ErrorCategory::from_core(&CoreError::Timeout("probe".into())),
            ErrorCategory::Timeout
        );
        assert_eq!(
            ErrorCategory::from_core(&CoreError::Synthesis {
                stage: "writing".into(),
                reason: "repair budget exhausted".into()
            }),
            ErrorCategory::Synthesis
        );
        assert_eq!(
            ErrorCategory::from_core(&CoreError::Storage("disk full".into())),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_core_error_found_through_context() {
        let err = Err::<(), _>(CoreError::Synthesis {
            stage: "metadata".into(),
            reason: "HTTP 500".into(),
        })
        .context("Generation failed")
        .unwrap_err();
        assert_eq!(exit_code_from_error(&err), 8);
    }

    #[test]
    fn test_cli_error_wins() {
        let err: anyhow::Error = CliError::usage(anyhow!("No API key configured")).into();
        assert_eq!(exit_code_from_error(&err), 2);
    }

    #[test]
    fn test_message_inference() {
        assert_eq!(exit_code_from_error(&anyhow!("Operation timed out")), 6);
        assert_eq!(exit_code_from_error(&anyhow!("Connection refused")), 5);
        assert_eq!(exit_code_from_error(&anyhow!("Something went wrong")), 1);
    }

    #[test]
    fn test_display_is_source_message() {
        let err = CliError::usage(anyhow!("bad flag"));
        assert_eq!(err.to_string(), "bad flag");
    }
}
