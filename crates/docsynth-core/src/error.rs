//! Error types and handling for docsynth-core operations.
//!
//! This module provides a single error type covering every failure in the
//! documentation synthesis pipeline. Errors are categorized for logging and
//! carry a recoverability hint so callers can tell a flaky upstream from a
//! permanent misconfiguration.
//!
//! ## Error Categories
//!
//! - **Transport**: HTTP requests, non-2xx responses, timeouts
//! - **Parse**: malformed HTML, XML or JSON
//! - **Configuration**: invalid settings, missing credentials
//! - **Guard**: URLs rejected by the SSRF guard before any network call
//! - **Terminal**: synthesis stage failures that abort a run
//!
//! ## Degrade vs. Abort
//!
//! Most errors never reach the user. Discovery, sitemap resolution and
//! research wrap their calls in [`soft_fail`](crate::soft::soft_fail), which
//! logs the error and continues with an empty contribution. Only
//! [`Error::Synthesis`], [`Error::BlockedUrl`] and [`Error::Storage`] surface
//! from a pipeline run.
//!
//! ```rust
//! use docsynth_core::Error;
//!
//! let err = Error::Synthesis {
//!     stage: "writing".to_string(),
//!     reason: "model returned invalid JSON after 2 repair attempts".to_string(),
//! };
//! assert_eq!(err.category(), "synthesis");
//! assert!(!err.is_recoverable());
//! ```

use thiserror::Error;

/// The main error type for docsynth-core operations.
///
/// All public functions in docsynth-core return `Result<T, Error>`.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers reading configuration files and writing persisted documents.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Connection failures, DNS errors, TLS errors and client-side timeouts.
    /// The underlying `reqwest::Error` is preserved.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Http {
        /// URL that was requested.
        url: String,
        /// Status code returned by the server.
        status: u16,
    },

    /// Parsing operation failed.
    ///
    /// Malformed HTML, XML or JSON content.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A provider credential is not configured.
    ///
    /// Research providers treat this as "no results" rather than failing.
    #[error("Missing credential for {provider}")]
    MissingCredential {
        /// Provider that needs the credential.
        provider: String,
    },

    /// URL is malformed or uses an unsupported scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL was rejected by the SSRF guard.
    ///
    /// Raised before any network call for loopback, link-local, private and
    /// cloud metadata hosts.
    #[error("Blocked URL '{url}': {reason}")]
    BlockedUrl {
        /// The rejected URL.
        url: String,
        /// Why the guard rejected it.
        reason: String,
    },

    /// Operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A synthesis stage failed terminally.
    ///
    /// Produced on a non-2xx response from the generative-text service or
    /// when the JSON repair budget is exhausted. Aborts the run.
    #[error("Synthesis failed during {stage} stage: {reason}")]
    Synthesis {
        /// Name of the stage that failed.
        stage: String,
        /// Human-readable failure description.
        reason: String,
    },

    /// Document persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl Error {
    /// Check if the error might succeed on a later attempt.
    ///
    /// Timeouts, connection failures, 429 and 5xx responses are transient.
    /// Everything else (bad input, missing credentials, guard rejections,
    /// exhausted repair budgets) is permanent.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Whether this error is an expected miss rather than a fault.
    ///
    /// Used by the soft-fail combinator to log probes of absent pages at
    /// debug level instead of warning.
    #[must_use]
    pub const fn is_expected_miss(&self) -> bool {
        matches!(
            self,
            Self::Http {
                status: 404 | 410,
                ..
            }
        )
    }

    /// Get the error category as a stable string identifier.
    ///
    /// Used as a structured logging field and by the CLI to pick an exit code.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) | Self::Http { .. } => "network",
            Self::Parse(_) => "parse",
            Self::Serialization(_) => "serialization",
            Self::Config(_) | Self::MissingCredential { .. } => "config",
            Self::InvalidUrl(_) => "invalid_url",
            Self::BlockedUrl { .. } => "blocked_url",
            Self::Timeout(_) => "timeout",
            Self::Synthesis { .. } => "synthesis",
            Self::Storage(_) => "storage",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unwrap_used,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io;

    #[test]
    fn test_error_display_formatting() {
        let err = Error::Http {
            url: "https://example.com/docs".to_string(),
            status: 503,
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://example.com/docs");

        let err = Error::BlockedUrl {
            url: "http://127.0.0.1/".to_string(),
            reason: "loopback address".to_string(),
        };
        assert!(err.to_string().contains("127.0.0.1"));
        assert!(err.to_string().contains("loopback"));

        let err = Error::Synthesis {
            stage: "metadata".to_string(),
            reason: "HTTP 500".to_string(),
        };
        assert!(err.to_string().contains("metadata stage"));

        let err = Error::Other("plain".to_string());
        assert_eq!(err.to_string(), "plain");
    }

    #[test]
    fn test_error_categories() {
        let cases = vec![
            (Error::Parse("x".into()), "parse"),
            (Error::Config("x".into()), "config"),
            (
                Error::MissingCredential {
                    provider: "serper".into(),
                },
                "config",
            ),
            (Error::InvalidUrl("x".into()), "invalid_url"),
            (
                Error::BlockedUrl {
                    url: "x".into(),
                    reason: "y".into(),
                },
                "blocked_url",
            ),
            (Error::Timeout("x".into()), "timeout"),
            (Error::Storage("x".into()), "storage"),
            (
                Error::Http {
                    url: "x".into(),
                    status: 404,
                },
                "network",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.category(), expected, "category of {error}");
        }
    }

    #[test]
    fn test_error_recoverability() {
        assert!(Error::Timeout("slow".into()).is_recoverable());
        assert!(
            Error::Http {
                url: "x".into(),
                status: 503
            }
            .is_recoverable()
        );
        assert!(
            Error::Http {
                url: "x".into(),
                status: 429
            }
            .is_recoverable()
        );
        assert!(
            !Error::Http {
                url: "x".into(),
                status: 404
            }
            .is_recoverable()
        );
        assert!(Error::Io(io::Error::new(io::ErrorKind::TimedOut, "t")).is_recoverable());
        assert!(!Error::Io(io::Error::new(io::ErrorKind::NotFound, "n")).is_recoverable());
        assert!(
            !Error::Synthesis {
                stage: "writing".into(),
                reason: "exhausted".into()
            }
            .is_recoverable()
        );
    }

    #[test]
    fn test_expected_misses() {
        assert!(
            Error::Http {
                url: "x".into(),
                status: 404
            }
            .is_expected_miss()
        );
        // Unconfigured providers are worth a warning
        assert!(
            !Error::MissingCredential {
                provider: "youtube".into()
            }
            .is_expected_miss()
        );
        assert!(!Error::Timeout("t".into()).is_expected_miss());
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_from_url_parse() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = parse_err.into();
        assert_eq!(err.category(), "invalid_url");
    }

    proptest! {
        #[test]
        fn test_parse_error_with_arbitrary_messages(msg in r".{0,500}") {
            let error = Error::Parse(msg.clone());
            let display = error.to_string();
            prop_assert!(display.contains("Parse error"));
            prop_assert!(display.contains(&msg));
        }
    }
}
