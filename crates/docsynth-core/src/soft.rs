//! Degrade-not-abort combinators.
//!
//! Optional external calls (sitemaps, probes, homepage links, research
//! providers) never fail a run. Instead of sprinkling `unwrap_or_default()`
//! and ad hoc logging at every call site, they are wrapped in
//! [`soft_fail`], which logs the error once and yields an empty value.

use crate::Result;
use std::future::Future;
use tracing::{debug, warn};

/// Await `fut`, returning `T::default()` if it fails.
///
/// Expected misses (404s) are logged at debug level; everything else,
/// including unconfigured credentials, is a warning tagged with `label` and
/// the error category.
pub async fn soft_fail<T, F>(label: &str, fut: F) -> T
where
    T: Default,
    F: Future<Output = Result<T>>,
{
    soft_fail_or(label, T::default(), fut).await
}

/// Await `fut`, returning `fallback` if it fails.
pub async fn soft_fail_or<T, F>(label: &str, fallback: T, fut: F) -> T
where
    F: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(value) => value,
        Err(e) if e.is_expected_miss() => {
            debug!(call = label, error = %e, "Optional call yielded nothing");
            fallback
        },
        Err(e) => {
            warn!(call = label, category = e.category(), error = %e, "Optional call failed; continuing without it");
            fallback
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_soft_fail_passes_through_success() {
        let value: Vec<u8> = soft_fail("ok", async { Ok(vec![1, 2, 3]) }).await;
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_soft_fail_defaults_on_error() {
        let value: Vec<String> = soft_fail("broken", async {
            Err(Error::Http {
                url: "https://example.com/sitemap.xml".into(),
                status: 500,
            })
        })
        .await;
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_soft_fail_or_uses_fallback() {
        let value = soft_fail_or("missing key", 7_u32, async {
            Err(Error::MissingCredential {
                provider: "youtube".into(),
            })
        })
        .await;
        assert_eq!(value, 7);
    }
}
