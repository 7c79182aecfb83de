//! Existence probing for common documentation paths and subdomains.
//!
//! Probes use [`Fetcher::exists`] (HEAD, then GET) and run as a bounded
//! fan-out: at most `concurrency` requests are in flight and results come
//! back in input order.

use crate::discovery::filter::site_domain;
use crate::discovery::sitemap::origin_of;
use crate::fetcher::Fetcher;
use futures::stream::{self, StreamExt};
use tracing::{debug, instrument};
use url::{Host, Url};

/// Paths probed under every discovered root.
pub const COMMON_DOC_PATHS: &[&str] = &[
    "/docs",
    "/documentation",
    "/help",
    "/support",
    "/guide",
    "/guides",
    "/tutorials",
    "/api",
    "/api-docs",
    "/reference",
    "/faq",
    "/kb",
    "/knowledge-base",
    "/learn",
    "/getting-started",
    "/quickstart",
    "/changelog",
    "/developers",
    "/developer",
    "/manual",
    "/handbook",
    "/resources",
    "/help-center",
    "/docs/api",
    "/sdk",
];

/// Subdomains probed under the base site.
pub const COMMON_SUBDOMAINS: &[&str] = &[
    "docs",
    "help",
    "support",
    "api",
    "developer",
    "developers",
    "kb",
    "learn",
    "guide",
];

/// Probe every URL and return those that exist, in input order.
///
/// A `concurrency` of zero is treated as one.
pub async fn probe_all(fetcher: &Fetcher, urls: Vec<String>, concurrency: usize) -> Vec<String> {
    let total = urls.len();
    let found: Vec<String> = stream::iter(urls)
        .map(|url| async move { fetcher.exists(&url).await.then_some(url) })
        .buffered(concurrency.max(1))
        .filter_map(|hit| async move { hit })
        .collect()
        .await;
    debug!(probed = total, found = found.len(), "Probe batch finished");
    found
}

/// Probe [`COMMON_DOC_PATHS`] under every root.
#[instrument(skip(fetcher, roots), fields(roots = roots.len()))]
pub async fn probe_doc_paths(fetcher: &Fetcher, roots: &[String], concurrency: usize) -> Vec<String> {
    let urls = roots
        .iter()
        .filter_map(|root| origin_of(root))
        .flat_map(|origin| COMMON_DOC_PATHS.iter().map(move |p| format!("{origin}{p}")))
        .collect();
    probe_all(fetcher, urls, concurrency).await
}

/// Probe [`COMMON_SUBDOMAINS`] of the base site and return the roots that answer.
///
/// IP-literal hosts have no subdomains and yield nothing.
#[instrument(skip_all, fields(base = %base))]
pub async fn probe_subdomains(fetcher: &Fetcher, base: &Url, concurrency: usize) -> Vec<String> {
    let urls = subdomain_roots(base);
    probe_all(fetcher, urls, concurrency).await
}

/// Candidate subdomain roots for `base`, e.g. `https://docs.example.com`.
///
/// When `base` is itself a common doc subdomain, siblings are built from
/// its parent domain and the base's own label is skipped.
#[must_use]
pub fn subdomain_roots(base: &Url) -> Vec<String> {
    let Some(Host::Domain(host)) = base.host() else {
        return Vec::new();
    };
    let domain = site_domain(&host.to_ascii_lowercase());
    let (own_label, parent) = match domain.split_once('.') {
        Some((label, rest)) if COMMON_SUBDOMAINS.contains(&label) && rest.contains('.') => {
            (Some(label), rest)
        },
        _ => (None, domain.as_str()),
    };
    let port = base.port().map(|p| format!(":{p}")).unwrap_or_default();

    COMMON_SUBDOMAINS
        .iter()
        .filter(|sub| Some(**sub) != own_label)
        .map(|sub| format!("{}://{sub}.{parent}{port}", base.scheme()))
        .collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use crate::url_guard::UrlGuard;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::with_timeout(Duration::from_secs(5), UrlGuard::AllowPrivate).unwrap()
    }

    #[test]
    fn test_subdomain_roots() {
        let base = Url::parse("https://www.example.com/").unwrap();
        let roots = subdomain_roots(&base);
        assert_eq!(roots.len(), COMMON_SUBDOMAINS.len());
        assert_eq!(roots[0], "https://docs.example.com");
        assert!(roots.contains(&"https://kb.example.com".to_string()));
    }

    #[test]
    fn test_subdomain_roots_skips_self_and_ips() {
        let base = Url::parse("https://docs.example.com/").unwrap();
        let roots = subdomain_roots(&base);
        assert!(!roots.contains(&"https://docs.docs.example.com".to_string()));
        assert!(!roots.contains(&"https://docs.example.com".to_string()));
        assert!(roots.contains(&"https://help.example.com".to_string()));
        assert_eq!(roots.len(), COMMON_SUBDOMAINS.len() - 1);

        let ip = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert!(subdomain_roots(&ip).is_empty());
    }

    #[test]
    fn test_subdomain_roots_from_nested_doc_host() {
        let base = Url::parse("https://help.acme.co.uk:8443/").unwrap();
        let roots = subdomain_roots(&base);
        assert_eq!(roots[0], "https://docs.acme.co.uk:8443");
        assert!(roots.iter().all(|r| !r.contains("help.")));

        // A bare two-label domain whose first label looks like a subdomain
        let base = Url::parse("https://docs.io/").unwrap();
        assert!(subdomain_roots(&base).contains(&"https://help.docs.io".to_string()));
    }

    #[tokio::test]
    async fn test_probe_all_preserves_order() {
        let server = MockServer::start().await;
        for p in ["/docs", "/help", "/faq"] {
            Mock::given(method("HEAD"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;
        }

        let base = server.uri();
        let urls = vec![
            format!("{base}/faq"),
            format!("{base}/missing"),
            format!("{base}/docs"),
            format!("{base}/help"),
        ];
        let found = probe_all(&fetcher(), urls, 3).await;
        assert_eq!(
            found,
            vec![
                format!("{base}/faq"),
                format!("{base}/docs"),
                format!("{base}/help")
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_all_zero_concurrency() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let found = probe_all(&fetcher(), vec![format!("{}/docs", server.uri())], 0).await;
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_probe_doc_paths() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/docs"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/changelog"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let found = probe_doc_paths(&fetcher(), &[server.uri()], 4).await;
        let base = server.uri();
        assert_eq!(
            found,
            vec![format!("{base}/docs"), format!("{base}/changelog")]
        );
    }
}
