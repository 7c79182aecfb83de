use crate::Result;
use crate::config::CrawlConfig;
use crate::discovery::filter::{is_doc_like, normalize_url};
use crate::discovery::links::{UNKNOWN_PRODUCT, parse_homepage};
use crate::discovery::probe::{probe_doc_paths, probe_subdomains};
use crate::discovery::sitemap::{origin_of, resolve_sitemaps};
use crate::fetcher::Fetcher;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

/// Candidate documentation pages for one site.
///
/// Produced once per run and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStructure {
    /// Product name from the homepage, or [`UNKNOWN_PRODUCT`]
    pub product_name: String,
    /// The URL discovery started from
    pub base_url: String,
    /// Documentation subdomains that answered a probe
    #[serde(default)]
    pub subdomains: Vec<String>,
    /// Common documentation paths that exist
    pub valid_doc_paths: Vec<String>,
    /// Links found in navigation landmarks
    pub nav_links: Vec<String>,
    /// Same-host homepage links
    pub all_internal_links: Vec<String>,
    /// Doc-like sitemap entries
    pub sitemap_urls: Vec<String>,
}

impl SiteStructure {
    /// Structure for a site whose homepage could not be fetched.
    #[must_use]
    pub fn degraded(base_url: impl Into<String>) -> Self {
        Self {
            product_name: UNKNOWN_PRODUCT.to_string(),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Whether discovery found nothing to crawl.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subdomains.is_empty()
            && self.valid_doc_paths.is_empty()
            && self.nav_links.is_empty()
            && self.all_internal_links.is_empty()
            && self.sitemap_urls.is_empty()
    }

    /// Ordered, deduplicated, doc-like candidate URLs for extraction.
    ///
    /// Sources are merged in priority order: probed doc paths, navigation
    /// links, sitemap entries, then the remaining internal links.
    #[must_use]
    pub fn candidate_urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.valid_doc_paths
            .iter()
            .chain(&self.nav_links)
            .chain(&self.sitemap_urls)
            .chain(&self.all_internal_links)
            .filter(|url| is_doc_like(url))
            .filter(|url| normalize_url(url).is_some_and(|key| seen.insert(key)))
            .cloned()
            .collect()
    }
}

/// Resolve a base URL into a [`SiteStructure`].
///
/// Every step after the homepage fetch is soft: a failing probe or sitemap
/// contributes nothing. If the homepage itself cannot be fetched, a
/// [degraded](SiteStructure::degraded) structure is returned.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`](crate::Error::InvalidUrl) or
/// [`Error::BlockedUrl`](crate::Error::BlockedUrl) if `base_url` fails the
/// fetcher's URL guard. Nothing is fetched in that case.
#[instrument(skip_all, fields(url = %base_url))]
pub async fn discover_site(
    fetcher: &Fetcher,
    base_url: &str,
    crawl: &CrawlConfig,
) -> Result<SiteStructure> {
    let base = fetcher.guard().check(base_url)?;
    let base_str = base.to_string();

    let homepage = match fetcher.get_page(&base_str).await {
        Ok(page) => page,
        Err(e) => {
            warn!(error = %e, "Homepage fetch failed; continuing with an empty site structure");
            return Ok(SiteStructure::degraded(base_str));
        },
    };

    // Links resolve against the post-redirect URL
    let page_url = url::Url::parse(&homepage.url).unwrap_or_else(|_| base.clone());
    let links = parse_homepage(&homepage.body, &page_url, crawl.internal_link_cap());

    let subdomains = probe_subdomains(fetcher, &base, crawl.probe_concurrency).await;

    let mut roots: Vec<String> = origin_of(&base_str).into_iter().collect();
    roots.extend(subdomains.iter().cloned());

    let (doc_paths, sitemap_urls) = tokio::join!(
        probe_doc_paths(fetcher, &roots, crawl.probe_concurrency),
        resolve_sitemaps(fetcher, &base_str, &subdomains, crawl.sitemap_url_cap()),
    );

    let structure = SiteStructure {
        product_name: links
            .product_name
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
        base_url: base_str,
        valid_doc_paths: subdomains.iter().cloned().chain(doc_paths).collect(),
        subdomains,
        nav_links: links.nav_links,
        all_internal_links: links.internal_links,
        sitemap_urls,
    };

    info!(
        product = %structure.product_name,
        doc_paths = structure.valid_doc_paths.len(),
        nav_links = structure.nav_links.len(),
        internal_links = structure.all_internal_links.len(),
        sitemap_urls = structure.sitemap_urls.len(),
        "Site discovery complete"
    );
    Ok(structure)
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
    use crate::Error;
    use crate::url_guard::UrlGuard;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(guard: UrlGuard) -> Fetcher {
        Fetcher::with_timeout(Duration::from_secs(5), guard).unwrap()
    }

    #[test]
    fn test_candidate_urls_merge_order_and_dedup() {
        let site = SiteStructure {
            product_name: "Acme".into(),
            base_url: "https://acme.io/".into(),
            subdomains: vec![],
            valid_doc_paths: vec!["https://acme.io/docs".into()],
            nav_links: vec![
                "https://acme.io/docs/".into(),
                "https://acme.io/pricing".into(),
                "https://acme.io/guides".into(),
            ],
            all_internal_links: vec![
                "https://acme.io/help".into(),
                "https://acme.io/about".into(),
            ],
            sitemap_urls: vec!["https://acme.io/api/users".into()],
        };
        assert_eq!(
            site.candidate_urls(),
            vec![
                "https://acme.io/docs",
                "https://acme.io/guides",
                "https://acme.io/api/users",
                "https://acme.io/help",
            ]
        );
    }

    #[test]
    fn test_degraded_structure() {
        let site = SiteStructure::degraded("https://acme.io/");
        assert_eq!(site.product_name, UNKNOWN_PRODUCT);
        assert!(site.is_empty());
        assert!(site.candidate_urls().is_empty());
    }

    #[tokio::test]
    async fn test_discover_site_homepage_failure_degrades() {
        let site = discover_site(
            &fetcher(UrlGuard::AllowPrivate),
            "http://127.0.0.1:9/",
            &CrawlConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(site.product_name, "Unknown Product");
        assert!(site.is_empty());
    }

    #[tokio::test]
    async fn test_discover_site_blocked_url() {
        let err = discover_site(
            &fetcher(UrlGuard::PublicOnly),
            "http://169.254.169.254/",
            &CrawlConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::BlockedUrl { .. }));
    }

    #[tokio::test]
    async fn test_discover_site_collects_all_sources() {
        let server = MockServer::start().await;
        let base = server.uri();
        let homepage = format!(
            r#"<html><head><title>Acme | Home</title></head><body>
                <nav><a href="/guides">Guides</a></nav>
                <a href="/about">About</a>
                <a href="{base}/help">Help</a>
            </body></html>"#
        );
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(homepage),
            )
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/docs"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<urlset><url><loc>{base}/docs/intro</loc></url><url><loc>{base}/team</loc></url></urlset>"
            )))
            .mount(&server)
            .await;

        let site = discover_site(
            &fetcher(UrlGuard::AllowPrivate),
            &base,
            &CrawlConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(site.product_name, "Acme");
        assert!(site.subdomains.is_empty());
        assert_eq!(site.valid_doc_paths, vec![format!("{base}/docs")]);
        assert_eq!(site.nav_links, vec![format!("{base}/guides")]);
        assert_eq!(site.all_internal_links.len(), 3);
        assert_eq!(site.sitemap_urls, vec![format!("{base}/docs/intro")]);
        assert_eq!(
            site.candidate_urls(),
            vec![
                format!("{base}/docs"),
                format!("{base}/guides"),
                format!("{base}/docs/intro"),
                format!("{base}/help"),
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_site_caps_hold_above_configured_limits() {
        let server = MockServer::start().await;
        let base = server.uri();
        let anchors: String = (0..300)
            .map(|i| format!("<a href=\"/page-{i}\">Page {i}</a>"))
            .collect();
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(format!("<html><body>{anchors}</body></html>")),
            )
            .mount(&server)
            .await;
        let locs: String = (0..300)
            .map(|i| format!("<url><loc>{base}/docs/{i}</loc></url>"))
            .collect();
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("<urlset>{locs}</urlset>")))
            .mount(&server)
            .await;

        let crawl = CrawlConfig {
            max_internal_links: 5000,
            max_sitemap_urls: 5000,
            ..CrawlConfig::default()
        };
        let site = discover_site(&fetcher(UrlGuard::AllowPrivate), &base, &crawl)
            .await
            .unwrap();

        assert_eq!(site.all_internal_links.len(), 200);
        assert_eq!(site.sitemap_urls.len(), 200);
    }
}
