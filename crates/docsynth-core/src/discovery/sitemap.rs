//! Sitemap resolution for documentation discovery.
//!
//! Sitemaps are scanned with a `<loc>` pattern rather than a full XML
//! parser: a malformed document simply yields no matches. Fetch failures are
//! swallowed per root so the resolver never fails a run.
//!
//! ## Sitemap Formats
//!
//! - **Standard sitemap**: `<urlset>` with `<url><loc>` entries
//! - **Sitemap index**: `<sitemapindex>` whose `<loc>` entries point at child
//!   sitemaps; up to [`MAX_CHILD_SITEMAPS`] children are followed one level
//!   deep

use crate::Result;
use crate::discovery::filter::{is_doc_like, is_same_site, normalize_url, site_domain};
use crate::fetcher::Fetcher;
use crate::soft::soft_fail;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, instrument};
use url::Url;

/// Sitemap locations probed under every root.
pub const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];

/// Maximum number of child sitemaps fetched from an index.
pub const MAX_CHILD_SITEMAPS: usize = 5;

#[allow(clippy::unwrap_used)]
static LOC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: Pattern is a compile-time constant
    Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").unwrap()
});

#[allow(clippy::unwrap_used)]
static INDEX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: Pattern is a compile-time constant
    Regex::new(r"(?i)<sitemapindex[\s>]").unwrap()
});

/// Extract every `<loc>` value from sitemap XML.
///
/// Entities (`&amp;`, `&lt;`, ...) and `CDATA` wrappers are decoded.
/// Malformed input yields an empty list.
///
/// ```rust
/// use docsynth_core::discovery::sitemap::extract_locs;
///
/// let xml = "<urlset><url><loc>https://example.com/docs?a=1&amp;b=2</loc></url></urlset>";
/// assert_eq!(extract_locs(xml), vec!["https://example.com/docs?a=1&b=2"]);
/// assert!(extract_locs("<not xml").is_empty());
/// ```
#[must_use]
pub fn extract_locs(xml: &str) -> Vec<String> {
    LOC_PATTERN
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            let raw = m.as_str();
            let raw = raw
                .strip_prefix("<![CDATA[")
                .and_then(|s| s.strip_suffix("]]>"))
                .unwrap_or(raw);
            html_escape::decode_html_entities(raw.trim()).into_owned()
        })
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Check if XML content is a sitemap index rather than a URL set.
#[must_use]
pub fn is_sitemap_index(xml: &str) -> bool {
    INDEX_PATTERN.is_match(xml)
}

/// Fetch one sitemap and return its raw `<loc>` entries.
///
/// If the document is a sitemap index, up to [`MAX_CHILD_SITEMAPS`] child
/// sitemaps are fetched (one level only) and their entries are returned
/// instead. Child failures are soft.
///
/// # Errors
///
/// Returns an error if the top-level sitemap cannot be fetched.
#[instrument(skip(fetcher))]
pub async fn fetch_sitemap_locs(fetcher: &Fetcher, sitemap_url: &str) -> Result<Vec<String>> {
    let page = fetcher.get_quick(sitemap_url).await?;
    let locs = extract_locs(&page.body);

    if !is_sitemap_index(&page.body) {
        debug!(count = locs.len(), "Parsed sitemap");
        return Ok(locs);
    }

    let children: Vec<String> = locs.into_iter().take(MAX_CHILD_SITEMAPS).collect();
    debug!(children = children.len(), "Following sitemap index");

    let mut entries = Vec::new();
    for child in &children {
        let child_locs: Vec<String> = soft_fail("sitemap child", async {
            let page = fetcher.get_quick(child).await?;
            // Nested indexes are not followed further
            if is_sitemap_index(&page.body) {
                return Ok(Vec::new());
            }
            Ok(extract_locs(&page.body))
        })
        .await;
        entries.extend(child_locs);
    }
    Ok(entries)
}

/// Resolve documentation URLs from the sitemaps of `root` and `alternates`.
///
/// For each root, `/sitemap.xml` and `/sitemap_index.xml` are tried. Entries
/// are kept only if they are doc-like and on the base site (or one of its
/// subdomains). The result is deduplicated by normalized URL and capped at
/// `cap` entries.
#[instrument(skip(fetcher, alternates), fields(alternates = alternates.len()))]
pub async fn resolve_sitemaps(
    fetcher: &Fetcher,
    root: &str,
    alternates: &[String],
    cap: usize,
) -> Vec<String> {
    let Some(domain) = Url::parse(root)
        .ok()
        .and_then(|u| u.host_str().map(site_domain))
    else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    'roots: for base in std::iter::once(root).chain(alternates.iter().map(String::as_str)) {
        let Some(origin) = origin_of(base) else {
            continue;
        };
        for path in SITEMAP_PATHS {
            let sitemap_url = format!("{origin}{path}");
            let locs: Vec<String> =
                soft_fail("sitemap", fetch_sitemap_locs(fetcher, &sitemap_url)).await;

            for loc in locs {
                if urls.len() >= cap {
                    break 'roots;
                }
                if !is_doc_like(&loc) || !is_same_site(&loc, &domain) {
                    continue;
                }
                if let Some(key) = normalize_url(&loc) {
                    if seen.insert(key) {
                        urls.push(loc);
                    }
                }
            }
        }
    }

    debug!(count = urls.len(), "Resolved sitemap URLs");
    urls
}

/// Scheme, host and port of a URL without a trailing slash.
pub(crate) fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
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
    use std::fmt::Write as _;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::with_timeout(Duration::from_secs(5), UrlGuard::AllowPrivate).unwrap()
    }

    fn urlset(locs: &[String]) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
        );
        for loc in locs {
            let _ = write!(xml, "<url><loc>{loc}</loc></url>");
        }
        xml.push_str("</urlset>");
        xml
    }

    #[test]
    fn test_extract_locs_basic() {
        let xml = r"
            <urlset>
              <url><loc>https://example.com/docs</loc><lastmod>2024-01-01</lastmod></url>
              <url><loc>
                  https://example.com/help
              </loc></url>
            </urlset>";
        assert_eq!(
            extract_locs(xml),
            vec!["https://example.com/docs", "https://example.com/help"]
        );
    }

    #[test]
    fn test_extract_locs_cdata_and_case() {
        let xml = "<urlset><url><LOC><![CDATA[https://example.com/docs/a]]></LOC></url></urlset>";
        assert_eq!(extract_locs(xml), vec!["https://example.com/docs/a"]);
    }

    #[test]
    fn test_extract_locs_malformed_is_empty() {
        assert!(extract_locs("").is_empty());
        assert!(extract_locs("<urlset><url><loc>unterminated").is_empty());
        assert!(extract_locs("<html><body>Not a sitemap</body></html>").is_empty());
    }

    #[test]
    fn test_is_sitemap_index() {
        assert!(is_sitemap_index(
            r#"<?xml version="1.0"?><sitemapindex xmlns="x"><sitemap><loc>a</loc></sitemap></sitemapindex>"#
        ));
        assert!(!is_sitemap_index("<urlset></urlset>"));
    }

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://docs.example.com/a/b?c").as_deref(),
            Some("https://docs.example.com")
        );
        assert_eq!(
            origin_of("http://127.0.0.1:8080/").as_deref(),
            Some("http://127.0.0.1:8080")
        );
        assert!(origin_of("garbage").is_none());
    }

    #[tokio::test]
    async fn test_resolve_filters_to_docs_and_site() {
        let server = MockServer::start().await;
        let base = server.uri();
        let body = urlset(&[
            format!("{base}/docs/intro"),
            format!("{base}/docs/intro/"),
            format!("{base}/pricing"),
            "https://other.org/docs/x".to_string(),
            format!("{base}/help/faq"),
        ]);
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let urls = resolve_sitemaps(&fetcher(), &base, &[], 200).await;
        assert_eq!(
            urls,
            vec![format!("{base}/docs/intro"), format!("{base}/help/faq")]
        );
    }

    #[tokio::test]
    async fn test_resolve_follows_index_children() {
        let server = MockServer::start().await;
        let base = server.uri();
        let index = format!(
            "<sitemapindex><sitemap><loc>{base}/sitemap-docs.xml</loc></sitemap></sitemapindex>"
        );
        Mock::given(method("GET"))
            .and(path("/sitemap_index.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap-docs.xml"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(urlset(&[format!("{base}/guides/a")])),
            )
            .mount(&server)
            .await;

        let urls = resolve_sitemaps(&fetcher(), &base, &[], 200).await;
        assert_eq!(urls, vec![format!("{base}/guides/a")]);
    }

    #[tokio::test]
    async fn test_resolve_caps_results() {
        let server = MockServer::start().await;
        let base = server.uri();
        let locs: Vec<String> = (0..300).map(|i| format!("{base}/docs/page-{i}")).collect();
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&locs)))
            .mount(&server)
            .await;

        let urls = resolve_sitemaps(&fetcher(), &base, &[], 200).await;
        assert_eq!(urls.len(), 200);
        assert_eq!(urls[0], format!("{base}/docs/page-0"));
    }

    #[tokio::test]
    async fn test_resolve_swallows_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let urls = resolve_sitemaps(&fetcher(), &server.uri(), &[], 200).await;
        assert!(urls.is_empty());

        // Unreachable roots are skipped as well
        let urls = resolve_sitemaps(&fetcher(), "http://127.0.0.1:9", &[], 200).await;
        assert!(urls.is_empty());
    }
}
