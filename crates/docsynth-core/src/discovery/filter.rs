//! URL heuristics shared by discovery, sitemap resolution and extraction.
//!
//! A URL is "doc-like" when its host or one of its path segments names a
//! documentation concept (docs, help, guide, api, faq, changelog, ...). The
//! check is a pure function of the URL: no state, no I/O, no errors.
//!
//! ```rust
//! use docsynth_core::discovery::filter::{is_doc_like, normalize_url};
//!
//! assert!(is_doc_like("https://example.com/docs/getting-started"));
//! assert!(is_doc_like("https://help.example.com/"));
//! assert!(is_doc_like("https://example.com/api-reference/users"));
//! assert!(!is_doc_like("https://example.com/blog/launch"));
//! assert!(!is_doc_like("https://example.com/docs/logo.png"));
//!
//! assert_eq!(
//!     normalize_url("https://WWW.Example.com/Docs/?utm_source=x#intro").as_deref(),
//!     Some("example.com/Docs"),
//! );
//! ```

use url::Url;

/// Path keywords matched against whole segments or their `-`/`_` separated words.
const DOC_PATH_KEYWORDS: &[&str] = &[
    "docs",
    "documentation",
    "help",
    "support",
    "guide",
    "guides",
    "tutorial",
    "tutorials",
    "api",
    "apis",
    "reference",
    "faq",
    "faqs",
    "changelog",
    "kb",
    "knowledgebase",
    "learn",
    "manual",
    "handbook",
    "quickstart",
    "developer",
    "developers",
    "sdk",
    "sdks",
    "howto",
    "troubleshooting",
];

/// Multi-word path segments matched whole.
const DOC_PATH_PHRASES: &[&str] = &[
    "getting-started",
    "get-started",
    "quick-start",
    "knowledge-base",
    "how-to",
    "release-notes",
    "help-center",
];

/// First host labels that mark a documentation host.
const DOC_HOST_LABELS: &[&str] = &[
    "docs",
    "doc",
    "help",
    "support",
    "developer",
    "developers",
    "dev",
    "api",
    "kb",
    "learn",
    "guide",
    "guides",
    "manual",
    "wiki",
];

/// Path segments that disqualify a URL regardless of keywords.
const EXCLUDED_SEGMENTS: &[&str] = &[
    "blog",
    "login",
    "signin",
    "sign-in",
    "signup",
    "sign-up",
    "register",
    "cart",
    "checkout",
    "careers",
    "jobs",
    "privacy",
    "terms",
    "legal",
    "cdn-cgi",
    "wp-admin",
    "wp-content",
    "_next",
    "_nuxt",
    "assets",
    "static",
];

/// File extensions that indicate non-documentation content.
const NON_DOC_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".bmp", ".css", ".js", ".mjs",
    ".woff", ".woff2", ".ttf", ".eot", ".pdf", ".zip", ".tar", ".gz", ".mp3", ".mp4", ".webm",
    ".json", ".xml", ".yaml", ".yml", ".map", ".txt",
];

/// Query parameters dropped during normalization.
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "mc_cid", "mc_eid", "ref"];

/// Check whether a URL is plausibly documentation-relevant.
///
/// Returns `false` for unparseable or non-http(s) URLs, static assets and
/// excluded sections (blog, auth, legal, build output).
#[must_use]
pub fn is_doc_like(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let path = parsed.path().to_ascii_lowercase();
    if NON_DOC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| EXCLUDED_SEGMENTS.contains(s)) {
        return false;
    }

    if parsed
        .host_str()
        .and_then(|h| h.split('.').next())
        .is_some_and(|label| DOC_HOST_LABELS.contains(&label.to_ascii_lowercase().as_str()))
    {
        return true;
    }

    segments.iter().any(|segment| segment_is_doc_like(segment))
}

fn segment_is_doc_like(segment: &str) -> bool {
    let stem = segment
        .rsplit_once('.')
        .filter(|(_, ext)| matches!(*ext, "html" | "htm" | "md" | "mdx" | "php" | "aspx"))
        .map_or(segment, |(stem, _)| stem);

    if DOC_PATH_PHRASES.contains(&stem) || DOC_PATH_KEYWORDS.contains(&stem) {
        return true;
    }

    stem.split(['-', '_'])
        .any(|word| DOC_PATH_KEYWORDS.contains(&word))
}

/// Strip a leading `www.` and lowercase a host.
#[must_use]
pub fn site_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host.strip_prefix("www.").map_or(host.clone(), ToString::to_string)
}

/// Whether `url` is on `domain` or one of its subdomains.
///
/// `domain` should already be passed through [`site_domain`].
#[must_use]
pub fn is_same_site(url: &str, domain: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(site_domain))
        .is_some_and(|host| host == domain || host.ends_with(&format!(".{domain}")))
}

/// Produce a comparison key for deduplicating URLs.
///
/// The key ignores scheme, `www.`, fragments, trailing slashes and tracking
/// parameters (`utm_*`, `gclid`, ...). Returns `None` for unparseable or
/// non-http(s) URLs.
#[must_use]
pub fn normalize_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = site_domain(parsed.host_str()?);
    let mut key = host;
    if let Some(port) = parsed.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }

    let path = parsed.path().trim_end_matches('/');
    key.push_str(path);

    let query: Vec<String> = parsed
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| {
            if v.is_empty() {
                k.into_owned()
            } else {
                format!("{k}={v}")
            }
        })
        .collect();
    if !query.is_empty() {
        key.push('?');
        key.push_str(&query.join("&"));
    }

    Some(key)
}

/// Strip the fragment from a URL for storage and display.
#[must_use]
pub fn strip_fragment(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_fragment(None);
    clean.to_string()
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

    #[test]
    fn test_doc_paths() {
        assert!(is_doc_like("https://example.com/docs"));
        assert!(is_doc_like("https://example.com/docs/getting-started"));
        assert!(is_doc_like("https://example.com/help/billing"));
        assert!(is_doc_like("https://example.com/support"));
        assert!(is_doc_like("https://example.com/guides/intro"));
        assert!(is_doc_like("https://example.com/tutorial/step-1"));
        assert!(is_doc_like("https://example.com/faq"));
        assert!(is_doc_like("https://example.com/changelog"));
        assert!(is_doc_like("https://example.com/kb/article-42"));
        assert!(is_doc_like("https://example.com/getting-started"));
    }

    #[test]
    fn test_compound_segments() {
        assert!(is_doc_like("https://example.com/api-reference"));
        assert!(is_doc_like("https://example.com/developer_guide"));
        assert!(is_doc_like("https://example.com/help-center/articles"));
        assert!(is_doc_like("https://example.com/en/docs/intro.html"));
    }

    #[test]
    fn test_doc_hosts() {
        assert!(is_doc_like("https://docs.example.com/"));
        assert!(is_doc_like("https://help.example.com/articles/1"));
        assert!(is_doc_like("https://developer.example.com"));
        assert!(!is_doc_like("https://www.example.com/"));
    }

    #[test]
    fn test_non_doc_paths() {
        assert!(!is_doc_like("https://example.com/"));
        assert!(!is_doc_like("https://example.com/pricing"));
        assert!(!is_doc_like("https://example.com/about"));
        assert!(!is_doc_like("https://example.com/blog/api-launch"));
        assert!(!is_doc_like("https://example.com/login?next=/docs"));
    }

    #[test]
    fn test_word_boundaries() {
        assert!(!is_doc_like("https://example.com/doc-builder/x"));
        assert!(!is_doc_like("https://example.com/documentary"));
        assert!(!is_doc_like("https://example.com/guidance-system"));
        assert!(!is_doc_like("https://example.com/rapid/prototype"));
    }

    #[test]
    fn test_static_assets_excluded() {
        assert!(!is_doc_like("https://example.com/docs/logo.png"));
        assert!(!is_doc_like("https://example.com/api/schema.json"));
        assert!(!is_doc_like("https://docs.example.com/sitemap.xml"));
        assert!(!is_doc_like("https://example.com/_next/static/docs.js"));
    }

    #[test]
    fn test_non_http_rejected() {
        assert!(!is_doc_like("mailto:docs@example.com"));
        assert!(!is_doc_like("ftp://example.com/docs"));
        assert!(!is_doc_like("not a url"));
        assert!(!is_doc_like(""));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(is_doc_like("https://example.com/DOCS/Intro"));
        assert!(is_doc_like("https://DOCS.example.com/"));
    }

    #[test]
    fn test_site_domain_and_same_site() {
        assert_eq!(site_domain("WWW.Example.com"), "example.com");
        assert!(is_same_site("https://docs.example.com/a", "example.com"));
        assert!(is_same_site("https://www.example.com/a", "example.com"));
        assert!(!is_same_site("https://example.com.evil.com/a", "example.com"));
        assert!(!is_same_site("https://notexample.com/a", "example.com"));
        assert!(!is_same_site("garbage", "example.com"));
    }

    #[test]
    fn test_normalize_url_equivalences() {
        let a = normalize_url("https://www.example.com/docs/").unwrap();
        let b = normalize_url("http://example.com/docs#section").unwrap();
        let c = normalize_url("https://example.com/docs?utm_source=twitter&utm_medium=x").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_normalize_url_keeps_meaningful_query() {
        let key = normalize_url("https://example.com/search?q=rust&utm_campaign=a").unwrap();
        assert_eq!(key, "example.com/search?q=rust");
        assert_ne!(
            normalize_url("https://example.com/a?page=1"),
            normalize_url("https://example.com/a?page=2")
        );
    }

    #[test]
    fn test_normalize_url_rejects_non_http() {
        assert!(normalize_url("javascript:alert(1)").is_none());
        assert!(normalize_url("/relative").is_none());
    }
}
