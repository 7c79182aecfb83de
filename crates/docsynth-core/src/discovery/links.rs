//! Homepage parsing: product name, internal links and navigation links.
//!
//! Parsing is synchronous. `scraper::Html` is not `Send`, so callers parse
//! after the fetch completes and keep only the owned results across awaits.

use crate::discovery::filter::{is_same_site, normalize_url, site_domain, strip_fragment};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Product name used when the homepage yields none.
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

#[allow(clippy::unwrap_used)]
static TITLE: LazyLock<Selector> = LazyLock::new(|| {
    // SAFETY: Selector is a compile-time constant
    Selector::parse("title").unwrap()
});

#[allow(clippy::unwrap_used)]
static H1: LazyLock<Selector> = LazyLock::new(|| {
    // SAFETY: Selector is a compile-time constant
    Selector::parse("h1").unwrap()
});

#[allow(clippy::unwrap_used)]
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| {
    // SAFETY: Selector is a compile-time constant
    Selector::parse("a[href]").unwrap()
});

#[allow(clippy::unwrap_used)]
static NAV_ANCHOR: LazyLock<Selector> = LazyLock::new(|| {
    // SAFETY: Selector is a compile-time constant
    Selector::parse(
        "nav a[href], header a[href], [role='navigation'] a[href], \
         .nav a[href], .navbar a[href], .menu a[href]",
    )
    .unwrap()
});

/// What discovery needs from the homepage DOM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomepageLinks {
    /// Product name from `<title>` or the first `<h1>`
    pub product_name: Option<String>,
    /// Same-host links, fragment-stripped and deduplicated
    pub internal_links: Vec<String>,
    /// Links inside navigation landmarks, same site or subdomain
    pub nav_links: Vec<String>,
}

/// Parse a homepage into product name and link sets.
///
/// Both link lists are capped at `max_links`.
#[must_use]
pub fn parse_homepage(html: &str, page_url: &Url, max_links: usize) -> HomepageLinks {
    let document = Html::parse_document(html);
    let host = page_url.host_str().map(site_domain).unwrap_or_default();

    let internal_links = collect_links(&document, &ANCHOR, page_url, max_links, |url| {
        url.host_str().map(site_domain).as_deref() == Some(host.as_str())
    });
    let nav_links = collect_links(&document, &NAV_ANCHOR, page_url, max_links, |url| {
        is_same_site(url.as_str(), &host)
    });

    HomepageLinks {
        product_name: product_name(&document),
        internal_links,
        nav_links,
    }
}

/// Derive a product name from `<title>` (text before `|`), else the first `<h1>`.
#[must_use]
pub fn product_name(document: &Html) -> Option<String> {
    let from_title = document
        .select(&TITLE)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .and_then(|title| {
            let name = title.split('|').next().unwrap_or_default().trim().to_string();
            (!name.is_empty()).then_some(name)
        });

    from_title.or_else(|| {
        document
            .select(&H1)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|name| !name.is_empty())
    })
}

fn collect_links<F>(
    document: &Html,
    selector: &Selector,
    base: &Url,
    max_links: usize,
    keep: F,
) -> Vec<String>
where
    F: Fn(&Url) -> bool,
{
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in document.select(selector).filter_map(|a| a.value().attr("href")) {
        if links.len() >= max_links {
            break;
        }
        let Some(resolved) = resolve_href(href, base) else {
            continue;
        };
        if !keep(&resolved) {
            continue;
        }
        let url = strip_fragment(&resolved);
        if let Some(key) = normalize_url(&url) {
            if seen.insert(key) {
                links.push(url);
            }
        }
    }

    links
}

/// Resolve an `href` against `base`, skipping anchors and non-http schemes.
#[must_use]
pub fn resolve_href(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
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

    fn base() -> Url {
        Url::parse("https://www.acme.io/").unwrap()
    }

    #[test]
    fn test_product_name_from_title() {
        let html = "<html><head><title>  Acme Cloud | Deploy faster </title></head></html>";
        let links = parse_homepage(html, &base(), 200);
        assert_eq!(links.product_name.as_deref(), Some("Acme Cloud"));
    }

    #[test]
    fn test_product_name_keeps_dashes_and_colons() {
        let html = "<html><head><title>Acme-DB: Edge SQL - Docs</title></head></html>";
        let links = parse_homepage(html, &base(), 200);
        assert_eq!(links.product_name.as_deref(), Some("Acme-DB: Edge SQL - Docs"));
    }

    #[test]
    fn test_product_name_falls_back_to_h1() {
        let html = "<html><head><title> | </title></head><body><h1>Acme\n Cloud</h1></body></html>";
        let links = parse_homepage(html, &base(), 200);
        assert_eq!(links.product_name.as_deref(), Some("Acme Cloud"));

        let links = parse_homepage("<html><body><p>nothing</p></body></html>", &base(), 200);
        assert!(links.product_name.is_none());
    }

    #[test]
    fn test_internal_links_same_host_only() {
        let html = r##"<html><body>
            <a href="/docs">Docs</a>
            <a href="https://acme.io/pricing#plans">Pricing</a>
            <a href="https://docs.acme.io/intro">Subdomain</a>
            <a href="https://github.com/acme">GitHub</a>
            <a href="#top">Top</a>
            <a href="mailto:hi@acme.io">Mail</a>
            <a href="javascript:void(0)">JS</a>
            <a href="/docs/">Docs again</a>
        </body></html>"##;
        let links = parse_homepage(html, &base(), 200);
        assert_eq!(
            links.internal_links,
            vec!["https://www.acme.io/docs", "https://acme.io/pricing"]
        );
    }

    #[test]
    fn test_nav_links_allow_subdomains() {
        let html = r#"<html><body>
            <nav><a href="/guides">Guides</a><a href="https://docs.acme.io/">Docs</a></nav>
            <header><a href="https://twitter.com/acme">Twitter</a></header>
            <div class="navbar"><a href="/support">Support</a></div>
            <main><a href="/blog">Blog</a></main>
        </body></html>"#;
        let links = parse_homepage(html, &base(), 200);
        assert_eq!(
            links.nav_links,
            vec![
                "https://www.acme.io/guides",
                "https://docs.acme.io/",
                "https://www.acme.io/support"
            ]
        );
    }

    #[test]
    fn test_links_capped() {
        let mut html = String::from("<html><body>");
        for i in 0..500 {
            html.push_str(&format!(r#"<a href="/page-{i}">p</a>"#));
        }
        html.push_str("</body></html>");
        let links = parse_homepage(&html, &base(), 200);
        assert_eq!(links.internal_links.len(), 200);
        assert_eq!(links.internal_links[0], "https://www.acme.io/page-0");
    }

    #[test]
    fn test_resolve_href() {
        let base = Url::parse("https://acme.io/docs/intro").unwrap();
        assert_eq!(
            resolve_href("setup", &base).unwrap().as_str(),
            "https://acme.io/docs/setup"
        );
        assert!(resolve_href("  ", &base).is_none());
        assert!(resolve_href("TEL:123", &base).is_none());
        assert!(resolve_href("ftp://acme.io/x", &base).is_none());
    }
}
