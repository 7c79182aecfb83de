use crate::Result;
use crate::config::{PricingConfig, ResearchConfig};
use crate::discovery::links::parse_homepage;
use crate::discovery::sitemap::{SITEMAP_PATHS, fetch_sitemap_locs, origin_of};
use crate::extraction::extract_page;
use crate::fetcher::Fetcher;
use crate::pricing::quote::{
    Complexity, ComplexityFactors, PageCountSource, PricingQuote, price_quote,
};
use crate::research::Researcher;
use crate::soft::{soft_fail, soft_fail_or};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, instrument};
use url::Url;

/// Bytes of homepage text scanned for API keywords.
const SIGNAL_TEXT_CAP: usize = 100_000;

#[allow(clippy::unwrap_used)]
static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: Pattern is a compile-time constant
    Regex::new(r"(?i)<script\b").unwrap()
});

#[allow(clippy::unwrap_used)]
static API_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: Pattern is a compile-time constant
    Regex::new(r"(?i)\b(?:apis?|sdks?|endpoints?|webhooks?|graphql|rest|oauth|cli|json|integrations?)\b")
        .unwrap()
});

/// What the estimator reads off the homepage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomepageSignals {
    /// Product name, if the page names one
    pub product_name: Option<String>,
    /// Same-site links, bounded by the link estimate cap
    pub internal_links: usize,
    /// Distinct code samples
    pub code_blocks: usize,
    /// `<script>` tags
    pub scripts: usize,
    /// API-related keyword mentions in visible text
    pub api_mentions: usize,
}

/// Read estimator signals from homepage HTML.
#[must_use]
pub fn homepage_signals(html: &str, page_url: &Url, max_links: usize) -> HomepageSignals {
    let links = parse_homepage(html, page_url, max_links);
    let page = extract_page(page_url.as_str(), html, SIGNAL_TEXT_CAP);
    HomepageSignals {
        product_name: links.product_name,
        internal_links: links.internal_links.len(),
        code_blocks: page.code_blocks.len(),
        scripts: SCRIPT_TAG.find_iter(html).count(),
        api_mentions: API_KEYWORD.find_iter(&page.content).count(),
    }
}

/// Classify complexity from code density, API vocabulary and script weight.
#[must_use]
pub const fn classify(code_blocks: usize, api_mentions: usize, scripts: usize) -> Complexity {
    if code_blocks >= 10 || api_mentions >= 15 || scripts >= 30 {
        Complexity::Complex
    } else if code_blocks >= 3 || api_mentions >= 5 || scripts >= 15 {
        Complexity::Moderate
    } else {
        Complexity::Simple
    }
}

/// Pick the page estimate: sitemap count, else bounded link count, else the default.
#[must_use]
pub fn page_estimate(
    sitemap_locs: usize,
    internal_links: usize,
    config: &PricingConfig,
) -> (u64, PageCountSource) {
    if sitemap_locs > 0 {
        (sitemap_locs as u64, PageCountSource::Sitemap)
    } else if internal_links > 0 {
        (
            (internal_links as u64).min(config.max_link_estimate),
            PageCountSource::Links,
        )
    } else {
        (config.default_page_estimate, PageCountSource::Default)
    }
}

/// Quote a site without running synthesis.
///
/// The URL guard runs before anything is fetched. The homepage, sitemap and
/// presence checks are all soft; a site that answers nothing is quoted from
/// defaults.
///
/// # Errors
///
/// [`Error::InvalidUrl`](crate::Error::InvalidUrl) or
/// [`Error::BlockedUrl`](crate::Error::BlockedUrl) from the guard.
#[instrument(skip_all, fields(url = %url))]
pub async fn estimate(
    fetcher: &Fetcher,
    research: &ResearchConfig,
    pricing: &PricingConfig,
    url: &str,
) -> Result<PricingQuote> {
    let base = fetcher.guard().check(url)?;
    let base_str = base.to_string();

    let homepage = soft_fail_or("homepage", None, async {
        fetcher.get_page(&base_str).await.map(Some)
    })
    .await;
    let max_links = usize::try_from(pricing.max_link_estimate).unwrap_or(usize::MAX);
    let signals = homepage
        .filter(|page| page.is_html())
        .map(|page| {
            let page_url = Url::parse(&page.url).unwrap_or_else(|_| base.clone());
            homepage_signals(&page.body, &page_url, max_links)
        })
        .unwrap_or_default();

    let product = signals
        .product_name
        .clone()
        .or_else(|| base.host_str().map(str::to_string))
        .unwrap_or_default();
    let researcher = Researcher::new(fetcher, research, &base_str);

    let (sitemap_locs, issues, answers) = tokio::join!(
        sitemap_loc_count(fetcher, &base_str),
        soft_fail("github issues", researcher.github_issues(&product)),
        soft_fail("stackoverflow", researcher.stackoverflow(&product)),
    );

    let (pages, page_source) = page_estimate(sitemap_locs, signals.internal_links, pricing);
    let factors = ComplexityFactors {
        complexity: classify(signals.code_blocks, signals.api_mentions, signals.scripts),
        page_estimate: pages,
        page_source,
        code_blocks: signals.code_blocks,
        scripts: signals.scripts,
        api_mentions: signals.api_mentions,
        github_results: issues.len(),
        qa_results: answers.len(),
    };

    let mut quote = price_quote(factors.total_resources(), factors.has_presence(), pricing);
    quote.complexity_factors = factors;

    info!(
        total = quote.estimated_total,
        free = quote.is_free,
        complexity = quote.complexity_factors.complexity.as_str(),
        "Estimate ready"
    );
    Ok(quote)
}

/// `<loc>` entries in the first root sitemap that has any.
async fn sitemap_loc_count(fetcher: &Fetcher, base_url: &str) -> usize {
    let Some(origin) = origin_of(base_url) else {
        return 0;
    };
    for path in SITEMAP_PATHS {
        let locs = soft_fail("sitemap", fetch_sitemap_locs(fetcher, &format!("{origin}{path}"))).await;
        if !locs.is_empty() {
            return locs.len();
        }
    }
    0
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::config::ProviderEndpoints;
    use crate::url_guard::UrlGuard;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(guard: UrlGuard) -> Fetcher {
        Fetcher::with_timeout(Duration::from_secs(5), guard).unwrap()
    }

    fn research_at(server: &MockServer) -> ResearchConfig {
        ResearchConfig {
            endpoints: ProviderEndpoints::all_at(&server.uri()),
            ..ResearchConfig::default()
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(0, 0, 0), Complexity::Simple);
        assert_eq!(classify(3, 0, 0), Complexity::Moderate);
        assert_eq!(classify(0, 5, 0), Complexity::Moderate);
        assert_eq!(classify(0, 0, 15), Complexity::Moderate);
        assert_eq!(classify(10, 0, 0), Complexity::Complex);
        assert_eq!(classify(0, 15, 0), Complexity::Complex);
        assert_eq!(classify(2, 4, 30), Complexity::Complex);
    }

    #[test]
    fn test_page_estimate_fallbacks() {
        let config = PricingConfig::default();
        assert_eq!(page_estimate(42, 10, &config), (42, PageCountSource::Sitemap));
        assert_eq!(page_estimate(0, 10, &config), (10, PageCountSource::Links));
        assert_eq!(page_estimate(0, 400, &config), (150, PageCountSource::Links));
        assert_eq!(page_estimate(0, 0, &config), (25, PageCountSource::Default));
    }

    #[test]
    fn test_homepage_signals() {
        let html = r#"<html><head><title>Acme | Home</title>
            <script src="a.js"></script><SCRIPT>var x = 1;</SCRIPT></head>
            <body><main>
              <p>Our REST API and SDK expose every endpoint. See the API reference.</p>
              <pre><code class="language-bash">curl https://acme.io/v1/users</code></pre>
              <a href="/docs">Docs</a><a href="/pricing">Pricing</a>
            </main></body></html>"#;
        let page_url = Url::parse("https://acme.io/").unwrap();
        let signals = homepage_signals(html, &page_url, 150);
        assert_eq!(signals.product_name.as_deref(), Some("Acme"));
        assert_eq!(signals.internal_links, 2);
        assert_eq!(signals.code_blocks, 1);
        assert_eq!(signals.scripts, 2);
        assert_eq!(signals.api_mentions, 5);
    }

    #[tokio::test]
    async fn test_estimate_rejects_private_hosts_before_fetching() {
        let research = ResearchConfig::default();
        let pricing = PricingConfig::default();
        for url in [
            "http://127.0.0.1/",
            "http://169.254.169.254/latest/meta-data",
            "http://10.0.0.5/",
            "http://metadata.google.internal/",
        ] {
            let err = estimate(&fetcher(UrlGuard::PublicOnly), &research, &pricing, url)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::BlockedUrl { .. }), "{url} was not blocked");
        }
    }

    #[tokio::test]
    async fn test_estimate_unreachable_site_uses_defaults() {
        let server = MockServer::start().await;
        let quote = estimate(
            &fetcher(UrlGuard::AllowPrivate),
            &research_at(&server),
            &PricingConfig::default(),
            "http://127.0.0.1:9/",
        )
        .await
        .unwrap();
        assert_eq!(quote.complexity_factors.page_source, PageCountSource::Default);
        assert_eq!(quote.complexity_factors.page_estimate, 25);
        assert!(!quote.is_free);
        assert_eq!(quote.estimated_total, 425.0);
    }

    #[tokio::test]
    async fn test_estimate_from_sitemap_and_presence() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><head><title>Acme</title></head><body><p>hi</p></body></html>"),
            )
            .mount(&server)
            .await;
        let urls: String = (0..120)
            .map(|i| format!("<url><loc>{base}/docs/{i}</loc></url>"))
            .collect();
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("<urlset>{urls}</urlset>")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/2.3/search/advanced"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "title": "A", "link": "https://stackoverflow.com/q/1", "score": 3 },
                    { "title": "B", "link": "https://stackoverflow.com/q/2", "score": 1 }
                ]
            })))
            .mount(&server)
            .await;

        let quote = estimate(
            &fetcher(UrlGuard::AllowPrivate),
            &research_at(&server),
            &PricingConfig::default(),
            &base,
        )
        .await
        .unwrap();

        let factors = &quote.complexity_factors;
        assert_eq!(factors.page_source, PageCountSource::Sitemap);
        assert_eq!(factors.page_estimate, 120);
        assert_eq!(factors.qa_results, 2);
        assert_eq!(factors.github_results, 0);
        assert_eq!(factors.complexity, Complexity::Simple);
        // 300 + 122 * 5 * 1.5
        assert_eq!(quote.breakdown.total_resources, 122);
        assert_eq!(quote.estimated_total, 1215.0);
    }
}
