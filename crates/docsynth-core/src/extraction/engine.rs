use crate::config::CrawlConfig;
use crate::extraction::page::{ExtractedPage, extract_page};
use crate::fetcher::{Fetcher, Throttle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Pages extracted from a candidate list, plus bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    /// Successful pages in candidate order
    pub pages: Vec<ExtractedPage>,
    /// URLs fetched across both passes
    pub attempted: usize,
    /// Fetches that failed or were not HTML
    pub skipped: usize,
    /// Whether the second pass ran
    pub second_pass: bool,
}

impl ExtractionReport {
    /// Whether the soft coverage target was met.
    #[must_use]
    pub const fn coverage_met(&self, min_pages: usize) -> bool {
        self.pages.len() >= min_pages
    }
}

/// Fetch and extract candidate pages one at a time.
///
/// The first `max_candidates` URLs are always attempted. If fewer than
/// `min_pages` succeed, up to `second_pass_candidates` more are tried,
/// stopping as soon as the target is reached. Requests are spaced by the
/// configured politeness interval. A failing page is logged and skipped.
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub async fn extract_pages(
    fetcher: &Fetcher,
    candidates: &[String],
    crawl: &CrawlConfig,
) -> ExtractionReport {
    let throttle = Throttle::new(crawl.request_interval());
    let mut report = ExtractionReport::default();

    let split = crawl.max_candidates.min(candidates.len());
    let (first, rest) = candidates.split_at(split);

    for url in first {
        extract_one(fetcher, &throttle, url, crawl.content_cap, &mut report).await;
    }

    if !report.coverage_met(crawl.min_pages) && !rest.is_empty() {
        info!(
            pages = report.pages.len(),
            target = crawl.min_pages,
            "Coverage below target; starting second pass"
        );
        report.second_pass = true;
        for url in rest.iter().take(crawl.second_pass_candidates) {
            if report.coverage_met(crawl.min_pages) {
                break;
            }
            extract_one(fetcher, &throttle, url, crawl.content_cap, &mut report).await;
        }
    }

    if !report.coverage_met(crawl.min_pages) {
        warn!(
            pages = report.pages.len(),
            target = crawl.min_pages,
            "Coverage target not met; continuing with what was extracted"
        );
    }
    info!(
        pages = report.pages.len(),
        attempted = report.attempted,
        skipped = report.skipped,
        "Extraction complete"
    );
    report
}

async fn extract_one(
    fetcher: &Fetcher,
    throttle: &Throttle,
    url: &str,
    content_cap: usize,
    report: &mut ExtractionReport,
) {
    throttle.wait().await;
    report.attempted += 1;

    match fetcher.get_page(url).await {
        Ok(page) if page.is_html() => {
            report.pages.push(extract_page(&page.url, &page.body, content_cap));
        },
        Ok(page) => {
            debug!(url, content_type = ?page.content_type, "Skipping non-HTML page");
            report.skipped += 1;
        },
        Err(e) => {
            debug!(url, error = %e, "Skipping page that failed to fetch");
            report.skipped += 1;
        },
    }
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

    fn crawl(max: usize, second: usize, min: usize) -> CrawlConfig {
        CrawlConfig {
            max_candidates: max,
            second_pass_candidates: second,
            min_pages: min,
            request_interval_ms: 0,
            ..CrawlConfig::default()
        }
    }

    async fn mount_html(server: &MockServer, route: &str, title: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(format!(
                        "<html><head><title>{title}</title></head><body><main>{title} body</main></body></html>"
                    )),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_preserves_order_and_skips_failures() {
        let server = MockServer::start().await;
        mount_html(&server, "/docs/a", "A").await;
        mount_html(&server, "/docs/c", "C").await;
        Mock::given(method("GET"))
            .and(path("/docs/pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_string("%PDF"),
            )
            .mount(&server)
            .await;

        let base = server.uri();
        let candidates = vec![
            format!("{base}/docs/c"),
            format!("{base}/docs/missing"),
            format!("{base}/docs/pdf"),
            format!("{base}/docs/a"),
        ];
        let report = extract_pages(&fetcher(), &candidates, &crawl(60, 140, 1)).await;

        let titles: Vec<&str> = report.pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A"]);
        assert_eq!(report.attempted, 4);
        assert_eq!(report.skipped, 2);
        assert!(!report.second_pass);
    }

    #[tokio::test]
    async fn test_second_pass_stops_at_target() {
        let server = MockServer::start().await;
        for route in ["/docs/1", "/docs/2", "/docs/3", "/docs/4"] {
            mount_html(&server, route, route).await;
        }

        let base = server.uri();
        let candidates: Vec<String> = ["/docs/missing", "/docs/1", "/docs/2", "/docs/3", "/docs/4"]
            .iter()
            .map(|p| format!("{base}{p}"))
            .collect();

        let report = extract_pages(&fetcher(), &candidates, &crawl(2, 10, 3)).await;
        assert!(report.second_pass);
        assert_eq!(report.pages.len(), 3);
        assert_eq!(report.attempted, 4);
        assert!(report.coverage_met(3));
    }

    #[tokio::test]
    async fn test_second_pass_bounded() {
        let server = MockServer::start().await;
        let base = server.uri();
        let candidates: Vec<String> = (0..10).map(|i| format!("{base}/docs/{i}")).collect();

        let report = extract_pages(&fetcher(), &candidates, &crawl(2, 3, 15)).await;
        assert!(report.pages.is_empty());
        assert_eq!(report.attempted, 5);
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let report = extract_pages(&fetcher(), &[], &CrawlConfig::default()).await;
        assert_eq!(report, ExtractionReport::default());
    }
}
