use crate::config::ResearchConfig;
use crate::discovery::filter::normalize_url;
use crate::fetcher::Fetcher;
use crate::research::providers::Researcher;
use crate::research::types::{ResearchBundle, ResearchResult};
use crate::soft::soft_fail;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, instrument};

/// Mean engagement at which the engagement term saturates.
pub const ENGAGEMENT_SATURATION: f64 = 5000.0;

const TRUST_WEIGHT: f64 = 0.7;
const ENGAGEMENT_WEIGHT: f64 = 0.3;

/// Query every provider concurrently and aggregate the results.
///
/// Providers are fault-isolated: each call goes through
/// [`soft_fail`], so this never fails. Results are merged in priority
/// order (web, Q&A, issues, video, discussion) before deduplication.
#[instrument(skip_all, fields(product = %product))]
pub async fn research(
    fetcher: &Fetcher,
    config: &ResearchConfig,
    product: &str,
    base_url: &str,
) -> ResearchBundle {
    let researcher = Researcher::new(fetcher, config, base_url);
    let web_query = format!("{product} documentation tutorial");

    let (web, qa, issues, video, discussion) = tokio::join!(
        soft_fail("web search", researcher.web_search(&web_query)),
        soft_fail("stackoverflow", researcher.stackoverflow(product)),
        soft_fail("github issues", researcher.github_issues(product)),
        soft_fail("youtube", researcher.youtube(product)),
        soft_fail("reddit", researcher.reddit(product)),
    );

    let bundle = aggregate([web, qa, issues, video, discussion]);
    info!(
        sources = bundle.total_sources,
        quality = bundle.quality_score,
        "Research complete"
    );
    bundle
}

/// Merge provider batches (in priority order) into a scored bundle.
///
/// Results sharing a normalized URL are collapsed to the first occurrence,
/// so earlier batches win ties.
#[must_use]
pub fn aggregate<I>(batches: I) -> ResearchBundle
where
    I: IntoIterator<Item = Vec<ResearchResult>>,
{
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for result in batches.into_iter().flatten() {
        let key = normalize_url(&result.url).unwrap_or_else(|| result.url.clone());
        if seen.insert(key) {
            results.push(result);
        }
    }

    let mut provider_counts = BTreeMap::new();
    for result in &results {
        *provider_counts
            .entry(result.source.as_str().to_string())
            .or_insert(0) += 1;
    }

    ResearchBundle {
        quality_score: quality_score(&results),
        total_sources: results.len(),
        provider_counts,
        results,
    }
}

/// `0.7 * mean trust + 0.3 * min(mean engagement / 5000, 1)`.
///
/// Engagement is averaged over results that report it; an empty result set
/// scores zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn quality_score(results: &[ResearchResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }

    let mean_trust = results.iter().map(|r| r.trust_score).sum::<f64>() / results.len() as f64;

    let engagements: Vec<u64> = results.iter().filter_map(|r| r.detail.engagement()).collect();
    let mean_engagement = if engagements.is_empty() {
        0.0
    } else {
        engagements.iter().map(|&e| e as f64).sum::<f64>() / engagements.len() as f64
    };
    let normalized = (mean_engagement / ENGAGEMENT_SATURATION).min(1.0);

    TRUST_WEIGHT.mul_add(mean_trust, ENGAGEMENT_WEIGHT * normalized)
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
    use crate::config::ProviderEndpoints;
    use crate::research::types::{Provider, ResultDetail};
    use crate::url_guard::UrlGuard;
    use proptest::prelude::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search(url: &str, source: Provider, trust: f64) -> ResearchResult {
        ResearchResult {
            url: url.into(),
            title: url.into(),
            snippet: String::new(),
            source,
            trust_score: trust,
            detail: ResultDetail::Search { first_party: false },
        }
    }

    fn video(url: &str, views: u64, trust: f64) -> ResearchResult {
        ResearchResult {
            url: url.into(),
            title: url.into(),
            snippet: String::new(),
            source: Provider::Youtube,
            trust_score: trust,
            detail: ResultDetail::Video {
                channel: "c".into(),
                view_count: Some(views),
            },
        }
    }

    #[test]
    fn test_dedup_prefers_earlier_provider() {
        let bundle = aggregate([
            vec![search("https://example.com/acme/", Provider::Serper, 0.6)],
            vec![search("https://www.example.com/acme#top", Provider::Reddit, 0.7)],
        ]);
        assert_eq!(bundle.results.len(), 1);
        assert_eq!(bundle.results[0].source, Provider::Serper);
        assert_eq!(bundle.total_sources, 1);
        assert_eq!(bundle.provider_counts.get("serper"), Some(&1));
        assert!(!bundle.provider_counts.contains_key("reddit"));
    }

    #[test]
    fn test_quality_score_formula() {
        // mean trust 0.7, mean engagement 2500 over the one video
        let results = vec![
            search("https://a.com", Provider::Serper, 0.6),
            video("https://b.com", 2500, 0.8),
        ];
        let expected = 0.7f64.mul_add(0.7, 0.3 * 0.5);
        assert!((quality_score(&results) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_quality_score_saturates_and_empty() {
        assert!(quality_score(&[]).abs() < f64::EPSILON);
        let results = vec![video("https://b.com", 1_000_000, 1.0)];
        assert!((quality_score(&results) - 1.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_totals_match_counts(urls in prop::collection::vec("[a-c]{1,2}", 0..30)) {
            let batches: Vec<Vec<ResearchResult>> = urls
                .chunks(5)
                .map(|chunk| chunk.iter().map(|u| search(&format!("https://x.com/{u}"), Provider::Github, 0.5)).collect())
                .collect();
            let bundle = aggregate(batches);
            let counted: usize = bundle.provider_counts.values().sum();
            prop_assert_eq!(counted, bundle.total_sources);
            prop_assert_eq!(bundle.total_sources, bundle.results.len());
            let unique: HashSet<&String> = urls.iter().collect();
            prop_assert_eq!(bundle.results.len(), unique.len());
            prop_assert!((0.0..=1.0).contains(&bundle.quality_score));
        }
    }

    #[tokio::test]
    async fn test_research_degrades_without_providers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = Fetcher::with_timeout(Duration::from_secs(5), UrlGuard::AllowPrivate).unwrap();
        let config = ResearchConfig {
            endpoints: ProviderEndpoints::all_at(&server.uri()),
            ..ResearchConfig::default()
        };
        let bundle = research(&fetcher, &config, "Acme", "https://acme.io").await;
        assert!(bundle.is_empty());
        assert!(bundle.quality_score.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_research_merges_in_priority_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2.3/search/advanced"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "title": "Q", "link": "https://stackoverflow.com/q/1", "score": 12, "view_count": 400 }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "children": [
                    { "data": { "title": "dup", "permalink": "/r/x/1", "score": 5 } }
                ]}
            })))
            .mount(&server)
            .await;

        let fetcher = Fetcher::with_timeout(Duration::from_secs(5), UrlGuard::AllowPrivate).unwrap();
        let config = ResearchConfig {
            endpoints: ProviderEndpoints::all_at(&server.uri()),
            ..ResearchConfig::default()
        };
        let bundle = research(&fetcher, &config, "Acme", "https://acme.io").await;

        let sources: Vec<Provider> = bundle.results.iter().map(|r| r.source).collect();
        assert_eq!(sources, vec![Provider::StackOverflow, Provider::Reddit]);
        assert!(bundle.has_provider(Provider::StackOverflow));
        assert!(!bundle.has_provider(Provider::Github));
        assert!(bundle.quality_score > 0.0);
    }
}
