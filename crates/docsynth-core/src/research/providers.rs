//! Clients for the individual research providers.
//!
//! Every method returns a `Result` and is wrapped in
//! [`soft_fail`](crate::soft::soft_fail) by the aggregator, so a missing
//! credential or a provider outage only shrinks the bundle.

use crate::config::ResearchConfig;
use crate::discovery::filter::{is_same_site, site_domain};
use crate::discovery::links::collapse_whitespace;
use crate::fetcher::Fetcher;
use crate::research::types::{Provider, ResearchResult, ResultDetail, band_trust};
use crate::soft::soft_fail;
use crate::{Error, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, instrument};
use url::Url;

/// Characters kept from provider snippets and bodies.
const SNIPPET_CHARS: usize = 300;

/// Issues a query against each provider with shared settings.
pub struct Researcher<'a> {
    fetcher: &'a Fetcher,
    config: &'a ResearchConfig,
    site_domain: Option<String>,
}

impl<'a> Researcher<'a> {
    /// Create a researcher for the product hosted at `base_url`.
    ///
    /// `base_url` only marks web results on the product's own site as first
    /// party; it is never fetched.
    #[must_use]
    pub fn new(fetcher: &'a Fetcher, config: &'a ResearchConfig, base_url: &str) -> Self {
        let site_domain = Url::parse(base_url)
            .ok()
            .and_then(|u| u.host_str().map(site_domain));
        Self {
            fetcher,
            config,
            site_domain,
        }
    }

    fn limit(&self) -> usize {
        self.config.max_results_per_provider.max(1)
    }

    fn endpoint(base: &str, path: &str) -> String {
        format!("{}{path}", base.trim_end_matches('/'))
    }

    /// General web search: Serper first, Brave when Serper is unconfigured,
    /// failing, or returns nothing.
    ///
    /// # Errors
    ///
    /// Returns the Brave error if both providers fail.
    pub async fn web_search(&self, query: &str) -> Result<Vec<ResearchResult>> {
        match self.serper(query).await {
            Ok(results) if !results.is_empty() => return Ok(results),
            Ok(_) => debug!("Serper returned no results; falling back to Brave"),
            Err(e) => debug!(error = %e, "Serper unavailable; falling back to Brave"),
        }
        self.brave(query).await
    }

    /// Serper (Google) web search.
    ///
    /// # Errors
    ///
    /// [`Error::MissingCredential`] without an API key, or any transport error.
    #[instrument(skip(self))]
    pub async fn serper(&self, query: &str) -> Result<Vec<ResearchResult>> {
        let key = credential(self.config.serper_api_key.as_deref(), Provider::Serper)?;
        let request = self
            .fetcher
            .request(
                Method::POST,
                &Self::endpoint(&self.config.endpoints.serper, "/search"),
            )?
            .timeout(self.config.timeout())
            .header("X-API-KEY", key)
            .json(&json!({ "q": query, "num": self.limit() }));

        let response: SerperResponse = self.fetcher.send_json(request).await?;
        Ok(response
            .organic
            .into_iter()
            .take(self.limit())
            .map(|hit| self.web_result(Provider::Serper, hit.link, hit.title, &hit.snippet))
            .collect())
    }

    /// Brave web search.
    ///
    /// # Errors
    ///
    /// [`Error::MissingCredential`] without an API key, or any transport error.
    #[instrument(skip(self))]
    pub async fn brave(&self, query: &str) -> Result<Vec<ResearchResult>> {
        let key = credential(self.config.brave_api_key.as_deref(), Provider::Brave)?;
        let limit = self.limit().to_string();
        let request = self
            .fetcher
            .request(
                Method::GET,
                &Self::endpoint(&self.config.endpoints.brave, "/res/v1/web/search"),
            )?
            .timeout(self.config.timeout())
            .header("X-Subscription-Token", key)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", limit.as_str())]);

        let response: BraveResponse = self.fetcher.send_json(request).await?;
        Ok(response
            .web
            .results
            .into_iter()
            .take(self.limit())
            .map(|hit| self.web_result(Provider::Brave, hit.url, hit.title, &hit.description))
            .collect())
    }

    fn web_result(
        &self,
        provider: Provider,
        url: String,
        title: String,
        snippet: &str,
    ) -> ResearchResult {
        let first_party = self
            .site_domain
            .as_deref()
            .is_some_and(|domain| is_same_site(&url, domain));
        let trust = &self.config.trust;
        ResearchResult {
            url,
            title,
            snippet: excerpt(snippet),
            source: provider,
            trust_score: if first_party {
                trust.search_first_party
            } else {
                trust.search
            },
            detail: ResultDetail::Search { first_party },
        }
    }

    /// Stack Overflow questions, highest voted first.
    ///
    /// Works without a key; a configured key raises the quota.
    ///
    /// # Errors
    ///
    /// Any transport or decode error.
    #[instrument(skip(self))]
    pub async fn stackoverflow(&self, query: &str) -> Result<Vec<ResearchResult>> {
        let limit = self.limit().to_string();
        let mut params = vec![
            ("order", "desc"),
            ("sort", "votes"),
            ("site", "stackoverflow"),
            ("q", query),
            ("pagesize", limit.as_str()),
        ];
        if let Some(key) = self.config.stackexchange_key.as_deref() {
            params.push(("key", key));
        }

        let request = self
            .fetcher
            .request(
                Method::GET,
                &Self::endpoint(&self.config.endpoints.stackexchange, "/2.3/search/advanced"),
            )?
            .timeout(self.config.timeout())
            .query(&params);

        let response: StackExchangeResponse = self.fetcher.send_json(request).await?;
        let trust = &self.config.trust;
        Ok(response
            .items
            .into_iter()
            .take(self.limit())
            .map(|q| {
                let votes = u64::try_from(q.score).unwrap_or(0);
                let mut trust_score = band_trust(&trust.qa, trust.qa_floor, votes);
                if q.is_answered {
                    trust_score = (trust_score + trust.qa_accepted_bonus).min(1.0);
                }
                let snippet = if q.tags.is_empty() {
                    format!("{} answers", q.answer_count)
                } else {
                    format!("{} answers; tags: {}", q.answer_count, q.tags.join(", "))
                };
                ResearchResult {
                    url: q.link,
                    title: html_escape::decode_html_entities(&q.title).into_owned(),
                    snippet,
                    source: Provider::StackOverflow,
                    trust_score,
                    detail: ResultDetail::Answer {
                        score: q.score,
                        view_count: q.view_count,
                        answer_count: q.answer_count,
                        is_answered: q.is_answered,
                    },
                }
            })
            .collect())
    }

    /// GitHub issues mentioning the product, most discussed first.
    ///
    /// # Errors
    ///
    /// Any transport or decode error.
    #[instrument(skip(self))]
    pub async fn github_issues(&self, query: &str) -> Result<Vec<ResearchResult>> {
        let mut request = self
            .fetcher
            .request(
                Method::GET,
                &Self::endpoint(&self.config.endpoints.github, "/search/issues"),
            )?
            .timeout(self.config.timeout())
            .header("Accept", "application/vnd.github+json")
            .query(&[
                ("q", format!("{query} is:issue")),
                ("sort", "comments".to_string()),
                ("order", "desc".to_string()),
                ("per_page", self.limit().to_string()),
            ]);
        if let Some(token) = self.config.github_token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response: GithubSearchResponse = self.fetcher.send_json(request).await?;
        let trust = &self.config.trust;
        Ok(response
            .items
            .into_iter()
            .take(self.limit())
            .map(|issue| {
                let reactions = issue.reactions.total_count;
                ResearchResult {
                    trust_score: band_trust(
                        &trust.issues,
                        trust.issues_floor,
                        issue.comments + reactions,
                    ),
                    url: issue.html_url,
                    title: issue.title,
                    snippet: excerpt(issue.body.as_deref().unwrap_or_default()),
                    source: Provider::Github,
                    detail: ResultDetail::Issue {
                        state: issue.state,
                        comments: issue.comments,
                        reactions,
                    },
                }
            })
            .collect())
    }

    /// `YouTube` videos, enriched with view counts when statistics are available.
    ///
    /// # Errors
    ///
    /// [`Error::MissingCredential`] without an API key, or any transport error
    /// from the search call. The statistics call is soft.
    #[instrument(skip(self))]
    pub async fn youtube(&self, query: &str) -> Result<Vec<ResearchResult>> {
        let key = credential(self.config.youtube_api_key.as_deref(), Provider::Youtube)?;
        let limit = self.limit().to_string();
        let request = self
            .fetcher
            .request(
                Method::GET,
                &Self::endpoint(&self.config.endpoints.youtube, "/search"),
            )?
            .timeout(self.config.timeout())
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", limit.as_str()),
                ("key", key),
            ]);

        let response: YoutubeSearchResponse = self.fetcher.send_json(request).await?;
        let videos: Vec<YoutubeSearchItem> = response
            .items
            .into_iter()
            .filter(|item| item.id.video_id.is_some())
            .take(self.limit())
            .collect();

        let ids: Vec<&str> = videos
            .iter()
            .filter_map(|v| v.id.video_id.as_deref())
            .collect();
        let views = soft_fail("youtube statistics", self.youtube_views(&ids, key)).await;

        let trust = &self.config.trust;
        Ok(videos
            .into_iter()
            .filter_map(|video| {
                let id = video.id.video_id?;
                let view_count = views.get(&id).copied();
                Some(ResearchResult {
                    url: format!("https://www.youtube.com/watch?v={id}"),
                    title: html_escape::decode_html_entities(&video.snippet.title).into_owned(),
                    snippet: excerpt(&video.snippet.description),
                    source: Provider::Youtube,
                    trust_score: band_trust(
                        &trust.video,
                        trust.video_floor,
                        view_count.unwrap_or(0),
                    ),
                    detail: ResultDetail::Video {
                        channel: video.snippet.channel_title,
                        view_count,
                    },
                })
            })
            .collect())
    }

    async fn youtube_views(&self, ids: &[&str], key: &str) -> Result<HashMap<String, u64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let joined = ids.join(",");
        let request = self
            .fetcher
            .request(
                Method::GET,
                &Self::endpoint(&self.config.endpoints.youtube, "/videos"),
            )?
            .timeout(self.config.timeout())
            .query(&[("part", "statistics"), ("id", joined.as_str()), ("key", key)]);

        let response: YoutubeVideosResponse = self.fetcher.send_json(request).await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let views = item.statistics.view_count?.parse().ok()?;
                Some((item.id, views))
            })
            .collect())
    }

    /// Reddit discussions.
    ///
    /// # Errors
    ///
    /// Any transport or decode error.
    #[instrument(skip(self))]
    pub async fn reddit(&self, query: &str) -> Result<Vec<ResearchResult>> {
        let base = self.config.endpoints.reddit.trim_end_matches('/');
        let limit = self.limit().to_string();
        let request = self
            .fetcher
            .request(Method::GET, &format!("{base}/search.json"))?
            .timeout(self.config.timeout())
            .query(&[
                ("q", query),
                ("sort", "relevance"),
                ("limit", limit.as_str()),
            ]);

        let response: RedditListing = self.fetcher.send_json(request).await?;
        let trust = &self.config.trust;
        Ok(response
            .data
            .children
            .into_iter()
            .take(self.limit())
            .map(|child| {
                let post = child.data;
                let metric = u64::try_from(post.score).unwrap_or(0);
                ResearchResult {
                    url: format!("{base}{}", post.permalink),
                    title: post.title,
                    snippet: excerpt(&post.selftext),
                    source: Provider::Reddit,
                    trust_score: band_trust(&trust.discussion, trust.discussion_floor, metric),
                    detail: ResultDetail::Discussion {
                        community: post.subreddit,
                        score: post.score,
                        comments: post.num_comments,
                    },
                }
            })
            .collect())
    }
}

fn credential(value: Option<&str>, provider: Provider) -> Result<&str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::MissingCredential {
            provider: provider.to_string(),
        })
}

fn excerpt(text: &str) -> String {
    collapse_whitespace(text).chars().take(SNIPPET_CHARS).collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SerperResponse {
    organic: Vec<SerperHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SerperHit {
    title: String,
    link: String,
    snippet: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BraveResponse {
    web: BraveWeb,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BraveWeb {
    results: Vec<BraveHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BraveHit {
    title: String,
    url: String,
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StackExchangeResponse {
    items: Vec<StackExchangeQuestion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StackExchangeQuestion {
    title: String,
    link: String,
    score: i64,
    view_count: u64,
    answer_count: u64,
    is_answered: bool,
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GithubSearchResponse {
    items: Vec<GithubIssue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GithubIssue {
    title: String,
    html_url: String,
    body: Option<String>,
    state: String,
    comments: u64,
    reactions: GithubReactions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GithubReactions {
    total_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct YoutubeSearchResponse {
    items: Vec<YoutubeSearchItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct YoutubeSearchItem {
    id: YoutubeVideoId,
    snippet: YoutubeSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct YoutubeVideoId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct YoutubeSnippet {
    title: String,
    description: String,
    channel_title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct YoutubeVideosResponse {
    items: Vec<YoutubeVideo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct YoutubeVideo {
    id: String,
    statistics: YoutubeStatistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct YoutubeStatistics {
    // The API reports counts as strings
    view_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedditListing {
    data: RedditListingData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedditListingData {
    children: Vec<RedditChild>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedditChild {
    data: RedditPost,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedditPost {
    title: String,
    permalink: String,
    selftext: String,
    subreddit: String,
    score: i64,
    num_comments: u64,
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
    use crate::url_guard::UrlGuard;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::with_timeout(Duration::from_secs(5), UrlGuard::AllowPrivate).unwrap()
    }

    fn config(server: &MockServer) -> ResearchConfig {
        ResearchConfig {
            endpoints: ProviderEndpoints::all_at(&server.uri()),
            ..ResearchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_serper_requires_key() {
        let server = MockServer::start().await;
        let config = config(&server);
        let fetcher = fetcher();
        let researcher = Researcher::new(&fetcher, &config, "https://acme.io");
        let err = researcher.serper("acme").await.unwrap_err();
        assert!(matches!(err, Error::MissingCredential { .. }));
    }

    #[tokio::test]
    async fn test_serper_marks_first_party() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "secret"))
            .and(body_partial_json(json!({ "q": "acme docs" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organic": [
                    { "title": "Acme Docs", "link": "https://docs.acme.io/intro", "snippet": "Official" },
                    { "title": "Acme tutorial", "link": "https://blog.example.com/acme", "snippet": "  A   walkthrough " }
                ]
            })))
            .mount(&server)
            .await;

        let config = ResearchConfig {
            serper_api_key: Some("secret".into()),
            ..config(&server)
        };
        let fetcher = fetcher();
        let researcher = Researcher::new(&fetcher, &config, "https://www.acme.io/");
        let results = researcher.serper("acme docs").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].detail, ResultDetail::Search { first_party: true });
        assert!((results[0].trust_score - 0.9).abs() < f64::EPSILON);
        assert!((results[1].trust_score - 0.6).abs() < f64::EPSILON);
        assert_eq!(results[1].snippet, "A walkthrough");
    }

    #[tokio::test]
    async fn test_web_search_falls_back_to_brave() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res/v1/web/search"))
            .and(header("X-Subscription-Token", "brave-key"))
            .and(query_param("q", "acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "web": { "results": [
                    { "title": "Acme guide", "url": "https://example.com/acme", "description": "Guide" }
                ]}
            })))
            .mount(&server)
            .await;

        let config = ResearchConfig {
            serper_api_key: Some("serper-key".into()),
            brave_api_key: Some("brave-key".into()),
            ..config(&server)
        };
        let fetcher = fetcher();
        let researcher = Researcher::new(&fetcher, &config, "https://acme.io");
        let results = researcher.web_search("acme").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, Provider::Brave);
    }

    #[tokio::test]
    async fn test_stackoverflow_bands_and_bonus() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2.3/search/advanced"))
            .and(query_param("site", "stackoverflow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "title": "Why does Acme &quot;fail&quot;?", "link": "https://stackoverflow.com/q/1",
                      "score": 60, "view_count": 12000, "answer_count": 3, "is_answered": true, "tags": ["acme"] },
                    { "title": "Acme setup", "link": "https://stackoverflow.com/q/2",
                      "score": 0, "view_count": 10, "answer_count": 0, "is_answered": false }
                ]
            })))
            .mount(&server)
            .await;

        let config = config(&server);
        let fetcher = fetcher();
        let researcher = Researcher::new(&fetcher, &config, "https://acme.io");
        let results = researcher.stackoverflow("acme").await.unwrap();

        assert_eq!(results[0].title, "Why does Acme \"fail\"?");
        assert!((results[0].trust_score - 0.95).abs() < 1e-9);
        assert!((results[1].trust_score - 0.4).abs() < 1e-9);
        assert_eq!(results[0].snippet, "3 answers; tags: acme");
    }

    #[tokio::test]
    async fn test_github_issues() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .and(query_param("q", "acme is:issue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "title": "Crash on deploy", "html_url": "https://github.com/acme/cli/issues/7",
                    "body": "Steps to reproduce", "state": "open", "comments": 45,
                    "reactions": { "total_count": 10 }
                }]
            })))
            .mount(&server)
            .await;

        let config = config(&server);
        let fetcher = fetcher();
        let researcher = Researcher::new(&fetcher, &config, "https://acme.io");
        let results = researcher.github_issues("acme").await.unwrap();

        assert_eq!(results.len(), 1);
        assert!((results[0].trust_score - 0.8).abs() < f64::EPSILON);
        assert_eq!(results[0].detail.engagement(), Some(55));
    }

    #[tokio::test]
    async fn test_youtube_enriches_views() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("key", "yt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "id": { "videoId": "abc" }, "snippet": { "title": "Acme in 100s", "description": "d", "channelTitle": "Fireship" } },
                    { "id": { "channelId": "skip-me" }, "snippet": { "title": "Channel" } }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": "abc", "statistics": { "viewCount": "250000" } }]
            })))
            .mount(&server)
            .await;

        let config = ResearchConfig {
            youtube_api_key: Some("yt".into()),
            ..config(&server)
        };
        let fetcher = fetcher();
        let researcher = Researcher::new(&fetcher, &config, "https://acme.io");
        let results = researcher.youtube("acme").await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(results[0].detail.engagement(), Some(250_000));
        assert!((results[0].trust_score - 0.8).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_youtube_statistics_failure_is_soft() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": { "videoId": "abc" }, "snippet": { "title": "t" } }]
            })))
            .mount(&server)
            .await;

        let config = ResearchConfig {
            youtube_api_key: Some("yt".into()),
            ..config(&server)
        };
        let fetcher = fetcher();
        let researcher = Researcher::new(&fetcher, &config, "https://acme.io");
        let results = researcher.youtube("acme").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].detail.engagement(), None);
        assert!((results[0].trust_score - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_reddit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "children": [{ "data": {
                    "title": "Acme vs Other", "permalink": "/r/devops/comments/1/acme/",
                    "selftext": "Thoughts?", "subreddit": "devops", "score": 150, "num_comments": 40
                }}]}
            })))
            .mount(&server)
            .await;

        let config = config(&server);
        let fetcher = fetcher();
        let researcher = Researcher::new(&fetcher, &config, "https://acme.io");
        let results = researcher.reddit("acme").await.unwrap();

        assert_eq!(
            results[0].url,
            format!("{}/r/devops/comments/1/acme/", server.uri())
        );
        assert!((results[0].trust_score - 0.7).abs() < f64::EPSILON);
    }
}
