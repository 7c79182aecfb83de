//! Guarded HTTP fetching.
//!
//! Every request URL, including each redirect hop, passes the [`UrlGuard`]
//! before it leaves the process. [`Throttle`] spaces out crawl requests.

use crate::config::HttpConfig;
use crate::url_guard::UrlGuard;
use crate::{Error, Result};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const MAX_REDIRECTS: usize = 5;

/// HTTP client for page fetches, existence probes and provider API calls.
///
/// Every outgoing request is checked by the configured [`UrlGuard`] before it
/// is sent, so no component can reach a blocked host by accident.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    probe_client: Client,
    guard: UrlGuard,
}

impl Fetcher {
    /// Creates a fetcher from HTTP settings.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let guard = UrlGuard::from_flag(config.allow_private_hosts);
        let client = Self::build_client(config, config.timeout(), guard)?;
        let probe_client = Self::build_client(config, config.probe_timeout(), guard)?;
        Ok(Self {
            client,
            probe_client,
            guard,
        })
    }

    /// Creates a fetcher with a custom timeout for every request (primarily for tests)
    pub fn with_timeout(timeout: Duration, guard: UrlGuard) -> Result<Self> {
        let config = HttpConfig::default();
        let client = Self::build_client(&config, timeout, guard)?;
        Ok(Self {
            probe_client: client.clone(),
            client,
            guard,
        })
    }

    fn build_client(config: &HttpConfig, timeout: Duration, guard: UrlGuard) -> Result<Client> {
        // Redirect targets are re-checked so a public page cannot bounce us inward
        let redirect = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.stop()
            } else if guard.check(attempt.url().as_str()).is_err() {
                attempt.error("redirect target blocked by URL guard")
            } else {
                attempt.follow()
            }
        });

        Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .redirect(redirect)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)
    }

    /// The URL policy applied to every request.
    #[must_use]
    pub const fn guard(&self) -> UrlGuard {
        self.guard
    }

    /// Fetches a page with browser-like headers and the page timeout.
    ///
    /// Non-2xx responses are returned as [`Error::Http`].
    pub async fn get_page(&self, url: &str) -> Result<FetchedPage> {
        self.get_with(&self.client, url).await
    }

    /// Fetches a small resource (sitemap, homepage probe) with the probe timeout.
    pub async fn get_quick(&self, url: &str) -> Result<FetchedPage> {
        self.get_with(&self.probe_client, url).await
    }

    async fn get_with(&self, client: &Client, url: &str) -> Result<FetchedPage> {
        let checked = self.guard.check(url)?;
        let response = client
            .get(checked)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;
        let response = ensure_success(response)?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        let body = response.text().await?;

        debug!(url = %final_url, bytes = body.len(), "Fetched page");

        Ok(FetchedPage {
            url: final_url,
            status,
            content_type,
            body,
        })
    }

    /// Checks whether a URL exists.
    ///
    /// Tries HEAD first to save bandwidth, then GET for servers that reject
    /// HEAD. Any 2xx on either request counts as "exists". Guard rejections
    /// and transport failures count as "does not exist".
    pub async fn exists(&self, url: &str) -> bool {
        let Ok(checked) = self.guard.check(url) else {
            return false;
        };

        let head_ok = self
            .probe_client
            .head(checked.clone())
            .send()
            .await
            .is_ok_and(|r| r.status().is_success());
        if head_ok {
            return true;
        }

        self.probe_client
            .get(checked)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    /// Starts a guarded request for provider API calls.
    pub fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let checked = self.guard.check(url)?;
        Ok(self.client.request(method, checked))
    }

    /// Sends a request and decodes a JSON body, mapping non-2xx to [`Error::Http`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = ensure_success(request.send().await?)?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Parse(format!("invalid JSON body: {e}")))
    }
}

fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::Http {
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Lowercased `Content-Type` header, if present
    pub content_type: Option<String>,
    /// Response body as text
    pub body: String,
}

impl FetchedPage {
    /// Whether the body looks like HTML.
    ///
    /// Pages without a content type are sniffed for an `<html` or `<body` tag.
    #[must_use]
    pub fn is_html(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => ct.contains("html"),
            None => {
                let head: String = self.body.chars().take(1024).collect::<String>().to_lowercase();
                head.contains("<html") || head.contains("<body") || head.contains("<!doctype html")
            },
        }
    }
}

/// Minimum-interval rate limiter.
///
/// Callers await [`Throttle::wait`] before each request; consecutive calls are
/// spaced at least `interval` apart. The first call never waits.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create a throttle with the given minimum spacing.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Spacing between requests.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next request slot.
    pub async fn wait(&self) {
        let mut next = self.next_slot.lock().await;
        if let Some(at) = *next {
            if at > Instant::now() {
                tokio::time::sleep_until(at).await;
            }
        }
        *next = Some(Instant::now() + self.interval);
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::match_wildcard_for_single_variants
)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header_exists, method, path},
    };

    fn test_fetcher() -> Fetcher {
        Fetcher::with_timeout(Duration::from_secs(5), UrlGuard::AllowPrivate).unwrap()
    }

    #[tokio::test]
    async fn test_fetcher_creation() {
        assert!(Fetcher::new(&HttpConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_get_page_returns_body_and_content_type() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs"))
            .and(header_exists("user-agent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html><body>hi</body></html>"),
            )
            .mount(&server)
            .await;

        let page = test_fetcher()
            .get_page(&format!("{}/docs", server.uri()))
            .await?;
        assert_eq!(page.status, 200);
        assert!(page.is_html());
        assert!(page.body.contains("hi"));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_page_maps_non_2xx() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = test_fetcher()
            .get_page(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        match err {
            Error::Http { status, .. } => assert_eq!(status, 404),
            other => panic!("expected Http error, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_guard_blocks_before_network() {
        let fetcher = Fetcher::with_timeout(Duration::from_secs(5), UrlGuard::PublicOnly).unwrap();
        let err = fetcher.get_page("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, Error::BlockedUrl { .. }));
        assert!(!fetcher.exists("http://10.0.0.5/").await);
    }

    #[tokio::test]
    async fn test_exists_head_success() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/docs"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(test_fetcher().exists(&format!("{}/docs", server.uri())).await);
    }

    #[tokio::test]
    async fn test_exists_falls_back_to_get() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/help"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/help"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(test_fetcher().exists(&format!("{}/help", server.uri())).await);
    }

    #[tokio::test]
    async fn test_exists_false_when_both_fail() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(!test_fetcher().exists(&format!("{}/nope", server.uri())).await);
    }

    #[tokio::test]
    async fn test_send_json_decodes() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"n": 3}"#))
            .mount(&server)
            .await;

        let fetcher = test_fetcher();
        let request = fetcher.request(Method::GET, &format!("{}/api", server.uri()))?;
        let value: serde_json::Value = fetcher.send_json(request).await?;
        assert_eq!(value["n"], 3);
        Ok(())
    }

    #[test]
    fn test_is_html_sniffing() {
        let page = FetchedPage {
            url: "https://example.com".into(),
            status: 200,
            content_type: None,
            body: "<!DOCTYPE html><html></html>".into(),
        };
        assert!(page.is_html());

        let page = FetchedPage {
            content_type: Some("application/pdf".into()),
            ..page
        };
        assert!(!page.is_html());
    }

    #[tokio::test]
    async fn test_throttle_spaces_requests() {
        let throttle = Throttle::new(Duration::from_millis(40));
        let start = std::time::Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_throttle_first_call_is_immediate() {
        let throttle = Throttle::new(Duration::from_secs(10));
        let start = std::time::Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
