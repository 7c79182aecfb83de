#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use docsynth_core::config::ProviderEndpoints;
use docsynth_core::storage::{FileDocumentStore, MemoryDocumentStore};
use docsynth_core::synthesis::{ChatMessage, Role};
use docsynth_core::{CompletionClient, Config, Error, Pipeline, Result};
use serde_json::{Value, json};
use std::sync::Mutex;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Answers each stage with a fixed response and records what it was sent.
struct StageClient {
    responses: Mutex<Vec<String>>,
    user_messages: Mutex<Vec<String>>,
}

impl StageClient {
    fn new(responses: &[Value]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(Value::to_string).collect()),
            user_messages: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<String> {
        self.user_messages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionClient for StageClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let user = messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.user_messages.lock().unwrap().push(user);

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(Error::Http {
                url: "mock://completions".into(),
                status: 500,
            });
        }
        Ok(responses.remove(0))
    }
}

fn test_config(provider_base: &str) -> Config {
    let mut config = Config::default();
    config.http.allow_private_hosts = true;
    config.http.timeout_secs = 5;
    config.http.probe_timeout_secs = 2;
    config.crawl.request_interval_ms = 0;
    config.research.endpoints = ProviderEndpoints::all_at(provider_base);
    config
}

fn default_stages() -> Vec<Value> {
    vec![
        json!({ "overview": "A toolkit" }),
        json!({ "title": "Guide", "sections": [{ "title": "Intro", "content": "Hello" }] }),
        json!({ "metadata": { "audience": "developers" } }),
    ]
}

#[tokio::test]
async fn dead_homepage_still_reaches_synthesis_with_empty_corpus() {
    let providers = MockServer::start().await;
    let client = StageClient::new(&default_stages());
    let pipeline = Pipeline::new(
        test_config(&providers.uri()),
        client,
        MemoryDocumentStore::new(),
    )
    .unwrap();

    let outcome = pipeline.run("http://127.0.0.1:9/", Some("user-7")).await.unwrap();

    assert_eq!(outcome.site.product_name, "Unknown Product");
    assert!(outcome.site.is_empty());
    assert_eq!(outcome.pages_attempted, 0);
    assert_eq!(outcome.document.research_stats.pages_extracted, 0);
    assert!(!outcome.document.research_stats.coverage_met);
    assert_eq!(outcome.document.title, "Guide");

    let sent = pipeline.orchestrator().client().sent();
    assert_eq!(sent.len(), 3);
    let corpus: Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(corpus["productName"], "Unknown Product");
    assert_eq!(corpus["pages"], json!([]));

    let stored = pipeline.store().documents().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0.id, outcome.document_id());
    assert_eq!(stored[0].0.user_id.as_deref(), Some("user-7"));
}

#[tokio::test]
async fn synthesis_failure_persists_nothing() {
    let providers = MockServer::start().await;
    // Stage two never produces JSON, even after repair
    let client = StageClient::new(&[
        json!({}),
        json!("not an object"),
        json!("still not"),
        json!("nope"),
    ]);
    let pipeline = Pipeline::new(
        test_config(&providers.uri()),
        client,
        MemoryDocumentStore::new(),
    )
    .unwrap();

    let err = pipeline.run("http://127.0.0.1:9/", None).await.unwrap_err();
    match err {
        Error::Synthesis { stage, .. } => assert_eq!(stage, "writing"),
        other => panic!("expected a synthesis failure, got {other:?}"),
    }
    assert!(pipeline.store().documents().unwrap().is_empty());
}

#[tokio::test]
async fn blocked_url_fails_before_any_request() {
    let client = StageClient::new(&default_stages());
    let pipeline = Pipeline::new(Config::default(), client, MemoryDocumentStore::new()).unwrap();

    let err = pipeline
        .run("http://metadata.google.internal/computeMetadata/v1/", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BlockedUrl { .. }));
    assert!(pipeline.orchestrator().client().sent().is_empty());
}

#[tokio::test]
async fn full_run_writes_cited_document_to_disk() {
    let server = MockServer::start().await;
    let base = server.uri();

    let homepage = r#"<html><head><title>Acme | Build faster</title></head><body>
        <nav><a href="/docs/start">Getting started</a></nav>
        <a href="/about">About</a>
    </body></html>"#;
    let start_page = r#"<html><head><title>Getting started</title></head><body><main>
        <h1>Getting started</h1>
        <p>Install the Acme CLI. Brand color #ff6600.</p>
        <pre><code class="language-bash">npm install -g acme-cli</code></pre>
    </main></body></html>"#;

    for (route, body) in [("/", homepage), ("/docs/start", start_page)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/2.3/search/advanced"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "title": "How do I configure Acme?",
                "link": "https://stackoverflow.com/questions/1/acme",
                "score": 15,
                "view_count": 2000,
                "is_answered": true
            }]
        })))
        .mount(&server)
        .await;

    let client = StageClient::new(&[
        json!({
            "productName": "Acme",
            "citations": [
                format!("{base}/docs/start"),
                "https://stackoverflow.com/questions/1/acme",
                "https://invented.example.com/nowhere"
            ]
        }),
        json!({ "title": "Acme Guide", "sections": [{ "title": "Install", "content": "npm i" }] }),
        json!({ "description": "Everything about Acme", "searchability": { "keywords": ["acme"] } }),
    ]);

    let data_dir = tempdir().unwrap();
    let store = FileDocumentStore::new(data_dir.path());
    let pipeline = Pipeline::new(test_config(&base), client, store).unwrap();

    let outcome = pipeline.run(&base, None).await.unwrap();

    assert_eq!(outcome.site.product_name, "Acme");
    let doc = &outcome.document;
    assert_eq!(doc.title, "Acme Guide");
    assert_eq!(doc.description, "Everything about Acme");
    assert_eq!(doc.research_stats.pages_extracted, 1);
    assert_eq!(doc.research_stats.total_sources, 1);
    assert_eq!(doc.theme.colors, vec!["#ff6600"]);

    let cited: Vec<&str> = doc.citations.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(
        cited,
        vec![
            format!("{base}/docs/start").as_str(),
            "https://stackoverflow.com/questions/1/acme"
        ]
    );

    let corpus: Value = serde_json::from_str(&pipeline.orchestrator().client().sent()[0]).unwrap();
    assert_eq!(corpus["pages"][0]["codeBlocks"][0]["language"], "bash");

    let written = std::fs::read_to_string(pipeline.store().document_path(outcome.document_id())).unwrap();
    let written: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(written["title"], "Acme Guide");
    assert_eq!(written["content"]["researchStats"]["pagesExtracted"], 1);
}
