//! Generative-text client.
//!
//! The orchestrator talks to the model through [`CompletionClient`] so tests
//! can substitute a scripted implementation.

use crate::config::SynthesisConfig;
use crate::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fixed role instruction
    System,
    /// Request content
    User,
}

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// A system instruction.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// A user request.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Trait for generative-text backends (allows mocking in tests).
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send messages and return the raw text of the first choice.
    ///
    /// Implementations request strict JSON output, but the returned text is
    /// not guaranteed to parse.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl HttpCompletionClient {
    /// Build a client from synthesis settings.
    ///
    /// A missing API key is reported on the first request rather than here,
    /// so commands that never synthesize still work unconfigured.
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait::async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(Error::MissingCredential {
                provider: "llm".to_string(),
            });
        };

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Parse("completion response had no message content".into()))?;

        debug!(chars = content.len(), "Received completion");
        Ok(content)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompletionMessage {
    content: Option<String>,
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
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, key: Option<&str>) -> SynthesisConfig {
        SynthesisConfig {
            api_base: format!("{}/v1", server.uri()),
            api_key: key.map(str::to_string),
            ..SynthesisConfig::default()
        }
    }

    #[tokio::test]
    async fn test_complete_sends_strict_json_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "response_format": { "type": "json_object" },
                "messages": [{ "role": "system", "content": "be terse" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "{\"ok\":true}" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(&config(&server, Some("sk-test"))).unwrap();
        let text = client
            .complete(&[ChatMessage::system("be terse")])
            .await
            .unwrap();
        assert_eq!(text, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_complete_non_2xx_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(&config(&server, Some("k"))).unwrap();
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_complete_requires_key() {
        let server = MockServer::start().await;
        let client = HttpCompletionClient::new(&config(&server, Some("  "))).unwrap();
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::MissingCredential { .. }));
    }

    #[tokio::test]
    async fn test_complete_missing_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(&config(&server, Some("k"))).unwrap();
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
