//! Bounded JSON repair for model output.
//!
//! Model text is tried in three ways, in order:
//!
//! 1. parsed directly
//! 2. parsed from a fenced code block (```` ```json ```` or plain ```` ``` ````)
//! 3. sent back to the model with a "fix this into valid JSON" request, up to
//!    [`RepairBudget::max_attempts`] times
//!
//! If the text already parses, no request is issued.

use crate::Error;
use crate::synthesis::client::{ChatMessage, CompletionClient};
use crate::synthesis::prompts;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

#[allow(clippy::unwrap_used)]
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: Pattern is a compile-time constant
    Regex::new(r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(.*?)```").unwrap()
});

/// How many repair requests a stage may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairBudget {
    /// Repair requests allowed after local parsing fails
    pub max_attempts: u32,
}

impl Default for RepairBudget {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

/// Which route produced the parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairRoute {
    /// The text parsed as-is
    Direct,
    /// A fenced code block parsed
    FencedBlock,
    /// A repair request produced parseable text
    Repaired,
}

/// A successfully parsed value and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Repaired<T> {
    /// The parsed value
    pub value: T,
    /// Route that succeeded
    pub route: RepairRoute,
    /// Repair requests issued (zero unless `route` is `Repaired`)
    pub repair_attempts: u32,
}

/// Terminal failures of the repair protocol.
#[derive(thiserror::Error, Debug)]
pub enum RepairError {
    /// Every repair request returned unparseable text.
    #[error("JSON repair exhausted after {attempts} attempt(s): {last_error}")]
    Exhausted {
        /// Repair requests issued
        attempts: u32,
        /// Parse error from the final attempt
        last_error: String,
    },
    /// A repair request itself failed.
    #[error("JSON repair request failed: {0}")]
    Transport(#[source] Error),
}

/// Parse text as a JSON object.
///
/// # Errors
///
/// Returns a description if the text is not JSON or not an object.
pub fn parse_object(text: &str) -> std::result::Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, found {}", json_kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Contents of every fenced code block in `text`, in order.
#[must_use]
pub fn fenced_blocks(text: &str) -> Vec<&str> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Try direct parsing, then fenced blocks, without any requests.
///
/// # Errors
///
/// Returns the direct-parse error if nothing parses.
pub fn parse_locally<T, P>(text: &str, parse: &P) -> std::result::Result<(T, RepairRoute), String>
where
    P: Fn(&str) -> std::result::Result<T, String>,
{
    let direct_error = match parse(text) {
        Ok(value) => return Ok((value, RepairRoute::Direct)),
        Err(e) => e,
    };

    fenced_blocks(text)
        .into_iter()
        .find_map(|block| parse(block).ok())
        .map(|value| (value, RepairRoute::FencedBlock))
        .ok_or(direct_error)
}

/// Parse model output, escalating to repair requests within `budget`.
///
/// Each repair request carries the original text and the latest parse error.
///
/// # Errors
///
/// [`RepairError::Transport`] if a repair request fails and
/// [`RepairError::Exhausted`] once the budget is spent.
pub async fn parse_with_repair<C, T, P>(
    client: &C,
    raw: &str,
    budget: RepairBudget,
    parse: P,
) -> std::result::Result<Repaired<T>, RepairError>
where
    C: CompletionClient + ?Sized,
    P: Fn(&str) -> std::result::Result<T, String>,
{
    let mut last_error = match parse_locally(raw, &parse) {
        Ok((value, route)) => {
            return Ok(Repaired {
                value,
                route,
                repair_attempts: 0,
            });
        },
        Err(e) => e,
    };

    for attempt in 1..=budget.max_attempts {
        debug!(attempt, error = %last_error, "Requesting JSON repair");
        let messages: Vec<ChatMessage> = prompts::repair(raw, &last_error);
        let repaired = client
            .complete(&messages)
            .await
            .map_err(RepairError::Transport)?;

        match parse_locally(&repaired, &parse) {
            Ok((value, _)) => {
                return Ok(Repaired {
                    value,
                    route: RepairRoute::Repaired,
                    repair_attempts: attempt,
                });
            },
            Err(e) => last_error = e,
        }
    }

    warn!(attempts = budget.max_attempts, error = %last_error, "JSON repair exhausted");
    Err(RepairError::Exhausted {
        attempts: budget.max_attempts,
        last_error,
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use crate::Result;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replies with scripted responses and counts calls.
    struct ScriptedClient {
        responses: Mutex<Vec<Result<String>>>,
        calls: AtomicU32,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().expect("lock poisoned");
            if responses.is_empty() {
                Ok("still not json".to_string())
            } else {
                responses.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn test_valid_json_issues_no_requests() {
        let client = ScriptedClient::new(vec![]);
        let result = parse_with_repair(&client, r#"{"a": 1}"#, RepairBudget::default(), parse_object)
            .await
            .unwrap();
        assert_eq!(result.route, RepairRoute::Direct);
        assert_eq!(result.repair_attempts, 0);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_fenced_block_issues_no_requests() {
        let client = ScriptedClient::new(vec![]);
        let raw = "Here you go:\n```json\n{\"title\": \"Acme\"}\n```\nEnjoy!";
        let result = parse_with_repair(&client, raw, RepairBudget::default(), parse_object)
            .await
            .unwrap();
        assert_eq!(result.route, RepairRoute::FencedBlock);
        assert_eq!(result.value["title"], "Acme");
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_plain_fence() {
        let client = ScriptedClient::new(vec![]);
        let raw = "```\n{\"ok\": true}\n```";
        let result = parse_with_repair(&client, raw, RepairBudget::default(), parse_object)
            .await
            .unwrap();
        assert_eq!(result.route, RepairRoute::FencedBlock);
    }

    #[tokio::test]
    async fn test_repair_succeeds_on_second_attempt() {
        let client = ScriptedClient::new(vec![
            Ok("{broken".to_string()),
            Ok("```json\n{\"fixed\": true}\n```".to_string()),
        ]);
        let result = parse_with_repair(&client, "{title: Acme", RepairBudget::default(), parse_object)
            .await
            .unwrap();
        assert_eq!(result.route, RepairRoute::Repaired);
        assert_eq!(result.repair_attempts, 2);
        assert_eq!(result.value["fixed"], true);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_repair_exhausted() {
        let client = ScriptedClient::new(vec![]);
        let err = parse_with_repair(&client, "nope", RepairBudget { max_attempts: 3 }, parse_object)
            .await
            .unwrap_err();
        match err {
            RepairError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_zero_budget_fails_without_requests() {
        let client = ScriptedClient::new(vec![]);
        let err = parse_with_repair(&client, "nope", RepairBudget { max_attempts: 0 }, parse_object)
            .await
            .unwrap_err();
        assert!(matches!(err, RepairError::Exhausted { attempts: 0, .. }));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_repair_transport_error() {
        let client = ScriptedClient::new(vec![Err(Error::Http {
            url: "https://api.example.com".into(),
            status: 500,
        })]);
        let err = parse_with_repair(&client, "nope", RepairBudget::default(), parse_object)
            .await
            .unwrap_err();
        assert!(matches!(err, RepairError::Transport(Error::Http { status: 500, .. })));
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_parse_object_rejects_non_objects() {
        assert!(parse_object("[1, 2]").unwrap_err().contains("an array"));
        assert!(parse_object("\"text\"").is_err());
        assert!(parse_object("  {\"a\": null}  ").is_ok());
    }

    #[test]
    fn test_fenced_blocks_multiple() {
        let text = "```js\nconsole.log(1)\n```\n```json\n{\"a\":1}\n```";
        let blocks = fenced_blocks(text);
        assert_eq!(blocks.len(), 2);
        let (value, route) = parse_locally(text, &parse_object).unwrap();
        assert_eq!(route, RepairRoute::FencedBlock);
        assert_eq!(value["a"], 1);
    }
}
