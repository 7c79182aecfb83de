//! Three-stage synthesis driver.
//!
//! ```text
//! StructureExtraction -> Writing -> Metadata -> Done
//! ```
//!
//! Each stage sends one request. The response must parse as a JSON object,
//! directly, from a fenced block, or after bounded repair requests
//! ([`parse_with_repair`]). A non-2xx response or an exhausted repair budget
//! fails the run with [`Error::Synthesis`] naming the stage; no partial
//! output escapes.

use crate::config::SynthesisConfig;
use crate::synthesis::client::{ChatMessage, CompletionClient};
use crate::synthesis::corpus::Corpus;
use crate::synthesis::document::{FinalDocument, StageOutputs};
use crate::synthesis::prompts;
use crate::synthesis::repair::{RepairBudget, parse_object, parse_with_repair};
use crate::synthesis::stages::{
    ExtractedStructure, FinalMetadata, WrittenDocumentation, to_prompt_json,
};
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{info, instrument, warn};

/// Position in the synthesis protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthesisState {
    /// Corpus to documentation structure
    StructureExtraction,
    /// Structure to written sections
    Writing,
    /// Written sections to publication metadata
    Metadata,
    /// All stages succeeded
    Done,
}

impl SynthesisState {
    /// Stable name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StructureExtraction => "structure_extraction",
            Self::Writing => "writing",
            Self::Metadata => "metadata",
            Self::Done => "done",
        }
    }

    /// The state after a successful stage. `Done` is terminal.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::StructureExtraction => Self::Writing,
            Self::Writing => Self::Metadata,
            Self::Metadata | Self::Done => Self::Done,
        }
    }
}

impl fmt::Display for SynthesisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs the three synthesis stages against a [`CompletionClient`].
pub struct SynthesisOrchestrator<C: CompletionClient> {
    client: C,
    budget: RepairBudget,
    max_prompt_chars: usize,
}

impl<C: CompletionClient> SynthesisOrchestrator<C> {
    /// Create an orchestrator with the default repair budget and prompt size.
    pub fn new(client: C) -> Self {
        let defaults = SynthesisConfig::default();
        Self {
            client,
            budget: RepairBudget {
                max_attempts: defaults.max_repair_attempts,
            },
            max_prompt_chars: defaults.max_prompt_chars,
        }
    }

    /// Create an orchestrator using the limits in `config`.
    pub fn from_config(client: C, config: &SynthesisConfig) -> Self {
        Self::new(client)
            .with_budget(RepairBudget {
                max_attempts: config.max_repair_attempts,
            })
            .with_max_prompt_chars(config.max_prompt_chars)
    }

    /// Set the per-stage repair budget.
    #[must_use]
    pub const fn with_budget(mut self, budget: RepairBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the upper bound on the serialized corpus.
    #[must_use]
    pub const fn with_max_prompt_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars;
        self
    }

    /// The underlying client.
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Run all three stages and assemble the document.
    ///
    /// `coverage_met` is recorded in the document's research stats.
    #[instrument(skip_all, fields(product = %corpus.product_name, pages = corpus.pages.len()))]
    pub async fn synthesize(&self, corpus: &Corpus, coverage_met: bool) -> Result<FinalDocument> {
        let mut repairs = 0;

        let corpus_json = corpus.to_prompt_json(self.max_prompt_chars)?;
        let structure = ExtractedStructure::from_map(
            self.run_stage(
                SynthesisState::StructureExtraction,
                prompts::structure(&corpus_json),
                &mut repairs,
            )
            .await?,
        );

        let written = WrittenDocumentation::from_map(
            self.run_stage(
                SynthesisState::Writing,
                prompts::writing(&to_prompt_json(&structure)?),
                &mut repairs,
            )
            .await?,
        );

        let metadata = FinalMetadata::from_map(
            self.run_stage(
                SynthesisState::Metadata,
                prompts::metadata(&to_prompt_json(&written)?),
                &mut repairs,
            )
            .await?,
        );

        info!(state = %SynthesisState::Done, repairs, "Synthesis complete");
        Ok(FinalDocument::assemble(
            corpus,
            StageOutputs {
                structure,
                written,
                metadata,
                repair_attempts: repairs,
            },
            coverage_met,
        ))
    }

    async fn run_stage(
        &self,
        state: SynthesisState,
        messages: Vec<ChatMessage>,
        repairs: &mut u32,
    ) -> Result<Map<String, Value>> {
        info!(stage = %state, "Starting synthesis stage");

        let raw = self
            .client
            .complete(&messages)
            .await
            .map_err(|e| stage_error(state, &e))?;

        let parsed = parse_with_repair(&self.client, &raw, self.budget, parse_object)
            .await
            .map_err(|e| stage_error(state, &e))?;

        if parsed.repair_attempts > 0 {
            warn!(stage = %state, attempts = parsed.repair_attempts, "Stage output needed JSON repair");
        }
        *repairs += parsed.repair_attempts;
        Ok(parsed.value)
    }
}

fn stage_error(state: SynthesisState, cause: &dyn std::error::Error) -> Error {
    Error::Synthesis {
        stage: state.name().to_string(),
        reason: cause.to_string(),
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
    use crate::synthesis::client::Role;
    use std::sync::Mutex;

    /// Replies with scripted responses and records every request.
    struct MockClient {
        responses: Mutex<Vec<Result<String>>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl MockClient {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn user_content(&self, index: usize) -> String {
            let requests = self.requests.lock().unwrap();
            requests[index]
                .iter()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap()
        }
    }

    #[async_trait::async_trait]
    impl CompletionClient for MockClient {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.requests.lock().unwrap().push(messages.to_vec());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("unexpected completion request");
            }
            responses.remove(0)
        }
    }

    fn corpus() -> Corpus {
        Corpus {
            product_name: "Acme".into(),
            base_url: "https://acme.io".into(),
            ..Corpus::default()
        }
    }

    #[test]
    fn test_state_transitions() {
        let mut state = SynthesisState::StructureExtraction;
        let mut visited = vec![state];
        while state != SynthesisState::Done {
            state = state.next();
            visited.push(state);
        }
        assert_eq!(
            visited,
            vec![
                SynthesisState::StructureExtraction,
                SynthesisState::Writing,
                SynthesisState::Metadata,
                SynthesisState::Done
            ]
        );
        assert_eq!(SynthesisState::Done.next(), SynthesisState::Done);
    }

    #[tokio::test]
    async fn test_three_stages_chain_outputs() {
        let client = MockClient::new(vec![
            Ok(r#"{"productName": "Acme", "topics": ["install"], "tone": "friendly"}"#.into()),
            Ok(r#"{"title": "Acme Guide", "sections": [{"title": "Install", "content": "..."}]}"#.into()),
            Ok(r#"{"metadata": {"difficulty": "beginner"}}"#.into()),
        ]);
        let orchestrator = SynthesisOrchestrator::new(client);
        let doc = orchestrator.synthesize(&corpus(), false).await.unwrap();

        assert_eq!(doc.title, "Acme Guide");
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.metadata["difficulty"], "beginner");
        assert_eq!(doc.research_stats.repair_attempts, 0);

        let client = orchestrator.client();
        assert_eq!(client.request_count(), 3);
        // Stage one output, including unknown keys, reaches stage two
        let writing_input: Value = serde_json::from_str(&client.user_content(1)).unwrap();
        assert_eq!(writing_input["tone"], "friendly");
        assert_eq!(writing_input["topics"][0], "install");
        let metadata_input: Value = serde_json::from_str(&client.user_content(2)).unwrap();
        assert_eq!(metadata_input["title"], "Acme Guide");
    }

    #[tokio::test]
    async fn test_stage_repair_counts_toward_stats() {
        let client = MockClient::new(vec![
            Ok("```json\n{\"overview\": \"x\"}\n```".into()),
            Ok("{title: broken".into()),
            Ok(r#"{"title": "Fixed"}"#.into()),
            Ok("{}".into()),
        ]);
        let orchestrator = SynthesisOrchestrator::new(client);
        let doc = orchestrator.synthesize(&corpus(), true).await.unwrap();
        assert_eq!(doc.title, "Fixed");
        assert_eq!(doc.research_stats.repair_attempts, 1);
        assert_eq!(orchestrator.client().request_count(), 4);
    }

    #[tokio::test]
    async fn test_exhausted_repair_fails_with_stage() {
        let client = MockClient::new(vec![
            Ok("{}".into()),
            Ok("not json".into()),
            Ok("still not".into()),
            Ok("nope".into()),
        ]);
        let orchestrator = SynthesisOrchestrator::new(client);
        let err = orchestrator.synthesize(&corpus(), false).await.unwrap_err();
        match err {
            Error::Synthesis { stage, reason } => {
                assert_eq!(stage, "writing");
                assert!(reason.contains("exhausted"));
            },
            other => panic!("expected synthesis error, got {other:?}"),
        }
        assert_eq!(orchestrator.client().request_count(), 4);
    }

    #[tokio::test]
    async fn test_transport_failure_is_immediate() {
        let client = MockClient::new(vec![Err(Error::Http {
            url: "https://llm.example.com/v1/chat/completions".into(),
            status: 502,
        })]);
        let orchestrator = SynthesisOrchestrator::new(client);
        let err = orchestrator.synthesize(&corpus(), false).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Synthesis { ref stage, .. } if stage == "structure_extraction"
        ));
        assert_eq!(orchestrator.client().request_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_budget() {
        let client = MockClient::new(vec![Ok("oops".into())]);
        let orchestrator =
            SynthesisOrchestrator::new(client).with_budget(RepairBudget { max_attempts: 0 });
        assert!(orchestrator.synthesize(&corpus(), false).await.is_err());
        assert_eq!(orchestrator.client().request_count(), 1);
    }
}
