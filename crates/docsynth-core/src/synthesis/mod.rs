//! Generative-text synthesis of the final document.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docsynth_core::config::SynthesisConfig;
//! use docsynth_core::synthesis::{Corpus, HttpCompletionClient, SynthesisOrchestrator};
//!
//! # async fn example(corpus: Corpus) -> docsynth_core::Result<()> {
//! let config = SynthesisConfig::default();
//! let client = HttpCompletionClient::new(&config)?;
//! let orchestrator = SynthesisOrchestrator::from_config(client, &config);
//!
//! let document = orchestrator.synthesize(&corpus, true).await?;
//! println!("{} ({} sections)", document.title, document.sections.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod corpus;
pub mod document;
pub mod orchestrator;
pub mod prompts;
pub mod repair;
pub mod stages;
pub mod theme;

pub use client::{ChatMessage, CompletionClient, HttpCompletionClient, Role};
pub use corpus::Corpus;
pub use document::{FinalDocument, ResearchStats, StageOutputs};
pub use orchestrator::{SynthesisOrchestrator, SynthesisState};
pub use repair::{RepairBudget, RepairError, RepairRoute, Repaired, parse_with_repair};
pub use stages::{Citation, ExtractedStructure, FinalMetadata, Section, WrittenDocumentation};
pub use theme::{Theme, derive_theme};
