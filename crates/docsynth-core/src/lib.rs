//! # docsynth-core
//!
//! Core functionality for docsynth. It crawls a product's public website,
//! gathers community knowledge about it and synthesizes structured,
//! citation-backed documentation with a generative-text service.
//!
//! ## Architecture
//!
//! The crate is organized around the stages of a run:
//!
//! - **Discovery**: homepage links, common doc paths and subdomains, sitemaps
//! - **Extraction**: rate-limited page fetches with text, code, image and heading extraction
//! - **Research**: web search, Q&A, issue tracker, video and forum providers, deduplicated and scored
//! - **Synthesis**: a three-stage generative protocol with bounded JSON repair
//! - **Pricing**: a lighter estimate built from discovery and research signals
//!
//! Everything before synthesis degrades instead of failing; see [`soft`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use docsynth_core::storage::MemoryDocumentStore;
//! use docsynth_core::synthesis::HttpCompletionClient;
//! use docsynth_core::{Config, Pipeline};
//!
//! # async fn example() -> docsynth_core::Result<()> {
//! let config = Config::load()?.with_env_overrides();
//! let client = HttpCompletionClient::new(&config.synthesis)?;
//! let pipeline = Pipeline::new(config, client, MemoryDocumentStore::new())?;
//!
//! let outcome = pipeline.run("https://hono.dev", None).await?;
//! println!("{}: {}", outcome.document_id(), outcome.document.title);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]. Only guard, synthesis and
//! storage failures abort a run:
//!
//! ```rust
//! use docsynth_core::url_guard::validate_public_url;
//! use docsynth_core::Error;
//!
//! match validate_public_url("http://169.254.169.254/") {
//!     Err(Error::BlockedUrl { reason, .. }) => eprintln!("blocked: {reason}"),
//!     Err(e) => eprintln!("error: {e}"),
//!     Ok(url) => println!("ok: {url}"),
//! }
//! ```

/// Configuration loading and environment overrides
pub mod config;
/// Site discovery
pub mod discovery;
/// Error types and result aliases
pub mod error;
/// Page content extraction
pub mod extraction;
/// Guarded HTTP fetching and rate limiting
pub mod fetcher;
/// End-to-end runs
pub mod pipeline;
/// Complexity and pricing estimates
pub mod pricing;
/// External research providers and aggregation
pub mod research;
/// Degrade-not-abort combinators
pub mod soft;
/// Document persistence
pub mod storage;
/// Generative-text synthesis
pub mod synthesis;
/// SSRF guard
pub mod url_guard;

// Re-export commonly used types
pub use config::{
    Config, CrawlConfig, HttpConfig, PathsConfig, PricingConfig, ResearchConfig, SynthesisConfig,
};
pub use discovery::{SiteStructure, discover_site, is_doc_like};
pub use error::{Error, Result};
pub use extraction::{ExtractedPage, extract_pages};
pub use fetcher::{FetchedPage, Fetcher, Throttle};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use pricing::{PricingQuote, estimate, price_quote};
pub use research::{ResearchBundle, ResearchResult, research};
pub use soft::{soft_fail, soft_fail_or};
pub use storage::{DocumentStore, FileDocumentStore, MemoryDocumentStore, NewDocument, StoredDocument};
pub use synthesis::{CompletionClient, Corpus, FinalDocument, HttpCompletionClient, SynthesisOrchestrator};
pub use url_guard::{UrlGuard, validate_public_url};
