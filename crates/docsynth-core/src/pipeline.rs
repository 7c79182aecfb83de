//! End-to-end documentation run.
//!
//! ```text
//! discover ──> extract ──┐
//!        └───> research ─┴─> synthesize ──> persist
//! ```
//!
//! Extraction and research run concurrently. Everything before synthesis
//! degrades instead of failing, so a dead homepage still reaches synthesis
//! with an empty corpus. Only a blocked URL, a synthesis failure or a
//! storage failure ends a run early, and nothing is persisted in that case.

use crate::config::Config;
use crate::discovery::{SiteStructure, UNKNOWN_PRODUCT, discover_site};
use crate::extraction::extract_pages;
use crate::fetcher::Fetcher;
use crate::research::research;
use crate::storage::{DocumentStore, NewDocument, StoredDocument};
use crate::synthesis::{CompletionClient, Corpus, FinalDocument, SynthesisOrchestrator};
use crate::{Error, Result};
use tracing::{info, instrument, warn};
use url::Url;

/// Result of a successful run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// What the store recorded
    pub stored: StoredDocument,
    /// The persisted document
    pub document: FinalDocument,
    /// What discovery found
    pub site: SiteStructure,
    /// Pages fetched during extraction
    pub pages_attempted: usize,
    /// Pages that failed or were not HTML
    pub pages_skipped: usize,
}

impl PipelineOutcome {
    /// Identifier assigned by the store.
    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.stored.id
    }
}

/// Wires discovery, extraction, research, synthesis and storage together.
pub struct Pipeline<C: CompletionClient, S: DocumentStore> {
    config: Config,
    fetcher: Fetcher,
    orchestrator: SynthesisOrchestrator<C>,
    store: S,
}

impl<C: CompletionClient, S: DocumentStore> Pipeline<C, S> {
    /// Build a pipeline whose fetcher follows `config.http`.
    pub fn new(config: Config, client: C, store: S) -> Result<Self> {
        let fetcher = Fetcher::new(&config.http)?;
        Ok(Self::with_fetcher(config, fetcher, client, store))
    }

    /// Build a pipeline around an existing fetcher.
    pub fn with_fetcher(config: Config, fetcher: Fetcher, client: C, store: S) -> Self {
        let orchestrator = SynthesisOrchestrator::from_config(client, &config.synthesis);
        Self {
            config,
            fetcher,
            orchestrator,
            store,
        }
    }

    /// The document store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The synthesis orchestrator.
    pub const fn orchestrator(&self) -> &SynthesisOrchestrator<C> {
        &self.orchestrator
    }

    /// Run the whole pipeline for `url` and persist the result once.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] / [`Error::BlockedUrl`] if the URL fails the guard
    /// - [`Error::Synthesis`] naming the failed stage
    /// - [`Error::Storage`] if the document cannot be persisted
    #[instrument(skip_all, fields(url = %url))]
    pub async fn run(&self, url: &str, user_id: Option<&str>) -> Result<PipelineOutcome> {
        let site = discover_site(&self.fetcher, url, &self.config.crawl).await?;
        let candidates = site.candidate_urls();
        let query = research_query(&site);

        let (extraction, bundle) = tokio::join!(
            extract_pages(&self.fetcher, &candidates, &self.config.crawl),
            research(&self.fetcher, &self.config.research, &query, &site.base_url),
        );

        let coverage_met = extraction.coverage_met(self.config.crawl.min_pages);
        if !coverage_met {
            warn!(
                pages = extraction.pages.len(),
                target = self.config.crawl.min_pages,
                "Coverage target not met; synthesizing from what was extracted"
            );
        }

        let corpus = Corpus {
            product_name: site.product_name.clone(),
            base_url: site.base_url.clone(),
            pages: extraction.pages,
            research_bundle: bundle,
        };
        let document = self.orchestrator.synthesize(&corpus, coverage_met).await?;

        let content = serde_json::to_value(&document)
            .map_err(|e| Error::Storage(format!("Failed to serialize document: {e}")))?;
        let stored = self
            .store
            .create_document(NewDocument {
                url: site.base_url.clone(),
                title: document.title.clone(),
                content,
                user_id: user_id.map(str::to_string),
            })
            .await?;

        info!(id = %stored.id, title = %document.title, "Documentation generated");
        Ok(PipelineOutcome {
            stored,
            document,
            site,
            pages_attempted: extraction.attempted,
            pages_skipped: extraction.skipped,
        })
    }
}

/// Product name for research queries; the host stands in for an unknown name.
fn research_query(site: &SiteStructure) -> String {
    if site.product_name != UNKNOWN_PRODUCT {
        return site.product_name.clone();
    }
    Url::parse(&site.base_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| site.product_name.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;

    #[test]
    fn test_research_query_falls_back_to_host() {
        let mut site = SiteStructure::degraded("https://www.acme.io/");
        assert_eq!(research_query(&site), "acme.io");
        site.product_name = "Acme".into();
        assert_eq!(research_query(&site), "Acme");
    }
}
