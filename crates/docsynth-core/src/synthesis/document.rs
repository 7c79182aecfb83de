use crate::discovery::filter::normalize_url;
use crate::synthesis::corpus::Corpus;
use crate::synthesis::stages::{Citation, ExtractedStructure, FinalMetadata, Section, WrittenDocumentation};
use crate::synthesis::theme::{Theme, derive_theme};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// How much material the document was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchStats {
    /// First-party pages in the corpus
    pub pages_extracted: usize,
    /// Whether extraction reached its page target
    pub coverage_met: bool,
    /// Deduplicated research results
    pub total_sources: usize,
    /// Research quality score
    pub quality_score: f64,
    /// Research results per provider
    pub provider_counts: BTreeMap<String, usize>,
    /// Repair requests issued across all stages
    pub repair_attempts: u32,
}

/// The unit persisted at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalDocument {
    /// Document title
    pub title: String,
    /// One-paragraph summary
    pub description: String,
    /// Ordered sections
    pub sections: Vec<Section>,
    /// Audience, difficulty and similar attributes
    pub metadata: Map<String, Value>,
    /// Keywords and search summary
    pub searchability: Map<String, Value>,
    /// Completeness notes
    pub validation: Map<String, Value>,
    /// Colors and fonts seen on the site
    pub theme: Theme,
    /// Stage-one citations whose URL appears in the corpus
    pub citations: Vec<Citation>,
    /// Extraction and research volume behind the document
    pub research_stats: ResearchStats,
}

/// Everything final assembly combines.
#[derive(Debug)]
pub struct StageOutputs {
    /// Stage one
    pub structure: ExtractedStructure,
    /// Stage two
    pub written: WrittenDocumentation,
    /// Stage three
    pub metadata: FinalMetadata,
    /// Repair requests across the three stages
    pub repair_attempts: u32,
}

impl FinalDocument {
    /// Merge stage outputs into the persisted document.
    ///
    /// Stage three wins for title, description and sections when it declares
    /// them (sections only if non-empty); stage two fills the gaps. Citations
    /// that do not point at a corpus URL are dropped.
    #[must_use]
    pub fn assemble(corpus: &Corpus, stages: StageOutputs, coverage_met: bool) -> Self {
        let StageOutputs {
            structure,
            written,
            metadata,
            repair_attempts,
        } = stages;

        let title = metadata
            .title
            .or(written.title)
            .unwrap_or_else(|| format!("{} Documentation", corpus.product_name));
        let description = metadata
            .description
            .or(written.description)
            .or(structure.overview)
            .unwrap_or_default();
        let sections = metadata
            .sections
            .filter(|s| !s.is_empty())
            .or(written.sections)
            .unwrap_or_default();

        let bundle = &corpus.research_bundle;
        Self {
            title,
            description,
            sections,
            metadata: metadata.metadata.unwrap_or_default(),
            searchability: metadata.searchability.unwrap_or_default(),
            validation: metadata.validation.unwrap_or_default(),
            theme: derive_theme(&corpus.pages),
            citations: grounded_citations(corpus, structure.citations.unwrap_or_default()),
            research_stats: ResearchStats {
                pages_extracted: corpus.pages.len(),
                coverage_met,
                total_sources: bundle.total_sources,
                quality_score: bundle.quality_score,
                provider_counts: bundle.provider_counts.clone(),
                repair_attempts,
            },
        }
    }
}

/// Keep citations whose normalized URL is a corpus page or research result.
///
/// Kept citations carry the corpus spelling of the URL, never the model's.
fn grounded_citations(corpus: &Corpus, citations: Vec<Citation>) -> Vec<Citation> {
    let mut known: HashMap<String, &str> = HashMap::new();
    for url in corpus
        .pages
        .iter()
        .map(|p| p.url.as_str())
        .chain(corpus.research_bundle.results.iter().map(|r| r.url.as_str()))
    {
        if let Some(key) = normalize_url(url) {
            known.entry(key).or_insert(url);
        }
    }

    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter_map(|mut citation| {
            let key = normalize_url(&citation.url)?;
            let corpus_url = known.get(&key)?;
            if !seen.insert(key) {
                return None;
            }
            citation.url = (*corpus_url).to_string();
            Some(citation)
        })
        .collect()
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
    use crate::extraction::ExtractedPage;
    use crate::research::{Provider, ResearchBundle, ResearchResult, ResultDetail};
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn corpus() -> Corpus {
        Corpus {
            product_name: "Acme".into(),
            base_url: "https://acme.io".into(),
            pages: vec![ExtractedPage {
                url: "https://acme.io/docs/start".into(),
                title: "Start".into(),
                content: "Brand color #336699".into(),
                excerpt: String::new(),
                code_blocks: vec![],
                images: vec![],
                headings: vec![],
                word_count: 3,
            }],
            research_bundle: ResearchBundle {
                results: vec![ResearchResult {
                    url: "https://stackoverflow.com/q/1".into(),
                    title: "Q".into(),
                    snippet: String::new(),
                    source: Provider::StackOverflow,
                    trust_score: 0.75,
                    detail: ResultDetail::Search { first_party: false },
                }],
                quality_score: 0.5,
                total_sources: 1,
                provider_counts: BTreeMap::from([("stackoverflow".to_string(), 1)]),
            },
        }
    }

    fn outputs(structure: Value, written: Value, metadata: Value) -> StageOutputs {
        StageOutputs {
            structure: ExtractedStructure::from_map(object(structure)),
            written: WrittenDocumentation::from_map(object(written)),
            metadata: FinalMetadata::from_map(object(metadata)),
            repair_attempts: 1,
        }
    }

    #[test]
    fn test_metadata_sections_take_precedence() {
        let doc = FinalDocument::assemble(
            &corpus(),
            outputs(
                json!({}),
                json!({"title": "Written", "sections": [{"title": "A"}]}),
                json!({"title": "Final", "sections": [{"title": "B"}, {"title": "C"}]}),
            ),
            false,
        );
        assert_eq!(doc.title, "Final");
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].title.as_deref(), Some("B"));
    }

    #[test]
    fn test_empty_metadata_sections_fall_back() {
        let doc = FinalDocument::assemble(
            &corpus(),
            outputs(
                json!({"overview": "An API toolkit"}),
                json!({"sections": [{"title": "A"}]}),
                json!({"sections": []}),
            ),
            true,
        );
        assert_eq!(doc.title, "Acme Documentation");
        assert_eq!(doc.description, "An API toolkit");
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title.as_deref(), Some("A"));
    }

    #[test]
    fn test_citations_subset_of_corpus() {
        let doc = FinalDocument::assemble(
            &corpus(),
            outputs(
                json!({"citations": [
                    "https://acme.io/docs/start/",
                    "https://www.acme.io/docs/start#intro",
                    {"url": "https://stackoverflow.com/q/1", "source": "stackoverflow"},
                    "https://made-up.example.com/page"
                ]}),
                json!({}),
                json!({}),
            ),
            false,
        );
        let urls: Vec<&str> = doc.citations.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://acme.io/docs/start", "https://stackoverflow.com/q/1"]
        );
        assert_eq!(doc.citations[1].source.as_deref(), Some("stackoverflow"));
    }

    #[test]
    fn test_cited_urls_are_corpus_urls_verbatim() {
        let doc = FinalDocument::assemble(
            &corpus(),
            outputs(
                json!({"citations": ["https://WWW.acme.io/docs/start/#x"]}),
                json!({}),
                json!({}),
            ),
            true,
        );
        let corpus = corpus();
        let corpus_urls: Vec<&str> = corpus
            .pages
            .iter()
            .map(|p| p.url.as_str())
            .chain(corpus.research_bundle.results.iter().map(|r| r.url.as_str()))
            .collect();
        assert_eq!(doc.citations.len(), 1);
        for citation in &doc.citations {
            assert!(corpus_urls.contains(&citation.url.as_str()), "{}", citation.url);
        }
    }

    #[test]
    fn test_stats_and_theme() {
        let doc = FinalDocument::assemble(&corpus(), outputs(json!({}), json!({}), json!({})), true);
        assert_eq!(doc.research_stats.pages_extracted, 1);
        assert!(doc.research_stats.coverage_met);
        assert_eq!(doc.research_stats.total_sources, 1);
        assert_eq!(doc.research_stats.repair_attempts, 1);
        assert_eq!(doc.theme.colors, vec!["#336699"]);
        assert!(doc.metadata.is_empty());

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["researchStats"]["providerCounts"]["stackoverflow"], 1);
    }
}
