use crate::Result;
use crate::extraction::ExtractedPage;
use crate::research::ResearchBundle;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything the first synthesis stage sees.
///
/// Built once per run and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Corpus {
    /// Product name from discovery
    pub product_name: String,
    /// Site the run started from
    pub base_url: String,
    /// Extracted first-party pages in candidate order
    pub pages: Vec<ExtractedPage>,
    /// Third-party research
    pub research_bundle: ResearchBundle,
}

impl Corpus {
    /// Whether there is nothing to synthesize from besides the product name.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.research_bundle.is_empty()
    }

    /// A copy that serializes to at most `max_chars`, where possible.
    ///
    /// Pages are kept in order until the budget runs out. Research results
    /// are only dropped (from the end) once no page fits at all.
    pub fn within_budget(&self, max_chars: usize) -> Result<Self> {
        let mut trimmed = Self {
            pages: Vec::new(),
            research_bundle: ResearchBundle {
                results: Vec::new(),
                ..self.research_bundle.clone()
            },
            ..self.clone()
        };
        let mut used = serde_json::to_string(&trimmed)?.len();

        let research_lens = item_lengths(&self.research_bundle.results)?;
        let research_total: usize = research_lens.iter().sum();

        if used + research_total <= max_chars {
            trimmed.research_bundle.results = self.research_bundle.results.clone();
            used += research_total;
        } else {
            for (result, len) in self.research_bundle.results.iter().zip(research_lens) {
                if used + len > max_chars {
                    break;
                }
                used += len;
                trimmed.research_bundle.results.push(result.clone());
            }
        }

        for (page, len) in self.pages.iter().zip(item_lengths(&self.pages)?) {
            if used + len > max_chars {
                break;
            }
            used += len;
            trimmed.pages.push(page.clone());
        }

        if trimmed.pages.len() < self.pages.len()
            || trimmed.research_bundle.results.len() < self.research_bundle.results.len()
        {
            debug!(
                pages = trimmed.pages.len(),
                dropped_pages = self.pages.len() - trimmed.pages.len(),
                research = trimmed.research_bundle.results.len(),
                max_chars,
                "Corpus trimmed to prompt budget"
            );
        }
        Ok(trimmed)
    }

    /// Serialize for the structure stage, bounded by `max_chars`.
    pub fn to_prompt_json(&self, max_chars: usize) -> Result<String> {
        Ok(serde_json::to_string(&self.within_budget(max_chars)?)?)
    }
}

/// Serialized length of each item plus its separating comma.
fn item_lengths<T: Serialize>(items: &[T]) -> Result<Vec<usize>> {
    items
        .iter()
        .map(|item| Ok(serde_json::to_string(item)?.len() + 1))
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
    use crate::research::{Provider, ResearchResult, ResultDetail};

    fn page(n: usize, body_len: usize) -> ExtractedPage {
        ExtractedPage {
            url: format!("https://acme.io/docs/{n}"),
            title: format!("Page {n}"),
            content: "x".repeat(body_len),
            excerpt: String::new(),
            code_blocks: vec![],
            images: vec![],
            headings: vec![],
            word_count: 1,
        }
    }

    fn result(n: usize) -> ResearchResult {
        ResearchResult {
            url: format!("https://stackoverflow.com/q/{n}"),
            title: "Q".into(),
            snippet: "s".repeat(50),
            source: Provider::StackOverflow,
            trust_score: 0.6,
            detail: ResultDetail::Search { first_party: false },
        }
    }

    fn corpus(pages: usize, results: usize) -> Corpus {
        Corpus {
            product_name: "Acme".into(),
            base_url: "https://acme.io".into(),
            pages: (0..pages).map(|n| page(n, 1_000)).collect(),
            research_bundle: ResearchBundle {
                results: (0..results).map(result).collect(),
                ..ResearchBundle::default()
            },
        }
    }

    #[test]
    fn test_fits_unchanged() {
        let c = corpus(3, 2);
        assert_eq!(c.within_budget(1_000_000).unwrap(), c);
    }

    #[test]
    fn test_pages_trimmed_before_research() {
        let c = corpus(10, 3);
        let trimmed = c.within_budget(3_500).unwrap();
        assert_eq!(trimmed.research_bundle.results.len(), 3);
        assert!(trimmed.pages.len() < 10);
        assert!(!trimmed.pages.is_empty());
        assert_eq!(trimmed.pages[0].url, "https://acme.io/docs/0");
        assert!(trimmed.to_prompt_json(3_500).unwrap().len() <= 3_500);
    }

    #[test]
    fn test_research_trimmed_last() {
        let c = corpus(2, 20);
        let trimmed = c.within_budget(800).unwrap();
        assert!(trimmed.pages.is_empty());
        assert!(trimmed.research_bundle.results.len() < 20);
        assert!(c.to_prompt_json(800).unwrap().len() <= 800);
    }

    #[test]
    fn test_empty_corpus() {
        let c = corpus(0, 0);
        assert!(c.is_empty());
        let json = c.to_prompt_json(10_000).unwrap();
        assert!(json.contains("\"productName\":\"Acme\""));
        assert!(json.contains("\"pages\":[]"));
    }
}
