use crate::config::Band;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A research provider, listed in priority order.
///
/// When two providers return the same URL, the earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Primary web search
    Serper,
    /// Fallback web search
    Brave,
    /// Q&A
    StackOverflow,
    /// Issue tracker
    Github,
    /// Video
    Youtube,
    /// Discussion forum
    Reddit,
}

impl Provider {
    /// Stable identifier used in logs and `provider_counts`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serper => "serper",
            Self::Brave => "brave",
            Self::StackOverflow => "stackoverflow",
            Self::Github => "github",
            Self::Youtube => "youtube",
            Self::Reddit => "reddit",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific fields of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ResultDetail {
    /// A general web search hit.
    Search {
        /// Whether the hit is on the product's own site
        first_party: bool,
    },
    /// A Q&A question.
    Answer {
        /// Question score (votes)
        score: i64,
        /// Times viewed
        view_count: u64,
        /// Number of answers
        answer_count: u64,
        /// Whether an answer was accepted
        is_answered: bool,
    },
    /// An issue-tracker thread.
    Issue {
        /// `open` or `closed`
        state: String,
        /// Comment count
        comments: u64,
        /// Total reactions
        reactions: u64,
    },
    /// A video.
    Video {
        /// Channel name
        channel: String,
        /// View count, when statistics were available
        #[serde(skip_serializing_if = "Option::is_none")]
        view_count: Option<u64>,
    },
    /// A forum discussion.
    Discussion {
        /// Community name
        community: String,
        /// Post score
        score: i64,
        /// Comment count
        comments: u64,
    },
}

impl ResultDetail {
    /// Engagement metric used for quality scoring, if the kind reports one.
    ///
    /// Views for Q&A and video, comments plus reactions for issues, score
    /// plus comments for discussions.
    #[must_use]
    pub fn engagement(&self) -> Option<u64> {
        match self {
            Self::Search { .. } => None,
            Self::Answer { view_count, .. } => Some(*view_count),
            Self::Issue {
                comments,
                reactions,
                ..
            } => Some(comments + reactions),
            Self::Video { view_count, .. } => *view_count,
            Self::Discussion {
                score, comments, ..
            } => Some(u64::try_from(*score).unwrap_or(0) + comments),
        }
    }
}

/// One third-party source about the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResult {
    /// Canonical link to the source
    pub url: String,
    /// Title as reported by the provider
    pub title: String,
    /// Snippet or body excerpt
    pub snippet: String,
    /// Provider that returned it
    pub source: Provider,
    /// Heuristic trust in `[0, 1]`
    pub trust_score: f64,
    /// Kind-specific fields
    #[serde(flatten)]
    pub detail: ResultDetail,
}

/// Deduplicated, scored research results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchBundle {
    /// Results in provider-priority order
    pub results: Vec<ResearchResult>,
    /// `0.7 * mean trust + 0.3 * normalized engagement`
    pub quality_score: f64,
    /// Equal to `results.len()`
    pub total_sources: usize,
    /// Results per provider after deduplication
    pub provider_counts: BTreeMap<String, usize>,
}

impl ResearchBundle {
    /// Whether any provider contributed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Whether any result came from `provider`.
    #[must_use]
    pub fn has_provider(&self, provider: Provider) -> bool {
        self.provider_counts
            .get(provider.as_str())
            .is_some_and(|n| *n > 0)
    }
}

/// Trust for `metric` under `bands`, falling back to `floor`.
///
/// Bands are checked highest threshold first regardless of declaration order.
#[must_use]
pub fn band_trust(bands: &[Band], floor: f64, metric: u64) -> f64 {
    let mut sorted: Vec<&Band> = bands.iter().collect();
    sorted.sort_by(|a, b| b.min.cmp(&a.min));
    sorted
        .into_iter()
        .find(|band| metric >= band.min)
        .map_or(floor, |band| band.trust)
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
    use crate::config::TrustBands;

    #[test]
    fn test_band_trust() {
        let trust = TrustBands::default();
        assert!((band_trust(&trust.qa, trust.qa_floor, 120) - 0.9).abs() < f64::EPSILON);
        assert!((band_trust(&trust.qa, trust.qa_floor, 10) - 0.75).abs() < f64::EPSILON);
        assert!((band_trust(&trust.qa, trust.qa_floor, 0) - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_band_trust_unsorted_bands() {
        let bands = [Band { min: 1, trust: 0.2 }, Band { min: 5, trust: 0.8 }];
        assert!((band_trust(&bands, 0.0, 6) - 0.8).abs() < f64::EPSILON);
        assert!((band_trust(&bands, 0.0, 2) - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_engagement() {
        assert_eq!(ResultDetail::Search { first_party: true }.engagement(), None);
        assert_eq!(
            ResultDetail::Discussion {
                community: "rust".into(),
                score: -4,
                comments: 3
            }
            .engagement(),
            Some(3)
        );
        assert_eq!(
            ResultDetail::Video {
                channel: "c".into(),
                view_count: None
            }
            .engagement(),
            None
        );
    }

    #[test]
    fn test_result_serializes_flat() {
        let result = ResearchResult {
            url: "https://stackoverflow.com/q/1".into(),
            title: "How?".into(),
            snippet: String::new(),
            source: Provider::StackOverflow,
            trust_score: 0.75,
            detail: ResultDetail::Answer {
                score: 12,
                view_count: 900,
                answer_count: 2,
                is_answered: true,
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "answer");
        assert_eq!(json["source"], "stackoverflow");
        assert_eq!(json["trustScore"], 0.75);
        assert_eq!(json["viewCount"], 900);
    }
}
