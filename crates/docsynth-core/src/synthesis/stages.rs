//! Typed, lenient views over each stage's JSON output.
//!
//! The model decides which keys to emit. Every known field is an `Option`
//! that is `None` when the key is absent or has an unexpected type, and any
//! key not claimed by a field (including mistyped ones) is kept in `extra`.
//! Serializing a stage output therefore reproduces everything the model
//! said, which is what the next stage receives.
//!
//! Keys are accepted in camelCase or snake_case.

use crate::Result;
use serde::Serialize;
use serde_json::{Map, Value};

/// Field extraction over a JSON object.
struct Fields(Map<String, Value>);

impl Fields {
    fn take(&mut self, key: &str) -> Option<(String, Value)> {
        if let Some(value) = self.0.remove(key) {
            return Some((key.to_string(), value));
        }
        let snake = to_snake_case(key);
        self.0.remove(&snake).map(|value| (snake, value))
    }

    /// Take a key, keeping it in `extra` when `convert` rejects it.
    fn take_with<T>(&mut self, key: &str, convert: impl FnOnce(&Value) -> Option<T>) -> Option<T> {
        let (found, value) = self.take(key)?;
        let converted = convert(&value);
        if converted.is_none() && !value.is_null() {
            self.0.insert(found, value);
        }
        converted
    }

    fn string(&mut self, key: &str) -> Option<String> {
        self.take_with(key, |v| {
            v.as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    }

    fn array(&mut self, key: &str) -> Option<Vec<Value>> {
        self.take_with(key, |v| v.as_array().cloned())
    }

    fn object(&mut self, key: &str) -> Option<Map<String, Value>> {
        self.take_with(key, |v| v.as_object().cloned())
    }

    fn sections(&mut self, key: &str) -> Option<Vec<Section>> {
        self.take_with(key, |v| {
            v.as_array()
                .map(|items| items.iter().filter_map(Section::from_value).collect())
        })
    }

    fn citations(&mut self, key: &str) -> Option<Vec<Citation>> {
        self.take_with(key, |v| {
            v.as_array()
                .map(|items| items.iter().filter_map(Citation::from_value).collect())
        })
    }

    fn into_extra(self) -> Map<String, Value> {
        self.0
    }
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// A source reference declared by the structure stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// Cited URL
    pub url: String,
    /// Display title, if given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Source label (provider or "documentation"), if given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Citation {
    /// Accept a bare URL string or an object with a `url` (or `link`) key.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(url) if !url.trim().is_empty() => Some(Self {
                url: url.trim().to_string(),
                title: None,
                source: None,
            }),
            Value::Object(map) => {
                let text = |key: &str| {
                    map.get(key)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                };
                Some(Self {
                    url: text("url").or_else(|| text("link"))?,
                    title: text("title"),
                    source: text("source"),
                })
            },
            _ => None,
        }
    }
}

/// One documentation section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Section {
    /// Section heading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Markdown body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Any other keys the model attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Section {
    /// Objects map field-wise; a bare string becomes a section's content.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => {
                let mut fields = Fields(map.clone());
                Some(Self {
                    title: fields.string("title"),
                    content: fields.string("content"),
                    extra: fields.into_extra(),
                })
            },
            Value::String(text) if !text.trim().is_empty() => Some(Self {
                content: Some(text.clone()),
                ..Self::default()
            }),
            _ => None,
        }
    }
}

/// Stage one: what the documentation should cover.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedStructure {
    /// Product name as the model understood it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// Short product overview
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    /// Core features
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<Value>>,
    /// Documentation topics to cover
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<Value>>,
    /// Representative code examples
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_examples: Option<Vec<Value>>,
    /// Problems users report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_issues: Option<Vec<Value>>,
    /// Sources the structure draws on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    /// Unrecognized or mistyped keys, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtractedStructure {
    /// Read a stage response object.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut fields = Fields(map);
        Self {
            product_name: fields.string("productName"),
            overview: fields.string("overview"),
            features: fields.array("features"),
            topics: fields.array("topics"),
            code_examples: fields.array("codeExamples"),
            common_issues: fields.array("commonIssues"),
            citations: fields.citations("citations"),
            extra: fields.into_extra(),
        }
    }
}

/// Stage two: the written documentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenDocumentation {
    /// Document title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// One-paragraph summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered sections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
    /// Unrecognized or mistyped keys, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WrittenDocumentation {
    /// Read a stage response object.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut fields = Fields(map);
        Self {
            title: fields.string("title"),
            description: fields.string("description"),
            sections: fields.sections("sections"),
            extra: fields.into_extra(),
        }
    }
}

/// Stage three: publication metadata, optionally with revised sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalMetadata {
    /// Document title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// One-paragraph summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered sections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
    /// Audience, difficulty and similar attributes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Keywords and search summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchability: Option<Map<String, Value>>,
    /// Completeness notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Map<String, Value>>,
    /// Unrecognized or mistyped keys, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FinalMetadata {
    /// Read a stage response object.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut fields = Fields(map);
        Self {
            title: fields.string("title"),
            description: fields.string("description"),
            sections: fields.sections("sections"),
            metadata: fields.object("metadata"),
            searchability: fields.object("searchability"),
            validation: fields.object("validation"),
            extra: fields.into_extra(),
        }
    }
}

/// Serialize a stage output as the next stage's request body.
///
/// # Errors
///
/// Returns [`Error::Serialization`](crate::Error::Serialization) if the value
/// cannot be encoded.
pub fn to_prompt_json<T: Serialize>(stage_output: &T) -> Result<String> {
    Ok(serde_json::to_string(stage_output)?)
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
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_structure_accepts_both_key_styles() {
        let s = ExtractedStructure::from_map(object(json!({
            "productName": "Acme",
            "code_examples": [{"language": "rust", "code": "fn main() {}"}],
        })));
        assert_eq!(s.product_name.as_deref(), Some("Acme"));
        assert_eq!(s.code_examples.unwrap().len(), 1);
        assert!(s.overview.is_none());
        assert!(s.extra.is_empty());
    }

    #[test]
    fn test_missing_fields_are_unset() {
        let s = ExtractedStructure::from_map(Map::new());
        assert_eq!(s, ExtractedStructure::default());
        assert_eq!(to_prompt_json(&s).unwrap(), "{}");
    }

    #[test]
    fn test_mistyped_field_kept_verbatim_in_extra() {
        let s = ExtractedStructure::from_map(object(json!({
            "features": "fast, small",
            "audience": ["devs"],
        })));
        assert!(s.features.is_none());
        assert_eq!(s.extra["features"], "fast, small");

        let round: Value = serde_json::from_str(&to_prompt_json(&s).unwrap()).unwrap();
        assert_eq!(round, json!({ "features": "fast, small", "audience": ["devs"] }));
    }

    #[test]
    fn test_citations_accept_strings_and_objects() {
        let s = ExtractedStructure::from_map(object(json!({
            "citations": [
                "https://acme.io/docs",
                {"url": "https://stackoverflow.com/q/1", "title": "Q", "source": "stackoverflow"},
                {"link": "https://github.com/acme/acme/issues/2"},
                {"title": "no url"},
                42
            ]
        })));
        let citations = s.citations.unwrap();
        assert_eq!(citations.len(), 3);
        assert_eq!(citations[1].source.as_deref(), Some("stackoverflow"));
        assert_eq!(citations[2].url, "https://github.com/acme/acme/issues/2");
    }

    #[test]
    fn test_written_sections() {
        let w = WrittenDocumentation::from_map(object(json!({
            "title": "Acme Guide",
            "sections": [
                {"title": "Install", "content": "cargo add acme", "order": 1},
                "A loose paragraph",
                null
            ]
        })));
        let sections = w.sections.unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title.as_deref(), Some("Install"));
        assert_eq!(sections[0].extra["order"], 1);
        assert_eq!(sections[1].content.as_deref(), Some("A loose paragraph"));
        assert!(sections[1].title.is_none());
    }

    #[test]
    fn test_final_metadata_objects() {
        let m = FinalMetadata::from_map(object(json!({
            "title": "  ",
            "metadata": {"difficulty": "beginner"},
            "searchability": ["not", "an", "object"],
            "validation": {"complete": true}
        })));
        assert!(m.title.is_none());
        assert!(m.sections.is_none());
        assert_eq!(m.metadata.unwrap()["difficulty"], "beginner");
        assert!(m.searchability.is_none());
        assert!(m.extra.contains_key("searchability"));
        assert_eq!(m.validation.unwrap()["complete"], true);
    }
}
