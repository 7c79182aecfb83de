//! Role instructions and message builders for each synthesis request.

use crate::synthesis::client::ChatMessage;

const STRUCTURE_ROLE: &str = "You are a technical documentation analyst. You receive a JSON corpus \
containing pages crawled from a product's website and third-party research results. Identify the \
product's overview, core features, documentation topics, representative code examples and common \
issues users report. Cite sources only by URLs that appear in the corpus. Respond with a single \
JSON object with the keys productName, overview, features, topics, codeExamples, commonIssues and \
citations (each citation an object with url, title and source).";

const WRITING_ROLE: &str = "You are a senior technical writer. You receive a JSON object describing \
the structure of a product's documentation. Write complete, accurate documentation from it: a \
title, a one-paragraph description and an ordered list of sections, each with a title and \
Markdown content. Do not invent features that are not in the input. Respond with a single JSON \
object with the keys title, description and sections.";

const METADATA_ROLE: &str = "You are a documentation editor preparing a document for publication. \
You receive written documentation as JSON. Produce the final title and description, the sections \
in publication order (you may return the input sections unchanged), metadata (audience, \
difficulty, estimated reading time), searchability (keywords and summary) and validation \
(completeness notes and any gaps). Respond with a single JSON object with the keys title, \
description, sections, metadata, searchability and validation.";

const REPAIR_ROLE: &str = "You repair malformed JSON. Return only the corrected JSON object with \
no commentary and no code fences. Preserve every key and value that can be recovered.";

/// Stage one: the serialized corpus.
#[must_use]
pub fn structure(corpus_json: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(STRUCTURE_ROLE),
        ChatMessage::user(corpus_json),
    ]
}

/// Stage two: the stage-one structure.
#[must_use]
pub fn writing(structure_json: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(WRITING_ROLE),
        ChatMessage::user(structure_json),
    ]
}

/// Stage three: the stage-two documentation.
#[must_use]
pub fn metadata(written_json: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(METADATA_ROLE),
        ChatMessage::user(written_json),
    ]
}

/// Ask the model to fix `content` into valid JSON.
#[must_use]
pub fn repair(content: &str, parse_error: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(REPAIR_ROLE),
        ChatMessage::user(format!(
            "Fix this content into valid JSON.\n\nParser error: {parse_error}\n\nContent:\n{content}"
        )),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::synthesis::client::Role;

    #[test]
    fn test_stage_messages_are_system_then_user() {
        for messages in [structure("{}"), writing("{}"), metadata("{}")] {
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0].role, Role::System);
            assert!(messages[0].content.contains("JSON object"));
            assert_eq!(messages[1].role, Role::User);
            assert_eq!(messages[1].content, "{}");
        }
    }

    #[test]
    fn test_repair_carries_content_and_error() {
        let messages = repair("{title: x", "key must be a string at line 1");
        assert!(messages[1].content.contains("{title: x"));
        assert!(messages[1].content.contains("key must be a string"));
    }
}
