//! DOM extraction for a single documentation page.

use crate::discovery::links::{collapse_whitespace, resolve_href};
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Minimum length of a code block worth keeping.
pub const MIN_CODE_CHARS: usize = 10;
/// Maximum code blocks kept per page.
pub const MAX_CODE_BLOCKS: usize = 30;
/// Maximum images kept per page.
pub const MAX_IMAGES: usize = 20;
/// Length of [`ExtractedPage::excerpt`] in characters.
pub const EXCERPT_CHARS: usize = 300;

/// Containers tried in order for the main content; `body` is the fallback.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "[role='main']",
    "article",
    ".content",
    ".documentation",
    ".docs-content",
    ".main-content",
    "#content",
];

/// Elements whose text never counts as content.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Image sources and alt texts containing these are decoration.
const DECORATIVE_IMAGE_HINTS: &[&str] = &["logo", "icon", "avatar"];

#[allow(clippy::unwrap_used)]
static TITLE: LazyLock<Selector> = LazyLock::new(|| {
    // SAFETY: Selector is a compile-time constant
    Selector::parse("title").unwrap()
});

#[allow(clippy::unwrap_used)]
static H1: LazyLock<Selector> = LazyLock::new(|| {
    // SAFETY: Selector is a compile-time constant
    Selector::parse("h1").unwrap()
});

#[allow(clippy::unwrap_used)]
static HEADINGS: LazyLock<Selector> = LazyLock::new(|| {
    // SAFETY: Selector is a compile-time constant
    Selector::parse("h1, h2, h3, h4").unwrap()
});

#[allow(clippy::unwrap_used)]
static CODE: LazyLock<Selector> = LazyLock::new(|| {
    // SAFETY: Selector is a compile-time constant
    Selector::parse("pre, code, .highlight, [class*='language-']").unwrap()
});

#[allow(clippy::unwrap_used)]
static IMAGES: LazyLock<Selector> = LazyLock::new(|| {
    // SAFETY: Selector is a compile-time constant
    Selector::parse("img[src]").unwrap()
});

#[allow(clippy::unwrap_used)]
static BODY: LazyLock<Selector> = LazyLock::new(|| {
    // SAFETY: Selector is a compile-time constant
    Selector::parse("body").unwrap()
});

#[allow(clippy::unwrap_used)]
static MAIN_CONTENT: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    MAIN_CONTENT_SELECTORS
        .iter()
        // SAFETY: Selectors are compile-time constants
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

/// A code sample found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Language from a `language-*`/`lang-*` class, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Code text with surrounding whitespace trimmed
    pub code: String,
}

/// An image reference with an absolute source URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Absolute image URL
    pub src: String,
    /// Alt text (may be empty)
    pub alt: String,
}

/// A heading in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// 1 through 4
    pub level: u8,
    /// Heading text
    pub text: String,
}

/// Structured content extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPage {
    /// Final URL of the page
    pub url: String,
    /// Page title
    pub title: String,
    /// Main text content, truncated to the configured cap
    pub content: String,
    /// First characters of `content`
    pub excerpt: String,
    /// Code samples
    pub code_blocks: Vec<CodeBlock>,
    /// Non-decorative images
    pub images: Vec<ImageRef>,
    /// h1 through h4 headings
    pub headings: Vec<Heading>,
    /// Words in the truncated `content`
    pub word_count: usize,
}

/// Extract structured content from a page's HTML.
///
/// `content_cap` bounds [`ExtractedPage::content`] in bytes; truncation
/// always lands on a character boundary.
#[must_use]
pub fn extract_page(url: &str, html: &str, content_cap: usize) -> ExtractedPage {
    let document = Html::parse_document(html);
    let base = Url::parse(url).ok();

    let content = truncate_to_boundary(&main_text(&document), content_cap).to_string();
    let excerpt: String = content.chars().take(EXCERPT_CHARS).collect();
    let word_count = content.split_whitespace().count();

    ExtractedPage {
        url: url.to_string(),
        title: page_title(&document).unwrap_or_else(|| url.to_string()),
        excerpt,
        word_count,
        code_blocks: code_blocks(&document),
        images: base.map(|b| images(&document, &b)).unwrap_or_default(),
        headings: headings(&document),
        content,
    }
}

/// Truncate `text` to at most `cap` bytes without splitting a character.
#[must_use]
pub fn truncate_to_boundary(text: &str, cap: usize) -> &str {
    if text.len() <= cap {
        return text;
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn page_title(document: &Html) -> Option<String> {
    [&*TITLE, &*H1].into_iter().find_map(|selector| {
        document
            .select(selector)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    })
}

fn main_text(document: &Html) -> String {
    for selector in MAIN_CONTENT.iter() {
        if let Some(element) = document.select(selector).next() {
            let text = element_text(element);
            if !text.is_empty() {
                return text;
            }
        }
    }

    document
        .select(&BODY)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// Visible text of an element with script-like children skipped.
fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            },
            Node::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {},
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            },
            _ => {},
        }
    }
}

fn code_blocks(document: &Html) -> Vec<CodeBlock> {
    let mut seen = HashSet::new();
    let mut blocks = Vec::new();

    for element in document.select(&CODE) {
        if blocks.len() >= MAX_CODE_BLOCKS {
            break;
        }
        // <pre><code> is captured once, through the <pre>
        if element.value().name() == "code" && parent_is_pre(element) {
            continue;
        }

        let code = element.text().collect::<String>().trim().to_string();
        if code.chars().count() < MIN_CODE_CHARS || !seen.insert(code.clone()) {
            continue;
        }

        blocks.push(CodeBlock {
            language: code_language(element),
            code,
        });
    }

    blocks
}

fn parent_is_pre(element: ElementRef<'_>) -> bool {
    element
        .parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|p| p.value().name() == "pre")
}

/// Language from the element's classes or those of its first `<code>` child.
fn code_language(element: ElementRef<'_>) -> Option<String> {
    let from_classes = |el: ElementRef<'_>| {
        el.value().attr("data-language").map(str::to_string).or_else(|| {
            el.value().classes().find_map(|class| {
                class
                    .strip_prefix("language-")
                    .or_else(|| class.strip_prefix("lang-"))
                    .filter(|lang| !lang.is_empty())
                    .map(str::to_ascii_lowercase)
            })
        })
    };

    from_classes(element).or_else(|| {
        element
            .children()
            .filter_map(ElementRef::wrap)
            .find(|child| child.value().name() == "code")
            .and_then(from_classes)
    })
}

fn images(document: &Html, base: &Url) -> Vec<ImageRef> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for element in document.select(&IMAGES) {
        if images.len() >= MAX_IMAGES {
            break;
        }
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        let alt = element.value().attr("alt").unwrap_or_default().trim().to_string();

        let hint = format!("{} {}", src.to_ascii_lowercase(), alt.to_ascii_lowercase());
        if DECORATIVE_IMAGE_HINTS.iter().any(|h| hint.contains(h)) {
            continue;
        }

        let Some(resolved) = resolve_href(src, base) else {
            continue;
        };
        let src = resolved.to_string();
        if seen.insert(src.clone()) {
            images.push(ImageRef { src, alt });
        }
    }

    images
}

fn headings(document: &Html) -> Vec<Heading> {
    document
        .select(&HEADINGS)
        .filter_map(|el| {
            let level = el.value().name().strip_prefix('h')?.parse().ok()?;
            let text = collapse_whitespace(&el.text().collect::<String>());
            (!text.is_empty()).then_some(Heading { level, text })
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
    use proptest::prelude::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Install | Acme Docs</title><style>.x { color: red }</style></head>
<body>
  <nav>Home Pricing</nav>
  <main>
    <h1>Installation</h1>
    <p>Install the   Acme CLI.</p>
    <script>window.tracking = true;</script>
    <pre><code class="language-bash">curl -sSL https://acme.io/install | sh</code></pre>
    <p>Use <code>acme</code> inline.</p>
    <div class="highlight"><pre>acme deploy --prod</pre></div>
    <h2>Configure</h2>
    <h5>Ignored level</h5>
    <img src="/img/diagram.png" alt="Architecture diagram">
    <img src="/img/logo.svg" alt="Acme">
    <img src="https://cdn.acme.io/team.png" alt="Team avatar">
  </main>
  <footer>Copyright</footer>
</body>
</html>"#;

    #[test]
    fn test_extracts_title_and_main_content() {
        let page = extract_page("https://acme.io/docs/install", PAGE, 15_000);
        assert_eq!(page.title, "Install | Acme Docs");
        assert!(page.content.starts_with("Installation Install the Acme CLI."));
        assert!(!page.content.contains("tracking"));
        assert!(!page.content.contains("Copyright"));
        assert!(!page.content.contains("Pricing"));
        assert_eq!(page.word_count, page.content.split_whitespace().count());
    }

    #[test]
    fn test_extracts_code_blocks() {
        let page = extract_page("https://acme.io/docs/install", PAGE, 15_000);
        let codes: Vec<&str> = page.code_blocks.iter().map(|b| b.code.as_str()).collect();
        assert_eq!(
            codes,
            vec!["curl -sSL https://acme.io/install | sh", "acme deploy --prod"]
        );
        assert_eq!(page.code_blocks[0].language.as_deref(), Some("bash"));
        assert_eq!(page.code_blocks[1].language, None);
    }

    #[test]
    fn test_extracts_headings_h1_to_h4() {
        let page = extract_page("https://acme.io/docs/install", PAGE, 15_000);
        assert_eq!(
            page.headings,
            vec![
                Heading {
                    level: 1,
                    text: "Installation".into()
                },
                Heading {
                    level: 2,
                    text: "Configure".into()
                },
            ]
        );
    }

    #[test]
    fn test_images_resolved_and_filtered() {
        let page = extract_page("https://acme.io/docs/install", PAGE, 15_000);
        assert_eq!(
            page.images,
            vec![ImageRef {
                src: "https://acme.io/img/diagram.png".into(),
                alt: "Architecture diagram".into()
            }]
        );
    }

    #[test]
    fn test_body_fallback_and_url_title() {
        let html = "<html><body><div>Just some text here</div></body></html>";
        let page = extract_page("https://acme.io/faq", html, 15_000);
        assert_eq!(page.title, "https://acme.io/faq");
        assert_eq!(page.content, "Just some text here");
        assert_eq!(page.word_count, 4);
    }

    #[test]
    fn test_content_truncated_to_cap() {
        let body = "word ".repeat(10_000);
        let html = format!("<html><body><main>{body}</main></body></html>");
        let page = extract_page("https://acme.io/docs", &html, 100);
        assert!(page.content.len() <= 100);
        assert_eq!(page.excerpt.chars().count(), 100.min(EXCERPT_CHARS));
        assert_eq!(page.word_count, page.content.split_whitespace().count());
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_to_boundary("héllo", 2), "h");
        assert_eq!(truncate_to_boundary("héllo", 3), "hé");
        assert_eq!(truncate_to_boundary("abc", 10), "abc");
        assert_eq!(truncate_to_boundary("日本語", 4), "日");
    }

    proptest! {
        #[test]
        fn prop_truncate_never_exceeds_cap(text in ".{0,400}", cap in 0usize..300) {
            let out = truncate_to_boundary(&text, cap);
            prop_assert!(out.len() <= cap);
            prop_assert!(text.starts_with(out));
        }

        #[test]
        fn prop_page_content_within_cap(words in prop::collection::vec("[a-zé]{1,12}", 0..200), cap in 1usize..500) {
            let html = format!("<html><body><main><p>{}</p></main></body></html>", words.join(" "));
            let page = extract_page("https://acme.io/docs", &html, cap);
            prop_assert!(page.content.len() <= cap);
        }
    }
}
