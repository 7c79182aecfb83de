//! Visual theme guessed from extracted page text.

use crate::extraction::ExtractedPage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Most frequent colors kept.
pub const MAX_COLORS: usize = 10;
/// Most frequent font families kept.
pub const MAX_FONTS: usize = 5;

#[allow(clippy::unwrap_used)]
static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: Pattern is a compile-time constant
    Regex::new(r"#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{3})\b").unwrap()
});

#[allow(clippy::unwrap_used)]
static FONT_FAMILY: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: Pattern is a compile-time constant
    Regex::new(r#"(?i)font-family\s*:\s*([^;}\n]+)"#).unwrap()
});

/// Dominant colors and fonts, most frequent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Lowercase hex colors, e.g. `#1a73e8`
    pub colors: Vec<String>,
    /// Primary font families
    pub fonts: Vec<String>,
}

/// Scan page content and code blocks for hex colors and `font-family`
/// declarations.
///
/// Ties in frequency keep first-seen order.
#[must_use]
pub fn derive_theme(pages: &[ExtractedPage]) -> Theme {
    let mut colors = Tally::default();
    let mut fonts = Tally::default();

    let texts = pages.iter().flat_map(|page| {
        std::iter::once(page.content.as_str()).chain(page.code_blocks.iter().map(|b| b.code.as_str()))
    });

    for text in texts {
        for m in HEX_COLOR.find_iter(text) {
            colors.add(m.as_str().to_ascii_lowercase());
        }
        for caps in FONT_FAMILY.captures_iter(text) {
            if let Some(family) = caps.get(1).and_then(|m| primary_family(m.as_str())) {
                fonts.add(family);
            }
        }
    }

    Theme {
        colors: colors.top(MAX_COLORS),
        fonts: fonts.top(MAX_FONTS),
    }
}

/// First family in a `font-family` list, unquoted.
fn primary_family(declaration: &str) -> Option<String> {
    let first = declaration.split(',').next()?;
    let name = first
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .trim_end_matches("!important")
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[derive(Default)]
struct Tally {
    counts: HashMap<String, (usize, usize)>,
}

impl Tally {
    fn add(&mut self, key: String) {
        let next = self.counts.len();
        self.counts.entry(key).or_insert((0, next)).0 += 1;
    }

    fn top(self, n: usize) -> Vec<String> {
        let mut entries: Vec<_> = self.counts.into_iter().collect();
        entries.sort_by(|(_, (ca, fa)), (_, (cb, fb))| cb.cmp(ca).then(fa.cmp(fb)));
        entries.into_iter().take(n).map(|(key, _)| key).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::extraction::CodeBlock;

    fn page(content: &str, code: &[&str]) -> ExtractedPage {
        ExtractedPage {
            url: "https://acme.io/docs".into(),
            title: "Docs".into(),
            content: content.into(),
            excerpt: String::new(),
            code_blocks: code
                .iter()
                .map(|c| CodeBlock {
                    language: Some("css".into()),
                    code: (*c).to_string(),
                })
                .collect(),
            images: vec![],
            headings: vec![],
            word_count: 0,
        }
    }

    #[test]
    fn test_colors_ranked_by_frequency() {
        let pages = vec![
            page("Use #FFF on #1A73E8 buttons", &[".a { color: #1a73e8 }"]),
            page("Accent #ff0000 and #1a73e8", &[]),
        ];
        let theme = derive_theme(&pages);
        assert_eq!(theme.colors, vec!["#1a73e8", "#fff", "#ff0000"]);
    }

    #[test]
    fn test_fonts_take_first_family() {
        let pages = vec![page(
            "",
            &[
                "body { font-family: 'Inter', sans-serif; }",
                "code { font-family: \"JetBrains Mono\", monospace }",
                "h1 { font-family: Inter }",
            ],
        )];
        let theme = derive_theme(&pages);
        assert_eq!(theme.fonts, vec!["Inter", "JetBrains Mono"]);
    }

    #[test]
    fn test_caps_and_non_colors() {
        let content: String = (0..15).map(|i| format!("#{i:06x} ")).collect();
        let theme = derive_theme(&[page(&format!("{content} issue #12345 #abcdefg"), &[])]);
        assert_eq!(theme.colors.len(), MAX_COLORS);
        assert!(!theme.colors.iter().any(|c| c == "#abcdefg"));
    }

    #[test]
    fn test_empty_pages() {
        assert_eq!(derive_theme(&[]), Theme::default());
    }
}
