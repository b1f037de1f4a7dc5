//! HTML to markdown rendering for article pages.
//!
//! Produces two views of a page: the raw markdown of every visible block,
//! and the "fit" markdown of the blocks that survive the [`PruningFilter`].
//! Both views are converted with `htmd`; relative links are then resolved
//! against the page URL and script links are reduced to their label.

pub mod blocks;
pub mod pruning;

pub use blocks::{extract_blocks, Block, BlockKind};
pub use pruning::PruningFilter;

use crate::config::MarkdownConfig;
use blocks::{resolve_href, DROPPED};
use htmd::HtmlToMarkdown;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\]]*)\]\(((?:[^()\s]|\([^()\s]*\))*)((?:\s+"[^"]*")?)\)"#).expect("link regex is valid")
});

/// Both markdown views of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownDocument {
    pub fit_markdown: String,
    pub raw_markdown: String,
}

/// Outcome of rendering one page, with its own success flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownResult {
    pub success: bool,
    pub markdown: Option<MarkdownDocument>,
    pub error_message: Option<String>,
}

impl MarkdownResult {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            markdown: None,
            error_message: Some(message.into()),
        }
    }
}

/// Converts rendered HTML into raw and pruned markdown.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    filter: PruningFilter,
}

impl MarkdownRenderer {
    pub fn new(filter: PruningFilter) -> Self {
        Self { filter }
    }

    pub fn from_config(config: &MarkdownConfig) -> Self {
        Self::new(PruningFilter::from_config(config))
    }

    pub fn render(&self, html: &str, page_url: &str) -> MarkdownResult {
        if html.trim().is_empty() {
            return MarkdownResult::failed("empty document");
        }
        let blocks = extract_blocks(html, page_url);
        if blocks.is_empty() {
            return MarkdownResult::failed("document has no visible body content");
        }

        match self.views(&blocks, page_url) {
            Ok(doc) => MarkdownResult {
                success: true,
                markdown: Some(doc),
                error_message: None,
            },
            Err(e) => MarkdownResult::failed(format!("markdown conversion failed: {e}")),
        }
    }

    fn views(&self, blocks: &[Block], page_url: &str) -> std::io::Result<MarkdownDocument> {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(DROPPED.to_vec())
            .build();
        let kept = self.filter.filter(blocks);
        tracing::debug!(blocks = blocks.len(), kept = kept.len(), "pruned markdown blocks");
        Ok(MarkdownDocument {
            raw_markdown: to_markdown(&converter, blocks.iter(), page_url)?,
            fit_markdown: to_markdown(&converter, kept.into_iter(), page_url)?,
        })
    }
}

fn to_markdown<'b>(
    converter: &HtmlToMarkdown,
    blocks: impl Iterator<Item = &'b Block>,
    page_url: &str,
) -> std::io::Result<String> {
    let html: String = blocks.map(|b| b.html.as_str()).collect::<Vec<_>>().join("\n");
    if html.is_empty() {
        return Ok(String::new());
    }
    let markdown = converter.convert(&html)?;
    Ok(resolve_links(&markdown, page_url).trim().to_string())
}

/// Make link targets absolute; links that go nowhere keep only their label.
fn resolve_links(markdown: &str, page_url: &str) -> String {
    LINK.replace_all(markdown, |caps: &Captures<'_>| {
        match resolve_href(page_url, &caps[2]) {
            Some(target) => format!("[{}]({target}{})", &caps[1], &caps[3]),
            None => caps[1].to_string(),
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://news.example.kr/a/1";

    fn long_paragraph(n: usize) -> String {
        let words: Vec<String> = (0..n).map(|i| format!("word{i}")).collect();
        format!("<p>{}</p>", words.join(" "))
    }

    fn has_line(markdown: &str, indented: bool, prefix: &str, suffix: &str) -> bool {
        markdown.lines().any(|line| {
            line.starts_with(' ') == indented
                && line.trim_start().starts_with(prefix)
                && line.trim_end().ends_with(suffix)
        })
    }

    #[test]
    fn test_empty_html_fails() {
        let result = MarkdownRenderer::from_config(&MarkdownConfig::default()).render("  ", PAGE);
        assert!(!result.success);
        assert!(result.markdown.is_none());
        assert_eq!(result.error_message.as_deref(), Some("empty document"));
    }

    #[test]
    fn test_no_visible_content_fails() {
        let result = MarkdownRenderer::from_config(&MarkdownConfig::default())
            .render("<html><head><title>t</title></head><body><script>x()</script></body></html>", PAGE);
        assert!(!result.success);
    }

    #[test]
    fn test_lists_keep_numbering_and_nesting() {
        let html = "<ol><li>first</li><li>second<ul><li>nested</li></ul></li></ol>\
                    <p>a *literal* star</p>";
        let result = MarkdownRenderer::from_config(&MarkdownConfig::default()).render(html, PAGE);
        let raw = result.markdown.unwrap().raw_markdown;
        assert!(has_line(&raw, false, "1.", "first"), "{raw}");
        assert!(has_line(&raw, false, "2.", "second"), "{raw}");
        assert!(has_line(&raw, true, "", "nested"), "{raw}");
        assert!(!has_line(&raw, false, "", "nested"), "{raw}");
        assert!(raw.contains(r"\*literal\*"), "{raw}");
    }

    #[test]
    fn test_links_resolved_against_page() {
        let html = r#"<p>Read <a href="/related/9">the related story</a> or
            <a href="javascript:void(0)">print</a> or <a href="https://other.example/x">elsewhere</a>.</p>"#;
        let result = MarkdownRenderer::from_config(&MarkdownConfig::default()).render(html, PAGE);
        let raw = result.markdown.unwrap().raw_markdown;
        assert!(raw.contains("[the related story](https://news.example.kr/related/9)"), "{raw}");
        assert!(raw.contains("[elsewhere](https://other.example/x)"), "{raw}");
        assert!(raw.contains("print") && !raw.contains("javascript"), "{raw}");
    }

    #[test]
    fn test_fit_prunes_navigation_when_article_is_long() {
        let html = format!(
            r#"<body><nav class="menu"><a href="/a">Section A</a> <a href="/b">Section B</a></nav>
               <article>{}</article></body>"#,
            long_paragraph(120)
        );
        let result = MarkdownRenderer::from_config(&MarkdownConfig::default()).render(&html, PAGE);
        let doc = result.markdown.unwrap();
        assert!(doc.raw_markdown.contains("[Section A](https://news.example.kr/a)"));
        assert!(!doc.fit_markdown.contains("Section A"));
        assert!(doc.fit_markdown.starts_with("word0 word1"));
    }

    #[test]
    fn test_short_article_never_gets_chrome_back() {
        let html = format!(
            r#"<body><nav class="gnb"><ul><li><a href="/politics">Politics</a></li><li><a href="/economy">Economy</a></li></ul></nav>
               <div class="article-body">{}</div>
               <footer><p>Copyright 2026 Example News. All rights reserved.</p></footer></body>"#,
            long_paragraph(40)
        );

        let strict = MarkdownRenderer::from_config(&MarkdownConfig::default()).render(&html, PAGE);
        assert!(strict.success);
        let doc = strict.markdown.unwrap();
        assert!(doc.raw_markdown.contains("Politics"));
        assert!(doc.raw_markdown.contains("Copyright"));
        assert!(!doc.fit_markdown.contains("Politics"));
        assert!(!doc.fit_markdown.contains("Copyright"));

        let config = MarkdownConfig {
            word_count_threshold: 20,
            ..MarkdownConfig::default()
        };
        let doc = MarkdownRenderer::from_config(&config)
            .render(&html, PAGE)
            .markdown
            .unwrap();
        assert!(doc.fit_markdown.starts_with("word0 word1"));
        assert!(doc.fit_markdown.ends_with("word39"));
        assert!(!doc.fit_markdown.contains("Politics"));
        assert!(!doc.fit_markdown.contains("Copyright"));
    }
}
