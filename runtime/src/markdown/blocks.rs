//! DOM walk that cuts a rendered page into scoreable blocks.
//!
//! Headings, paragraphs, lists, preformatted text, quotes and data tables
//! become one block each. Text and inline elements sitting directly inside
//! containers are gathered into "stray text" blocks tagged with the
//! container's name. Layout tables are walked like any other container.
//! Every block keeps its own HTML, which is what gets converted to markdown,
//! plus the measurements the pruning filter scores on.

use scraper::node::Node;
use scraper::{ElementRef, Html};

/// Subtrees that never contribute text.
pub const DROPPED: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "img", "head", "object", "canvas",
];

const INLINE: &[&str] = &[
    "a", "abbr", "b", "bdi", "br", "cite", "code", "data", "em", "font", "i", "kbd", "label",
    "mark", "q", "s", "small", "span", "strong", "sub", "sup", "time", "u", "var", "wbr",
];

/// Sectioning elements whose name counts as a class hint.
const CHROME: &[&str] = &["nav", "footer", "aside"];

/// Elements whose presence inside a table marks it as page layout.
const LAYOUT: &[&str] = &["table", "div", "p", "section", "article", "ul", "ol"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    List,
    Code,
    Quote,
    Table,
    /// Loose text directly inside a container element.
    Text,
}

/// One block of the page plus the measurements used for pruning.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    /// Serialized HTML of the block.
    pub html: String,
    /// Visible text, whitespace collapsed.
    pub text: String,
    /// Visible characters.
    pub text_len: usize,
    /// Visible characters inside links.
    pub link_text_len: usize,
    pub words: usize,
    /// Element name the block came from.
    pub tag: String,
    /// Lower-cased class and id values of the element and its ancestors.
    pub hint: String,
    /// Characters of the block's serialized HTML.
    pub markup_len: usize,
}

impl Block {
    pub fn is_heading(&self) -> bool {
        matches!(self.kind, BlockKind::Heading(_))
    }
}

/// Text gathered from a subtree.
#[derive(Debug, Default)]
struct Measure {
    html: String,
    text: String,
    link_text_len: usize,
}

impl Measure {
    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Resolve a link target against the page, skipping script and fragment links.
pub fn resolve_href(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    url::Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .ok()
}

struct Walker<'a> {
    page_url: &'a str,
    blocks: Vec<Block>,
}

/// Cut `html` into blocks, counting link text only for links that resolve
/// against `page_url`.
pub fn extract_blocks(html: &str, page_url: &str) -> Vec<Block> {
    let document = Html::parse_document(html);
    let mut walker = Walker {
        page_url,
        blocks: Vec::new(),
    };
    walker.container(document.root_element(), "");
    walker.blocks
}

impl Walker<'_> {
    fn container(&mut self, element: ElementRef<'_>, parent_hint: &str) {
        let tag = element.value().name();
        let hint = extend_hint(parent_hint, element);
        let mut pending = Measure::default();

        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    pending.text.push_str(text);
                    pending.html.push_str(&escape_text(text));
                }
                Node::Element(_) => {
                    let Some(child) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let name = child.value().name();
                    if DROPPED.contains(&name) {
                        continue;
                    }
                    if INLINE.contains(&name) {
                        self.measure(child, &mut pending);
                        pending.html.push_str(&child.html());
                        continue;
                    }
                    self.flush(&mut pending, tag, &hint);
                    self.block(child, &hint);
                }
                _ => {}
            }
        }
        self.flush(&mut pending, tag, &hint);
    }

    fn flush(&mut self, pending: &mut Measure, tag: &str, hint: &str) {
        let measure = std::mem::take(pending);
        if measure.is_blank() {
            return;
        }
        let markup_len = measure.html.chars().count();
        let html = format!("<p>{}</p>", measure.html);
        self.push(BlockKind::Text, html, markup_len, measure, tag, hint);
    }

    fn block(&mut self, element: ElementRef<'_>, parent_hint: &str) {
        let name = element.value().name();
        let kind = match name {
            "h1" => BlockKind::Heading(1),
            "h2" => BlockKind::Heading(2),
            "h3" => BlockKind::Heading(3),
            "h4" => BlockKind::Heading(4),
            "h5" => BlockKind::Heading(5),
            "h6" => BlockKind::Heading(6),
            "p" => BlockKind::Paragraph,
            "ul" | "ol" | "dl" => BlockKind::List,
            "pre" => BlockKind::Code,
            "blockquote" => BlockKind::Quote,
            "table" if !is_layout_table(element) => BlockKind::Table,
            _ => return self.container(element, parent_hint),
        };
        let hint = extend_hint(parent_hint, element);

        let mut measure = Measure::default();
        self.measure(element, &mut measure);
        if measure.is_blank() {
            return;
        }
        let html = element.html();
        let markup_len = html.chars().count();
        self.push(kind, html, markup_len, measure, name, &hint);
    }

    /// Accumulate the visible text and link text of `element`.
    fn measure(&self, element: ElementRef<'_>, out: &mut Measure) {
        let name = element.value().name();
        if DROPPED.contains(&name) {
            return;
        }
        let spaced = !INLINE.contains(&name);
        if spaced || name == "br" {
            out.text.push(' ');
        }

        let is_link = name == "a"
            && element
                .value()
                .attr("href")
                .and_then(|href| resolve_href(self.page_url, href))
                .is_some();
        if is_link {
            let mut link = Measure::default();
            self.measure_children(element, &mut link);
            out.link_text_len += collapse(&link.text).chars().count();
            out.text.push_str(&link.text);
        } else {
            self.measure_children(element, out);
        }

        if spaced {
            out.text.push(' ');
        }
    }

    fn measure_children(&self, element: ElementRef<'_>, out: &mut Measure) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.text.push_str(text),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.measure(child, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn push(
        &mut self,
        kind: BlockKind,
        html: String,
        markup_len: usize,
        measure: Measure,
        tag: &str,
        hint: &str,
    ) {
        let text = collapse(&measure.text);
        self.blocks.push(Block {
            kind,
            html,
            text_len: text.chars().count(),
            link_text_len: measure.link_text_len,
            words: text.split_whitespace().count(),
            text,
            tag: tag.to_string(),
            hint: hint.to_string(),
            markup_len: markup_len.max(1),
        });
    }
}

fn is_layout_table(table: ElementRef<'_>) -> bool {
    table
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|e| LAYOUT.contains(&e.value().name()))
}

fn extend_hint(parent: &str, element: ElementRef<'_>) -> String {
    let mut hint = parent.to_string();
    let name = element.value().name();
    let chrome = CHROME.contains(&name).then_some(name);
    for value in [chrome, element.value().attr("class"), element.value().attr("id")]
        .into_iter()
        .flatten()
    {
        if !hint.is_empty() {
            hint.push(' ');
        }
        hint.push_str(&value.to_lowercase());
    }
    hint
}
