//! Preview URL resolution.
//!
//! Board pages on government sites embed attachments through an in-browser
//! document viewer instead of linking to files. Three independent heuristics
//! recover viewer URLs from a page's HTML:
//!
//! - **open iframes**: viewer iframes already present in a preview container;
//! - **onclick reconstruction**: `fnConvertDocViewer(brd, seq, fileSeq)`
//!   anchors, rebuilt into viewer URLs using a result suffix taken from the
//!   same row's iframe or, failing that, the year-month of any iframe on the
//!   page;
//! - **external viewer links**: `window.open('synapviewer.do...')` handlers
//!   inside `fileDiv*` containers, resolved against the page's directory.
//!
//! The union is passed through [`normalize_preview_urls`]. All functions here
//! are synchronous because `scraper::Html` is `!Send`; parse and drop it
//! before any `.await`.

pub mod collect;
pub mod normalize;
pub mod urls;

pub use collect::PreviewCollector;
pub use normalize::{normalize_preview_urls, Rejection};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

/// Path fragment every accepted viewer URL contains.
pub const VIEWER_MARKER: &str = "docviewer/skin/doc.html";

const PREVIEW_IFRAME: &str = "div.bbs_file_preview iframe[src]";
const RESULT_IFRAME: &str = "div.bbs_file_preview iframe[src*='docviewer/result/']";
/// The target sites spell the class this way.
const PREVIEW_ANCHOR: &str = "a.bbs_icon_preveiw[onclick]";
const FILE_LABEL: &str = ".bbs_file_cont > strong";
const VIEWER_LINK_CONTAINER: &str = "div[id^='fileDiv']";

static ONCLICK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"fnConvertDocViewer\('([^']+)','([^']+)','([^']+)'\)")
        .expect("onclick regex is valid")
});

static RS_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]rs=([^&]+)").expect("rs regex is valid"));

static VIEWER_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"window\.open\('(synapviewer\.do[^']+)'\)").expect("window.open regex is valid")
});

// ── Resolution report ────────────────────────────────────────────────────────

/// Which heuristic produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    OpenIframe,
    Onclick,
    ExternalViewer,
}

/// A raw candidate and the filter's verdict on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub raw: String,
    pub strategy: Strategy,
    pub verdict: Result<String, Rejection>,
}

/// Everything the resolver saw, for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub candidates: Vec<Candidate>,
    /// The caller-visible result.
    pub urls: Vec<String>,
    /// True when no candidate was accepted and `urls` is the raw fallback.
    pub used_fallback: bool,
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Resolve viewer URLs from `html`.
///
/// `base_url` is the site origin used for root-relative references;
/// `page_url` supplies the directory for external-viewer paths. An empty
/// result means no preview exists on the page.
pub fn resolve(html: &str, base_url: &str, page_url: &str) -> Vec<String> {
    resolve_detailed(html, base_url, page_url).urls
}

/// Like [`resolve`], also reporting each raw candidate and its verdict.
pub fn resolve_detailed(html: &str, base_url: &str, page_url: &str) -> Resolution {
    let document = Html::parse_document(html);

    let mut candidates = Vec::new();
    let mut seen = BTreeSet::new();
    let strategies = [
        (Strategy::OpenIframe, open_iframe_urls(&document, base_url)),
        (Strategy::Onclick, onclick_urls(&document, base_url)),
        (Strategy::ExternalViewer, external_viewer_urls(&document, base_url, page_url)),
    ];
    for (strategy, found) in strategies {
        for raw in found {
            if seen.insert(raw.clone()) {
                let verdict = normalize::accept(&raw);
                candidates.push(Candidate { raw, strategy, verdict });
            }
        }
    }

    let urls = normalize_preview_urls(&seen);
    let used_fallback = !urls.is_empty() && candidates.iter().all(|c| c.verdict.is_err());
    if used_fallback {
        debug!(count = urls.len(), "no viewer URL accepted, returning raw candidates");
    }

    Resolution {
        candidates,
        urls,
        used_fallback,
    }
}

// ── Strategies ───────────────────────────────────────────────────────────────

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn rs_param(src: &str) -> Option<String> {
    RS_PARAM_RE
        .captures(src)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Viewer iframes already open in a preview container.
fn open_iframe_urls(document: &Html, base_url: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let Some(sel) = selector(PREVIEW_IFRAME) else {
        return found;
    };
    for iframe in document.select(&sel) {
        if let Some(src) = iframe.value().attr("src") {
            if src.contains(VIEWER_MARKER) {
                found.insert(urls::join(base_url, src));
            }
        }
    }
    found
}

/// The `rs` value of the first result iframe anywhere on the page.
fn any_result_suffix(document: &Html) -> Option<String> {
    let sel = selector(RESULT_IFRAME)?;
    let iframe = document.select(&sel).next()?;
    rs_param(iframe.value().attr("src")?)
}

/// Last path segment of a result suffix, e.g. `2024_05` from `/docviewer/result/b/1/2/2024_05/`.
fn year_month(suffix: &str) -> &str {
    suffix.trim_matches('/').rsplit('/').next().unwrap_or("")
}

fn enclosing_li<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "li")
}

/// Viewer URLs rebuilt from `fnConvertDocViewer` anchors.
///
/// The filename comes from the row's label. The result suffix comes from the
/// same row's preview iframe when present; otherwise the year-month of any
/// result iframe on the page is reused. That fallback can pair a title with
/// another row's document when a page mixes unrelated attachments.
fn onclick_urls(document: &Html, base_url: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let (Some(anchor_sel), Some(label_sel), Some(iframe_sel)) = (
        selector(PREVIEW_ANCHOR),
        selector(FILE_LABEL),
        selector(PREVIEW_IFRAME),
    ) else {
        return found;
    };
    let page_suffix = any_result_suffix(document);

    for anchor in document.select(&anchor_sel) {
        let onclick = anchor.value().attr("onclick").unwrap_or("");
        let Some(caps) = ONCLICK_RE.captures(onclick) else {
            continue;
        };
        let (brd_id, seq, file_seq) = (&caps[1], &caps[2], &caps[3]);

        let row = enclosing_li(&anchor);
        let filename = row
            .and_then(|li| li.select(&label_sel).next())
            .map(|strong| strong.text().map(str::trim).collect::<String>())
            .filter(|name| !name.is_empty());
        let Some(filename) = filename else {
            debug!(brd_id, seq, file_seq, "preview anchor without file label");
            continue;
        };

        let row_suffix = row
            .and_then(|li| li.select(&iframe_sel).next())
            .and_then(|iframe| iframe.value().attr("src").and_then(rs_param));
        let rs = match (row_suffix, &page_suffix) {
            (Some(rs), _) => rs,
            (None, Some(suffix)) => format!(
                "/docviewer/result/{brd_id}/{seq}/{file_seq}/{}",
                year_month(suffix)
            ),
            (None, None) => continue,
        };

        let path = format!("/{VIEWER_MARKER}?fn={filename}&rs={rs}");
        found.insert(urls::join(base_url, &path));
    }
    found
}

/// `synapviewer.do` links opened from `fileDiv*` containers.
///
/// Bare relative paths are resolved against the page's own directory before
/// the site origin.
fn external_viewer_urls(document: &Html, base_url: &str, page_url: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let (Some(div_sel), Some(anchor_sel)) = (selector(VIEWER_LINK_CONTAINER), selector("a")) else {
        return found;
    };
    let page_dir = urls::page_directory(page_url);

    for div in document.select(&div_sel) {
        for link in div.select(&anchor_sel) {
            let onclick = link.value().attr("onclick").unwrap_or("");
            let Some(caps) = VIEWER_OPEN_RE.captures(onclick) else {
                continue;
            };
            let target = &caps[1];
            let target = if target.starts_with("http://")
                || target.starts_with("https://")
                || target.starts_with('/')
            {
                target.to_string()
            } else {
                format!("{page_dir}{target}")
            };
            found.insert(urls::join(base_url, &target));
        }
    }
    found
}
