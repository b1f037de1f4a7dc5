//! URL helpers for the preview resolver.
//!
//! `url::Url::join` percent-encodes spaces and non-ASCII text. Candidate URLs
//! must keep the reference text exactly as written so the normalizer can
//! still see (and reject) Hangul and encode spaces itself, so joining here is
//! string-based. Only the base is parsed.

use crate::error::{EngineError, EngineResult};
use url::{Position, Url};

/// `scheme://host[:port]` of a page URL.
pub fn base_of(page_url: &str) -> EngineResult<String> {
    let parsed = Url::parse(page_url.trim())
        .map_err(|e| EngineError::InvalidUrl(format!("{page_url}: {e}")))?;
    if !parsed.has_host() {
        return Err(EngineError::InvalidUrl(format!("{page_url}: no host")));
    }
    Ok(parsed[..Position::BeforePath].to_string())
}

/// Directory of the page's own path, with a trailing slash.
///
/// Empty when the page URL cannot be parsed.
pub fn page_directory(page_url: &str) -> String {
    match Url::parse(page_url.trim()) {
        Ok(parsed) => match parsed.path().rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/"),
            None => String::new(),
        },
        Err(_) => String::new(),
    }
}

fn has_scheme(reference: &str) -> bool {
    let Some((scheme, _)) = reference.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolve `reference` against `base`, keeping the reference text verbatim.
///
/// Falls back to the trimmed reference when the base is not an absolute URL.
pub fn join(base: &str, reference: &str) -> String {
    let reference = reference.trim();
    if has_scheme(reference) {
        return reference.to_string();
    }
    let Ok(base) = Url::parse(base.trim()) else {
        return reference.to_string();
    };

    if reference.is_empty() {
        return base.to_string();
    }
    if reference.starts_with("//") {
        return format!("{}:{reference}", base.scheme());
    }
    if reference.starts_with('/') {
        let (path, rest) = split_path(reference);
        return format!(
            "{}{}{rest}",
            &base[..Position::BeforePath],
            remove_dot_segments(path)
        );
    }
    if reference.starts_with('?') {
        return format!("{}{reference}", &base[..Position::AfterPath]);
    }
    if reference.starts_with('#') {
        return format!("{}{reference}", &base[..Position::AfterQuery]);
    }

    let directory = match base.path().rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/"),
        None => "/".to_string(),
    };
    let (path, rest) = split_path(reference);
    format!(
        "{}{}{rest}",
        &base[..Position::BeforePath],
        remove_dot_segments(&format!("{directory}{path}"))
    )
}

fn split_path(reference: &str) -> (&str, &str) {
    match reference.find(['?', '#']) {
        Some(i) => reference.split_at(i),
        None => (reference, ""),
    }
}

fn remove_dot_segments(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);
    let mut out: Vec<&str> = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "." => {
                if i == last {
                    out.push("");
                }
            }
            ".." => {
                if out.len() > 1 {
                    out.pop();
                }
                if i == last {
                    out.push("");
                }
            }
            s => out.push(s),
        }
    }
    out.join("/")
}
