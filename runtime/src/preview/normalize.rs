//! Candidate URL filtering and canonicalization.

use super::VIEWER_MARKER;
use std::collections::BTreeSet;

/// Why a candidate was left out of the accepted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    NotHttp,
    MissingViewerMarker,
    ContainsHangul,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Empty => "empty",
            Self::NotHttp => "not an http(s) URL",
            Self::MissingViewerMarker => "no viewer path",
            Self::ContainsHangul => "contains Hangul (mis-resolved path)",
        };
        f.write_str(reason)
    }
}

/// Precomposed Hangul syllables.
pub fn contains_hangul(text: &str) -> bool {
    text.chars().any(|c| ('\u{AC00}'..='\u{D7A3}').contains(&c))
}

pub fn encode_spaces(url: &str) -> String {
    url.replace(' ', "%20")
}

/// Classify one raw candidate, returning the canonical form if accepted.
pub fn accept(raw: &str) -> Result<String, Rejection> {
    let clean = raw.trim();
    if clean.is_empty() {
        return Err(Rejection::Empty);
    }
    if !clean.starts_with("http") {
        return Err(Rejection::NotHttp);
    }
    if !clean.contains(VIEWER_MARKER) {
        return Err(Rejection::MissingViewerMarker);
    }
    if contains_hangul(clean) {
        return Err(Rejection::ContainsHangul);
    }
    Ok(encode_spaces(clean))
}

/// Filter candidates down to canonical viewer URLs, sorted and deduplicated.
///
/// When nothing passes the filter, every non-empty raw entry is returned
/// with spaces encoded instead, so an empty result always means no
/// candidate was found at all. Applying this twice gives the same result.
pub fn normalize_preview_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let raw: BTreeSet<String> = urls
        .into_iter()
        .map(|u| u.as_ref().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    let accepted: BTreeSet<String> = raw.iter().filter_map(|u| accept(u).ok()).collect();
    if !accepted.is_empty() {
        return accepted.into_iter().collect();
    }

    raw.iter()
        .map(|u| encode_spaces(u))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
