//! Chunk merging and whitespace cleanup for extracted frame text.

use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

static NEWLINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Separator placed between surviving chunks.
pub const CHUNK_SEPARATOR: &str = "\n\n";

fn chunk_key(chunk: &str) -> (usize, u64) {
    let mut hasher = DefaultHasher::new();
    chunk.hash(&mut hasher);
    (chunk.len(), hasher.finish())
}

/// Trim each chunk, deduplicate by `(length, hash)` keeping first-seen
/// order, then join them with a blank line. Whitespace-only chunks are
/// skipped.
pub fn merge_chunks<I, S>(chunks: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut kept: Vec<String> = Vec::new();
    for chunk in chunks {
        let chunk = chunk.as_ref().trim();
        if chunk.is_empty() {
            continue;
        }
        if seen.insert(chunk_key(chunk)) {
            kept.push(chunk.to_string());
        }
    }
    kept.join(CHUNK_SEPARATOR)
}

/// Collapse every whitespace run to one space, collapse 3+ newlines to two,
/// then trim.
///
/// The first pass already removes newlines, so the output is a single line
/// with no doubled spaces.
pub fn clean_text(text: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(text, " ");
    let collapsed = NEWLINE_RUN.replace_all(&collapsed, "\n\n");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_dedupes_in_first_seen_order() {
        let merged = merge_chunks(["alpha", "beta", "alpha", "gamma", "beta"]);
        assert_eq!(merged, "alpha\n\nbeta\n\ngamma");
    }

    #[test]
    fn test_merge_skips_blank_chunks() {
        let merged = merge_chunks(vec![String::new(), "  \n".into(), "body".into()]);
        assert_eq!(merged, "body");
        assert_eq!(merge_chunks(Vec::<String>::new()), "");
    }

    #[test]
    fn test_merge_ignores_surrounding_whitespace() {
        let merged = merge_chunks(vec!["body\n".to_string(), "body".into(), "  tail ".into()]);
        assert_eq!(merged, "body\n\ntail");
    }

    #[test]
    fn test_merge_keeps_same_length_different_text() {
        let merged = merge_chunks(["abc", "abd"]);
        assert_eq!(merged, "abc\n\nabd");
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        let cleaned = clean_text("  제목\n\n\n\n본문   내용\t\t끝  ");
        assert_eq!(cleaned, "제목 본문 내용 끝");
    }

    #[test]
    fn test_clean_text_output_has_no_runs() {
        let inputs = [
            "a\n\n\n\nb",
            "x  y   z",
            "\n\n\n",
            "line one\r\n\r\n\r\nline two \u{a0} end",
            "",
        ];
        for input in inputs {
            let cleaned = clean_text(input);
            assert!(!cleaned.contains("\n\n\n"), "{cleaned:?}");
            assert!(!cleaned.contains("  "), "{cleaned:?}");
            assert_eq!(cleaned, cleaned.trim());
        }
    }
}
