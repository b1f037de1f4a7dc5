//! Charset detection for static page bodies.
//!
//! Older Korean boards often serve EUC-KR with a bare `text/html` header and
//! declare the charset only in a `<meta>` tag. Lookup order: the
//! Content-Type header, then `<meta charset>` or the `http-equiv` form in the
//! first KiB of the body, then UTF-8.

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use std::sync::LazyLock;

/// How much of the body is searched for a meta declaration.
const SNIFF_LIMIT: usize = 1024;

/// Matches both `<meta charset=..>` and the charset inside an `http-equiv`
/// content value.
static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([^"'\s/>;]+)"#)
        .expect("meta charset regex is valid")
});

fn header_charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\''))
    })
}

fn meta_charset(body: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&body[..body.len().min(SNIFF_LIMIT)]);
    META_CHARSET
        .captures(&head)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Pick the encoding for a response body.
pub fn detect(body: &[u8], content_type: Option<&str>) -> &'static Encoding {
    content_type
        .and_then(header_charset)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| meta_charset(body).and_then(|label| Encoding::for_label(label.as_bytes())))
        .unwrap_or(UTF_8)
}

/// Decode a response body to UTF-8, replacing malformed sequences.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = detect(body, content_type);
    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!(encoding = used.name(), "body had malformed sequences");
    }
    text.into_owned()
}
