//! Textual stylesheet minification.
//!
//! The rules are purely lexical and work on raw bytes: comment markers and
//! whitespace inside quoted strings are rewritten like everything else, and
//! bytes outside those patterns pass through untouched whatever their encoding.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s-u)/\*.*?\*/").expect("valid comment pattern"));

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u:\s)+").expect("valid whitespace pattern"));

/// Separator tightening, applied in order over the whole text.
const TIGHTEN: [(&[u8], &[u8]); 6] = [
    (b"; ", b";"),
    (b": ", b":"),
    (b" {", b"{"),
    (b"{ ", b"{"),
    (b" :", b":"),
    (b" }", b"}"),
];

/// Strip block comments, collapse whitespace and tighten separators.
pub fn minify(css: &[u8]) -> Vec<u8> {
    let stripped = BLOCK_COMMENT.replace_all(css, &b""[..]);
    let collapsed = WHITESPACE_RUN.replace_all(&stripped, &b" "[..]);

    TIGHTEN
        .iter()
        .fold(collapsed.into_owned(), |text, &(from, to)| {
            replace_bytes(&text, from, to)
        })
}

fn replace_bytes(text: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.windows(from.len()).position(|window| window == from) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(to);
        rest = &rest[pos + from.len()..];
    }
    out.extend_from_slice(rest);
    out
}
