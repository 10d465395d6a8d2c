// src/source_range.rs
//! Canonical source positions for the mutation manifest.
//!
//! Lines and columns are 1-based; the end column points one past the last
//! character of the range, matching how compilers report token ranges.

use serde::{Deserialize, Serialize};

/// Longest snippet stored verbatim; longer ranges are elided symmetrically.
const MAX_SNIPPET_LEN: usize = 36;
const SNIPPET_EDGE_LEN: usize = 10;
const SNIPPET_ELISION: &str = " ... [snip] ... ";

/// A 1-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

/// Canonicalised description of a byte range in a source buffer: its
/// line/column span and a short snippet of the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRangeInfo {
    pub start: LineCol,
    pub end: LineCol,
    pub snippet: String,
}

impl SourceRangeInfo {
    #[must_use]
    pub fn new(source: &str, start_byte: usize, end_byte: usize) -> Self {
        Self {
            start: line_col_at(source, start_byte),
            end: line_col_at(source, end_byte),
            snippet: snippet_of(source, start_byte, end_byte),
        }
    }
}

/// Computes the 1-based line/column of a byte offset.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn line_col_at(source: &str, byte: usize) -> LineCol {
    let byte = byte.min(source.len());
    let prefix = &source.as_bytes()[..byte];
    let line = prefix.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = prefix
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |p| p + 1);
    LineCol {
        line: line as u32,
        column: (byte - line_start + 1) as u32,
    }
}

/// Extracts the snippet for a range, eliding the middle of long ranges:
/// the first and last ten bytes joined by ` ... [snip] ... `.
#[must_use]
pub fn snippet_of(source: &str, start_byte: usize, end_byte: usize) -> String {
    let bytes = source.as_bytes();
    let start = start_byte.min(bytes.len());
    let end = end_byte.clamp(start, bytes.len());
    let raw = &bytes[start..end];

    if raw.len() <= MAX_SNIPPET_LEN {
        return String::from_utf8_lossy(raw).into_owned();
    }
    let head = String::from_utf8_lossy(&raw[..SNIPPET_EDGE_LEN]);
    let tail = String::from_utf8_lossy(&raw[raw.len() - SNIPPET_EDGE_LEN..]);
    format!("{head}{SNIPPET_ELISION}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_single_line() {
        let src = "void foo() { 1 + 2; }";
        assert_eq!(line_col_at(src, 0), LineCol { line: 1, column: 1 });
        assert_eq!(line_col_at(src, 13), LineCol { line: 1, column: 14 });
        assert_eq!(line_col_at(src, 19), LineCol { line: 1, column: 20 });
    }

    #[test]
    fn test_line_col_multi_line() {
        let src = "int a;\nint b;\n";
        assert_eq!(line_col_at(src, 7), LineCol { line: 2, column: 1 });
        assert_eq!(line_col_at(src, 11), LineCol { line: 2, column: 5 });
    }

    #[test]
    fn test_short_snippet_verbatim() {
        let src = "x + y";
        assert_eq!(snippet_of(src, 0, 5), "x + y");
    }

    #[test]
    fn test_snippet_at_limit_is_verbatim() {
        let src: String = "a".repeat(36);
        assert_eq!(snippet_of(&src, 0, 36), src);
    }

    #[test]
    fn test_snippet_over_limit_is_elided() {
        let src: String = (b'a'..=b'z').chain(b'a'..=b'z').map(char::from).collect();
        let snippet = snippet_of(&src, 0, 37);
        assert_eq!(snippet.len(), 10 + SNIPPET_ELISION.len() + 10);
        assert_eq!(&snippet[..10], &src[..10]);
        assert!(snippet.ends_with(&src[27..37]));
        assert!(snippet.contains("[snip]"));
    }

    #[test]
    fn test_range_info_spans_tokens() {
        let src = "void foo() { 1 + 2; }";
        let info = SourceRangeInfo::new(src, 13, 19);
        assert_eq!(info.start, LineCol { line: 1, column: 14 });
        assert_eq!(info.end, LineCol { line: 1, column: 20 });
        assert_eq!(info.snippet, "1 + 2;");
    }
}
