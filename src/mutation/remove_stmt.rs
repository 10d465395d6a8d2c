// src/mutation/remove_stmt.rs
//! Statement removal: the statement is wrapped in a guard so that enabling
//! the mutant skips it entirely.
//!
//! The recorded range is the statement extended over trailing comments and
//! one trailing semicolon, so the guard never orphans a `;` and the
//! manifest range covers exactly the guarded text.

use crate::mutation::ByteSpan;
use crate::rewrite::EditBuffer;
use crate::source_range::SourceRangeInfo;

#[derive(Debug, Clone)]
pub struct RemoveStmtMutation {
    /// Extended range: statement plus absorbed comments/semicolon.
    pub range: ByteSpan,
    pub info: SourceRangeInfo,
    pub extended_with_comment: bool,
    pub extended_with_semi: bool,
}

/// Extends a statement's byte range over trailing comments, then over a
/// single trailing semicolon if one follows.
#[must_use]
pub fn extend_range(source: &str, start: usize, end: usize) -> (ByteSpan, bool, bool) {
    let bytes = source.as_bytes();
    let mut pos = end;
    let mut with_comment = false;

    loop {
        let mut probe = pos;
        while probe < bytes.len() && bytes[probe].is_ascii_whitespace() {
            probe += 1;
        }
        if probe + 1 < bytes.len() && bytes[probe] == b'/' && bytes[probe + 1] == b'/' {
            let mut line_end = probe + 2;
            while line_end < bytes.len() && bytes[line_end] != b'\n' {
                line_end += 1;
            }
            pos = line_end;
            with_comment = true;
        } else if probe + 1 < bytes.len() && bytes[probe] == b'/' && bytes[probe + 1] == b'*' {
            let Some(close) = source[probe + 2..].find("*/") else {
                break;
            };
            pos = probe + 2 + close + 2;
            with_comment = true;
        } else {
            break;
        }
    }

    let mut probe = pos;
    while probe < bytes.len() && bytes[probe].is_ascii_whitespace() {
        probe += 1;
    }
    let with_semi = probe < bytes.len() && bytes[probe] == b';';
    if with_semi {
        pos = probe + 1;
    }

    (ByteSpan::new(start, pos), with_comment, with_semi)
}

/// Wraps the statement in `if (!__dredd_enabled_mutation(id)) { … }`.
pub fn apply(m: &RemoveStmtMutation, local_id: i32, buf: &mut EditBuffer) {
    buf.insert_before(
        m.range.start,
        format!("if (!__dredd_enabled_mutation({local_id})) {{ "),
    );
    // When a single-line comment was absorbed and no semicolon followed, a
    // space would leave the closing brace inside the comment.
    let closer = if m.extended_with_comment && !m.extended_with_semi {
        "\n}"
    } else {
        " }"
    };
    buf.insert_after(m.range.end, closer.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation(source: &str, start: usize, end: usize) -> RemoveStmtMutation {
        let (range, with_comment, with_semi) = extend_range(source, start, end);
        RemoveStmtMutation {
            range,
            info: SourceRangeInfo::new(source, range.start, range.end),
            extended_with_comment: with_comment,
            extended_with_semi: with_semi,
        }
    }

    #[test]
    fn test_statement_already_ending_in_semicolon() {
        let src = "void foo() { 1 + 2; }";
        let m = mutation(src, 13, 19);
        assert_eq!(m.range, ByteSpan::new(13, 19));
        assert!(!m.extended_with_comment);
        assert!(!m.extended_with_semi);

        let mut buf = EditBuffer::new(src);
        apply(&m, 0, &mut buf);
        assert_eq!(
            buf.render(),
            "void foo() { if (!__dredd_enabled_mutation(0)) { 1 + 2; } }"
        );
    }

    #[test]
    fn test_range_extends_over_block_comment_and_semicolon() {
        // A range that stops before its semicolon absorbs comments first.
        let src = "x = 1 /* note */ ;";
        let (range, with_comment, with_semi) = extend_range(src, 0, 5);
        assert_eq!(&src[range.start..range.end], "x = 1 /* note */ ;");
        assert!(with_comment);
        assert!(with_semi);
    }

    #[test]
    fn test_line_comment_without_semicolon_takes_newline() {
        let src = "void foo() { { 1; } // tail\n}";
        let (range, with_comment, with_semi) = extend_range(src, 13, 19);
        assert!(with_comment);
        assert!(!with_semi);
        let m = RemoveStmtMutation {
            range,
            info: SourceRangeInfo::new(src, range.start, range.end),
            extended_with_comment: with_comment,
            extended_with_semi: with_semi,
        };
        let mut buf = EditBuffer::new(src);
        apply(&m, 2, &mut buf);
        assert_eq!(
            buf.render(),
            "void foo() { if (!__dredd_enabled_mutation(2)) { { 1; } // tail\n}\n}"
        );
    }

    #[test]
    fn test_recorded_span_covers_semicolon() {
        let src = "void foo() { 1 + 2; }";
        let m = mutation(src, 13, 19);
        assert_eq!(m.info.start.line, 1);
        assert_eq!(m.info.start.column, 14);
        assert_eq!(m.info.end.column, 20);
        assert_eq!(m.info.snippet, "1 + 2;");
    }
}
