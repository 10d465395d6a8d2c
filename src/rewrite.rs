// src/rewrite.rs
//! Text edits and prelude synthesis.
//!
//! `EditBuffer` keeps the original bytes untouched and accumulates edits
//! against original positions: replacements of whole token ranges and
//! zero-width insertions at statement boundaries. Call-site substitutions
//! compose by extracting the *rewritten* text of a nested range before
//! replacing the enclosing one, the edits it absorbed are dropped in the
//! same step. Overlap that is not clean nesting means an exclusion rule was
//! violated upstream; that is a bug, and the buffer panics rather than emit
//! corrupt code.

use crate::ids::IdAllocator;
use crate::lang::Lang;
use crate::mutation::{self, Mutation, PlannedSite, VariantSet};
use std::collections::BTreeSet;

/// Priority of edits sharing a position: closers end an earlier construct
/// and must precede openers of the next one; replacements consume source
/// and come last.
const PRIO_CLOSER: u8 = 0;
const PRIO_OPENER: u8 = 1;
const PRIO_REPLACE: u8 = 2;

#[derive(Debug, Clone)]
struct Edit {
    start: usize,
    end: usize,
    prio: u8,
    seq: usize,
    text: String,
}

/// An edit set over one immutable source buffer.
#[derive(Debug)]
pub struct EditBuffer<'a> {
    source: &'a str,
    edits: Vec<Edit>,
    next_seq: usize,
}

impl<'a> EditBuffer<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            edits: Vec::new(),
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Inserts text that opens a construct at `pos` (e.g. `if (…) { `).
    pub fn insert_before(&mut self, pos: usize, text: String) {
        self.push(Edit {
            start: pos,
            end: pos,
            prio: PRIO_OPENER,
            seq: 0,
            text,
        });
    }

    /// Inserts text that closes a construct at `pos` (e.g. ` }`).
    pub fn insert_after(&mut self, pos: usize, text: String) {
        self.push(Edit {
            start: pos,
            end: pos,
            prio: PRIO_CLOSER,
            seq: 0,
            text,
        });
    }

    /// Replaces `[start, end)` with `text`, absorbing every edit nested
    /// inside the range (their content is expected to already be part of
    /// `text`, via [`EditBuffer::rewritten_text`]).
    ///
    /// # Panics
    /// Panics when an existing replacement partially overlaps the range;
    /// that would silently corrupt the output.
    pub fn replace(&mut self, start: usize, end: usize, text: String) {
        for edit in &self.edits {
            let disjoint = edit.end <= start || edit.start >= end;
            assert!(
                disjoint || Self::absorbed(edit, start, end),
                "rewrite of {start}..{end} overlaps an earlier edit {}..{}",
                edit.start,
                edit.end
            );
        }
        self.edits.retain(|e| !Self::absorbed(e, start, end));
        self.push(Edit {
            start,
            end,
            prio: PRIO_REPLACE,
            seq: 0,
            text,
        });
    }

    /// True when `edit` sits inside `[start, end)` and its text belongs to
    /// the rewritten content of that range. Zero-width edits on the
    /// boundary belong to the range only from the matching side.
    fn absorbed(edit: &Edit, start: usize, end: usize) -> bool {
        if edit.start < start || edit.end > end {
            return false;
        }
        if edit.start == edit.end {
            if edit.start == start {
                return edit.prio == PRIO_OPENER;
            }
            if edit.end == end {
                return edit.prio == PRIO_CLOSER;
            }
            return true;
        }
        true
    }

    /// The current text of `[start, end)` with all nested edits applied.
    #[must_use]
    pub fn rewritten_text(&self, start: usize, end: usize) -> String {
        let mut contained: Vec<&Edit> = self
            .edits
            .iter()
            .filter(|e| Self::absorbed(e, start, end))
            .collect();
        contained.sort_by_key(|e| (e.start, e.prio, e.seq));

        let mut out = String::new();
        let mut cursor = start;
        for edit in contained {
            assert!(
                edit.start >= cursor,
                "overlapping edits at {}..{}",
                edit.start,
                edit.end
            );
            out.push_str(&self.source[cursor..edit.start]);
            out.push_str(&edit.text);
            cursor = edit.end;
        }
        out.push_str(&self.source[cursor..end]);
        out
    }

    /// Renders the fully edited buffer.
    #[must_use]
    pub fn render(&self) -> String {
        self.rewritten_text(0, self.source.len())
    }

    fn push(&mut self, mut edit: Edit) {
        edit.seq = self.next_seq;
        self.next_seq += 1;
        self.edits.push(edit);
    }
}

/// What the rewriter emits at each site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    /// Dispatcher calls selecting mutants at run time.
    Mutants,
    /// Coverage recorders only; behaviour is unchanged.
    Coverage,
}

/// Options threaded from the driver into rewriting.
#[derive(Debug, Clone, Copy)]
pub struct RewriteOptions {
    pub lang: Lang,
    pub optimise: bool,
    pub mode: EmitMode,
}

/// Applies every planned mutation to `source` and returns the rewritten
/// buffer, or `None` when nothing was emitted (no prelude either).
#[must_use]
pub fn rewrite(
    source: &str,
    mutations: &[Mutation],
    plans: &[Option<PlannedSite>],
    alloc: &IdAllocator,
    first_decl_byte: Option<usize>,
    opts: RewriteOptions,
) -> Option<String> {
    let mut order: Vec<&PlannedSite> = plans.iter().flatten().collect();
    if order.is_empty() {
        return None;
    }
    // Innermost first: apply order is the reverse of reading order so that
    // enclosing call sites pick up the rewritten text of their operands.
    order.sort_by(|a, b| {
        let ra = mutations[a.mutation_index].range();
        let rb = mutations[b.mutation_index].range();
        rb.start
            .cmp(&ra.start)
            .then(ra.end.cmp(&rb.end))
            .then(a.base_id.cmp(&b.base_id))
    });

    let mut buf = EditBuffer::new(source);
    let mut decls: BTreeSet<String> = BTreeSet::new();
    for site in order {
        let local_id = site.base_id - alloc.first_id_in_file();
        let mutation = &mutations[site.mutation_index];
        match opts.mode {
            EmitMode::Coverage => apply_coverage(mutation, local_id, &mut buf),
            EmitMode::Mutants => {
                apply_mutants(mutation, &site.variants, local_id, opts, &mut buf, &mut decls);
            }
        }
    }

    let prelude = build_prelude(opts, &decls);
    buf.insert_before(first_decl_byte.unwrap_or(0), prelude);
    Some(buf.render())
}

fn apply_mutants(
    mutation: &Mutation,
    variants: &VariantSet,
    local_id: i32,
    opts: RewriteOptions,
    buf: &mut EditBuffer,
    decls: &mut BTreeSet<String>,
) {
    match (mutation, variants) {
        (Mutation::RemoveStmt(m), VariantSet::Remove) => {
            mutation::remove_stmt::apply(m, local_id, buf);
        }
        (Mutation::ReplaceExpr(m), VariantSet::Expr(v)) => {
            mutation::replace_expr::apply(m, v, local_id, opts.optimise, opts.lang, buf, decls);
        }
        (Mutation::ReplaceUnaryOperator(m), VariantSet::Unary(v)) => {
            mutation::replace_unary::apply(m, v, local_id, opts.lang, buf, decls);
        }
        (Mutation::ReplaceBinaryOperator(m), VariantSet::Binary(v)) => {
            mutation::replace_binary::apply(m, v, local_id, opts.optimise, opts.lang, buf, decls);
        }
        _ => panic!("variant set does not match mutation kind"),
    }
}

fn apply_coverage(mutation: &Mutation, local_id: i32, buf: &mut EditBuffer) {
    match mutation {
        Mutation::RemoveStmt(m) => {
            buf.insert_before(
                m.range.start,
                format!("__dredd_record_covered_mutants({local_id}); "),
            );
        }
        Mutation::ReplaceExpr(_)
        | Mutation::ReplaceUnaryOperator(_)
        | Mutation::ReplaceBinaryOperator(_) => {
            let range = mutation.range();
            let text = buf.rewritten_text(range.start, range.end);
            buf.replace(
                range.start,
                range.end,
                format!("(__dredd_record_covered_mutants({local_id}), {text})"),
            );
        }
    }
}

fn build_prelude(opts: RewriteOptions, decls: &BTreeSet<String>) -> String {
    let mut prelude = String::new();
    match opts.lang {
        Lang::Cpp => {
            if opts.mode == EmitMode::Mutants {
                prelude.push_str("#include <functional>\n\n");
            }
            prelude.push_str(
                "extern \"C\" bool __dredd_enabled_mutation(int local_mutation_id);\n\
                 extern \"C\" void __dredd_record_covered_mutants(int local_mutation_id);\n\n",
            );
        }
        Lang::C => {
            prelude.push_str("#include <stdbool.h>\n\n");
            prelude.push_str(
                "bool __dredd_enabled_mutation(int local_mutation_id);\n\
                 void __dredd_record_covered_mutants(int local_mutation_id);\n\n",
            );
        }
    }
    if !decls.is_empty() {
        prelude.push_str(
            "#define __DREDD_MUTANT_ENABLED(offset) \
             __dredd_enabled_mutation(local_mutation_id + (offset))\n\n",
        );
        for decl in decls {
            prelude.push_str(decl);
            prelude.push('\n');
        }
    }
    prelude
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_composes_nested_ranges() {
        // "-2": replace the operand, then the whole expression using the
        // operand's rewritten text.
        let mut buf = EditBuffer::new("-2;");
        buf.replace(1, 2, "f(2, 0)".to_string());
        let inner = buf.rewritten_text(0, 2);
        assert_eq!(inner, "-f(2, 0)");
        buf.replace(0, 2, format!("g({inner}, 1)"));
        assert_eq!(buf.render(), "g(-f(2, 0), 1);");
    }

    #[test]
    fn test_same_range_replacement_wraps_previous() {
        let mut buf = EditBuffer::new("a && b");
        buf.replace(0, 6, "inner(a && b, 0)".to_string());
        let text = buf.rewritten_text(0, 6);
        buf.replace(0, 6, format!("outer({text}, 1)"));
        assert_eq!(buf.render(), "outer(inner(a && b, 0), 1)");
    }

    #[test]
    fn test_insertions_at_statement_boundaries() {
        let mut buf = EditBuffer::new("x; y;");
        buf.insert_before(3, "B ".to_string());
        buf.insert_after(5, " E".to_string());
        buf.insert_before(0, "A ".to_string());
        buf.insert_after(2, " D".to_string());
        assert_eq!(buf.render(), "A x; D B y; E");
    }

    #[test]
    fn test_insertions_survive_enclosing_extraction() {
        let mut buf = EditBuffer::new("{ x; }");
        buf.insert_before(2, "W ".to_string());
        buf.insert_after(4, " V".to_string());
        assert_eq!(buf.rewritten_text(0, 6), "{ W x; V }");
    }

    #[test]
    #[should_panic(expected = "overlaps an earlier edit")]
    fn test_partial_overlap_panics() {
        let mut buf = EditBuffer::new("abcdef");
        buf.replace(0, 4, "X".to_string());
        buf.replace(2, 6, "Y".to_string());
    }
}
