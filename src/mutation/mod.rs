// src/mutation/mod.rs
//! The mutation model: a closed sum of four site kinds, the per-kind
//! replacement catalogues, and id planning.
//!
//! Mutations are plain records captured at discovery time — byte ranges,
//! type descriptors and flags — so nothing here borrows the AST. The
//! catalogue decides, per site, the ordered list of surviving variants;
//! planning turns that into dense id spans in source order.

pub mod remove_stmt;
pub mod replace_binary;
pub mod replace_expr;
pub mod replace_unary;

use crate::ids::IdAllocator;
use crate::source_range::SourceRangeInfo;
use crate::typing::TypeKind;
use std::collections::HashSet;

pub use remove_stmt::RemoveStmtMutation;
pub use replace_binary::ReplaceBinaryOperatorMutation;
pub use replace_expr::{ExprFlags, ExprVariant, ReplaceExprMutation};
pub use replace_unary::{ReplaceUnaryOperatorMutation, UnaryVariant};

/// Half-open byte range in the original source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    pub start: usize,
    pub end: usize,
}

impl ByteSpan {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A builtin type plus the volatility that must propagate into generated
/// reference parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDesc {
    pub kind: TypeKind,
    pub volatile: bool,
}

impl TypeDesc {
    #[must_use]
    pub fn plain(kind: TypeKind) -> Self {
        Self {
            kind,
            volatile: false,
        }
    }

    /// Spelling used in generated code, e.g. `volatile unsigned int&`.
    #[must_use]
    pub fn code(&self, reference: bool) -> String {
        let vol = if self.volatile { "volatile " } else { "" };
        let amp = if reference { "&" } else { "" };
        format!("{vol}{}{amp}", self.kind.name())
    }

    /// Identifier fragment for dispatcher names: spaces become underscores
    /// and references are never part of the name.
    #[must_use]
    pub fn ident(&self) -> String {
        let vol = if self.volatile { "volatile_" } else { "" };
        format!("{vol}{}", space_to_underscore(self.kind.name()))
    }
}

/// Types such as `unsigned int` appear in synthesised function names.
#[must_use]
pub fn space_to_underscore(input: &str) -> String {
    input.replace(' ', "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    PreInc,
    PostInc,
    PreDec,
    PostDec,
    /// Bitwise complement `~`.
    Not,
    Plus,
    Minus,
    /// Logical not `!`.
    LNot,
}

impl UnaryOp {
    #[must_use]
    pub fn clang_name(self) -> &'static str {
        match self {
            Self::PreInc => "PreInc",
            Self::PostInc => "PostInc",
            Self::PreDec => "PreDec",
            Self::PostDec => "PostDec",
            Self::Not => "Not",
            Self::Plus => "Plus",
            Self::Minus => "Minus",
            Self::LNot => "LNot",
        }
    }

    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::PreInc | Self::PostInc => "++",
            Self::PreDec | Self::PostDec => "--",
            Self::Not => "~",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::LNot => "!",
        }
    }

    #[must_use]
    pub fn is_prefix(self) -> bool {
        !matches!(self, Self::PostInc | Self::PostDec)
    }

    #[must_use]
    pub fn is_inc_dec(self) -> bool {
        matches!(
            self,
            Self::PreInc | Self::PostInc | Self::PreDec | Self::PostDec
        )
    }

    /// Operators that write through their operand.
    #[must_use]
    pub fn has_side_effects(self) -> bool {
        self.is_inc_dec()
    }

    #[must_use]
    pub fn from_expr_token(token: &str) -> Option<Self> {
        match token {
            "~" => Some(Self::Not),
            "!" => Some(Self::LNot),
            "-" => Some(Self::Minus),
            "+" => Some(Self::Plus),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_update_token(token: &str, prefix: bool) -> Option<Self> {
        match (token, prefix) {
            ("++", true) => Some(Self::PreInc),
            ("++", false) => Some(Self::PostInc),
            ("--", true) => Some(Self::PreDec),
            ("--", false) => Some(Self::PostDec),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinFamily {
    Arithmetic,
    Bitwise,
    Relational,
    Logical,
    Assignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    LT,
    GT,
    LE,
    GE,
    EQ,
    NE,
    LAnd,
    LOr,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

impl BinaryOp {
    #[must_use]
    pub fn clang_name(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
            Self::Rem => "Rem",
            Self::And => "And",
            Self::Or => "Or",
            Self::Xor => "Xor",
            Self::Shl => "Shl",
            Self::Shr => "Shr",
            Self::LT => "LT",
            Self::GT => "GT",
            Self::LE => "LE",
            Self::GE => "GE",
            Self::EQ => "EQ",
            Self::NE => "NE",
            Self::LAnd => "LAnd",
            Self::LOr => "LOr",
            Self::Assign => "Assign",
            Self::AddAssign => "AddAssign",
            Self::SubAssign => "SubAssign",
            Self::MulAssign => "MulAssign",
            Self::DivAssign => "DivAssign",
            Self::RemAssign => "RemAssign",
            Self::AndAssign => "AndAssign",
            Self::OrAssign => "OrAssign",
            Self::XorAssign => "XorAssign",
            Self::ShlAssign => "ShlAssign",
            Self::ShrAssign => "ShrAssign",
        }
    }

    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::LT => "<",
            Self::GT => ">",
            Self::LE => "<=",
            Self::GE => ">=",
            Self::EQ => "==",
            Self::NE => "!=",
            Self::LAnd => "&&",
            Self::LOr => "||",
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
            Self::RemAssign => "%=",
            Self::AndAssign => "&=",
            Self::OrAssign => "|=",
            Self::XorAssign => "^=",
            Self::ShlAssign => "<<=",
            Self::ShrAssign => ">>=",
        }
    }

    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            "&" => Self::And,
            "|" => Self::Or,
            "^" => Self::Xor,
            "<<" => Self::Shl,
            ">>" => Self::Shr,
            "<" => Self::LT,
            ">" => Self::GT,
            "<=" => Self::LE,
            ">=" => Self::GE,
            "==" => Self::EQ,
            "!=" => Self::NE,
            "&&" => Self::LAnd,
            "||" => Self::LOr,
            "=" => Self::Assign,
            "+=" => Self::AddAssign,
            "-=" => Self::SubAssign,
            "*=" => Self::MulAssign,
            "/=" => Self::DivAssign,
            "%=" => Self::RemAssign,
            "&=" => Self::AndAssign,
            "|=" => Self::OrAssign,
            "^=" => Self::XorAssign,
            "<<=" => Self::ShlAssign,
            ">>=" => Self::ShrAssign,
            _ => return None,
        };
        Some(op)
    }

    #[must_use]
    pub fn family(self) -> BinFamily {
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem => BinFamily::Arithmetic,
            Self::And | Self::Or | Self::Xor | Self::Shl | Self::Shr => BinFamily::Bitwise,
            Self::LT | Self::GT | Self::LE | Self::GE | Self::EQ | Self::NE => {
                BinFamily::Relational
            }
            Self::LAnd | Self::LOr => BinFamily::Logical,
            _ => BinFamily::Assignment,
        }
    }

    #[must_use]
    pub fn is_assignment(self) -> bool {
        self.family() == BinFamily::Assignment
    }

    /// Assignment operators that only exist for integer operands.
    #[must_use]
    pub fn integer_only(self) -> bool {
        matches!(
            self,
            Self::Rem
                | Self::And
                | Self::Or
                | Self::Xor
                | Self::Shl
                | Self::Shr
                | Self::RemAssign
                | Self::AndAssign
                | Self::OrAssign
                | Self::XorAssign
                | Self::ShlAssign
                | Self::ShrAssign
        )
    }
}

/// One mutation site. A closed set: the catalogue and rewriter dispatch on
/// a single match each.
#[derive(Debug, Clone)]
pub enum Mutation {
    RemoveStmt(RemoveStmtMutation),
    ReplaceExpr(ReplaceExprMutation),
    ReplaceUnaryOperator(ReplaceUnaryOperatorMutation),
    ReplaceBinaryOperator(ReplaceBinaryOperatorMutation),
}

impl Mutation {
    #[must_use]
    pub fn range(&self) -> ByteSpan {
        match self {
            Self::RemoveStmt(m) => m.range,
            Self::ReplaceExpr(m) => m.range,
            Self::ReplaceUnaryOperator(m) => m.range,
            Self::ReplaceBinaryOperator(m) => m.range,
        }
    }

    #[must_use]
    pub fn info(&self) -> &SourceRangeInfo {
        match self {
            Self::RemoveStmt(m) => &m.info,
            Self::ReplaceExpr(m) => &m.info,
            Self::ReplaceUnaryOperator(m) => &m.info,
            Self::ReplaceBinaryOperator(m) => &m.info,
        }
    }
}

/// Ordered surviving variants of one site.
#[derive(Debug, Clone)]
pub enum VariantSet {
    Remove,
    Expr(Vec<ExprVariant>),
    Unary(Vec<UnaryVariant>),
    Binary(Vec<BinaryOp>),
}

impl VariantSet {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Remove => 1,
            Self::Expr(v) => v.len(),
            Self::Unary(v) => v.len(),
            Self::Binary(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Manifest labels, in offset order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        match self {
            Self::Remove => vec!["omit".to_string()],
            Self::Expr(v) => v.iter().map(|x| x.label().to_string()).collect(),
            Self::Unary(v) => v.iter().map(|x| x.label()).collect(),
            Self::Binary(v) => v.iter().map(|x| x.token().to_string()).collect(),
        }
    }

    /// Keeps only the variants whose offset satisfies `keep`; `None` when
    /// nothing survives (a removal site is all-or-nothing).
    #[must_use]
    fn filtered(&self, keep: impl Fn(usize) -> bool) -> Option<Self> {
        fn retain<T: Clone>(items: &[T], keep: impl Fn(usize) -> bool) -> Vec<T> {
            items
                .iter()
                .enumerate()
                .filter(|(i, _)| keep(*i))
                .map(|(_, v)| v.clone())
                .collect()
        }
        match self {
            Self::Remove => keep(0).then_some(Self::Remove),
            Self::Expr(v) => Some(Self::Expr(retain(v, keep))),
            Self::Unary(v) => Some(Self::Unary(retain(v, keep))),
            Self::Binary(v) => Some(Self::Binary(retain(v, keep))),
        }
    }
}

/// The full variant set a site would get in an unrestricted run.
#[must_use]
pub fn surviving_variants(mutation: &Mutation, optimise: bool) -> VariantSet {
    match mutation {
        Mutation::RemoveStmt(_) => VariantSet::Remove,
        Mutation::ReplaceExpr(m) => VariantSet::Expr(replace_expr::variants(m, optimise)),
        Mutation::ReplaceUnaryOperator(m) => {
            VariantSet::Unary(replace_unary::variants(m, optimise))
        }
        Mutation::ReplaceBinaryOperator(m) => {
            VariantSet::Binary(replace_binary::variants(m, optimise))
        }
    }
}

/// A site with its allocated id span. `base_id` is global; generated code
/// uses `base_id - first_mutation_id_in_file`.
#[derive(Debug, Clone)]
pub struct PlannedSite {
    pub mutation_index: usize,
    pub base_id: i32,
    pub variants: VariantSet,
}

/// Assigns dense ids to every emitted site.
///
/// Sites are ordered by (start asc, end desc, discovery index): reading
/// order, outermost first at equal starts. This yields the source-order
/// monotonicity and density guarantees. With an `enabled` restriction,
/// variants keep or lose their slot by the file-local id they would have
/// had in an unrestricted run; surviving variants are then re-densified.
/// The result is indexed by discovery index; `None` marks sites with no
/// surviving variant.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn build_plan(
    mutations: &[Mutation],
    optimise: bool,
    enabled: Option<&HashSet<i32>>,
    alloc: &mut IdAllocator,
) -> Vec<Option<PlannedSite>> {
    let mut order: Vec<usize> = (0..mutations.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = mutations[a].range();
        let rb = mutations[b].range();
        ra.start
            .cmp(&rb.start)
            .then(rb.end.cmp(&ra.end))
            .then(a.cmp(&b))
    });

    let mut plans: Vec<Option<PlannedSite>> = vec![None; mutations.len()];
    let mut shadow_local: i32 = 0;
    for index in order {
        let full = surviving_variants(&mutations[index], optimise);
        let base_shadow = shadow_local;
        shadow_local += full.len() as i32;
        let kept = match enabled {
            None => Some(full),
            Some(set) => full.filtered(|offset| set.contains(&(base_shadow + offset as i32))),
        };
        let Some(kept) = kept else { continue };
        if kept.is_empty() {
            continue;
        }
        let base_id = alloc.take(kept.len());
        plans[index] = Some(PlannedSite {
            mutation_index: index,
            base_id,
            variants: kept,
        });
    }
    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_range::SourceRangeInfo;
    use crate::typing::TypeKind;

    fn dummy_info() -> SourceRangeInfo {
        SourceRangeInfo::new("x", 0, 1)
    }

    fn expr_at(start: usize, end: usize) -> Mutation {
        Mutation::ReplaceExpr(ReplaceExprMutation {
            range: ByteSpan::new(start, end),
            info: dummy_info(),
            ty: TypeDesc::plain(TypeKind::Int),
            flags: ExprFlags::default(),
            constant: false,
            pure_expr: true,
            value: None,
        })
    }

    #[test]
    fn test_plan_ids_follow_source_order() {
        // Discovery order is post-order (inner first); the plan must be
        // lexical: outer [0,10) before inner [2,4) before trailing [6,8).
        let mutations = vec![expr_at(2, 4), expr_at(6, 8), expr_at(0, 10)];
        let mut alloc = IdAllocator::new();
        alloc.begin_file();
        let plans = build_plan(&mutations, false, None, &mut alloc);

        let base = |i: usize| plans[i].as_ref().expect("planned").base_id;
        assert!(base(2) < base(0));
        assert!(base(0) < base(1));
    }

    #[test]
    fn test_plan_ids_are_dense() {
        let mutations = vec![expr_at(0, 3), expr_at(4, 7)];
        let mut alloc = IdAllocator::new();
        alloc.begin_file();
        let plans = build_plan(&mutations, false, None, &mut alloc);
        let mut ids: Vec<i32> = Vec::new();
        for plan in plans.iter().flatten() {
            for offset in 0..plan.variants.len() {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                ids.push(plan.base_id + offset as i32);
            }
        }
        ids.sort_unstable();
        let expected: Vec<i32> = (0..alloc.next_id()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_enabled_filter_restricts_and_redensifies() {
        let mutations = vec![expr_at(0, 3)];
        // Unrestricted signed int: 6 variants with local ids 0..=5. Keep 1
        // and 3 only.
        let enabled: HashSet<i32> = [1, 3].into_iter().collect();
        let mut alloc = IdAllocator::new();
        alloc.begin_file();
        let plans = build_plan(&mutations, false, Some(&enabled), &mut alloc);
        let plan = plans[0].as_ref().expect("planned");
        assert_eq!(plan.variants.len(), 2);
        assert_eq!(plan.base_id, 0);
        assert_eq!(alloc.next_id(), 2);
    }

    #[test]
    fn test_enabled_filter_can_drop_sites() {
        let mutations = vec![expr_at(0, 3)];
        let enabled: HashSet<i32> = HashSet::new();
        let mut alloc = IdAllocator::new();
        alloc.begin_file();
        let plans = build_plan(&mutations, false, Some(&enabled), &mut alloc);
        assert!(plans[0].is_none());
        assert_eq!(alloc.next_id(), 0);
    }

    #[test]
    fn test_type_desc_rendering() {
        let ty = TypeDesc {
            kind: TypeKind::UInt,
            volatile: true,
        };
        assert_eq!(ty.code(true), "volatile unsigned int&");
        assert_eq!(ty.ident(), "volatile_unsigned_int");
        assert_eq!(TypeDesc::plain(TypeKind::Int).code(false), "int");
    }
}
