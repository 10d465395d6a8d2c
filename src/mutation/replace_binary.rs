// src/mutation/replace_binary.rs
//! Binary operator replacement.
//!
//! Replacements never cross operator families: arithmetic, bitwise,
//! relational, logical and assignment each swap among themselves, filtered
//! by operand typing. Value-aware prunings (all right-operand based) are
//! encoded in the dispatcher name so that equal names mean equal bodies.

use crate::lang::Lang;
use crate::mutation::{BinFamily, BinaryOp, ByteSpan, TypeDesc};
use crate::rewrite::EditBuffer;
use crate::source_range::SourceRangeInfo;
use crate::typing::Lit;
use std::collections::BTreeSet;
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct ReplaceBinaryOperatorMutation {
    pub range: ByteSpan,
    pub lhs_range: ByteSpan,
    pub rhs_range: ByteSpan,
    pub info: SourceRangeInfo,
    pub op: BinaryOp,
    pub result_ty: TypeDesc,
    pub lhs_ty: TypeDesc,
    pub rhs_ty: TypeDesc,
    /// Left operand is a modifiable lvalue (assignment requires it; other
    /// families pass it by reference).
    pub lhs_lvalue: bool,
    pub lhs_constant: bool,
    pub rhs_constant: bool,
    /// Folded right-operand value, for redundancy pruning.
    pub rhs_value: Option<Lit>,
}

const ARITHMETIC: [BinaryOp; 5] = [
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::Div,
    BinaryOp::Rem,
];
const BITWISE: [BinaryOp; 5] = [
    BinaryOp::And,
    BinaryOp::Or,
    BinaryOp::Xor,
    BinaryOp::Shl,
    BinaryOp::Shr,
];
const RELATIONAL: [BinaryOp; 6] = [
    BinaryOp::LT,
    BinaryOp::LE,
    BinaryOp::GT,
    BinaryOp::GE,
    BinaryOp::EQ,
    BinaryOp::NE,
];
const LOGICAL: [BinaryOp; 2] = [BinaryOp::LAnd, BinaryOp::LOr];
const ASSIGNMENT: [BinaryOp; 11] = [
    BinaryOp::Assign,
    BinaryOp::AddAssign,
    BinaryOp::SubAssign,
    BinaryOp::MulAssign,
    BinaryOp::DivAssign,
    BinaryOp::RemAssign,
    BinaryOp::AndAssign,
    BinaryOp::OrAssign,
    BinaryOp::XorAssign,
    BinaryOp::ShlAssign,
    BinaryOp::ShrAssign,
];

fn family_ops(family: BinFamily) -> &'static [BinaryOp] {
    match family {
        BinFamily::Arithmetic => &ARITHMETIC,
        BinFamily::Bitwise => &BITWISE,
        BinFamily::Relational => &RELATIONAL,
        BinFamily::Logical => &LOGICAL,
        BinFamily::Assignment => &ASSIGNMENT,
    }
}

fn is_valid_replacement(op: BinaryOp, m: &ReplaceBinaryOperatorMutation) -> bool {
    let floating = m.lhs_ty.kind.is_floating() || m.rhs_ty.kind.is_floating();
    if op.integer_only() && floating {
        return false;
    }
    // Compound arithmetic on bool is ill-formed in C++.
    if op.is_assignment() && op != BinaryOp::Assign && m.lhs_ty.kind.is_bool() {
        return false;
    }
    true
}

fn is_redundant_replacement(op: BinaryOp, m: &ReplaceBinaryOperatorMutation) -> bool {
    let rhs_zero = matches!(m.rhs_value, Some(Lit::Int(0)))
        || matches!(m.rhs_value, Some(Lit::Float(v)) if v == 0.0);
    let rhs_one = matches!(m.rhs_value, Some(Lit::Int(1)))
        || matches!(m.rhs_value, Some(Lit::Float(v)) if v == 1.0);

    // x + 0 == x - 0, x << 0 == x >> 0, x * 1 == x / 1: swapping within the
    // pair cannot change behaviour.
    let pair = |a: BinaryOp, b: BinaryOp| {
        (m.op == a && op == b) || (m.op == b && op == a)
    };
    (rhs_zero && (pair(BinaryOp::Add, BinaryOp::Sub) || pair(BinaryOp::Shl, BinaryOp::Shr)))
        || (rhs_one && pair(BinaryOp::Mul, BinaryOp::Div))
}

/// True when value-aware pruning fires for this site; the dispatcher name
/// must then carry the matching suffix.
fn pruning_suffix(m: &ReplaceBinaryOperatorMutation, optimise: bool) -> &'static str {
    if !optimise {
        return "";
    }
    let rhs_zero = matches!(m.rhs_value, Some(Lit::Int(0)))
        || matches!(m.rhs_value, Some(Lit::Float(v)) if v == 0.0);
    let rhs_one = matches!(m.rhs_value, Some(Lit::Int(1)))
        || matches!(m.rhs_value, Some(Lit::Float(v)) if v == 1.0);
    if rhs_zero && matches!(m.op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Shl | BinaryOp::Shr)
    {
        return "_rhs_zero";
    }
    if rhs_one && matches!(m.op, BinaryOp::Mul | BinaryOp::Div) {
        return "_rhs_one";
    }
    ""
}

/// Ordered surviving variants for one binary operator site.
#[must_use]
pub fn variants(m: &ReplaceBinaryOperatorMutation, optimise: bool) -> Vec<BinaryOp> {
    let mut set = Vec::new();
    for &op in family_ops(m.op.family()) {
        if op == m.op || !is_valid_replacement(op, m) {
            continue;
        }
        if optimise && is_redundant_replacement(op, m) {
            continue;
        }
        set.push(op);
    }
    set
}

/// Stable dispatcher name for this site.
#[must_use]
pub fn function_name(m: &ReplaceBinaryOperatorMutation, optimise: bool) -> String {
    format!(
        "__dredd_replace_binary_operator_{}_{}_{}{}",
        m.op.clang_name(),
        lhs_desc(m).ident(),
        TypeDesc::plain(m.rhs_ty.kind).ident(),
        pruning_suffix(m, optimise)
    )
}

fn lhs_desc(m: &ReplaceBinaryOperatorMutation) -> TypeDesc {
    // Volatility only matters where the dispatcher writes through the left
    // operand; value parameters take a plain copy.
    TypeDesc {
        kind: m.lhs_ty.kind,
        volatile: m.op.is_assignment() && m.lhs_lvalue && m.lhs_ty.volatile,
    }
}

/// Rewrites the call site and records the dispatcher declaration.
pub fn apply(
    m: &ReplaceBinaryOperatorMutation,
    variants: &[BinaryOp],
    local_id: i32,
    optimise: bool,
    lang: Lang,
    buf: &mut EditBuffer,
    decls: &mut BTreeSet<String>,
) {
    let name = function_name(m, optimise);
    let lhs_text = buf.rewritten_text(m.lhs_range.start, m.lhs_range.end);
    let rhs_text = buf.rewritten_text(m.rhs_range.start, m.rhs_range.end);

    let lhs = if m.op.is_assignment() {
        // The assignment target was never rewritten from the inside, so the
        // raw text binds to the reference (or pointer) parameter.
        if lang.has_lambdas() {
            lhs_text
        } else {
            format!("&({lhs_text})")
        }
    } else if m.lhs_constant || !lang.has_lambdas() {
        lhs_text
    } else {
        let ty = TypeDesc::plain(m.lhs_ty.kind).code(false);
        format!("[&]() -> {ty} {{ return static_cast<{ty}>({lhs_text}); }}")
    };
    let rhs = if m.rhs_constant || !lang.has_lambdas() {
        rhs_text
    } else {
        let ty = TypeDesc::plain(m.rhs_ty.kind).code(false);
        format!("[&]() -> {ty} {{ return static_cast<{ty}>({rhs_text}); }}")
    };

    buf.replace(
        m.range.start,
        m.range.end,
        format!("{name}({lhs}, {rhs}, {local_id})"),
    );
    decls.insert(dispatcher(m, variants, &name, lang));
}

fn dispatcher(
    m: &ReplaceBinaryOperatorMutation,
    variants: &[BinaryOp],
    name: &str,
    lang: Lang,
) -> String {
    let assignment = m.op.is_assignment();
    let result = if assignment {
        lhs_desc(m).code(lang.has_lambdas())
    } else {
        TypeDesc::plain(m.result_ty.kind).code(false)
    };

    let (param1, arg1) = if assignment {
        if lang.has_lambdas() {
            (format!("{} arg1", lhs_desc(m).code(true)), "arg1".to_string())
        } else {
            (
                format!("{}* arg1", TypeDesc::plain(m.lhs_ty.kind).code(false)),
                "(*arg1)".to_string(),
            )
        }
    } else if m.lhs_constant || !lang.has_lambdas() {
        (
            format!("{} arg1", TypeDesc::plain(m.lhs_ty.kind).code(false)),
            "arg1".to_string(),
        )
    } else {
        (
            format!(
                "std::function<{}()> arg1",
                TypeDesc::plain(m.lhs_ty.kind).code(false)
            ),
            "arg1()".to_string(),
        )
    };
    let (param2, arg2) = if m.rhs_constant || !lang.has_lambdas() {
        (
            format!("{} arg2", TypeDesc::plain(m.rhs_ty.kind).code(false)),
            "arg2".to_string(),
        )
    } else {
        (
            format!(
                "std::function<{}()> arg2",
                TypeDesc::plain(m.rhs_ty.kind).code(false)
            ),
            "arg2()".to_string(),
        )
    };

    let mut body = String::new();
    let _ = writeln!(
        body,
        "static {result} {name}({param1}, {param2}, int local_mutation_id) {{"
    );
    for (offset, op) in variants.iter().enumerate() {
        let _ = writeln!(
            body,
            "  if (__DREDD_MUTANT_ENABLED({offset})) return {arg1} {} {arg2};",
            op.token()
        );
    }
    let _ = writeln!(body, "  return {arg1} {} {arg2};", m.op.token());
    body.push_str("}\n");
    body
}
