// src/mutation/replace_unary.rs
//! Unary operator replacement.
//!
//! A site keeps its operand and swaps the operator for every other
//! well-typed member of the unary family, plus the operand alone (the
//! operator removed). Logical not sites swap the whole expression for the
//! boolean constants instead.

use crate::lang::Lang;
use crate::mutation::{ByteSpan, TypeDesc, UnaryOp};
use crate::rewrite::EditBuffer;
use crate::source_range::SourceRangeInfo;
use std::collections::BTreeSet;
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct ReplaceUnaryOperatorMutation {
    /// The whole operator expression.
    pub range: ByteSpan,
    /// The operand only.
    pub operand_range: ByteSpan,
    pub info: SourceRangeInfo,
    pub op: UnaryOp,
    pub result_ty: TypeDesc,
    pub operand_ty: TypeDesc,
    /// The operand is a modifiable lvalue (increments become valid).
    pub operand_lvalue: bool,
    pub operand_constant: bool,
    /// The whole expression is an lvalue (C++ prefix `++`/`--` only); the
    /// dispatcher must return a reference and may only swap prefix forms.
    pub expr_lvalue: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryVariant {
    Op(UnaryOp),
    /// The bare operand, operator removed.
    Identity,
    True,
    False,
}

impl UnaryVariant {
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Op(op) if op.is_prefix() => format!("{}arg", op.token()),
            Self::Op(op) => format!("arg{}", op.token()),
            Self::Identity => "arg".to_string(),
            Self::True => "true".to_string(),
            Self::False => "false".to_string(),
        }
    }

    fn render(self, arg: &str) -> String {
        match self {
            Self::Op(op) if op.is_prefix() => format!("{}{arg}", op.token()),
            Self::Op(op) => format!("{arg}{}", op.token()),
            Self::Identity => arg.to_string(),
            Self::True => "true".to_string(),
            Self::False => "false".to_string(),
        }
    }
}

const CANDIDATES: [UnaryOp; 8] = [
    UnaryOp::PreInc,
    UnaryOp::PostInc,
    UnaryOp::PreDec,
    UnaryOp::PostDec,
    UnaryOp::Not,
    UnaryOp::Plus,
    UnaryOp::Minus,
    UnaryOp::LNot,
];

fn is_valid_replacement(op: UnaryOp, m: &ReplaceUnaryOperatorMutation) -> bool {
    if op.is_inc_dec() && (!m.operand_lvalue || m.operand_ty.kind.is_bool()) {
        return false;
    }
    if m.expr_lvalue && !matches!(op, UnaryOp::PreInc | UnaryOp::PreDec) {
        return false;
    }
    if op == UnaryOp::Not && !m.operand_ty.kind.is_integer() {
        return false;
    }
    // `!` crosses in from the logical family for integer operands only;
    // floating sites keep to their own catalogue.
    if op == UnaryOp::LNot && !m.operand_ty.kind.is_integer() {
        return false;
    }
    true
}

fn is_redundant_replacement(op: UnaryOp, m: &ReplaceUnaryOperatorMutation) -> bool {
    // `+arg` is the identity variant spelled differently.
    if op == UnaryOp::Plus {
        return true;
    }
    // Swapping increment/decrement fixity alone changes only the result
    // value; the matching-fixity twin already covers the state change.
    if op.is_inc_dec() && m.op.is_inc_dec() {
        return op.is_prefix() != m.op.is_prefix();
    }
    false
}

/// Ordered surviving variants for one unary operator site.
#[must_use]
pub fn variants(m: &ReplaceUnaryOperatorMutation, optimise: bool) -> Vec<UnaryVariant> {
    let mut set = Vec::new();
    if m.op == UnaryOp::LNot {
        if !optimise {
            set.push(UnaryVariant::Identity);
        }
        set.push(UnaryVariant::True);
        set.push(UnaryVariant::False);
        return set;
    }
    for op in CANDIDATES {
        if op == m.op || !is_valid_replacement(op, m) {
            continue;
        }
        if optimise && is_redundant_replacement(op, m) {
            continue;
        }
        set.push(UnaryVariant::Op(op));
    }
    if !optimise || m.op.has_side_effects() {
        set.push(UnaryVariant::Identity);
    }
    set
}

/// Stable dispatcher name: operator plus the operand type (references do
/// not take part in the name, so lvalue and rvalue C++ sites overload).
#[must_use]
pub fn function_name(m: &ReplaceUnaryOperatorMutation, lang: Lang) -> String {
    let mut name = format!(
        "__dredd_replace_unary_operator_{}_{}",
        m.op.clang_name(),
        operand_desc(m).ident()
    );
    if lang == Lang::C && m.operand_lvalue {
        name.push_str("_lvalue");
    }
    name
}

fn operand_desc(m: &ReplaceUnaryOperatorMutation) -> TypeDesc {
    TypeDesc {
        kind: m.operand_ty.kind,
        volatile: m.operand_lvalue && m.operand_ty.volatile,
    }
}

/// Rewrites the call site and records the dispatcher declaration.
pub fn apply(
    m: &ReplaceUnaryOperatorMutation,
    variants: &[UnaryVariant],
    local_id: i32,
    lang: Lang,
    buf: &mut EditBuffer,
    decls: &mut BTreeSet<String>,
) {
    let name = function_name(m, lang);
    let operand = buf.rewritten_text(m.operand_range.start, m.operand_range.end);

    let arg = if lang.has_lambdas() {
        if m.operand_constant {
            operand
        } else {
            let input = operand_desc(m).code(m.operand_lvalue);
            format!("[&]() -> {input} {{ return static_cast<{input}>({operand}); }}")
        }
    } else if m.operand_lvalue {
        format!("&({operand})")
    } else {
        operand
    };
    buf.replace(m.range.start, m.range.end, format!("{name}({arg}, {local_id})"));
    decls.insert(dispatcher(m, variants, &name, lang));
}

fn dispatcher(
    m: &ReplaceUnaryOperatorMutation,
    variants: &[UnaryVariant],
    name: &str,
    lang: Lang,
) -> String {
    let result = TypeDesc {
        kind: m.result_ty.kind,
        volatile: m.expr_lvalue && m.result_ty.volatile,
    }
    .code(m.expr_lvalue && lang.has_lambdas());

    let (param, arg_expr) = if lang.has_lambdas() {
        if m.operand_constant {
            (
                format!("{} arg", TypeDesc::plain(m.operand_ty.kind).code(false)),
                "arg".to_string(),
            )
        } else {
            (
                format!(
                    "std::function<{}()> arg",
                    operand_desc(m).code(m.operand_lvalue)
                ),
                "arg()".to_string(),
            )
        }
    } else if m.operand_lvalue {
        (
            format!("{}* arg", TypeDesc::plain(m.operand_ty.kind).code(false)),
            "(*arg)".to_string(),
        )
    } else {
        (
            format!("{} arg", TypeDesc::plain(m.operand_ty.kind).code(false)),
            "arg".to_string(),
        )
    };

    let mut body = String::new();
    let _ = writeln!(body, "static {result} {name}({param}, int local_mutation_id) {{");
    for (offset, variant) in variants.iter().enumerate() {
        let _ = writeln!(
            body,
            "  if (__DREDD_MUTANT_ENABLED({offset})) return {};",
            variant.render(&arg_expr)
        );
    }
    let _ = writeln!(body, "  return {};", UnaryVariant::Op(m.op).render(&arg_expr));
    body.push_str("}\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typing::TypeKind;

    fn minus_on_constant() -> ReplaceUnaryOperatorMutation {
        ReplaceUnaryOperatorMutation {
            range: ByteSpan::new(13, 15),
            operand_range: ByteSpan::new(14, 15),
            info: SourceRangeInfo::new("-2", 0, 2),
            op: UnaryOp::Minus,
            result_ty: TypeDesc::plain(TypeKind::Int),
            operand_ty: TypeDesc::plain(TypeKind::Int),
            operand_lvalue: false,
            operand_constant: true,
            expr_lvalue: false,
        }
    }

    fn postdec_on_lvalue() -> ReplaceUnaryOperatorMutation {
        ReplaceUnaryOperatorMutation {
            range: ByteSpan::new(0, 3),
            operand_range: ByteSpan::new(0, 1),
            info: SourceRangeInfo::new("x--", 0, 3),
            op: UnaryOp::PostDec,
            result_ty: TypeDesc::plain(TypeKind::Int),
            operand_ty: TypeDesc::plain(TypeKind::Int),
            operand_lvalue: true,
            operand_constant: false,
            expr_lvalue: false,
        }
    }

    #[test]
    fn test_minus_on_constant_keeps_not_and_lnot() {
        let m = minus_on_constant();
        let labels: Vec<String> = variants(&m, true).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["~arg", "!arg"]);
    }

    #[test]
    fn test_minus_without_optimisations_keeps_identity() {
        let m = minus_on_constant();
        let labels: Vec<String> = variants(&m, false).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["~arg", "+arg", "!arg", "arg"]);
    }

    #[test]
    fn test_floating_minus_excludes_integer_only_replacements() {
        let m = ReplaceUnaryOperatorMutation {
            result_ty: TypeDesc::plain(TypeKind::Double),
            operand_ty: TypeDesc::plain(TypeKind::Double),
            ..minus_on_constant()
        };
        let labels: Vec<String> = variants(&m, true).iter().map(|v| v.label()).collect();
        assert!(labels.is_empty(), "got: {labels:?}");
        // Without optimisations only identity survives: `~` and `!` need an
        // integer operand and `+` is the identity in operator form.
        let labels: Vec<String> = variants(&m, false).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["+arg", "arg"]);
    }

    #[test]
    fn test_postdec_keeps_five_variants() {
        let m = postdec_on_lvalue();
        let labels: Vec<String> = variants(&m, true).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["arg++", "~arg", "-arg", "!arg", "arg"]);
    }

    #[test]
    fn test_lnot_replaces_with_constants() {
        let m = ReplaceUnaryOperatorMutation {
            op: UnaryOp::LNot,
            result_ty: TypeDesc::plain(TypeKind::Bool),
            operand_ty: TypeDesc::plain(TypeKind::Bool),
            operand_lvalue: false,
            ..minus_on_constant()
        };
        let labels: Vec<String> = variants(&m, true).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["true", "false"]);
        let labels: Vec<String> = variants(&m, false).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["arg", "true", "false"]);
    }

    #[test]
    fn test_constant_call_site_passes_raw_operand() {
        let m = minus_on_constant();
        let set = variants(&m, true);
        let src = "void foo() { -2; }";
        let mut buf = EditBuffer::new(src);
        let mut decls = BTreeSet::new();
        apply(&m, &set, 0, Lang::Cpp, &mut buf, &mut decls);
        assert_eq!(
            buf.render(),
            "void foo() { __dredd_replace_unary_operator_Minus_int(2, 0); }"
        );
        let decl = decls.iter().next().expect("one declaration");
        let expected = "static int __dredd_replace_unary_operator_Minus_int(int arg, int local_mutation_id) {\n  if (__DREDD_MUTANT_ENABLED(0)) return ~arg;\n  if (__DREDD_MUTANT_ENABLED(1)) return !arg;\n  return -arg;\n}\n";
        assert_eq!(decl, expected);
    }

    #[test]
    fn test_lvalue_call_site_wraps_reference_lambda() {
        let m = postdec_on_lvalue();
        let set = variants(&m, true);
        let src = "x--";
        let mut buf = EditBuffer::new(src);
        let mut decls = BTreeSet::new();
        apply(&m, &set, 0, Lang::Cpp, &mut buf, &mut decls);
        assert_eq!(
            buf.render(),
            "__dredd_replace_unary_operator_PostDec_int([&]() -> int& { return static_cast<int&>(x); }, 0)"
        );
        let decl = decls.iter().next().expect("one declaration");
        assert!(decl.starts_with(
            "static int __dredd_replace_unary_operator_PostDec_int(std::function<int&()> arg, int local_mutation_id) {"
        ));
        assert!(decl.contains("return arg()++;"));
        assert!(decl.contains("return arg();"));
        assert!(decl.ends_with("  return arg()--;\n}\n"));
    }

    #[test]
    fn test_c_lvalue_site_passes_pointer() {
        let m = postdec_on_lvalue();
        let set = variants(&m, true);
        let src = "x--";
        let mut buf = EditBuffer::new(src);
        let mut decls = BTreeSet::new();
        apply(&m, &set, 3, Lang::C, &mut buf, &mut decls);
        assert_eq!(
            buf.render(),
            "__dredd_replace_unary_operator_PostDec_int_lvalue(&(x), 3)"
        );
        let decl = decls.iter().next().expect("one declaration");
        assert!(decl.contains("(int* arg, int local_mutation_id)"));
        assert!(decl.contains("return (*arg)++;"));
        assert!(decl.ends_with("  return (*arg)--;\n}\n"));
    }
}
