// src/mutation/replace_expr.rs
//! Wholesale expression replacement.
//!
//! Every expression with a builtin arithmetic or boolean type is a
//! candidate. The variant set depends on the type family; logical `&&`/`||`
//! expressions collapse to a single constant replacement, and compile-time
//! constants lose variants whose result would duplicate another one.

use crate::lang::Lang;
use crate::mutation::{ByteSpan, TypeDesc};
use crate::rewrite::EditBuffer;
use crate::source_range::SourceRangeInfo;
use crate::typing::Lit;
use std::collections::BTreeSet;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExprFlags {
    /// The site is the dedicated lvalue record (`++arg`/`--arg` variants).
    pub lvalue: bool,
    /// The expression is itself a logical `&&`.
    pub logical_and: bool,
    /// The expression is itself a logical `||`.
    pub logical_or: bool,
    pub integer_zero: bool,
    pub integer_one: bool,
    pub floating_zero: bool,
    pub floating_one: bool,
}

#[derive(Debug, Clone)]
pub struct ReplaceExprMutation {
    pub range: ByteSpan,
    pub info: SourceRangeInfo,
    pub ty: TypeDesc,
    pub flags: ExprFlags,
    /// Compile-time constant expression (call sites pass it raw).
    pub constant: bool,
    /// Free of side effects (no lambda wrapper needed).
    pub pure_expr: bool,
    /// Folded value, when the expression is constant and foldable.
    pub value: Option<Lit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprVariant {
    LNot,
    BitNot,
    Minus,
    IntZero,
    IntOne,
    IntMinusOne,
    FloatZero,
    FloatOne,
    FloatMinusOne,
    True,
    False,
    PreInc,
    PreDec,
}

impl ExprVariant {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::LNot => "!arg",
            Self::BitNot => "~arg",
            Self::Minus => "-arg",
            Self::IntZero => "0",
            Self::IntOne => "1",
            Self::IntMinusOne => "-1",
            Self::FloatZero => "0.0",
            Self::FloatOne => "1.0",
            Self::FloatMinusOne => "-1.0",
            Self::True => "true",
            Self::False => "false",
            Self::PreInc => "++arg",
            Self::PreDec => "--arg",
        }
    }

    fn render(self, arg: &str) -> String {
        match self {
            Self::LNot => format!("!{arg}"),
            Self::BitNot => format!("~{arg}"),
            Self::Minus => format!("-{arg}"),
            Self::IntZero => "0".to_string(),
            Self::IntOne => "1".to_string(),
            Self::IntMinusOne => "-1".to_string(),
            Self::FloatZero => "0.0".to_string(),
            Self::FloatOne => "1.0".to_string(),
            Self::FloatMinusOne => "-1.0".to_string(),
            Self::True => "true".to_string(),
            Self::False => "false".to_string(),
            Self::PreInc => format!("++{arg}"),
            Self::PreDec => format!("--{arg}"),
        }
    }
}

/// Ordered surviving variants for one expression site.
#[must_use]
pub fn variants(m: &ReplaceExprMutation, optimise: bool) -> Vec<ExprVariant> {
    use ExprVariant::{
        BitNot, False, FloatMinusOne, FloatOne, FloatZero, IntMinusOne, IntOne, IntZero, LNot,
        Minus, PreDec, PreInc, True,
    };

    if m.flags.lvalue {
        return vec![PreInc, PreDec];
    }
    if optimise && m.flags.logical_and {
        return vec![False];
    }
    if optimise && m.flags.logical_or {
        return vec![True];
    }

    let kind = m.ty.kind;
    if kind.is_bool() {
        if optimise && m.constant {
            // `!arg` on a literal duplicates the opposite constant.
            match m.value {
                Some(Lit::Bool(true)) => return vec![False],
                Some(Lit::Bool(false)) => return vec![True],
                _ => {}
            }
        }
        return vec![True, False, LNot];
    }
    if kind.is_floating() {
        let mut set = vec![Minus, FloatZero, FloatOne, FloatMinusOne];
        if optimise && m.constant {
            if let Some(Lit::Float(v)) = m.value {
                if v == 0.0 {
                    set.retain(|x| !matches!(x, Minus | FloatZero));
                } else if v == 1.0 {
                    set.retain(|x| *x != FloatOne);
                }
            }
        }
        return set;
    }

    let mut set = if kind.is_unsigned_integer() {
        vec![LNot, BitNot, IntZero, IntOne]
    } else {
        vec![LNot, BitNot, Minus, IntZero, IntOne, IntMinusOne]
    };
    if optimise && m.constant {
        // A literal's logical not is 0 or 1, both already variants.
        set.retain(|x| *x != LNot);
        match m.value {
            Some(Lit::Int(0)) => {
                // -0 and the 0 variant are the literal itself; ~0 is -1,
                // which duplicates the -1 variant.
                set.retain(|x| !matches!(x, Minus | IntZero));
                if !kind.is_unsigned_integer() {
                    set.retain(|x| *x != IntMinusOne);
                }
            }
            Some(Lit::Int(1)) => {
                set.retain(|x| *x != IntOne);
                if !kind.is_unsigned_integer() {
                    // -1 duplicates the -arg result on a literal 1.
                    set.retain(|x| *x != IntMinusOne);
                }
            }
            _ => {}
        }
    }
    set
}

/// Stable dispatcher name for this site. Prunings that depend on literal
/// values are part of the name so that equal names always mean equal
/// bodies.
#[must_use]
pub fn function_name(m: &ReplaceExprMutation, optimise: bool) -> String {
    let mut name = format!("__dredd_replace_expr_{}", m.ty.ident());
    if m.constant {
        name.push_str("_constant");
    }
    if m.flags.lvalue {
        name.push_str("_lvalue");
    }
    if optimise {
        if m.flags.logical_and {
            name.push_str("_omit_true");
        } else if m.flags.logical_or {
            name.push_str("_omit_false");
        } else if m.constant {
            match m.value {
                Some(Lit::Bool(true)) => name.push_str("_omit_true"),
                Some(Lit::Bool(false)) => name.push_str("_omit_false"),
                Some(Lit::Int(0)) => name.push_str("_omit_zero"),
                Some(Lit::Int(1)) => name.push_str("_omit_one"),
                Some(Lit::Float(v)) if v == 0.0 => name.push_str("_omit_zero"),
                Some(Lit::Float(v)) if v == 1.0 => name.push_str("_omit_one"),
                _ => {}
            }
        }
    }
    name
}

/// Rewrites the call site and records the dispatcher declaration.
pub fn apply(
    m: &ReplaceExprMutation,
    variants: &[ExprVariant],
    local_id: i32,
    optimise: bool,
    lang: Lang,
    buf: &mut EditBuffer,
    decls: &mut BTreeSet<String>,
) {
    let name = function_name(m, optimise);
    let text = buf.rewritten_text(m.range.start, m.range.end);

    let arg = if lang.has_lambdas() {
        if m.flags.lvalue || m.constant || m.pure_expr {
            text
        } else {
            let ty = m.ty.code(false);
            format!("[&]() -> {ty} {{ return static_cast<{ty}>({text}); }}")
        }
    } else if m.flags.lvalue {
        format!("&({text})")
    } else {
        text
    };
    buf.replace(m.range.start, m.range.end, format!("{name}({arg}, {local_id})"));
    decls.insert(dispatcher(m, variants, &name, lang));
}

fn dispatcher(
    m: &ReplaceExprMutation,
    variants: &[ExprVariant],
    name: &str,
    lang: Lang,
) -> String {
    let value_ty = TypeDesc::plain(m.ty.kind).code(false);
    let (param, arg_expr) = if lang.has_lambdas() {
        if m.flags.lvalue {
            (format!("{} arg", m.ty.code(true)), "arg".to_string())
        } else if m.constant || m.pure_expr {
            (format!("{value_ty} arg"), "arg".to_string())
        } else {
            (
                format!("std::function<{value_ty}()> arg"),
                "arg()".to_string(),
            )
        }
    } else if m.flags.lvalue {
        (format!("{value_ty}* arg"), "(*arg)".to_string())
    } else {
        (format!("{value_ty} arg"), "arg".to_string())
    };

    let mut body = String::new();
    let _ = writeln!(
        body,
        "static {value_ty} {name}({param}, int local_mutation_id) {{"
    );
    for (offset, variant) in variants.iter().enumerate() {
        let _ = writeln!(
            body,
            "  if (__DREDD_MUTANT_ENABLED({offset})) return {};",
            variant.render(&arg_expr)
        );
    }
    let _ = writeln!(body, "  return {arg_expr};");
    body.push_str("}\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::ByteSpan;
    use crate::typing::TypeKind;

    fn site(ty: TypeKind) -> ReplaceExprMutation {
        ReplaceExprMutation {
            range: ByteSpan::new(0, 1),
            info: SourceRangeInfo::new("2", 0, 1),
            ty: TypeDesc::plain(ty),
            flags: ExprFlags::default(),
            constant: false,
            pure_expr: true,
            value: None,
        }
    }

    #[test]
    fn test_signed_int_base_set_and_order() {
        let m = site(TypeKind::Int);
        let labels: Vec<&str> = variants(&m, true).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["!arg", "~arg", "-arg", "0", "1", "-1"]);
    }

    #[test]
    fn test_unsigned_constant_two_keeps_three_variants() {
        let mut m = site(TypeKind::UInt);
        m.constant = true;
        m.value = Some(Lit::Int(2));
        let set = variants(&m, true);
        let labels: Vec<&str> = set.iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["~arg", "0", "1"]);
        assert_eq!(
            function_name(&m, true),
            "__dredd_replace_expr_unsigned_int_constant"
        );
    }

    #[test]
    fn test_signed_constant_two_keeps_five_variants() {
        let mut m = site(TypeKind::Int);
        m.constant = true;
        m.value = Some(Lit::Int(2));
        let labels: Vec<&str> = variants(&m, true).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["~arg", "-arg", "0", "1", "-1"]);
    }

    #[test]
    fn test_literal_zero_and_one_prune_their_duplicates() {
        let mut m = site(TypeKind::Int);
        m.constant = true;
        m.value = Some(Lit::Int(0));
        let labels: Vec<&str> = variants(&m, true).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["~arg", "1"]);
        assert!(function_name(&m, true).ends_with("_omit_zero"));

        m.value = Some(Lit::Int(1));
        let labels: Vec<&str> = variants(&m, true).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["~arg", "-arg", "0"]);
        assert!(function_name(&m, true).ends_with("_omit_one"));
    }

    #[test]
    fn test_float_constant_set() {
        let mut m = site(TypeKind::Double);
        m.constant = true;
        m.value = Some(Lit::Float(2.523));
        let labels: Vec<&str> = variants(&m, true).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["-arg", "0.0", "1.0", "-1.0"]);
    }

    #[test]
    fn test_logical_and_keeps_only_false() {
        let mut m = site(TypeKind::Bool);
        m.flags.logical_and = true;
        let set = variants(&m, true);
        assert_eq!(set, vec![ExprVariant::False]);
        assert_eq!(
            function_name(&m, true),
            "__dredd_replace_expr_bool_omit_true"
        );
    }

    #[test]
    fn test_logical_or_keeps_only_true() {
        let mut m = site(TypeKind::Bool);
        m.flags.logical_or = true;
        let set = variants(&m, true);
        assert_eq!(set, vec![ExprVariant::True]);
        assert_eq!(
            function_name(&m, true),
            "__dredd_replace_expr_bool_omit_false"
        );
    }

    #[test]
    fn test_logical_sites_keep_full_set_without_optimisations() {
        let mut m = site(TypeKind::Bool);
        m.flags.logical_and = true;
        let labels: Vec<&str> = variants(&m, false).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["true", "false", "!arg"]);
    }

    #[test]
    fn test_lvalue_record_gets_increments() {
        let mut m = site(TypeKind::Int);
        m.flags.lvalue = true;
        let labels: Vec<&str> = variants(&m, true).iter().map(|v| v.label()).collect();
        assert_eq!(labels, vec!["++arg", "--arg"]);
        assert_eq!(
            function_name(&m, true),
            "__dredd_replace_expr_int_lvalue"
        );
    }

    #[test]
    fn test_dispatcher_for_unsigned_constant() {
        let mut m = site(TypeKind::UInt);
        m.constant = true;
        m.value = Some(Lit::Int(2));
        let set = variants(&m, true);
        let name = function_name(&m, true);
        let decl = dispatcher(&m, &set, &name, Lang::Cpp);
        let expected = "static unsigned int __dredd_replace_expr_unsigned_int_constant(unsigned int arg, int local_mutation_id) {\n  if (__DREDD_MUTANT_ENABLED(0)) return ~arg;\n  if (__DREDD_MUTANT_ENABLED(1)) return 0;\n  if (__DREDD_MUTANT_ENABLED(2)) return 1;\n  return arg;\n}\n";
        assert_eq!(decl, expected);
    }

    #[test]
    fn test_c_lvalue_dispatcher_uses_pointer() {
        let mut m = site(TypeKind::Int);
        m.flags.lvalue = true;
        let set = variants(&m, true);
        let name = function_name(&m, true);
        let decl = dispatcher(&m, &set, &name, Lang::C);
        assert!(decl.contains("(int* arg, int local_mutation_id)"));
        assert!(decl.contains("return ++(*arg);"));
    }
}
