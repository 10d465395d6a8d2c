// src/typing.rs
//! Builtin-type semantics on top of the syntactic front-end.
//!
//! tree-sitter produces syntax only, but the mutation rules need to know an
//! expression's static type, whether it is an lvalue, and whether it is a
//! compile-time constant. This module keeps a scope stack of variables whose
//! declared type is a builtin arithmetic or boolean type and types
//! expressions bottom-up with integer promotion and the usual arithmetic
//! conversions (LP64 widths). Everything it cannot prove stays untyped and
//! is therefore never mutated — pointers, enums, classes, typedefs and
//! dependent template types all fall out this way.

use crate::lang::Lang;
use std::collections::HashMap;
use tree_sitter::Node;

/// The builtin C/C++ arithmetic and boolean types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
}

impl TypeKind {
    /// Canonical spelling, as a compiler would print it.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::SChar => "signed char",
            Self::UChar => "unsigned char",
            Self::Short => "short",
            Self::UShort => "unsigned short",
            Self::Int => "int",
            Self::UInt => "unsigned int",
            Self::Long => "long",
            Self::ULong => "unsigned long",
            Self::LongLong => "long long",
            Self::ULongLong => "unsigned long long",
            Self::Float => "float",
            Self::Double => "double",
            Self::LongDouble => "long double",
        }
    }

    #[must_use]
    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double | Self::LongDouble)
    }

    #[must_use]
    pub fn is_bool(self) -> bool {
        self == Self::Bool
    }

    #[must_use]
    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            Self::UChar | Self::UShort | Self::UInt | Self::ULong | Self::ULongLong
        )
    }

    #[must_use]
    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            Self::Char | Self::SChar | Self::Short | Self::Int | Self::Long | Self::LongLong
        )
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer() || self.is_bool()
    }

    /// Integer conversion rank bucket (promoted types only).
    fn rank(self) -> u8 {
        match self {
            Self::Int | Self::UInt => 0,
            Self::Long | Self::ULong => 1,
            _ => 2,
        }
    }

    /// Width in bits under LP64.
    fn width(self) -> u8 {
        match self {
            Self::Int | Self::UInt => 32,
            _ => 64,
        }
    }

    fn unsigned_counterpart(self) -> Self {
        match self {
            Self::Int => Self::UInt,
            Self::Long => Self::ULong,
            _ => Self::ULongLong,
        }
    }
}

/// Integer promotion: everything below `int` promotes to `int`.
#[must_use]
pub fn promote(kind: TypeKind) -> TypeKind {
    match kind {
        TypeKind::Bool
        | TypeKind::Char
        | TypeKind::SChar
        | TypeKind::UChar
        | TypeKind::Short
        | TypeKind::UShort => TypeKind::Int,
        other => other,
    }
}

/// Usual arithmetic conversions for a binary operator's operands.
#[must_use]
pub fn usual_arithmetic(lhs: TypeKind, rhs: TypeKind) -> TypeKind {
    for float in [TypeKind::LongDouble, TypeKind::Double, TypeKind::Float] {
        if lhs == float || rhs == float {
            return float;
        }
    }
    let a = promote(lhs);
    let b = promote(rhs);
    if a == b {
        return a;
    }
    if a.is_signed_integer() == b.is_signed_integer() {
        return if a.rank() >= b.rank() { a } else { b };
    }
    let (signed, unsigned) = if a.is_signed_integer() { (a, b) } else { (b, a) };
    if unsigned.rank() >= signed.rank() {
        unsigned
    } else if signed.width() > unsigned.width() {
        signed
    } else {
        signed.unsigned_counterpart()
    }
}

/// Result type of `!`, the relational operators and `&&`/`||`.
#[must_use]
pub fn bool_result(lang: Lang) -> TypeKind {
    match lang {
        Lang::C => TypeKind::Int,
        Lang::Cpp => TypeKind::Bool,
    }
}

/// Known literal or folded constant value, used by redundancy pruning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lit {
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Everything the mutation rules need to know about one expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExprInfo {
    pub ty: TypeKind,
    pub lvalue: bool,
    /// Lvalue that may legally be written through (not const-qualified).
    pub modifiable: bool,
    pub volatile: bool,
    /// Compile-time constant expression.
    pub constant: bool,
    /// Free of side effects when evaluated.
    pub pure_expr: bool,
    pub lit: Option<Lit>,
}

impl ExprInfo {
    fn rvalue(ty: TypeKind) -> Self {
        Self {
            ty,
            lvalue: false,
            modifiable: false,
            volatile: false,
            constant: false,
            pure_expr: true,
            lit: None,
        }
    }
}

/// A declared variable visible to the expression typer.
#[derive(Debug, Clone, Copy)]
pub struct VarInfo {
    pub ty: TypeKind,
    pub volatile: bool,
    pub is_const: bool,
}

/// Lexical scope stack; the outermost scope holds file-scope variables.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<HashMap<String, VarInfo>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn declare(&mut self, name: &str, info: VarInfo) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), info);
        }
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<VarInfo> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }
}

/// A parsed declaration type: base builtin kind plus qualifiers.
#[derive(Debug, Clone, Copy)]
pub struct DeclType {
    pub kind: TypeKind,
    pub volatile: bool,
    pub is_const: bool,
}

/// Reads the declared type of a `declaration` / `parameter_declaration` /
/// `field_declaration` node. Returns `None` for anything that is not a
/// plain builtin type (structs, enums, typedefs, `auto`, …).
#[must_use]
pub fn parse_decl_type(node: Node, source: &str) -> Option<DeclType> {
    let type_node = node.child_by_field_name("type")?;
    let kind = parse_type_node(type_node, source)?;

    let mut volatile = false;
    let mut is_const = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "type_qualifier" {
            match node_text(child, source) {
                "volatile" => volatile = true,
                "const" => is_const = true,
                _ => {}
            }
        }
    }
    Some(DeclType {
        kind,
        volatile,
        is_const,
    })
}

/// Parses a type node (`primitive_type` or `sized_type_specifier`).
#[must_use]
pub fn parse_type_node(node: Node, source: &str) -> Option<TypeKind> {
    match node.kind() {
        "primitive_type" => parse_type_words(&[node_text(node, source)]),
        "sized_type_specifier" => {
            let words: Vec<&str> = node_text(node, source).split_whitespace().collect();
            parse_type_words(&words)
        }
        _ => None,
    }
}

fn parse_type_words(words: &[&str]) -> Option<TypeKind> {
    let mut longs = 0u8;
    let mut short = false;
    let mut unsigned = false;
    let mut signed = false;
    let mut base: Option<&str> = None;
    for word in words {
        match *word {
            "long" => longs += 1,
            "short" => short = true,
            "unsigned" => unsigned = true,
            "signed" => signed = true,
            "int" | "char" | "float" | "double" | "bool" | "_Bool" => base = Some(word),
            _ => return None,
        }
    }
    match base {
        Some("float") => (!unsigned && !signed && longs == 0 && !short).then_some(TypeKind::Float),
        Some("double") => match longs {
            0 => Some(TypeKind::Double),
            1 => Some(TypeKind::LongDouble),
            _ => None,
        },
        Some("bool" | "_Bool") => Some(TypeKind::Bool),
        Some("char") => Some(if unsigned {
            TypeKind::UChar
        } else if signed {
            TypeKind::SChar
        } else {
            TypeKind::Char
        }),
        Some("int") | None => {
            if base.is_none() && !unsigned && !signed && longs == 0 && !short {
                return None;
            }
            Some(match (short, longs, unsigned) {
                (true, _, false) => TypeKind::Short,
                (true, _, true) => TypeKind::UShort,
                (false, 0, false) => TypeKind::Int,
                (false, 0, true) => TypeKind::UInt,
                (false, 1, false) => TypeKind::Long,
                (false, 1, true) => TypeKind::ULong,
                (false, _, false) => TypeKind::LongLong,
                (false, _, true) => TypeKind::ULongLong,
            })
        }
        _ => None,
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn first_expr_child<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment");
    found
}

/// Types an expression node. `None` means "not a builtin arithmetic or
/// boolean expression" and the node must not be mutated.
#[must_use]
pub fn analyze(node: Node, source: &str, lang: Lang, scopes: &ScopeStack) -> Option<ExprInfo> {
    match node.kind() {
        "number_literal" => Some(analyze_number_literal(node_text(node, source))),
        "true" | "false" => Some(ExprInfo {
            constant: true,
            lit: Some(Lit::Bool(node.kind() == "true")),
            ..ExprInfo::rvalue(TypeKind::Bool)
        }),
        "char_literal" => Some(ExprInfo {
            constant: true,
            ..ExprInfo::rvalue(match lang {
                Lang::C => TypeKind::Int,
                Lang::Cpp => TypeKind::Char,
            })
        }),
        "identifier" => {
            let var = scopes.lookup(node_text(node, source))?;
            Some(ExprInfo {
                ty: var.ty,
                lvalue: true,
                modifiable: !var.is_const,
                volatile: var.volatile,
                constant: false,
                pure_expr: true,
                lit: None,
            })
        }
        "parenthesized_expression" => analyze(first_expr_child(node)?, source, lang, scopes),
        "unary_expression" => analyze_unary(node, source, lang, scopes),
        "update_expression" => analyze_update(node, source, lang, scopes),
        "binary_expression" => analyze_binary(node, source, lang, scopes),
        "assignment_expression" => {
            let left = analyze(node.child_by_field_name("left")?, source, lang, scopes)?;
            let right = node.child_by_field_name("right")?;
            analyze(right, source, lang, scopes)?;
            (left.lvalue && left.modifiable).then_some(ExprInfo {
                ty: left.ty,
                lvalue: lang == Lang::Cpp,
                modifiable: lang == Lang::Cpp,
                volatile: left.volatile,
                constant: false,
                pure_expr: false,
                lit: None,
            })
        }
        "conditional_expression" => {
            let cond = analyze(node.child_by_field_name("condition")?, source, lang, scopes)?;
            let then = analyze(
                node.child_by_field_name("consequence")?,
                source,
                lang,
                scopes,
            )?;
            let alt = analyze(
                node.child_by_field_name("alternative")?,
                source,
                lang,
                scopes,
            )?;
            (then.ty == alt.ty).then_some(ExprInfo {
                constant: cond.constant && then.constant && alt.constant,
                pure_expr: cond.pure_expr && then.pure_expr && alt.pure_expr,
                ..ExprInfo::rvalue(then.ty)
            })
        }
        "cast_expression" => {
            let descriptor = node.child_by_field_name("type")?;
            if descriptor.child_by_field_name("declarator").is_some() {
                return None; // pointer or array cast
            }
            let target = parse_type_node(descriptor.child_by_field_name("type")?, source)?;
            let value = analyze(node.child_by_field_name("value")?, source, lang, scopes)?;
            Some(ExprInfo {
                constant: value.constant,
                pure_expr: value.pure_expr,
                lit: convert_lit(value.lit, target),
                ..ExprInfo::rvalue(target)
            })
        }
        "comma_expression" => {
            let left = analyze(node.child_by_field_name("left")?, source, lang, scopes)?;
            let right = analyze(node.child_by_field_name("right")?, source, lang, scopes)?;
            Some(ExprInfo {
                pure_expr: left.pure_expr && right.pure_expr,
                ..ExprInfo::rvalue(right.ty)
            })
        }
        _ => None,
    }
}

fn analyze_unary(node: Node, source: &str, lang: Lang, scopes: &ScopeStack) -> Option<ExprInfo> {
    let op = node_text(node.child_by_field_name("operator")?, source);
    let arg = analyze(node.child_by_field_name("argument")?, source, lang, scopes)?;
    let (ty, lit) = match op {
        "!" => (
            bool_result(lang),
            match arg.lit {
                Some(Lit::Int(v)) => Some(Lit::Int(i64::from(v == 0))),
                Some(Lit::Bool(b)) => Some(Lit::Bool(!b)),
                _ => None,
            },
        ),
        "~" => {
            if !arg.ty.is_integer() {
                return None;
            }
            (
                promote(arg.ty),
                match arg.lit {
                    Some(Lit::Int(v)) => Some(Lit::Int(!v)),
                    _ => None,
                },
            )
        }
        "-" => (
            promote(arg.ty),
            match arg.lit {
                Some(Lit::Int(v)) => Some(Lit::Int(v.wrapping_neg())),
                Some(Lit::Float(v)) => Some(Lit::Float(-v)),
                _ => None,
            },
        ),
        "+" => (promote(arg.ty), arg.lit),
        _ => return None,
    };
    Some(ExprInfo {
        constant: arg.constant,
        pure_expr: arg.pure_expr,
        lit: if arg.constant { lit } else { None },
        ..ExprInfo::rvalue(ty)
    })
}

fn analyze_update(node: Node, source: &str, lang: Lang, scopes: &ScopeStack) -> Option<ExprInfo> {
    let arg_node = node.child_by_field_name("argument")?;
    let arg = analyze(arg_node, source, lang, scopes)?;
    if !arg.lvalue || !arg.modifiable || (arg.ty.is_bool() && lang == Lang::Cpp) {
        return None;
    }
    let prefix = is_prefix_update(node);
    let lvalue = lang == Lang::Cpp && prefix;
    Some(ExprInfo {
        ty: arg.ty,
        lvalue,
        modifiable: lvalue,
        volatile: arg.volatile && lvalue,
        constant: false,
        pure_expr: false,
        lit: None,
    })
}

/// True for `++x`/`--x`, false for `x++`/`x--`.
#[must_use]
pub fn is_prefix_update(node: Node) -> bool {
    match (node.child_by_field_name("operator"), node.child_by_field_name("argument")) {
        (Some(op), Some(arg)) => op.start_byte() < arg.start_byte(),
        _ => false,
    }
}

fn analyze_binary(node: Node, source: &str, lang: Lang, scopes: &ScopeStack) -> Option<ExprInfo> {
    let op = node_text(node.child_by_field_name("operator")?, source);
    let left = analyze(node.child_by_field_name("left")?, source, lang, scopes)?;
    let right = analyze(node.child_by_field_name("right")?, source, lang, scopes)?;
    let ty = match op {
        "+" | "-" | "*" | "/" => usual_arithmetic(left.ty, right.ty),
        "%" | "&" | "|" | "^" => {
            if !left.ty.is_integer() || !right.ty.is_integer() {
                return None;
            }
            usual_arithmetic(left.ty, right.ty)
        }
        "<<" | ">>" => {
            if !left.ty.is_integer() || !right.ty.is_integer() {
                return None;
            }
            promote(left.ty)
        }
        "<" | "<=" | ">" | ">=" | "==" | "!=" | "&&" | "||" => bool_result(lang),
        _ => return None,
    };
    let constant = left.constant && right.constant;
    let lit = if constant {
        fold_binary(op, left.lit, right.lit)
    } else {
        None
    };
    Some(ExprInfo {
        constant,
        pure_expr: left.pure_expr && right.pure_expr,
        lit,
        ..ExprInfo::rvalue(ty)
    })
}

fn fold_binary(op: &str, lhs: Option<Lit>, rhs: Option<Lit>) -> Option<Lit> {
    let (Some(Lit::Int(a)), Some(Lit::Int(b))) = (lhs, rhs) else {
        return None;
    };
    let v = match op {
        "+" => a.wrapping_add(b),
        "-" => a.wrapping_sub(b),
        "*" => a.wrapping_mul(b),
        "/" => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        "%" => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        "&" => a & b,
        "|" => a | b,
        "^" => a ^ b,
        "<<" => {
            if !(0..64).contains(&b) {
                return None;
            }
            a.wrapping_shl(b as u32)
        }
        ">>" => {
            if !(0..64).contains(&b) {
                return None;
            }
            a.wrapping_shr(b as u32)
        }
        _ => return None,
    };
    Some(Lit::Int(v))
}

#[allow(clippy::cast_precision_loss)]
fn convert_lit(lit: Option<Lit>, target: TypeKind) -> Option<Lit> {
    match (lit, target.is_floating()) {
        (Some(Lit::Int(v)), true) => Some(Lit::Float(v as f64)),
        (Some(Lit::Int(v)), false) => Some(Lit::Int(v)),
        (Some(Lit::Bool(b)), false) if target.is_integer() && !target.is_bool() => {
            Some(Lit::Int(i64::from(b)))
        }
        (Some(Lit::Bool(b)), _) if target.is_bool() => Some(Lit::Bool(b)),
        (Some(Lit::Float(v)), true) => Some(Lit::Float(v)),
        _ => None,
    }
}

fn analyze_number_literal(text: &str) -> ExprInfo {
    let cleaned: String = text.chars().filter(|&c| c != '\'').collect();
    let lower = cleaned.to_ascii_lowercase();
    let hex = lower.starts_with("0x");

    let mut digits_end = cleaned.len();
    while digits_end > 0 {
        let c = cleaned.as_bytes()[digits_end - 1].to_ascii_lowercase();
        let is_suffix = matches!(c, b'u' | b'l') || (!hex && c == b'f');
        if is_suffix {
            digits_end -= 1;
        } else {
            break;
        }
    }
    let (digits, suffix) = cleaned.split_at(digits_end);
    let suffix = suffix.to_ascii_lowercase();
    let digits_lower = digits.to_ascii_lowercase();

    let is_float = if hex {
        digits_lower.contains('.') || digits_lower.contains('p')
    } else {
        digits_lower.contains('.') || digits_lower.contains('e') || suffix.contains('f')
    };

    if is_float {
        let ty = if suffix.contains('f') {
            TypeKind::Float
        } else if suffix.contains('l') {
            TypeKind::LongDouble
        } else {
            TypeKind::Double
        };
        let lit = if hex { None } else { digits.parse::<f64>().ok().map(Lit::Float) };
        return ExprInfo {
            constant: true,
            lit,
            ..ExprInfo::rvalue(ty)
        };
    }

    let unsigned = suffix.contains('u');
    let longs = suffix.matches('l').count();
    let ty = match (unsigned, longs) {
        (false, 0) => TypeKind::Int,
        (false, 1) => TypeKind::Long,
        (false, _) => TypeKind::LongLong,
        (true, 0) => TypeKind::UInt,
        (true, 1) => TypeKind::ULong,
        (true, _) => TypeKind::ULongLong,
    };
    let value = if let Some(hex_digits) = digits_lower.strip_prefix("0x") {
        i64::from_str_radix(hex_digits, 16).ok()
    } else if let Some(bin_digits) = digits_lower.strip_prefix("0b") {
        i64::from_str_radix(bin_digits, 2).ok()
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()
    } else {
        digits.parse::<i64>().ok()
    };
    ExprInfo {
        constant: true,
        lit: value.map(Lit::Int),
        ..ExprInfo::rvalue(ty)
    }
}
