// src/visitor.rs
//! Candidate discovery: a post-order walk over the parse tree that decides
//! which expressions and statements are mutable, classifies them, and
//! builds the mutation tree alongside a flat list of mutation records.
//!
//! The exclusion rules here are load-bearing: mutating a context the
//! language restricts (array sizes, template arguments, case labels,
//! lambda captures, default arguments, class-scope initializers) produces
//! code that no longer compiles.

use crate::lang::Lang;
use crate::mutation::{
    ByteSpan, ExprFlags, Mutation, RemoveStmtMutation, ReplaceBinaryOperatorMutation,
    ReplaceExprMutation, ReplaceUnaryOperatorMutation, TypeDesc, UnaryOp,
};
use crate::mutation::{remove_stmt, BinFamily, BinaryOp};
use crate::source_range::SourceRangeInfo;
use crate::tree::{MutationTree, NodeId};
use crate::typing::{
    analyze, is_prefix_update, parse_decl_type, Lit, ScopeStack, TypeKind, VarInfo,
};
use std::collections::HashSet;
use tree_sitter::Node;

/// Everything discovery produces for one translation unit.
#[derive(Debug)]
pub struct DiscoveryResult {
    pub mutations: Vec<Mutation>,
    pub tree: MutationTree,
    /// Start of the first top-level declaration; the prelude goes here.
    pub first_decl_byte: Option<usize>,
}

/// Walks `ast` and returns the discovered mutations. The tree is not yet
/// finalised; callers run `tree.tidy_up()` once discovery is complete.
#[must_use]
pub fn discover(ast: &tree_sitter::Tree, source: &str, lang: Lang) -> DiscoveryResult {
    let mut visitor = MutateVisitor {
        source,
        lang,
        scopes: ScopeStack::new(),
        tree: MutationTree::new(),
        node_stack: Vec::new(),
        in_function: Vec::new(),
        suppress: 0,
        var_decl_starts: HashSet::new(),
        mutations: Vec::new(),
        first_decl_byte: None,
    };
    let root = ast.root_node();
    let mut cursor = root.walk();
    let children: Vec<Node> = root.named_children(&mut cursor).collect();
    drop(cursor);
    for child in children {
        if visitor.first_decl_byte.is_none()
            && child.kind() != "comment"
            && !child.kind().starts_with("preproc")
        {
            visitor.first_decl_byte = Some(child.start_byte());
        }
        visitor.walk(child, ExprCtx::default());
    }
    DiscoveryResult {
        mutations: visitor.mutations,
        tree: visitor.tree,
        first_decl_byte: visitor.first_decl_byte,
    }
}

/// Context a node was reached in: whether its parent needs an lvalue from
/// it, and whether an enclosing initializer converts it to another type.
#[derive(Debug, Clone, Copy, Default)]
struct ExprCtx {
    lvalue_required: bool,
    coerce: Option<TypeKind>,
}

impl ExprCtx {
    fn lvalue() -> Self {
        Self {
            lvalue_required: true,
            coerce: None,
        }
    }

    fn coerced(kind: TypeKind) -> Self {
        Self {
            lvalue_required: false,
            coerce: Some(kind),
        }
    }
}

/// Flags propagated upward to decide statement-removal safety. Each flag
/// stops at the construct that would bind it.
#[derive(Debug, Clone, Copy, Default)]
struct EscapeFlags {
    ret_goto_label: bool,
    break_out: bool,
    continue_out: bool,
    case_out: bool,
}

impl EscapeFlags {
    fn any(self) -> bool {
        self.ret_goto_label || self.break_out || self.continue_out || self.case_out
    }

    fn union(self, other: Self) -> Self {
        Self {
            ret_goto_label: self.ret_goto_label || other.ret_goto_label,
            break_out: self.break_out || other.break_out,
            continue_out: self.continue_out || other.continue_out,
            case_out: self.case_out || other.case_out,
        }
    }
}

struct MutateVisitor<'a> {
    source: &'a str,
    lang: Lang,
    scopes: ScopeStack,
    tree: MutationTree,
    node_stack: Vec<NodeId>,
    in_function: Vec<bool>,
    /// Non-zero inside contexts where no mutation may be planted.
    suppress: u32,
    /// Start bytes of declared variable names; expressions that collide
    /// with a declaration are skipped.
    var_decl_starts: HashSet<usize>,
    mutations: Vec<Mutation>,
    first_decl_byte: Option<usize>,
}

impl<'a> MutateVisitor<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn named_children(node: Node) -> Vec<Node> {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        children
    }

    fn in_function(&self) -> bool {
        self.in_function.last().copied().unwrap_or(false)
    }

    fn current_tree_node(&self) -> NodeId {
        self.node_stack.last().copied().unwrap_or_else(|| self.tree.root())
    }

    fn push_tree_node(&mut self) -> NodeId {
        let id = self.tree.add_child(self.current_tree_node());
        self.node_stack.push(id);
        id
    }

    fn pop_tree_node(&mut self) {
        self.node_stack.pop();
    }

    fn record(&mut self, mutation: Mutation) {
        let index = self.mutations.len();
        self.mutations.push(mutation);
        let node = self.current_tree_node();
        self.tree.add_mutation(node, index);
    }

    fn span(&self, node: Node) -> ByteSpan {
        ByteSpan::new(node.start_byte(), node.end_byte())
    }

    fn info_for(&self, node: Node) -> SourceRangeInfo {
        SourceRangeInfo::new(self.source, node.start_byte(), node.end_byte())
    }

    // ---- traversal -------------------------------------------------------

    fn walk(&mut self, node: Node, ctx: ExprCtx) {
        match node.kind() {
            "comment" | "preproc_def" | "preproc_function_def" | "preproc_include"
            | "preproc_call" => {}
            "function_definition" => self.handle_function(node),
            "lambda_expression" => self.handle_lambda(node),
            "declaration" => self.handle_declaration(node),
            "compound_statement" => self.handle_compound(node),
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.handle_record_decl(node);
            }
            "enum_specifier" => self.handle_enum(node),
            "namespace_definition" => {
                self.push_tree_node();
                self.walk_children(node);
                self.pop_tree_node();
            }
            "case_statement" => self.handle_case(node),
            "sizeof_expression" | "alignof_expression" | "template_argument_list"
            | "template_parameter_list" | "static_assert_declaration"
            | "lambda_capture_specifier" | "type_descriptor" => {
                self.suppress += 1;
                self.walk_children(node);
                self.suppress -= 1;
            }
            "for_statement" | "for_range_loop" => {
                self.scopes.push();
                if node.kind() == "for_range_loop" {
                    self.register_range_var(node);
                }
                self.walk_children(node);
                self.scopes.pop();
            }
            "assignment_expression" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.walk(left, ExprCtx::lvalue());
                    let coerce = self.assignment_coercion(node, left);
                    if let Some(right) = node.child_by_field_name("right") {
                        self.walk(
                            right,
                            coerce.map_or_else(ExprCtx::default, ExprCtx::coerced),
                        );
                    }
                }
                self.try_mutate(node, ctx);
            }
            "update_expression" => {
                if let Some(arg) = node.child_by_field_name("argument") {
                    self.walk(arg, ExprCtx::lvalue());
                }
                self.try_mutate(node, ctx);
            }
            "pointer_expression" => {
                // `&x` needs x as an lvalue; `*p` is untypable anyway.
                let taking_address = node
                    .child_by_field_name("operator")
                    .is_some_and(|op| self.text(op) == "&");
                if let Some(arg) = node.child_by_field_name("argument") {
                    self.walk(
                        arg,
                        if taking_address {
                            ExprCtx::lvalue()
                        } else {
                            ExprCtx::default()
                        },
                    );
                }
            }
            _ => {
                self.walk_children(node);
                self.try_mutate(node, ctx);
            }
        }
    }

    fn walk_children(&mut self, node: Node) {
        for child in Self::named_children(node) {
            self.walk(child, ExprCtx::default());
        }
    }

    fn assignment_coercion(&mut self, node: Node, left: Node) -> Option<TypeKind> {
        let op = node.child_by_field_name("operator")?;
        if self.text(op) != "=" {
            return None;
        }
        let info = analyze(left, self.source, self.lang, &self.scopes)?;
        Some(info.ty)
    }

    // ---- declarations ----------------------------------------------------

    fn handle_function(&mut self, node: Node) {
        self.push_tree_node();
        self.scopes.push();
        if let Some(declarator) = node.child_by_field_name("declarator") {
            self.register_params(declarator);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.in_function.push(true);
            self.walk(body, ExprCtx::default());
            self.in_function.pop();
        }
        self.scopes.pop();
        self.pop_tree_node();
    }

    fn handle_lambda(&mut self, node: Node) {
        // Capture lists cannot contain lambdas, so they are never mutated;
        // they are simply not traversed.
        self.push_tree_node();
        self.scopes.push();
        if let Some(declarator) = node.child_by_field_name("declarator") {
            self.register_params(declarator);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.in_function.push(true);
            self.walk(body, ExprCtx::default());
            self.in_function.pop();
        }
        self.scopes.pop();
        self.pop_tree_node();
    }

    /// Finds the parameter list under a (possibly nested) declarator and
    /// registers every builtin-typed parameter. Default argument values
    /// are deliberately not traversed.
    fn register_params(&mut self, declarator: Node) {
        let mut current = declarator;
        loop {
            if let Some(params) = current.child_by_field_name("parameters") {
                for param in Self::named_children(params) {
                    if matches!(
                        param.kind(),
                        "parameter_declaration" | "optional_parameter_declaration"
                    ) {
                        self.register_param(param);
                    }
                }
                return;
            }
            match current.child_by_field_name("declarator") {
                Some(inner) => current = inner,
                None => return,
            }
        }
    }

    fn register_param(&mut self, param: Node) {
        let Some(base) = parse_decl_type(param, self.source) else {
            return;
        };
        let Some(declarator) = param.child_by_field_name("declarator") else {
            return;
        };
        self.register_variable(declarator, base.kind, base.volatile, base.is_const);
    }

    /// Registers `declarator` when it names a plain (or reference) variable
    /// of a builtin type. Returns true on success. Always records the
    /// declared name's start byte for the collision rule.
    fn register_variable(
        &mut self,
        declarator: Node,
        kind: TypeKind,
        volatile: bool,
        is_const: bool,
    ) -> bool {
        match declarator.kind() {
            "identifier" => {
                self.var_decl_starts.insert(declarator.start_byte());
                let name = self.text(declarator).to_string();
                self.scopes.declare(
                    &name,
                    VarInfo {
                        ty: kind,
                        volatile,
                        is_const,
                    },
                );
                true
            }
            "reference_declarator" => Self::named_children(declarator)
                .first()
                .copied()
                .is_some_and(|inner| self.register_variable(inner, kind, volatile, is_const)),
            "pointer_declarator" | "array_declarator" | "function_declarator" => {
                // Unsupported shape; still record the name location.
                if let Some(name) = Self::find_declared_name(declarator) {
                    self.var_decl_starts.insert(name.start_byte());
                }
                false
            }
            _ => false,
        }
    }

    fn find_declared_name(declarator: Node) -> Option<Node> {
        if declarator.kind() == "identifier" {
            return Some(declarator);
        }
        let inner = declarator.child_by_field_name("declarator")?;
        Self::find_declared_name(inner)
    }

    fn handle_declaration(&mut self, node: Node) {
        self.push_tree_node();
        let base = parse_decl_type(node, self.source);
        // In C, objects with static storage duration need constant
        // initializers; instrumenting them cannot compile.
        let frozen_init = self.lang == Lang::C && self.has_storage_class(node, "static");

        for child in Self::named_children(node) {
            match child.kind() {
                "init_declarator" => {
                    let registered = child
                        .child_by_field_name("declarator")
                        .is_some_and(|declarator| match base {
                            Some(ty) => {
                                self.register_variable(declarator, ty.kind, ty.volatile, ty.is_const)
                            }
                            None => {
                                if let Some(name) = Self::find_declared_name(declarator) {
                                    self.var_decl_starts.insert(name.start_byte());
                                }
                                false
                            }
                        });
                    if frozen_init {
                        continue;
                    }
                    if let Some(value) = child.child_by_field_name("value") {
                        self.walk_initializer(value, registered.then(|| base.map(|b| b.kind)).flatten());
                    }
                }
                "identifier" | "pointer_declarator" | "array_declarator"
                | "function_declarator" | "reference_declarator" => {
                    match base {
                        Some(ty) => {
                            self.register_variable(child, ty.kind, ty.volatile, ty.is_const);
                        }
                        None => {
                            if let Some(name) = Self::find_declared_name(child) {
                                self.var_decl_starts.insert(name.start_byte());
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        self.pop_tree_node();
    }

    /// Walks an initializer, converting the initialized expression to the
    /// declared type the way the compiler will.
    fn walk_initializer(&mut self, value: Node, coerce: Option<TypeKind>) {
        match value.kind() {
            "initializer_list" | "argument_list" => {
                let elements = Self::named_children(value);
                let single = elements.len() == 1;
                for element in elements {
                    self.walk(
                        element,
                        if single {
                            coerce.map_or_else(ExprCtx::default, ExprCtx::coerced)
                        } else {
                            ExprCtx::default()
                        },
                    );
                }
            }
            _ => self.walk(
                value,
                coerce.map_or_else(ExprCtx::default, ExprCtx::coerced),
            ),
        }
    }

    fn has_storage_class(&self, node: Node, which: &str) -> bool {
        Self::named_children(node)
            .iter()
            .any(|c| c.kind() == "storage_class_specifier" && self.text(*c) == which)
    }

    fn register_range_var(&mut self, node: Node) {
        let Some(base) = parse_decl_type(node, self.source) else {
            return;
        };
        if let Some(declarator) = node.child_by_field_name("declarator") {
            self.register_variable(declarator, base.kind, base.volatile, base.is_const);
        }
    }

    fn handle_record_decl(&mut self, node: Node) {
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        self.push_tree_node();
        self.scopes.push();
        // Class-scope member initializers are not "in a function": only a
        // lambda body inside one re-enables mutation.
        self.in_function.push(false);
        self.walk(body, ExprCtx::default());
        self.in_function.pop();
        self.scopes.pop();
        self.pop_tree_node();
    }

    fn handle_enum(&mut self, node: Node) {
        // Enumerator values must be integral constant expressions.
        if let Some(body) = node.child_by_field_name("body") {
            self.suppress += 1;
            self.walk(body, ExprCtx::default());
            self.suppress -= 1;
        }
    }

    fn handle_case(&mut self, node: Node) {
        let value = node.child_by_field_name("value");
        for child in Self::named_children(node) {
            if value.is_some_and(|v| v.id() == child.id()) {
                self.suppress += 1;
                self.walk(child, ExprCtx::default());
                self.suppress -= 1;
            } else {
                self.walk(child, ExprCtx::default());
            }
        }
    }

    // ---- statements ------------------------------------------------------

    fn handle_compound(&mut self, node: Node) {
        self.scopes.push();
        self.push_tree_node();
        for child in Self::named_children(node) {
            self.walk(child, ExprCtx::default());
            self.maybe_remove_stmt(child);
        }
        self.pop_tree_node();
        self.scopes.pop();
    }

    fn maybe_remove_stmt(&mut self, stmt: Node) {
        if !self.in_function() || self.suppress > 0 {
            return;
        }
        match stmt.kind() {
            "expression_statement" => {
                if Self::named_children(stmt).is_empty() {
                    return; // null statement
                }
            }
            "if_statement" | "while_statement" | "do_statement" | "for_statement"
            | "for_range_loop" | "switch_statement" | "compound_statement"
            | "break_statement" | "continue_statement" | "return_statement"
            | "goto_statement" => {}
            _ => return,
        }
        if self.escape_flags(stmt).any() {
            return;
        }
        let (range, with_comment, with_semi) =
            remove_stmt::extend_range(self.source, stmt.start_byte(), stmt.end_byte());
        let info = SourceRangeInfo::new(self.source, range.start, range.end);
        self.record(Mutation::RemoveStmt(RemoveStmtMutation {
            range,
            info,
            extended_with_comment: with_comment,
            extended_with_semi: with_semi,
        }));
    }

    fn escape_flags(&self, node: Node) -> EscapeFlags {
        let mut flags = EscapeFlags::default();
        match node.kind() {
            "return_statement" | "goto_statement" | "labeled_statement" => {
                flags.ret_goto_label = true;
            }
            "break_statement" => {
                flags.break_out = true;
                return flags;
            }
            "continue_statement" => {
                flags.continue_out = true;
                return flags;
            }
            "case_statement" => flags.case_out = true,
            // Escapes cannot cross a function boundary.
            "lambda_expression" | "function_definition" => return flags,
            _ => {}
        }
        for child in Self::named_children(node) {
            flags = flags.union(self.escape_flags(child));
        }
        match node.kind() {
            "while_statement" | "do_statement" | "for_statement" | "for_range_loop" => {
                flags.break_out = false;
                flags.continue_out = false;
            }
            "switch_statement" => {
                flags.break_out = false;
                flags.case_out = false;
            }
            _ => {}
        }
        flags
    }

    // ---- expression sites ------------------------------------------------

    fn try_mutate(&mut self, node: Node, ctx: ExprCtx) {
        if self.suppress > 0 || !self.in_function() {
            return;
        }
        if self.var_decl_starts.contains(&node.start_byte()) {
            return;
        }
        match node.kind() {
            "unary_expression" | "update_expression" => {
                self.try_unary(node, ctx);
                self.try_expr(node, ctx);
            }
            "binary_expression" | "assignment_expression" => {
                self.try_binary(node, ctx);
                self.try_expr(node, ctx);
            }
            "number_literal" | "char_literal" | "true" | "false" | "identifier"
            | "conditional_expression" | "cast_expression" => {
                self.try_expr(node, ctx);
            }
            _ => {}
        }
    }

    fn try_expr(&mut self, node: Node, ctx: ExprCtx) {
        if ctx.lvalue_required {
            return;
        }
        let Some(info) = analyze(node, self.source, self.lang, &self.scopes) else {
            return;
        };
        let range = self.span(node);
        let source_info = self.info_for(node);

        // A modifiable arithmetic lvalue gets a dedicated record whose
        // variants mutate it in place; the ordinary value record then wraps
        // the result.
        if info.lvalue && info.modifiable && !info.ty.is_bool() {
            self.record(Mutation::ReplaceExpr(ReplaceExprMutation {
                range,
                info: source_info.clone(),
                ty: TypeDesc {
                    kind: info.ty,
                    volatile: info.volatile,
                },
                flags: ExprFlags {
                    lvalue: true,
                    ..ExprFlags::default()
                },
                constant: false,
                pure_expr: true,
                value: None,
            }));
        }

        let kind = ctx.coerce.unwrap_or(info.ty);
        let value = if info.constant {
            typing_coerce(info.lit, kind)
        } else {
            None
        };
        let (logical_and, logical_or) = self.logical_shape(node);
        let flags = ExprFlags {
            lvalue: false,
            logical_and,
            logical_or,
            integer_zero: kind.is_integer() && matches!(value, Some(Lit::Int(0))),
            integer_one: kind.is_integer() && matches!(value, Some(Lit::Int(1))),
            floating_zero: kind.is_floating() && matches!(value, Some(Lit::Float(v)) if v == 0.0),
            floating_one: kind.is_floating() && matches!(value, Some(Lit::Float(v)) if v == 1.0),
        };
        self.record(Mutation::ReplaceExpr(ReplaceExprMutation {
            range,
            info: source_info,
            ty: TypeDesc::plain(kind),
            flags,
            constant: info.constant,
            pure_expr: info.pure_expr,
            value,
        }));
    }

    fn logical_shape(&self, node: Node) -> (bool, bool) {
        if node.kind() != "binary_expression" {
            return (false, false);
        }
        match node
            .child_by_field_name("operator")
            .map(|op| self.text(op))
        {
            Some("&&") => (true, false),
            Some("||") => (false, true),
            _ => (false, false),
        }
    }

    fn try_unary(&mut self, node: Node, ctx: ExprCtx) {
        let op = match node.kind() {
            "unary_expression" => node
                .child_by_field_name("operator")
                .and_then(|o| UnaryOp::from_expr_token(self.text(o))),
            "update_expression" => node
                .child_by_field_name("operator")
                .and_then(|o| UnaryOp::from_update_token(self.text(o), is_prefix_update(node))),
            _ => None,
        };
        let Some(op) = op else { return };
        let Some(operand) = node.child_by_field_name("argument") else {
            return;
        };
        let Some(expr_info) = analyze(node, self.source, self.lang, &self.scopes) else {
            return;
        };
        let Some(operand_info) = analyze(operand, self.source, self.lang, &self.scopes) else {
            return;
        };
        // The dispatcher returns a value unless the expression itself is an
        // lvalue, so an lvalue-requiring context rules the site out.
        if ctx.lvalue_required && !expr_info.lvalue {
            return;
        }
        self.record(Mutation::ReplaceUnaryOperator(ReplaceUnaryOperatorMutation {
            range: self.span(node),
            operand_range: self.span(operand),
            info: self.info_for(node),
            op,
            result_ty: TypeDesc {
                kind: expr_info.ty,
                volatile: expr_info.volatile,
            },
            operand_ty: TypeDesc {
                kind: operand_info.ty,
                volatile: operand_info.volatile,
            },
            // Only increment/decrement operands are passed by reference:
            // they were walked in an lvalue-requiring context, so their
            // text is pristine. Other operands read like rvalues (and may
            // contain nested call sites).
            operand_lvalue: op.is_inc_dec() && operand_info.lvalue && operand_info.modifiable,
            operand_constant: operand_info.constant,
            expr_lvalue: expr_info.lvalue,
        }));
    }

    fn try_binary(&mut self, node: Node, ctx: ExprCtx) {
        let Some(op) = node
            .child_by_field_name("operator")
            .and_then(|o| BinaryOp::from_token(self.text(o)))
        else {
            return;
        };
        // A value-passing C dispatcher would evaluate both operands and
        // destroy short-circuit evaluation.
        if op.family() == BinFamily::Logical && !self.lang.has_lambdas() {
            return;
        }
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };
        let Some(expr_info) = analyze(node, self.source, self.lang, &self.scopes) else {
            return;
        };
        let Some(lhs) = analyze(left, self.source, self.lang, &self.scopes) else {
            return;
        };
        let Some(rhs) = analyze(right, self.source, self.lang, &self.scopes) else {
            return;
        };
        if ctx.lvalue_required && !expr_info.lvalue {
            return;
        }
        if op.is_assignment() && !(lhs.lvalue && lhs.modifiable) {
            return;
        }
        self.record(Mutation::ReplaceBinaryOperator(
            ReplaceBinaryOperatorMutation {
                range: self.span(node),
                lhs_range: self.span(left),
                rhs_range: self.span(right),
                info: self.info_for(node),
                op,
                result_ty: TypeDesc::plain(expr_info.ty),
                lhs_ty: TypeDesc {
                    kind: lhs.ty,
                    volatile: lhs.volatile,
                },
                rhs_ty: TypeDesc::plain(rhs.ty),
                lhs_lvalue: lhs.lvalue && lhs.modifiable,
                lhs_constant: lhs.constant,
                rhs_constant: rhs.constant,
                rhs_value: if rhs.constant { rhs.lit } else { None },
            },
        ));
    }
}

#[allow(clippy::cast_precision_loss)]
fn typing_coerce(lit: Option<Lit>, kind: TypeKind) -> Option<Lit> {
    match (lit?, kind) {
        (Lit::Int(v), k) if k.is_floating() => Some(Lit::Float(v as f64)),
        (Lit::Int(v), k) if k.is_bool() => Some(Lit::Bool(v != 0)),
        (Lit::Int(v), _) => Some(Lit::Int(v)),
        (Lit::Bool(b), k) if k.is_bool() => Some(Lit::Bool(b)),
        (Lit::Bool(b), k) if k.is_integer() => Some(Lit::Int(i64::from(b))),
        (Lit::Float(v), k) if k.is_floating() => Some(Lit::Float(v)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::Mutation;
    use tree_sitter::Parser;

    fn discover_in(lang: Lang, source: &str) -> DiscoveryResult {
        let mut parser = Parser::new();
        parser.set_language(&lang.grammar()).expect("grammar");
        let tree = parser.parse(source, None).expect("parse");
        assert!(!tree.root_node().has_error(), "test source must parse");
        discover(&tree, source, lang)
    }

    fn count_removals(result: &DiscoveryResult) -> usize {
        result
            .mutations
            .iter()
            .filter(|m| matches!(m, Mutation::RemoveStmt(_)))
            .count()
    }

    #[test]
    fn test_simple_statement_yields_all_site_kinds() {
        let result = discover_in(Lang::Cpp, "void foo() { 1 + 2; }");
        // Sites: remove `1 + 2;`, binary op, whole expr, both literals.
        assert_eq!(count_removals(&result), 1);
        let binaries = result
            .mutations
            .iter()
            .filter(|m| matches!(m, Mutation::ReplaceBinaryOperator(_)))
            .count();
        assert_eq!(binaries, 1);
        let exprs = result
            .mutations
            .iter()
            .filter(|m| matches!(m, Mutation::ReplaceExpr(_)))
            .count();
        assert_eq!(exprs, 3);
    }

    #[test]
    fn test_first_decl_byte_skips_comments_and_includes() {
        let src = "// header\n#include <stdio.h>\nint g;\nvoid foo() { 1; }\n";
        let result = discover_in(Lang::C, src);
        let decl_start = src.find("int g;").expect("decl");
        assert_eq!(result.first_decl_byte, Some(decl_start));
    }

    #[test]
    fn test_return_inside_loop_is_not_removable() {
        let src = "int foo() { while (1) { return 0; } return 1; }";
        let result = discover_in(Lang::Cpp, src);
        // The while statement contains a return, the returns themselves
        // are returns: nothing is removable.
        assert_eq!(count_removals(&result), 0);
    }

    #[test]
    fn test_loop_with_break_is_removable_but_break_is_not() {
        let src = "void foo() { while (1) { break; } 1; }";
        let result = discover_in(Lang::Cpp, src);
        // `1;` and the whole while loop (the break binds to it) qualify;
        // the break statement itself does not.
        assert_eq!(count_removals(&result), 2);
        let removed: Vec<&str> = result
            .mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::RemoveStmt(r) => Some(r.info.snippet.as_str()),
                _ => None,
            })
            .collect();
        assert!(removed.contains(&"while (1) { break; }"));
        assert!(removed.contains(&"1;"));
    }

    #[test]
    fn test_case_labels_are_not_mutated() {
        let src = "void foo(int x) { switch (x) { case 2: break; } }";
        let result = discover_in(Lang::Cpp, src);
        // The literal 2 in the case label must not appear as a site. The
        // only expression site is the switch condition x.
        for m in &result.mutations {
            if let Mutation::ReplaceExpr(e) = m {
                assert_ne!(e.info.snippet, "2");
            }
        }
    }

    #[test]
    fn test_array_sizes_are_not_mutated() {
        let src = "void foo() { int a[3]; }";
        let result = discover_in(Lang::Cpp, src);
        assert!(result.mutations.is_empty());
    }

    #[test]
    fn test_class_member_initializer_not_in_function() {
        let src = "void foo() { class A { public: int x = 2; }; }";
        let result = discover_in(Lang::Cpp, src);
        for m in &result.mutations {
            if let Mutation::ReplaceExpr(e) = m {
                assert_ne!(e.info.snippet, "2");
            }
        }
    }

    #[test]
    fn test_file_scope_initializers_not_mutated() {
        let src = "int g = 1 + 2;\n";
        let result = discover_in(Lang::C, src);
        assert!(result.mutations.is_empty());
    }

    #[test]
    fn test_unsigned_initializer_is_coerced() {
        let src = "void foo() { unsigned int x = 2; }";
        let result = discover_in(Lang::Cpp, src);
        let expr = result
            .mutations
            .iter()
            .find_map(|m| match m {
                Mutation::ReplaceExpr(e) if e.info.snippet == "2" => Some(e),
                _ => None,
            })
            .expect("literal site");
        assert_eq!(expr.ty.kind, TypeKind::UInt);
        assert!(expr.constant);
    }

    #[test]
    fn test_logical_and_site_is_flagged() {
        let src = "bool foo(bool a, bool b) { return a && b; }";
        let result = discover_in(Lang::Cpp, src);
        let site = result
            .mutations
            .iter()
            .find_map(|m| match m {
                Mutation::ReplaceExpr(e) if e.flags.logical_and => Some(e),
                _ => None,
            })
            .expect("logical-and site");
        assert_eq!(site.info.snippet, "a && b");
        assert_eq!(site.ty.kind, TypeKind::Bool);
        assert!(site.pure_expr);
    }

    #[test]
    fn test_logical_operators_skipped_in_c() {
        let src = "int foo(int a, int b) { return a && b; }";
        let result = discover_in(Lang::C, src);
        assert!(!result
            .mutations
            .iter()
            .any(|m| matches!(m, Mutation::ReplaceBinaryOperator(_))));
    }

    #[test]
    fn test_assignment_lhs_gets_no_expr_record() {
        let src = "void foo() { int x = 0; x = 2; }";
        let result = discover_in(Lang::Cpp, src);
        // Expression records on `x` may only come from positions where a
        // value is allowed; the assignment target is not one.
        let x_records: Vec<_> = result
            .mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::ReplaceExpr(e) if e.info.snippet == "x" => Some(e),
                _ => None,
            })
            .collect();
        assert!(x_records.is_empty());
    }

    #[test]
    fn test_lvalue_in_value_position_gets_two_records() {
        let src = "void foo() { int x = 0; -x; }";
        let result = discover_in(Lang::Cpp, src);
        let x_records: Vec<_> = result
            .mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::ReplaceExpr(e) if e.info.snippet == "x" => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(x_records.len(), 2);
        assert!(x_records.iter().any(|e| e.flags.lvalue));
        assert!(x_records.iter().any(|e| !e.flags.lvalue));
    }

    #[test]
    fn test_postdec_site_shape() {
        let src = "void foo() { int x = 2; x--; }";
        let result = discover_in(Lang::Cpp, src);
        let unary = result
            .mutations
            .iter()
            .find_map(|m| match m {
                Mutation::ReplaceUnaryOperator(u) => Some(u),
                _ => None,
            })
            .expect("unary site");
        assert_eq!(unary.op, UnaryOp::PostDec);
        assert!(unary.operand_lvalue);
        assert!(!unary.operand_constant);
        assert!(!unary.expr_lvalue);
        assert_eq!(unary.operand_ty.kind, TypeKind::Int);
    }

    #[test]
    fn test_pointer_typed_expressions_are_ignored() {
        let src = "void foo(int* p) { p; *p; }";
        let result = discover_in(Lang::Cpp, src);
        for m in &result.mutations {
            assert!(matches!(m, Mutation::RemoveStmt(_)), "unexpected {m:?}");
        }
    }

    #[test]
    fn test_sizeof_operand_not_mutated() {
        let src = "void foo() { int x = 0; sizeof(x + 1); }";
        let result = discover_in(Lang::Cpp, src);
        for m in &result.mutations {
            if let Mutation::ReplaceBinaryOperator(b) = m {
                assert_ne!(b.info.snippet, "x + 1");
            }
        }
    }
}
