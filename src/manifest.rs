// src/manifest.rs
//! The mutation manifest: a JSON document describing every instrumented
//! mutation, its hierarchical position, source range and snippet.
//!
//! Field names follow the camelCase convention of protobuf JSON output.
//! Whitespace is always emitted (pretty printing) and primitive fields are
//! always present, so encode → decode → encode is byte-identical.

use crate::mutation::{Mutation, PlannedSite};
use crate::source_range::LineCol;
use crate::tree::{MutationTree, NodeId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    pub file_path: String,
    pub first_mutation_id_in_file: i32,
    pub tree: TreeNode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub mutations: Vec<MutationInfo>,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationInfo {
    #[serde(rename_all = "camelCase")]
    RemoveStmt {
        id: i32,
        start: LineCol,
        end: LineCol,
        snippet: String,
    },
    #[serde(rename_all = "camelCase")]
    ReplaceUnaryOp {
        id: i32,
        start: LineCol,
        end: LineCol,
        snippet: String,
        operator: String,
        operand_type: String,
        variants: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    ReplaceBinaryOp {
        id: i32,
        start: LineCol,
        end: LineCol,
        snippet: String,
        operator: String,
        lhs_type: String,
        rhs_type: String,
        variants: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    ReplaceExpr {
        id: i32,
        start: LineCol,
        end: LineCol,
        snippet: String,
        expr_type: String,
        flags: ExprFlagsInfo,
        variants: Vec<String>,
    },
}

impl MutationInfo {
    #[must_use]
    pub fn id(&self) -> i32 {
        match self {
            Self::RemoveStmt { id, .. }
            | Self::ReplaceUnaryOp { id, .. }
            | Self::ReplaceBinaryOp { id, .. }
            | Self::ReplaceExpr { id, .. } => *id,
        }
    }

    /// Number of mutant ids this entry spans.
    #[must_use]
    pub fn variant_count(&self) -> usize {
        match self {
            Self::RemoveStmt { .. } => 1,
            Self::ReplaceUnaryOp { variants, .. }
            | Self::ReplaceBinaryOp { variants, .. }
            | Self::ReplaceExpr { variants, .. } => variants.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExprFlagsInfo {
    pub lvalue: bool,
    pub logical_and: bool,
    pub logical_or: bool,
    pub integer_zero: bool,
    pub integer_one: bool,
    pub floating_zero: bool,
    pub floating_one: bool,
}

impl Manifest {
    /// Serialises with the canonical whitespace policy.
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut out = serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string());
        out.push('\n');
        out
    }

    /// # Errors
    /// Fails when the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json())
            .with_context(|| format!("Failed to write mutation info to {}", path.display()))
    }

    /// # Errors
    /// Fails when the file cannot be read or does not decode.
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mutation info from {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Invalid mutation info in {}", path.display()))
    }

    /// File-local mutant ids per file path. This is how an
    /// enabled-mutations manifest restricts a later run: local ids are
    /// stable across runs even when other files shift the global ids.
    #[must_use]
    pub fn local_ids_by_file(&self) -> HashMap<String, HashSet<i32>> {
        let mut map: HashMap<String, HashSet<i32>> = HashMap::new();
        for file in &self.files {
            let ids = map.entry(file.file_path.clone()).or_default();
            collect_local_ids(&file.tree, file.first_mutation_id_in_file, ids);
        }
        map
    }
}

fn collect_local_ids(node: &TreeNode, first_id: i32, out: &mut HashSet<i32>) {
    for m in &node.mutations {
        let base = m.id() - first_id;
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        for offset in 0..m.variant_count() as i32 {
            out.insert(base + offset);
        }
    }
    for child in &node.children {
        collect_local_ids(child, first_id, out);
    }
}

/// Builds the manifest entry for one translation unit from its finalised
/// tree and id plan. Sites the plan dropped (enabled-mutations filtering)
/// do not appear.
#[must_use]
pub fn file_entry(
    file_path: &str,
    first_mutation_id_in_file: i32,
    tree: &MutationTree,
    mutations: &[Mutation],
    plans: &[Option<PlannedSite>],
) -> ManifestFile {
    ManifestFile {
        file_path: file_path.to_string(),
        first_mutation_id_in_file,
        tree: tree_node(tree, tree.root(), mutations, plans),
    }
}

fn tree_node(
    tree: &MutationTree,
    node: NodeId,
    mutations: &[Mutation],
    plans: &[Option<PlannedSite>],
) -> TreeNode {
    TreeNode {
        mutations: tree
            .mutations(node)
            .iter()
            .filter_map(|&index| {
                plans[index]
                    .as_ref()
                    .map(|plan| mutation_info(&mutations[index], plan))
            })
            .collect(),
        children: tree
            .children(node)
            .iter()
            .map(|&child| tree_node(tree, child, mutations, plans))
            .collect(),
    }
}

fn mutation_info(mutation: &Mutation, plan: &PlannedSite) -> MutationInfo {
    let info = mutation.info();
    let id = plan.base_id;
    match mutation {
        Mutation::RemoveStmt(_) => MutationInfo::RemoveStmt {
            id,
            start: info.start,
            end: info.end,
            snippet: info.snippet.clone(),
        },
        Mutation::ReplaceUnaryOperator(m) => MutationInfo::ReplaceUnaryOp {
            id,
            start: info.start,
            end: info.end,
            snippet: info.snippet.clone(),
            operator: m.op.clang_name().to_string(),
            operand_type: m.operand_ty.kind.name().to_string(),
            variants: plan.variants.labels(),
        },
        Mutation::ReplaceBinaryOperator(m) => MutationInfo::ReplaceBinaryOp {
            id,
            start: info.start,
            end: info.end,
            snippet: info.snippet.clone(),
            operator: m.op.clang_name().to_string(),
            lhs_type: m.lhs_ty.kind.name().to_string(),
            rhs_type: m.rhs_ty.kind.name().to_string(),
            variants: plan.variants.labels(),
        },
        Mutation::ReplaceExpr(m) => MutationInfo::ReplaceExpr {
            id,
            start: info.start,
            end: info.end,
            snippet: info.snippet.clone(),
            expr_type: m.ty.kind.name().to_string(),
            flags: ExprFlagsInfo {
                lvalue: m.flags.lvalue,
                logical_and: m.flags.logical_and,
                logical_or: m.flags.logical_or,
                integer_zero: m.flags.integer_zero,
                integer_one: m.flags.integer_one,
                floating_zero: m.flags.floating_zero,
                floating_one: m.flags.floating_one,
            },
            variants: plan.variants.labels(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest {
            files: vec![ManifestFile {
                file_path: "foo.cc".to_string(),
                first_mutation_id_in_file: 0,
                tree: TreeNode {
                    mutations: vec![
                        MutationInfo::RemoveStmt {
                            id: 0,
                            start: LineCol { line: 1, column: 14 },
                            end: LineCol { line: 1, column: 20 },
                            snippet: "1 + 2;".to_string(),
                        },
                        MutationInfo::ReplaceExpr {
                            id: 1,
                            start: LineCol { line: 1, column: 14 },
                            end: LineCol { line: 1, column: 19 },
                            snippet: "1 + 2".to_string(),
                            expr_type: "int".to_string(),
                            flags: ExprFlagsInfo::default(),
                            variants: vec!["~arg".to_string(), "-arg".to_string()],
                        },
                    ],
                    children: Vec::new(),
                },
            }],
        }
    }

    #[test]
    fn test_roundtrip_is_byte_identical() {
        let manifest = sample();
        let encoded = manifest.to_json();
        let decoded: Manifest = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, manifest);
        assert_eq!(decoded.to_json(), encoded);
    }

    #[test]
    fn test_field_names_are_camel_case() {
        let json = sample().to_json();
        assert!(json.contains("\"filePath\""));
        assert!(json.contains("\"firstMutationIdInFile\""));
        assert!(json.contains("\"removeStmt\""));
        assert!(json.contains("\"replaceExpr\""));
        assert!(json.contains("\"exprType\""));
        assert!(json.contains("\"logicalAnd\""));
        assert!(!json.contains("file_path"));
    }

    #[test]
    fn test_primitive_fields_always_present() {
        let json = sample().to_json();
        // Zero-valued primitives still serialize.
        assert!(json.contains("\"firstMutationIdInFile\": 0"));
        assert!(json.contains("\"lvalue\": false"));
    }

    #[test]
    fn test_local_ids_cover_variant_spans() {
        let manifest = sample();
        let map = manifest.local_ids_by_file();
        let ids = map.get("foo.cc").expect("file entry");
        // Remove site: id 0; expr site: ids 1 and 2.
        let expected: HashSet<i32> = [0, 1, 2].into_iter().collect();
        assert_eq!(ids, &expected);
    }
}
