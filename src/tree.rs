// src/tree.rs
//! The mutation tree: a hierarchy mirroring the lexical nesting of the
//! translation unit (TU → declarations → statement blocks), with each
//! discovered mutation attached to its innermost enclosing node.
//!
//! Nodes live in an arena and refer to each other by index, so transforms
//! never juggle owning pointers. Mutations themselves are stored by the
//! caller in a flat vector; the tree records discovery indices only.

/// Index of a node in the arena.
pub type NodeId = usize;

#[derive(Debug, Default)]
struct NodeData {
    mutations: Vec<usize>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
pub struct MutationTree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Default for MutationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationTree {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::default()],
            root: 0,
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Adds a fresh child under `parent` and returns its id.
    pub fn add_child(&mut self, parent: NodeId) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeData::default());
        self.nodes[parent].children.push(id);
        id
    }

    /// Attaches a mutation (by discovery index) to `node`.
    pub fn add_mutation(&mut self, node: NodeId, mutation_index: usize) {
        self.nodes[node].mutations.push(mutation_index);
    }

    #[must_use]
    pub fn mutations(&self, node: NodeId) -> &[usize] {
        &self.nodes[node].mutations
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    /// True when the subtree rooted at `node` contains no mutations at all.
    #[must_use]
    pub fn is_empty(&self, node: NodeId) -> bool {
        self.nodes[node].mutations.is_empty()
            && self.nodes[node]
                .children
                .iter()
                .all(|&c| self.is_empty(c))
    }

    /// Finalises the tree: prunes empty subtrees, then compresses chains of
    /// single-child nodes that carry no mutations of their own. Idempotent.
    pub fn tidy_up(&mut self) {
        self.prune_empty_subtrees(self.root);
        self.compress(self.root);
    }

    fn prune_empty_subtrees(&mut self, node: NodeId) {
        let kept: Vec<NodeId> = self.nodes[node]
            .children
            .clone()
            .into_iter()
            .filter(|&c| !self.is_empty(c))
            .collect();
        for &child in &kept {
            self.prune_empty_subtrees(child);
        }
        self.nodes[node].children = kept;
    }

    fn compress(&mut self, node: NodeId) {
        while self.nodes[node].mutations.is_empty() && self.nodes[node].children.len() == 1 {
            let only = self.nodes[node].children[0];
            let absorbed = std::mem::take(&mut self.nodes[only]);
            self.nodes[node].mutations = absorbed.mutations;
            self.nodes[node].children = absorbed.children;
        }
        let children = self.nodes[node].children.clone();
        for child in children {
            self.compress(child);
        }
    }

    /// Total number of mutation references in the whole tree.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.count_from(self.root)
    }

    fn count_from(&self, node: NodeId) -> usize {
        self.nodes[node].mutations.len()
            + self.nodes[node]
                .children
                .iter()
                .map(|&c| self.count_from(c))
                .sum::<usize>()
    }
}
