//! Labeled ordered trees for pattern matching
//!
//! Trees are stored as an arena of nodes addressed by `NodeId`. Each node keeps
//! its parent index and its ordered child list, so relation searches can walk
//! both down and up the tree without any auxiliary maps.

use std::fmt;

/// Unique identifier for a node (index into `Tree::nodes`)
pub type NodeId = usize;

/// A node in a labeled ordered tree
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub label: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    /// Create a new detached node
    pub fn new(id: NodeId, label: Option<&str>) -> Self {
        Self {
            id,
            label: label.map(str::to_string),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// A labeled ordered tree (e.g. a constituency parse)
#[derive(Debug, Clone)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub root_id: Option<NodeId>,
}

impl Tree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root_id: None,
        }
    }

    /// Add a node to the tree. The first node added becomes the root.
    pub fn add_node(&mut self, label: Option<&str>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, label));
        if self.root_id.is_none() {
            self.root_id = Some(id);
        }
        id
    }

    /// Add a labeled node as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, label: &str) -> NodeId {
        let id = self.add_node(Some(label));
        self.set_parent(id, parent);
        id
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a mutable reference to a node by ID
    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Set the parent of a node, appending it to the parent's children
    pub fn set_parent(&mut self, child_id: NodeId, parent_id: NodeId) {
        if let Some(child) = self.get_node_mut(child_id) {
            child.parent = Some(parent_id);
        }
        if let Some(parent) = self.get_node_mut(parent_id) {
            parent.children.push(child_id);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The label of a node, if it has one
    pub fn label(&self, node_id: NodeId) -> Option<&str> {
        self.get_node(node_id).and_then(|node| node.label.as_deref())
    }

    /// Get the children of a node, in order
    pub fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.get_node(node_id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn num_children(&self, node_id: NodeId) -> usize {
        self.children(node_id).len()
    }

    pub fn is_leaf(&self, node_id: NodeId) -> bool {
        self.children(node_id).is_empty()
    }

    /// A preterminal is a node whose only child is a leaf
    pub fn is_preterminal(&self, node_id: NodeId) -> bool {
        matches!(self.children(node_id), [only] if self.is_leaf(*only))
    }

    pub fn first_child(&self, node_id: NodeId) -> Option<NodeId> {
        self.children(node_id).first().copied()
    }

    pub fn last_child(&self, node_id: NodeId) -> Option<NodeId> {
        self.children(node_id).last().copied()
    }

    /// Position of `child` among the children of `parent`
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Get the parent of a node
    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.get_node(node_id).and_then(|node| node.parent)
    }

    /// Leaves dominated by `node_id`, left to right
    pub fn leaves(&self, node_id: NodeId) -> Vec<NodeId> {
        self.preorder(node_id)
            .filter(|&id| self.is_leaf(id))
            .collect()
    }

    /// Preorder traversal of the subtree rooted at `node_id`
    pub fn preorder(&self, node_id: NodeId) -> Preorder<'_> {
        let stack = if node_id < self.nodes.len() {
            vec![node_id]
        } else {
            Vec::new()
        };
        Preorder { tree: self, stack }
    }

    /// Render the subtree rooted at `node_id` in Penn bracket notation
    pub fn display(&self, node_id: NodeId) -> SubtreeDisplay<'_> {
        SubtreeDisplay {
            tree: self,
            node: node_id,
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root_id {
            Some(root) => self.display(root).fmt(f),
            None => Ok(()),
        }
    }
}

/// Preorder iterator over node ids
pub struct Preorder<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(node).iter().rev().copied());
        Some(node)
    }
}

/// Display adapter returned by [`Tree::display`]
pub struct SubtreeDisplay<'a> {
    tree: &'a Tree,
    node: NodeId,
}

impl SubtreeDisplay<'_> {
    fn write_node(&self, f: &mut fmt::Formatter<'_>, node: NodeId) -> fmt::Result {
        let label = self.tree.label(node).unwrap_or("");
        if self.tree.is_leaf(node) {
            return f.write_str(label);
        }
        write!(f, "({}", label)?;
        for (i, &child) in self.tree.children(node).iter().enumerate() {
            if i > 0 || !label.is_empty() {
                f.write_str(" ")?;
            }
            self.write_node(f, child)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for SubtreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree {
        // (S (NP (DT the) (NN dog)) (VP (VBZ runs)))
        let mut tree = Tree::new();
        let s = tree.add_node(Some("S"));
        let np = tree.add_child(s, "NP");
        let dt = tree.add_child(np, "DT");
        tree.add_child(dt, "the");
        let nn = tree.add_child(np, "NN");
        tree.add_child(nn, "dog");
        let vp = tree.add_child(s, "VP");
        let vbz = tree.add_child(vp, "VBZ");
        tree.add_child(vbz, "runs");
        tree
    }

    #[test]
    fn test_tree_creation() {
        let tree = sample();

        assert_eq!(tree.len(), 9);
        assert_eq!(tree.root_id, Some(0));
        assert_eq!(tree.parent(1), Some(0));
        assert_eq!(tree.children(0).len(), 2);
        assert_eq!(tree.label(6), Some("VP"));
    }

    #[test]
    fn test_preorder_and_leaves() {
        let tree = sample();
        let order: Vec<_> = tree
            .preorder(0)
            .map(|id| tree.label(id).unwrap())
            .collect();
        assert_eq!(
            order,
            vec!["S", "NP", "DT", "the", "NN", "dog", "VP", "VBZ", "runs"]
        );

        let leaves: Vec<_> = tree
            .leaves(0)
            .into_iter()
            .map(|id| tree.label(id).unwrap())
            .collect();
        assert_eq!(leaves, vec!["the", "dog", "runs"]);
    }

    #[test]
    fn test_structure_queries() {
        let tree = sample();
        assert!(tree.is_preterminal(2));
        assert!(!tree.is_preterminal(1));
        assert_eq!(tree.first_child(1), Some(2));
        assert_eq!(tree.last_child(1), Some(4));
        assert_eq!(tree.child_index(1, 4), Some(1));
        assert_eq!(tree.child_index(1, 6), None);
        assert!(tree.is_leaf(3));
        assert_eq!(tree.parent(0), None);
    }

    #[test]
    fn test_display() {
        let tree = sample();
        assert_eq!(
            tree.to_string(),
            "(S (NP (DT the) (NN dog)) (VP (VBZ runs)))"
        );
        assert_eq!(tree.display(6).to_string(), "(VP (VBZ runs))");
        assert_eq!(tree.display(3).to_string(), "the");
    }

    #[test]
    fn test_display_unlabeled_root() {
        let mut tree = Tree::new();
        let root = tree.add_node(None);
        let s = tree.add_child(root, "S");
        tree.add_child(s, "x");
        assert_eq!(tree.to_string(), "((S x))");
    }
}
