//! Micro-DOM Tree - Arena-based node storage
//!
//! Efficient tree storage with:
//! - Arena allocation for nodes
//! - NodeId indices for traversal
//! - Sibling links so children can be appended in O(1)

use super::node::{Node, NodeData, NodeId};
use super::{TreeAccess, TreeBuilder, TreeError};

/// Root node ID. The first node in the arena is always the root.
pub const ROOT: NodeId = 0;

/// A micro-DOM tree stored in arena format
#[derive(Debug, Clone)]
pub struct Tree {
    /// Arena of nodes
    nodes: Vec<Node>,
}

impl Tree {
    /// Create a tree consisting of a single root node
    pub fn new(root: NodeData) -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(Node::new(root, None));
        Tree { nodes }
    }

    /// Create a new node as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, data: NodeData) -> Result<NodeId, TreeError> {
        let parent_kind = self
            .get_node(parent)
            .map(Node::kind)
            .ok_or(TreeError::UnknownNode(parent))?;
        if !parent_kind.can_have_children() {
            return Err(TreeError::LeafParent(parent_kind));
        }

        let child_id = NodeId::try_from(self.nodes.len()).map_err(|_| TreeError::Full)?;
        self.nodes.push(Node::new(data, Some(parent)));
        self.link_child(parent, child_id);
        Ok(child_id)
    }

    /// Link a child node to its parent
    fn link_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        // Get parent's last_child first to avoid borrow issues
        let last_child_opt = self.nodes[parent_id as usize].last_child;

        if let Some(last_child_id) = last_child_opt {
            self.nodes[child_id as usize].prev_sibling = Some(last_child_id);
            self.nodes[last_child_id as usize].next_sibling = Some(child_id);
        } else {
            self.nodes[parent_id as usize].first_child = Some(child_id);
        }
        self.nodes[parent_id as usize].last_child = Some(child_id);
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    /// Get a mutable node payload by ID
    pub fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id as usize).map(|n| &mut n.data)
    }

    /// Get a node payload by ID
    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.get_node(id).map(|n| &n.data)
    }

    /// Iterate over children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        let first = self.get_node(id).and_then(|n| n.first_child);
        ChildIter { tree: self, next: first }
    }

    /// Iterate over all descendants of a node (depth-first, document order)
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        // Initialize stack with all children in reverse order (so first is processed first)
        let mut stack = Vec::new();
        if let Some(node) = self.get_node(id) {
            let mut child_id = node.last_child;
            while let Some(cid) = child_id {
                stack.push(cid);
                child_id = self.get_node(cid).and_then(|n| n.prev_sibling);
            }
        }
        DescendantIter { tree: self, stack }
    }

    /// Get total number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Structural equality: kind, every field, attribute order and child order.
/// Arena ids play no part, so trees built in a different order still compare equal.
impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(ROOT, ROOT)];
        while let Some((a, b)) = stack.pop() {
            if self.data(a) != other.data(b) {
                return false;
            }
            let mut left = self.children(a);
            let mut right = other.children(b);
            loop {
                match (left.next(), right.next()) {
                    (Some(l), Some(r)) => stack.push((l, r)),
                    (None, None) => break,
                    _ => return false,
                }
            }
        }
        true
    }
}

impl Eq for Tree {}

/// Iterator over child nodes
pub struct ChildIter<'t> {
    tree: &'t Tree,
    next: Option<NodeId>,
}

impl<'t> Iterator for ChildIter<'t> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.get_node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Iterator over descendant nodes (depth-first)
pub struct DescendantIter<'t> {
    tree: &'t Tree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for DescendantIter<'t> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;

        // Add children to stack in reverse order (so first child is processed first)
        if let Some(node) = self.tree.get_node(current) {
            let mut child_id = node.last_child;
            while let Some(id) = child_id {
                self.stack.push(id);
                child_id = self.tree.get_node(id).and_then(|n| n.prev_sibling);
            }
        }

        Some(current)
    }
}

// =============================================================================
// TreeAccess / TreeBuilder implementations
// =============================================================================

impl TreeAccess for Tree {
    fn root_id(&self) -> Option<NodeId> {
        Some(ROOT)
    }

    fn node_data(&self, id: NodeId) -> Option<&NodeData> {
        self.data(id)
    }

    fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.first_child)
    }

    fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|n| n.next_sibling)
    }
}

impl TreeBuilder for Tree {
    fn create_root(data: NodeData) -> (Self, NodeId) {
        (Tree::new(data), ROOT)
    }

    fn append_child(&mut self, parent: NodeId, data: NodeData) -> Result<NodeId, TreeError> {
        Tree::append_child(self, parent, data)
    }
}
