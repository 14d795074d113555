//! DOM Module - Arena-based micro-DOM
//!
//! The in-memory tree the BMX codec reads from and writes into:
//! - Arena allocation for nodes
//! - NodeId (u32) indices for cache-friendly traversal
//! - Nine node kinds, each with its own payload
//!
//! The codec only talks to the tree through [`TreeAccess`] and [`TreeBuilder`].

pub mod node;
pub mod tree;

pub use node::{Attribute, Element, Node, NodeData, NodeId, NodeKind};
pub use tree::{Tree, ROOT};

/// Errors raised while attaching nodes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("no node with id {0}")]
    UnknownNode(NodeId),
    #[error("{0:?} nodes cannot have children")]
    LeafParent(NodeKind),
    #[error("tree exceeds the maximum number of nodes")]
    Full,
}

/// Read access to a tree - all the encoder needs to walk it
pub trait TreeAccess {
    /// Get root node ID, or None for an empty tree
    fn root_id(&self) -> Option<NodeId>;

    /// Get a node's payload by ID
    fn node_data(&self, id: NodeId) -> Option<&NodeData>;

    /// First child of a node
    fn first_child(&self, id: NodeId) -> Option<NodeId>;

    /// Next sibling of a node
    fn next_sibling(&self, id: NodeId) -> Option<NodeId>;

    /// Children in document order - returns collected Vec for trait object compatibility
    fn children_vec(&self, id: NodeId) -> Vec<NodeId> {
        let mut children = Vec::new();
        let mut next = self.first_child(id);
        while let Some(child) = next {
            children.push(child);
            next = self.next_sibling(child);
        }
        children
    }
}

/// Node instantiation - all the decoder needs to rebuild a tree
pub trait TreeBuilder: Sized {
    /// Start a new tree from its root node
    fn create_root(data: NodeData) -> (Self, NodeId);

    /// Create a node and append it as the last child of `parent`
    fn append_child(&mut self, parent: NodeId, data: NodeData) -> Result<NodeId, TreeError>;
}
