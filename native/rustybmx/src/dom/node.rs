//! Micro-DOM node representation
//!
//! Uses NodeId (u32) for compact, cache-friendly node references.

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Type of micro-DOM node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Generic grouping node without markup of its own
    Container,
    /// Element node
    Element,
    /// Text content
    Text,
    /// CDATA section
    CData,
    /// Comment
    Comment,
    /// `<!DOCTYPE ...>` declaration
    DocumentType,
    /// Entity reference (`&name;`)
    EntityReference,
    /// Processing instruction
    ProcessingInstruction,
}

impl NodeKind {
    /// Whether nodes of this kind may own children
    #[inline]
    pub fn can_have_children(self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::Container | NodeKind::Element)
    }
}

/// Element attribute, kept in insertion order on its element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Attribute {
            name: name.into(),
            value,
        }
    }
}

/// Element payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Namespace URI, absent for un-namespaced elements
    pub namespace_uri: Option<String>,
    /// Tag name (always present)
    pub tag_name: String,
    /// Attributes in document order
    pub attributes: Vec<Attribute>,
}

impl Element {
    /// Create an element without namespace or attributes
    pub fn new(tag_name: impl Into<String>) -> Self {
        Element {
            namespace_uri: None,
            tag_name: tag_name.into(),
            attributes: Vec::new(),
        }
    }

    /// Create an element in the given namespace
    pub fn with_namespace(namespace_uri: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Element {
            namespace_uri: Some(namespace_uri.into()),
            ..Element::new(tag_name)
        }
    }

    /// Append an attribute, keeping insertion order
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, Some(value.into())));
        self
    }

    /// Get attribute value by name
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }
}

/// Payload of a node, one variant per kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Container,
    Element(Element),
    Text {
        content: Option<String>,
        /// Formatting whitespace rather than semantic content
        ignorable_whitespace: bool,
    },
    CData(Option<String>),
    Comment(Option<String>),
    DocumentType {
        qualified_name: Option<String>,
        public_id: Option<String>,
        system_id: Option<String>,
    },
    EntityReference(Option<String>),
    ProcessingInstruction {
        target: Option<String>,
        data: Option<String>,
    },
}

impl NodeData {
    /// Text node with semantic content
    pub fn text(content: impl Into<String>) -> Self {
        NodeData::Text {
            content: Some(content.into()),
            ignorable_whitespace: false,
        }
    }

    pub fn comment(content: impl Into<String>) -> Self {
        NodeData::Comment(Some(content.into()))
    }

    pub fn cdata(content: impl Into<String>) -> Self {
        NodeData::CData(Some(content.into()))
    }

    /// Kind discriminator for this payload
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document => NodeKind::Document,
            NodeData::Container => NodeKind::Container,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text { .. } => NodeKind::Text,
            NodeData::CData(_) => NodeKind::CData,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::DocumentType { .. } => NodeKind::DocumentType,
            NodeData::EntityReference(_) => NodeKind::EntityReference,
            NodeData::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
        }
    }

    /// Get the element payload, if this is an element
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Element> for NodeData {
    fn from(element: Element) -> Self {
        NodeData::Element(element)
    }
}

/// A node in the arena
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    /// Parent node (None for the root)
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

impl Node {
    /// Create a detached node
    pub fn new(data: NodeData, parent: Option<NodeId>) -> Self {
        Node {
            data,
            parent,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    /// Check if this node has children
    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}
