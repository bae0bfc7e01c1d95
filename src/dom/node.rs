//! XML Node representation
//!
//! Uses NodeId (u32) for compact, cache-friendly node references. Text is
//! not a node kind: it lives in the `text`/`tail` fields of its neighbours
//! and is addressed through [`NodeRef`].

use crate::span::Span;

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Element node
    Element,
    /// Comment
    Comment,
    /// Processing instruction
    ProcessingInstruction,
}

/// Namespace-resolved name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI, `None` when the name is in no namespace
    pub namespace: Option<String>,
    pub local: String,
    /// Prefix as written in the source
    pub prefix: Option<String>,
}

impl QName {
    /// Name without namespace or prefix (PI targets)
    pub fn local(local: impl Into<String>) -> Self {
        QName {
            namespace: None,
            local: local.into(),
            prefix: None,
        }
    }

    /// Name as written: `prefix:local` or `local`
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }

    /// Same namespace URI and local name
    #[inline]
    pub fn same_expanded(&self, other: &QName) -> bool {
        self.local == other.local && self.namespace == other.namespace
    }
}

/// Stored attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: QName,
    pub value: String,
}

/// An XML node in the arena
#[derive(Debug, Clone)]
pub struct XmlNode {
    /// Type of this node
    pub kind: NodeKind,
    /// Parent node (None for document root)
    pub parent: Option<NodeId>,
    /// First child node
    pub first_child: Option<NodeId>,
    /// Last child node
    pub last_child: Option<NodeId>,
    /// Previous sibling
    pub prev_sibling: Option<NodeId>,
    /// Next sibling
    pub next_sibling: Option<NodeId>,
    /// Depth in document tree
    pub depth: u32,
    /// Element name, or PI target
    pub name: Option<QName>,
    pub attributes: Vec<XmlAttribute>,
    /// Text between the open tag and the first child
    pub text: Option<String>,
    /// Text between this node's end and the next sibling
    pub tail: Option<String>,
    /// Comment content or PI data
    pub value: Option<String>,
    /// Span of `<name ...>`, `<!--...-->` or `<?...?>`
    pub open_span: Span,
    /// Span of `</name>`; equal to `open_span` when there is no end tag
    pub close_span: Span,
}

impl XmlNode {
    fn new(kind: NodeKind, span: Span) -> Self {
        XmlNode {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            depth: 0,
            name: None,
            attributes: Vec::new(),
            text: None,
            tail: None,
            value: None,
            open_span: span,
            close_span: span,
        }
    }

    /// Create a new document root node
    pub fn document() -> Self {
        Self::new(NodeKind::Document, Span::default())
    }

    /// Create a new element node; the close span is filled in on end tag
    pub fn element(name: QName, attributes: Vec<XmlAttribute>, open_span: Span) -> Self {
        let mut node = Self::new(NodeKind::Element, open_span);
        node.name = Some(name);
        node.attributes = attributes;
        node
    }

    /// Create a new comment node
    pub fn comment(content: impl Into<String>, span: Span) -> Self {
        let mut node = Self::new(NodeKind::Comment, span);
        node.value = Some(content.into());
        node
    }

    /// Create a processing instruction node
    pub fn processing_instruction(target: impl Into<String>, data: impl Into<String>, span: Span) -> Self {
        let mut node = Self::new(NodeKind::ProcessingInstruction, span);
        node.name = Some(QName::local(target));
        node.value = Some(data.into());
        node
    }

    /// Check if this is an element node
    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Check if this node has children
    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    /// Open and close spans are identical: a self-closing element, a
    /// comment, or a processing instruction.
    #[inline]
    pub fn is_self_closing(&self) -> bool {
        self.open_span == self.close_span
    }
}

/// Handle to anything an XPath result can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// Document, element, comment or PI
    Node(NodeId),
    /// `index`-th attribute of `owner`
    Attribute { owner: NodeId, index: u32 },
    /// Leading text of element `owner`
    Text(NodeId),
    /// Text following node `id`
    Tail(NodeId),
}

impl NodeRef {
    /// The arena node this handle hangs off
    #[inline]
    pub fn anchor(&self) -> NodeId {
        match *self {
            NodeRef::Node(id) | NodeRef::Text(id) | NodeRef::Tail(id) => id,
            NodeRef::Attribute { owner, .. } => owner,
        }
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, NodeRef::Text(_) | NodeRef::Tail(_))
    }
}
