//! XML Document - Arena-based tree with source spans
//!
//! Nodes live in a single arena indexed by [`NodeId`]. Node 0 is the
//! document node; the root element and any prolog/epilog comments and
//! processing instructions are its children. Because nodes are appended
//! as the parser meets them, id order is document order.

use std::cmp::Ordering;

use super::node::{NodeId, NodeKind, NodeRef, XmlAttribute, XmlNode};
use crate::error::{Error, Result};
use crate::span::Span;

/// Node the document node always occupies
pub const DOCUMENT_NODE: NodeId = 0;

/// Sibling/parent step for [`Document::relative_node`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
    SelfNode,
    Parent,
}

impl std::str::FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "next" => Ok(Direction::Next),
            "prev" | "previous" => Ok(Direction::Previous),
            "self" => Ok(Direction::SelfNode),
            "parent" => Ok(Direction::Parent),
            other => Err(Error::InvalidDirection(other.to_string())),
        }
    }
}

/// Part of an element's markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPart {
    Open,
    Close,
}

/// Name of an element as [`Document::tag_name`] reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagName<'a> {
    pub namespace: Option<&'a str>,
    pub local: &'a str,
    /// `prefix:local` as written
    pub full: String,
}

/// A parsed XML document
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<XmlNode>,
    root_element: Option<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document holding only the document node
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(256);
        nodes.push(XmlNode::document());
        Document {
            nodes,
            root_element: None,
        }
    }

    /// Append `node` as the last child of `parent`
    pub(crate) fn append_child(&mut self, parent: NodeId, mut node: XmlNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        let prev = self.nodes[parent as usize].last_child;
        node.parent = Some(parent);
        node.prev_sibling = prev;
        node.depth = self.nodes[parent as usize].depth + 1;
        if node.is_element() && parent == DOCUMENT_NODE && self.root_element.is_none() {
            self.root_element = Some(node_id);
        }
        self.nodes.push(node);

        if let Some(prev_id) = prev {
            self.nodes[prev_id as usize].next_sibling = Some(node_id);
        } else {
            self.nodes[parent as usize].first_child = Some(node_id);
        }
        self.nodes[parent as usize].last_child = Some(node_id);
        node_id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut XmlNode> {
        self.nodes.get_mut(id as usize)
    }

    /// Get root element ID
    pub fn root_element_id(&self) -> Option<NodeId> {
        self.root_element
    }

    /// Get a node by ID
    #[inline]
    pub fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        self.nodes.get(id as usize)
    }

    /// Get total number of nodes, the document node included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every node except the document node, in document order
    pub fn all_nodes(&self) -> std::ops::Range<NodeId> {
        DOCUMENT_NODE + 1..self.nodes.len() as NodeId
    }

    /// Whether `node` refers to something in this document
    pub fn contains(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Node(id) => self.get_node(id).is_some(),
            NodeRef::Attribute { owner, index } => self
                .get_node(owner)
                .is_some_and(|n| (index as usize) < n.attributes.len()),
            NodeRef::Text(id) => self.get_node(id).is_some_and(|n| n.text.is_some()),
            NodeRef::Tail(id) => self.get_node(id).is_some_and(|n| n.tail.is_some()),
        }
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get_node(id).map(|n| n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.parent
    }

    pub fn attributes(&self, id: NodeId) -> &[XmlAttribute] {
        self.get_node(id).map_or(&[], |n| n.attributes.as_slice())
    }

    pub fn attribute(&self, owner: NodeId, index: u32) -> Option<&XmlAttribute> {
        self.attributes(owner).get(index as usize)
    }

    /// Iterate over children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        let first = self.get_node(id).and_then(|n| n.first_child);
        ChildIter { doc: self, next: first }
    }

    /// Iterate over all descendants of a node in document order
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let mut stack = Vec::new();
        if let Some(node) = self.get_node(id) {
            let mut child_id = node.last_child;
            while let Some(cid) = child_id {
                stack.push(cid);
                child_id = self.get_node(cid).and_then(|n| n.prev_sibling);
            }
        }
        DescendantIter { doc: self, stack }
    }

    /// Deepest last descendant, or the node itself when it has no children
    pub fn last_descendant(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(last) = self.get_node(current).and_then(|n| n.last_child) {
            current = last;
        }
        current
    }

    /// From the open tag start to the close tag end
    pub fn cover_span(&self, id: NodeId) -> Option<Span> {
        let node = self.get_node(id)?;
        Some(node.open_span.cover(&node.close_span))
    }

    pub fn tag_span(&self, id: NodeId, part: TagPart) -> Option<Span> {
        let node = self.get_node(id)?;
        Some(match part {
            TagPart::Open => node.open_span,
            TagPart::Close => node.close_span,
        })
    }

    pub fn is_self_closing(&self, id: NodeId) -> bool {
        self.get_node(id).is_some_and(|n| n.is_self_closing())
    }

    /// Namespace, local name and written name of an element
    pub fn tag_name(&self, id: NodeId) -> Option<TagName<'_>> {
        let node = self.get_node(id)?;
        if !node.is_element() {
            return None;
        }
        let name = node.name.as_ref()?;
        Some(TagName {
            namespace: name.namespace.as_deref(),
            local: &name.local,
            full: name.qualified(),
        })
    }

    /// Step to a sibling or parent; `None` past either end or above the
    /// root element
    pub fn relative_node(&self, id: NodeId, direction: Direction) -> Option<NodeId> {
        let node = self.get_node(id)?;
        match direction {
            Direction::Next => node.next_sibling,
            Direction::Previous => node.prev_sibling,
            Direction::SelfNode => Some(id),
            Direction::Parent => node.parent.filter(|&p| p != DOCUMENT_NODE),
        }
    }

    /// XPath string-value of any node reference
    pub fn string_value(&self, node: NodeRef) -> String {
        match node {
            NodeRef::Node(id) => match self.get_node(id) {
                Some(n) => match n.kind {
                    NodeKind::Document | NodeKind::Element => {
                        let mut out = String::new();
                        self.collect_text(id, &mut out);
                        out
                    }
                    NodeKind::Comment | NodeKind::ProcessingInstruction => {
                        n.value.clone().unwrap_or_default()
                    }
                },
                None => String::new(),
            },
            NodeRef::Attribute { owner, index } => self
                .attribute(owner, index)
                .map(|a| a.value.clone())
                .unwrap_or_default(),
            NodeRef::Text(id) => self
                .get_node(id)
                .and_then(|n| n.text.clone())
                .unwrap_or_default(),
            NodeRef::Tail(id) => self
                .get_node(id)
                .and_then(|n| n.tail.clone())
                .unwrap_or_default(),
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get_node(id) else {
            return;
        };
        if let Some(text) = &node.text {
            out.push_str(text);
        }
        for child in self.children(id) {
            if self.kind(child) == Some(NodeKind::Element) {
                self.collect_text(child, out);
            }
            if let Some(tail) = self.get_node(child).and_then(|n| n.tail.as_ref()) {
                out.push_str(tail);
            }
        }
    }

    /// XPath children of `id`: text nodes interleaved with child nodes
    pub fn child_refs(&self, id: NodeId) -> Vec<NodeRef> {
        let Some(node) = self.get_node(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        match node.kind {
            NodeKind::Element => {
                if node.text.is_some() {
                    out.push(NodeRef::Text(id));
                }
                for child in self.children(id) {
                    out.push(NodeRef::Node(child));
                    if self.get_node(child).is_some_and(|c| c.tail.is_some()) {
                        out.push(NodeRef::Tail(child));
                    }
                }
            }
            NodeKind::Document => out.extend(self.children(id).map(NodeRef::Node)),
            NodeKind::Comment | NodeKind::ProcessingInstruction => {}
        }
        out
    }

    /// XPath parent of any node reference
    pub fn parent_ref(&self, node: NodeRef) -> Option<NodeRef> {
        match node {
            NodeRef::Node(id) | NodeRef::Tail(id) => self.parent(id).map(NodeRef::Node),
            NodeRef::Text(owner) | NodeRef::Attribute { owner, .. } => Some(NodeRef::Node(owner)),
        }
    }

    /// Sort key giving total document order over node references
    pub fn order_key(&self, node: NodeRef) -> (NodeId, u8, u32) {
        match node {
            NodeRef::Node(id) => (id, 0, 0),
            NodeRef::Attribute { owner, index } => (owner, 1, index),
            NodeRef::Text(id) => (id, 2, 0),
            NodeRef::Tail(id) => {
                let depth = self.get_node(id).map_or(0, |n| n.depth);
                (self.last_descendant(id), 3, u32::MAX - depth)
            }
        }
    }

    pub fn compare_order(&self, a: NodeRef, b: NodeRef) -> Ordering {
        self.order_key(a).cmp(&self.order_key(b))
    }

    /// Sort into document order and drop duplicates
    pub fn sort_document_order(&self, nodes: &mut Vec<NodeRef>) {
        nodes.sort_by_cached_key(|n| self.order_key(*n));
        nodes.dedup();
    }
}

/// Iterator over child nodes
pub struct ChildIter<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.get_node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Iterator over descendant nodes (pre-order)
pub struct DescendantIter<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DescendantIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        if let Some(node) = self.doc.get_node(current) {
            let mut child_id = node.last_child;
            while let Some(id) = child_id {
                self.stack.push(id);
                child_id = self.doc.get_node(id).and_then(|n| n.prev_sibling);
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::QName;

    /// `<a>x<b/>y<c>z</c></a>` built by hand
    fn sample() -> Document {
        let mut doc = Document::new();
        let a = doc.append_child(
            DOCUMENT_NODE,
            XmlNode::element(QName::local("a"), Vec::new(), Span::new(0, 3)),
        );
        let b = doc.append_child(a, XmlNode::element(QName::local("b"), Vec::new(), Span::new(4, 8)));
        let c = doc.append_child(a, XmlNode::element(QName::local("c"), Vec::new(), Span::new(9, 12)));
        doc.node_mut(a).unwrap().text = Some("x".to_string());
        doc.node_mut(a).unwrap().close_span = Span::new(17, 21);
        doc.node_mut(b).unwrap().tail = Some("y".to_string());
        doc.node_mut(c).unwrap().text = Some("z".to_string());
        doc.node_mut(c).unwrap().close_span = Span::new(13, 17);
        doc
    }

    #[test]
    fn test_root_and_children() {
        let doc = sample();
        assert_eq!(doc.root_element_id(), Some(1));
        assert_eq!(doc.children(1).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(doc.descendants(DOCUMENT_NODE).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(doc.get_node(3).unwrap().depth, 2);
    }

    #[test]
    fn test_string_value_concatenates_text_and_tails() {
        let doc = sample();
        assert_eq!(doc.string_value(NodeRef::Node(1)), "xyz");
        assert_eq!(doc.string_value(NodeRef::Node(DOCUMENT_NODE)), "xyz");
        assert_eq!(doc.string_value(NodeRef::Tail(2)), "y");
    }

    #[test]
    fn test_child_refs_interleave_text() {
        let doc = sample();
        assert_eq!(
            doc.child_refs(1),
            vec![NodeRef::Text(1), NodeRef::Node(2), NodeRef::Tail(2), NodeRef::Node(3)]
        );
    }

    #[test]
    fn test_document_order_of_text_handles() {
        let doc = sample();
        let mut nodes = vec![
            NodeRef::Node(3),
            NodeRef::Tail(2),
            NodeRef::Text(3),
            NodeRef::Text(1),
            NodeRef::Node(2),
            NodeRef::Node(1),
            NodeRef::Tail(2),
        ];
        doc.sort_document_order(&mut nodes);
        assert_eq!(
            nodes,
            vec![
                NodeRef::Node(1),
                NodeRef::Text(1),
                NodeRef::Node(2),
                NodeRef::Tail(2),
                NodeRef::Node(3),
                NodeRef::Text(3),
            ]
        );
    }

    #[test]
    fn test_relative_node() {
        let doc = sample();
        assert_eq!(doc.relative_node(2, Direction::Next), Some(3));
        assert_eq!(doc.relative_node(2, Direction::Previous), None);
        assert_eq!(doc.relative_node(3, Direction::Parent), Some(1));
        assert_eq!(doc.relative_node(1, Direction::Parent), None);
        assert_eq!(doc.relative_node(3, Direction::SelfNode), Some(3));
        assert_eq!("previous".parse::<Direction>().unwrap(), Direction::Previous);
        assert!(matches!("up".parse::<Direction>(), Err(Error::InvalidDirection(_))));
    }

    #[test]
    fn test_tag_helpers() {
        let doc = sample();
        assert_eq!(doc.tag_name(3).unwrap().full, "c");
        assert_eq!(doc.cover_span(1), Some(Span::new(0, 21)));
        assert!(doc.is_self_closing(2));
        assert!(!doc.is_self_closing(3));
        assert_eq!(doc.tag_span(3, TagPart::Close), Some(Span::new(13, 17)));
    }
}
