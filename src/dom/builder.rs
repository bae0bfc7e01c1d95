//! Tree builder
//!
//! Turns parse events into a [`Document`]. Character data is buffered and
//! flushed on the next structural event: into the `text` of the most
//! recently opened element, or the `tail` of the most recently closed
//! node. Namespace declarations are intercepted here and recorded in the
//! document's [`NamespaceTable`].

use super::document::{Document, DOCUMENT_NODE};
use super::namespace::{NamespaceResolver, NamespaceTable};
use super::node::{NodeId, QName, XmlAttribute, XmlNode};
use crate::core::attributes::{split_qname, Attribute};
use crate::error::SinkError;
use crate::parse::{ParseEventSink, ParsedDocument};
use crate::span::Span;

/// `Some(prefix)` for `xmlns` / `xmlns:prefix` attribute names
fn namespace_declaration(name: &str) -> Option<Option<&str>> {
    match name.strip_prefix("xmlns") {
        Some("") => Some(None),
        Some(rest) => rest.strip_prefix(':').map(Some),
        None => None,
    }
}

/// [`ParseEventSink`] producing a [`ParsedDocument`]
#[derive(Debug, Default)]
pub struct TreeBuilder {
    document: Document,
    /// Open elements
    stack: Vec<NodeId>,
    /// Pending character data
    text: Vec<String>,
    most_recent: Option<NodeId>,
    /// Pending text belongs after `most_recent` rather than inside it
    in_tail: bool,
    resolver: NamespaceResolver,
    namespaces: NamespaceTable,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = self.text.concat();
        self.text.clear();

        // document-level character data is whitespace and is dropped
        if self.stack.is_empty() {
            return;
        }
        let Some(node) = self.most_recent.and_then(|id| self.document.node_mut(id)) else {
            return;
        };
        if self.in_tail {
            node.tail = Some(text);
        } else {
            node.text = Some(text);
        }
    }

    fn append(&mut self, node: XmlNode) -> NodeId {
        let parent = self.stack.last().copied().unwrap_or(DOCUMENT_NODE);
        self.document.append_child(parent, node)
    }

    fn resolve_element_name(&self, name: &str) -> Result<QName, SinkError> {
        let (prefix, local) = split_qname(name);
        let namespace = match prefix {
            Some(p) => Some(
                self.resolver
                    .resolve(Some(p))
                    .ok_or_else(|| SinkError::Malformed(format!("Namespace prefix {} on {} is not defined", p, local)))?
                    .to_string(),
            ),
            None => self.resolver.resolve(None).map(str::to_string),
        };
        Ok(QName {
            namespace,
            local: local.to_string(),
            prefix: prefix.map(str::to_string),
        })
    }

    fn resolve_attributes(&self, element: &str, attributes: Vec<Attribute>) -> Result<Vec<XmlAttribute>, SinkError> {
        let mut resolved: Vec<XmlAttribute> = Vec::with_capacity(attributes.len());
        for attr in attributes {
            let (prefix, local) = attr.split_name();
            // unprefixed attributes are in no namespace
            let namespace = match prefix {
                Some(p) => Some(
                    self.resolver
                        .resolve(Some(p))
                        .ok_or_else(|| {
                            SinkError::Malformed(format!("Namespace prefix {} for {} on {} is not defined", p, local, element))
                        })?
                        .to_string(),
                ),
                None => None,
            };
            let name = QName {
                namespace,
                local: local.to_string(),
                prefix: prefix.map(str::to_string),
            };
            if resolved.iter().any(|a| a.name.same_expanded(&name)) {
                return Err(SinkError::Malformed(format!("Attribute {} redefined", attr.name)));
            }
            resolved.push(XmlAttribute { name, value: attr.value });
        }
        Ok(resolved)
    }
}

impl ParseEventSink for TreeBuilder {
    type Output = ParsedDocument;

    fn element_start(&mut self, name: &str, attributes: Vec<Attribute>, span: Span) -> Result<(), SinkError> {
        self.flush();
        self.resolver.push_scope();

        let (declarations, plain): (Vec<Attribute>, Vec<Attribute>) = attributes
            .into_iter()
            .partition(|a| namespace_declaration(&a.name).is_some());
        for decl in &declarations {
            let Some(prefix) = namespace_declaration(&decl.name) else {
                continue;
            };
            self.resolver.declare(prefix, &decl.value).map_err(SinkError::Malformed)?;
            if prefix != Some("xml") {
                self.namespaces.record(prefix, &decl.value);
            }
        }

        let qname = self.resolve_element_name(name)?;
        let attributes = self.resolve_attributes(name, plain)?;
        let id = self.append(XmlNode::element(qname, attributes, span));
        self.stack.push(id);
        self.most_recent = Some(id);
        self.in_tail = false;
        Ok(())
    }

    fn element_end(&mut self, name: &str, span: Span) -> Result<(), SinkError> {
        self.flush();
        let id = self
            .stack
            .pop()
            .ok_or_else(|| SinkError::Invariant(format!("end of {} with no open element", name)))?;
        self.resolver.pop_scope();

        let node = self
            .document
            .node_mut(id)
            .ok_or_else(|| SinkError::Invariant(format!("open element {} missing from arena", id)))?;
        if node.name.as_ref().map(QName::qualified).as_deref() != Some(name) {
            return Err(SinkError::Invariant(format!("end of {} does not match the open element", name)));
        }
        // a self-closing tag ends where it starts
        node.close_span = if span.end == node.open_span.end { node.open_span } else { span };

        self.most_recent = Some(id);
        self.in_tail = true;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), SinkError> {
        self.text.push(text.to_string());
        Ok(())
    }

    fn comment(&mut self, content: &str, span: Span) -> Result<(), SinkError> {
        self.flush();
        let id = self.append(XmlNode::comment(content, span));
        self.most_recent = Some(id);
        self.in_tail = true;
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str, span: Span) -> Result<(), SinkError> {
        self.flush();
        let id = self.append(XmlNode::processing_instruction(target, data, span));
        self.most_recent = Some(id);
        self.in_tail = true;
        Ok(())
    }

    fn document_end(&mut self) -> Result<ParsedDocument, SinkError> {
        self.flush();
        if !self.stack.is_empty() {
            return Err(SinkError::Invariant(format!("{} elements still open", self.stack.len())));
        }
        let builder = std::mem::take(self);
        if builder.document.root_element_id().is_none() {
            return Err(SinkError::Malformed("Document has no root element".to_string()));
        }
        Ok(ParsedDocument {
            document: builder.document,
            namespaces: builder.namespaces,
        })
    }
}
