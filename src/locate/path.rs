//! Exact XPath for a node
//!
//! Builds an absolute, positional location path that selects exactly one
//! node when evaluated against the same document with the same prefix map.

use crate::dom::{Document, NodeId, NodeKind, NodeRef, QName, DOCUMENT_NODE};
use crate::query::namespaces::PrefixMap;

/// XPath expression for the string `value`. XPath 1.0 literals cannot
/// escape quotes, so a value holding both kinds becomes a `concat()`.
pub(crate) fn literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|part| format!("'{}'", part)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Name test for `name`, using a prefix from `prefixes` when there is one
fn name_test(name: &QName, prefixes: &PrefixMap) -> String {
    match &name.namespace {
        None => name.local.clone(),
        Some(uri) => match prefixes.prefix_for(uri, name.prefix.as_deref()) {
            Some(prefix) => format!("{}:{}", prefix, name.local),
            None => format!(
                "*[local-name()={} and namespace-uri()={}]",
                literal(&name.local),
                literal(uri)
            ),
        },
    }
}

/// 1-based position among preceding siblings accepted by `same`
fn sibling_position(doc: &Document, id: NodeId, same: impl Fn(NodeId) -> bool) -> usize {
    let mut position = 1;
    let mut current = doc.get_node(id).and_then(|n| n.prev_sibling);
    while let Some(sibling) = current {
        if same(sibling) {
            position += 1;
        }
        current = doc.get_node(sibling).and_then(|n| n.prev_sibling);
    }
    position
}

fn step(doc: &Document, id: NodeId, prefixes: &PrefixMap) -> Option<String> {
    let node = doc.get_node(id)?;
    match node.kind {
        NodeKind::Document => None,
        NodeKind::Element => {
            let name = node.name.as_ref()?;
            let position = sibling_position(doc, id, |s| {
                doc.get_node(s)
                    .and_then(|n| n.name.as_ref().filter(|_| n.is_element()))
                    .is_some_and(|n| n.same_expanded(name))
            });
            Some(format!("{}[{}]", name_test(name, prefixes), position))
        }
        NodeKind::Comment => {
            let position = sibling_position(doc, id, |s| doc.kind(s) == Some(NodeKind::Comment));
            Some(format!("comment()[{}]", position))
        }
        NodeKind::ProcessingInstruction => {
            let target = node.name.as_ref().map(|n| n.local.as_str()).unwrap_or_default();
            let position = sibling_position(doc, id, |s| {
                doc.get_node(s).is_some_and(|n| {
                    n.kind == NodeKind::ProcessingInstruction
                        && n.name.as_ref().map(|q| q.local.as_str()) == Some(target)
                })
            });
            Some(format!("processing-instruction({})[{}]", literal(target), position))
        }
    }
}

fn node_path(doc: &Document, id: NodeId, prefixes: &PrefixMap) -> String {
    let mut steps = Vec::new();
    let mut current = Some(id);
    while let Some(cid) = current {
        if cid == DOCUMENT_NODE {
            break;
        }
        if let Some(s) = step(doc, cid, prefixes) {
            steps.push(s);
        }
        current = doc.parent(cid);
    }
    if steps.is_empty() {
        return "/".to_string();
    }
    steps.reverse();
    let mut path = String::new();
    for s in steps {
        path.push('/');
        path.push_str(&s);
    }
    path
}

/// Absolute path selecting exactly `node`
pub fn exact_path(doc: &Document, node: NodeRef, prefixes: &PrefixMap) -> String {
    match node {
        NodeRef::Node(id) => node_path(doc, id, prefixes),
        NodeRef::Attribute { owner, index } => {
            let attribute = match doc.attribute(owner, index) {
                Some(attribute) => &attribute.name,
                None => return node_path(doc, owner, prefixes),
            };
            let test = match &attribute.namespace {
                None => attribute.local.clone(),
                Some(uri) => match prefixes.prefix_for(uri, attribute.prefix.as_deref()) {
                    Some(prefix) => format!("{}:{}", prefix, attribute.local),
                    None => format!(
                        "*[local-name()={} and namespace-uri()={}]",
                        literal(&attribute.local),
                        literal(uri)
                    ),
                },
            };
            format!("{}/@{}", node_path(doc, owner, prefixes), test)
        }
        NodeRef::Text(owner) => format!("{}/text()[1]", node_path(doc, owner, prefixes)),
        NodeRef::Tail(id) => {
            let Some(parent) = doc.parent(id) else {
                return node_path(doc, id, prefixes);
            };
            let has_text = doc.get_node(parent).is_some_and(|n| n.text.is_some());
            let mut position = usize::from(has_text);
            for child in doc.children(parent) {
                if doc.get_node(child).is_some_and(|n| n.tail.is_some()) {
                    position += 1;
                }
                if child == id {
                    break;
                }
            }
            format!("{}/text()[{}]", node_path(doc, parent, prefixes), position)
        }
    }
}

/// [`exact_path`] for each node
pub fn exact_paths(doc: &Document, nodes: &[NodeRef], prefixes: &PrefixMap) -> Vec<String> {
    nodes.iter().map(|n| exact_path(doc, *n, prefixes)).collect()
}
