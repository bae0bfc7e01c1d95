//! XPath Axes Implementation
//!
//! All 13 XPath 1.0 axes over [`NodeRef`] handles. Each axis returns its
//! nodes in axis order: forward axes in document order, reverse axes
//! (ancestor, preceding, preceding-sibling) nearest first, so predicate
//! positions count in proximity order.

use super::compiler::CompiledNodeTest;
use super::parser::Axis;
use crate::dom::{Document, NodeKind, NodeRef};

/// Navigate along an axis from a context node
pub fn navigate(doc: &Document, context: NodeRef, axis: Axis) -> Vec<NodeRef> {
    match axis {
        Axis::Child => child_axis(doc, context),
        Axis::Descendant => descendant_axis(doc, context),
        Axis::DescendantOrSelf => {
            let mut result = vec![context];
            result.extend(descendant_axis(doc, context));
            result
        }
        Axis::Parent => doc.parent_ref(context).into_iter().collect(),
        Axis::Ancestor => ancestor_axis(doc, context),
        Axis::AncestorOrSelf => {
            let mut result = vec![context];
            result.extend(ancestor_axis(doc, context));
            result
        }
        Axis::FollowingSibling => following_sibling_axis(doc, context),
        Axis::PrecedingSibling => preceding_sibling_axis(doc, context),
        Axis::Following => following_axis(doc, context),
        Axis::Preceding => preceding_axis(doc, context),
        Axis::Self_ => vec![context],
        Axis::Attribute => attribute_axis(doc, context),
        // namespace nodes are not modelled
        Axis::Namespace => Vec::new(),
    }
}

/// child:: axis - element content, text runs included
fn child_axis(doc: &Document, context: NodeRef) -> Vec<NodeRef> {
    match context {
        NodeRef::Node(id) => doc.child_refs(id),
        _ => Vec::new(),
    }
}

/// descendant:: axis - pre-order below the context node
fn descendant_axis(doc: &Document, context: NodeRef) -> Vec<NodeRef> {
    let mut result = Vec::new();
    collect_descendants(doc, context, &mut result);
    result
}

fn collect_descendants(doc: &Document, node: NodeRef, out: &mut Vec<NodeRef>) {
    for child in child_axis(doc, node) {
        out.push(child);
        if let NodeRef::Node(_) = child {
            collect_descendants(doc, child, out);
        }
    }
}

/// ancestor:: axis - parent, grandparent, up to the document node
fn ancestor_axis(doc: &Document, context: NodeRef) -> Vec<NodeRef> {
    let mut result = Vec::new();
    let mut current = doc.parent_ref(context);
    while let Some(parent) = current {
        result.push(parent);
        current = doc.parent_ref(parent);
    }
    result
}

/// Siblings of `context` split into those before and after it
fn siblings(doc: &Document, context: NodeRef) -> (Vec<NodeRef>, Vec<NodeRef>) {
    if matches!(context, NodeRef::Attribute { .. }) {
        return (Vec::new(), Vec::new());
    }
    let Some(parent) = doc.parent_ref(context) else {
        return (Vec::new(), Vec::new());
    };
    let mut all = child_axis(doc, parent);
    match all.iter().position(|n| *n == context) {
        Some(index) => {
            let after = all.split_off(index + 1);
            all.pop();
            (all, after)
        }
        None => (Vec::new(), Vec::new()),
    }
}

/// following-sibling:: axis
fn following_sibling_axis(doc: &Document, context: NodeRef) -> Vec<NodeRef> {
    siblings(doc, context).1
}

/// preceding-sibling:: axis - nearest sibling first
fn preceding_sibling_axis(doc: &Document, context: NodeRef) -> Vec<NodeRef> {
    let mut before = siblings(doc, context).0;
    before.reverse();
    before
}

/// following:: axis - everything after the context node in document
/// order, descendants and attributes excluded
fn following_axis(doc: &Document, context: NodeRef) -> Vec<NodeRef> {
    let mut result = Vec::new();
    let mut current = context;
    if let NodeRef::Attribute { owner, .. } = context {
        // an attribute precedes its owner's content
        current = NodeRef::Node(owner);
        collect_descendants(doc, current, &mut result);
    }
    loop {
        for sibling in following_sibling_axis(doc, current) {
            result.push(sibling);
            collect_descendants(doc, sibling, &mut result);
        }
        match doc.parent_ref(current) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    result
}

/// preceding:: axis - everything before the context node, ancestors and
/// attributes excluded, nearest first
fn preceding_axis(doc: &Document, context: NodeRef) -> Vec<NodeRef> {
    let mut result = Vec::new();
    let mut current = match context {
        NodeRef::Attribute { owner, .. } => NodeRef::Node(owner),
        other => other,
    };
    loop {
        for sibling in preceding_sibling_axis(doc, current) {
            let mut below = descendant_axis(doc, sibling);
            below.reverse();
            result.extend(below);
            result.push(sibling);
        }
        match doc.parent_ref(current) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    result
}

/// attribute:: axis - attributes of an element, in source order
fn attribute_axis(doc: &Document, context: NodeRef) -> Vec<NodeRef> {
    match context {
        NodeRef::Node(owner) => (0..doc.attributes(owner).len() as u32)
            .map(|index| NodeRef::Attribute { owner, index })
            .collect(),
        _ => Vec::new(),
    }
}

/// Check if a node matches a node test; name tests only see the axis's
/// principal node type (attributes on the attribute axis, elements
/// elsewhere)
pub fn matches_node_test(doc: &Document, node: NodeRef, axis: Axis, node_test: &CompiledNodeTest) -> bool {
    let name = match node {
        NodeRef::Attribute { owner, index } if axis == Axis::Attribute => {
            doc.attribute(owner, index).map(|a| &a.name)
        }
        NodeRef::Node(id) if axis != Axis::Attribute => doc
            .get_node(id)
            .filter(|n| n.is_element())
            .and_then(|n| n.name.as_ref()),
        _ => None,
    };

    match node_test {
        CompiledNodeTest::Any => name.is_some(),
        CompiledNodeTest::Name { namespace, local } => {
            name.is_some_and(|n| n.local == *local && n.namespace == *namespace)
        }
        CompiledNodeTest::NamespaceWildcard(uri) => {
            name.is_some_and(|n| n.namespace.as_deref() == Some(uri.as_str()))
        }
        CompiledNodeTest::Node => true,
        CompiledNodeTest::Text => node.is_text(),
        CompiledNodeTest::Comment => match node {
            NodeRef::Node(id) => doc.kind(id) == Some(NodeKind::Comment),
            _ => false,
        },
        CompiledNodeTest::ProcessingInstruction(target) => match node {
            NodeRef::Node(id) => doc.get_node(id).is_some_and(|n| {
                n.kind == NodeKind::ProcessingInstruction
                    && target
                        .as_deref()
                        .is_none_or(|t| n.name.as_ref().is_some_and(|q| q.local == t))
            }),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseConfig;
    use crate::dom::DOCUMENT_NODE;
    use crate::parse::parse_str;

    fn doc(text: &str) -> Document {
        parse_str(text, &ParseConfig::default(), None).unwrap().document
    }

    #[test]
    fn test_child_axis_interleaves_text() {
        let doc = doc("<root>a<x/>b<y/></root>");
        let root = doc.root_element_id().unwrap();
        let children = navigate(&doc, NodeRef::Node(root), Axis::Child);
        assert_eq!(children.len(), 4);
        assert_eq!(children[0], NodeRef::Text(root));
        assert!(matches!(children[2], NodeRef::Tail(_)));
    }

    #[test]
    fn test_descendant_axis() {
        let doc = doc("<root><a><b/></a><c/></root>");
        let root = doc.root_element_id().unwrap();
        let descendants = navigate(&doc, NodeRef::Node(root), Axis::Descendant);
        assert_eq!(descendants, vec![NodeRef::Node(2), NodeRef::Node(3), NodeRef::Node(4)]);
    }

    #[test]
    fn test_ancestor_axis_is_nearest_first() {
        let doc = doc("<root><a><b/></a></root>");
        let ancestors = navigate(&doc, NodeRef::Node(3), Axis::Ancestor);
        assert_eq!(
            ancestors,
            vec![NodeRef::Node(2), NodeRef::Node(1), NodeRef::Node(DOCUMENT_NODE)]
        );
    }

    #[test]
    fn test_sibling_axes() {
        let doc = doc("<r><a/><b/><c/></r>");
        assert_eq!(
            navigate(&doc, NodeRef::Node(3), Axis::FollowingSibling),
            vec![NodeRef::Node(4)]
        );
        assert_eq!(
            navigate(&doc, NodeRef::Node(4), Axis::PrecedingSibling),
            vec![NodeRef::Node(3), NodeRef::Node(2)]
        );
    }

    #[test]
    fn test_following_and_preceding() {
        // r=1 a=2 b=3 c=4 d=5
        let doc = doc("<r><a><b/></a><c><d/></c></r>");
        assert_eq!(
            navigate(&doc, NodeRef::Node(3), Axis::Following),
            vec![NodeRef::Node(4), NodeRef::Node(5)]
        );
        assert_eq!(
            navigate(&doc, NodeRef::Node(5), Axis::Preceding),
            vec![NodeRef::Node(3), NodeRef::Node(2)]
        );
    }

    #[test]
    fn test_attribute_axis_and_principal_type() {
        let doc = doc("<r id=\"1\" k=\"2\"><id/></r>");
        let attrs = navigate(&doc, NodeRef::Node(1), Axis::Attribute);
        assert_eq!(attrs.len(), 2);
        let test = CompiledNodeTest::Name {
            namespace: None,
            local: "id".to_string(),
        };
        assert!(matches_node_test(&doc, attrs[0], Axis::Attribute, &test));
        assert!(!matches_node_test(&doc, attrs[0], Axis::Child, &test));
        assert!(matches_node_test(&doc, NodeRef::Node(2), Axis::Child, &test));
    }

    #[test]
    fn test_namespace_axis_is_empty() {
        let doc = doc("<r xmlns:p=\"urn:p\"/>");
        assert!(navigate(&doc, NodeRef::Node(1), Axis::Namespace).is_empty());
    }
}
