//! Source regions of query results
//!
//! Turns result nodes back into spans the host can highlight. Attribute
//! and text results stand for the element that holds them.

use crate::dom::{Document, NodeId, NodeKind, NodeRef, DOCUMENT_NODE};
use crate::span::Span;

/// Which part of a node to report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Tag name in the open tag
    Open,
    /// Tag name in the close tag (the open name for self-closing elements)
    Close,
    /// Both tag names
    Names,
    /// Between the open and close tags
    Content,
    /// Open tag start to close tag end
    Entire,
}

/// Element, comment or PI a result stands for
fn holder(doc: &Document, node: NodeRef) -> Option<NodeId> {
    let id = match node {
        NodeRef::Node(id) => id,
        NodeRef::Attribute { owner, .. } | NodeRef::Text(owner) => owner,
        NodeRef::Tail(id) => doc.parent(id)?,
    };
    (id != DOCUMENT_NODE).then_some(id)
}

fn element_regions(doc: &Document, id: NodeId, kind: RegionKind, out: &mut Vec<Span>) {
    let (Some(node), Some(name)) = (doc.get_node(id), doc.tag_name(id)) else {
        return;
    };
    let len = name.full.len();
    let open_name = Span::new(node.open_span.start + 1, node.open_span.start + 1 + len);
    let close_name = Span::new(node.close_span.start + 2, node.close_span.start + 2 + len);
    let self_closing = node.is_self_closing();

    match kind {
        RegionKind::Open => out.push(open_name),
        RegionKind::Close if self_closing => out.push(open_name),
        RegionKind::Close => out.push(close_name),
        RegionKind::Names => {
            out.push(open_name);
            if !self_closing {
                out.push(close_name);
            }
        }
        RegionKind::Content if self_closing => out.push(Span::point(node.open_span.end)),
        RegionKind::Content => out.push(Span::new(node.open_span.end, node.close_span.start)),
        RegionKind::Entire => out.push(node.open_span.cover(&node.close_span)),
    }
}

/// Regions of `nodes`, in the order given; a node met twice (an element
/// and one of its attributes, say) is reported once
pub fn regions_of_nodes(doc: &Document, nodes: &[NodeRef], kind: RegionKind) -> Vec<Span> {
    let mut out = Vec::new();
    let mut seen = Vec::new();
    for &node in nodes {
        let Some(id) = holder(doc, node) else {
            continue;
        };
        if seen.contains(&id) {
            continue;
        }
        seen.push(id);
        let Some(n) = doc.get_node(id) else {
            continue;
        };
        match n.kind {
            NodeKind::Element => element_regions(doc, id, kind, &mut out),
            NodeKind::Comment | NodeKind::ProcessingInstruction => {
                let span = n.open_span;
                // `<!--`/`-->` and `<?`/`?>`
                let (lead, trail) = if n.kind == NodeKind::Comment { (4, 3) } else { (2, 2) };
                out.push(match kind {
                    RegionKind::Content if span.len() >= lead + trail => {
                        Span::new(span.start + lead, span.end - trail)
                    }
                    _ => span,
                });
            }
            NodeKind::Document => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseConfig;
    use crate::parse::parse_str;

    const TEXT: &str = "<r><p:a xmlns:p=\"u\" k=\"v\">x</p:a><b/><!--c--></r>";

    fn doc() -> Document {
        parse_str(TEXT, &ParseConfig::default(), None).unwrap().document
    }

    fn slices(spans: &[Span]) -> Vec<&'static str> {
        spans.iter().map(|s| &TEXT[s.start..s.end]).collect()
    }

    #[test]
    fn test_names() {
        let doc = doc();
        let nodes = [NodeRef::Node(2), NodeRef::Node(3)];
        assert_eq!(slices(&regions_of_nodes(&doc, &nodes, RegionKind::Open)), vec!["p:a", "b"]);
        assert_eq!(slices(&regions_of_nodes(&doc, &nodes, RegionKind::Close)), vec!["p:a", "b"]);
        assert_eq!(slices(&regions_of_nodes(&doc, &nodes, RegionKind::Names)), vec!["p:a", "p:a", "b"]);
    }

    #[test]
    fn test_content_and_entire() {
        let doc = doc();
        let a = [NodeRef::Node(2)];
        assert_eq!(slices(&regions_of_nodes(&doc, &a, RegionKind::Content)), vec!["x"]);
        assert_eq!(
            slices(&regions_of_nodes(&doc, &a, RegionKind::Entire)),
            vec!["<p:a xmlns:p=\"u\" k=\"v\">x</p:a>"]
        );
        let comment = [NodeRef::Node(4)];
        assert_eq!(slices(&regions_of_nodes(&doc, &comment, RegionKind::Content)), vec!["c"]);
        assert_eq!(slices(&regions_of_nodes(&doc, &comment, RegionKind::Open)), vec!["<!--c-->"]);
    }

    #[test]
    fn test_attributes_and_text_map_to_their_element() {
        let doc = doc();
        let nodes = [
            NodeRef::Node(2),
            NodeRef::Attribute { owner: 2, index: 0 },
            NodeRef::Text(2),
            NodeRef::Node(DOCUMENT_NODE),
        ];
        assert_eq!(slices(&regions_of_nodes(&doc, &nodes, RegionKind::Open)), vec!["p:a"]);
    }
}
