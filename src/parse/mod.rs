//! Location-aware parsing
//!
//! Chunked text goes in, a [`Document`] whose nodes carry exact source
//! spans comes out:
//!
//! ```text
//! chunks -> SpanTracker -> Tokenizer -> LocationAwareParser -> ParseEventSink
//! ```

pub mod target;
pub mod tracker;

pub use target::{LocationAwareParser, ParseEventSink};
pub use tracker::{Piece, PieceKind, SpanTracker};

use tokio_util::sync::CancellationToken;

use crate::config::ParseConfig;
use crate::dom::{Document, NamespaceTable, TreeBuilder};
use crate::error::{Error, Result};

/// A parsed document and the namespaces it declares
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub document: Document,
    pub namespaces: NamespaceTable,
}

/// Parse a sequence of chunks into a tree.
///
/// `position_offset` is the absolute offset of the first byte. The token
/// is checked before each chunk; once cancelled, no tree is produced.
pub fn parse<I, T>(chunks: I, position_offset: usize, cancel: Option<&CancellationToken>) -> Result<ParsedDocument>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut parser = LocationAwareParser::new(TreeBuilder::new(), position_offset);
    let mut bytes = 0usize;
    for chunk in chunks {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            log::debug!("parse at offset {} cancelled after {} bytes", position_offset, bytes);
            return Err(Error::Cancelled);
        }
        let chunk = chunk.as_ref();
        bytes += chunk.len();
        parser.feed(chunk)?;
    }
    let parsed = parser.close()?;
    log::debug!(
        "parsed {} bytes at offset {} into {} nodes",
        bytes,
        position_offset,
        parsed.document.node_count()
    );
    Ok(parsed)
}

/// Parse a complete string in `config.chunk_size` windows
pub fn parse_str(text: &str, config: &ParseConfig, cancel: Option<&CancellationToken>) -> Result<ParsedDocument> {
    parse(chunk_str(text, config.chunk_size), config.position_offset, cancel)
}

/// Split `text` into pieces of at most `size` bytes (at least one
/// character each), cutting only on character boundaries
pub fn chunk_str(text: &str, size: usize) -> impl Iterator<Item = &str> {
    let size = size.max(1);
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut cut = size.min(rest.len());
        while !rest.is_char_boundary(cut) {
            cut += 1;
        }
        let (head, tail) = rest.split_at(cut);
        rest = tail;
        Some(head)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NodeKind, NodeRef};
    use crate::span::Span;

    #[test]
    fn test_nested_spans_and_text() {
        let text = "<a><b>hi</b><c/></a>";
        let parsed = parse_str(text, &ParseConfig::default(), None).unwrap();
        let doc = &parsed.document;

        let a = doc.root_element_id().unwrap();
        let a_node = doc.get_node(a).unwrap();
        assert_eq!(a_node.open_span, Span::new(0, 3));
        assert_eq!(a_node.close_span, Span::new(16, 20));

        let children: Vec<_> = doc.children(a).collect();
        let b = doc.get_node(children[0]).unwrap();
        assert_eq!(b.open_span, Span::new(3, 6));
        assert_eq!(b.close_span, Span::new(8, 12));
        assert_eq!(b.text.as_deref(), Some("hi"));

        let c = doc.get_node(children[1]).unwrap();
        assert_eq!(c.open_span, Span::new(12, 16));
        assert!(c.is_self_closing());
    }

    #[test]
    fn test_self_closing_sibling_and_text() {
        let parsed = parse_str("<a><b/><c>text</c></a>", &ParseConfig::default(), None).unwrap();
        let doc = &parsed.document;
        let a = doc.root_element_id().unwrap();
        let children: Vec<_> = doc.children(a).collect();
        assert_eq!(children.len(), 2);
        assert_eq!(doc.tag_name(children[0]).unwrap().full, "b");
        assert!(doc.is_self_closing(children[0]));
        assert_eq!(doc.tag_name(children[1]).unwrap().full, "c");
        assert!(!doc.is_self_closing(children[1]));
        assert_eq!(doc.get_node(children[1]).unwrap().text.as_deref(), Some("text"));
    }

    #[test]
    fn test_child_spans_nest_inside_parent() {
        let text = "<r a=\"1\">\n  <x><y>t</y><z/></x>\n  <!-- c -->\n  <w>tail</w>\n</r>";
        let parsed = parse_str(text, &ParseConfig::default().with_chunk_size(5), None).unwrap();
        let doc = &parsed.document;
        for id in doc.all_nodes() {
            let node = doc.get_node(id).unwrap();
            if !node.is_element() {
                continue;
            }
            assert!(node.open_span.start <= node.open_span.end);
            assert!(node.open_span.end <= node.close_span.start || node.is_self_closing());
            assert!(node.close_span.start <= node.close_span.end);
            for child in doc.children(id) {
                let c = doc.get_node(child).unwrap();
                assert!(node.open_span.end <= c.open_span.start, "child {} of {}", child, id);
                assert!(c.close_span.end <= node.close_span.start, "child {} of {}", child, id);
            }
        }
    }

    #[test]
    fn test_chunk_boundaries_do_not_change_the_tree() {
        let text = "<?xml version=\"1.0\"?>\n<!-- lead -->\n<root xmlns:p=\"urn:p\">\n  <p:item k=\"v &amp; w\">one</p:item>\n  <![CDATA[<raw>]]>tail<e/>\n</root>\n";
        let whole = parse_str(text, &ParseConfig::default(), None).unwrap();
        for size in [1, 2, 3, 7, 16] {
            let parsed = parse_str(text, &ParseConfig::default().with_chunk_size(size), None).unwrap();
            assert_eq!(parsed.document.node_count(), whole.document.node_count());
            for id in 0..whole.document.node_count() as u32 {
                let expected = whole.document.get_node(id).unwrap();
                let actual = parsed.document.get_node(id).unwrap();
                assert_eq!(actual.open_span, expected.open_span, "chunk size {}", size);
                assert_eq!(actual.close_span, expected.close_span, "chunk size {}", size);
                assert_eq!(actual.text, expected.text);
                assert_eq!(actual.tail, expected.tail);
            }
        }
    }

    #[test]
    fn test_position_offset_shifts_spans() {
        let config = ParseConfig::default().with_position_offset(100);
        let parsed = parse_str("<r><x/></r>", &config, None).unwrap();
        let doc = &parsed.document;
        let r = doc.root_element_id().unwrap();
        assert_eq!(doc.get_node(r).unwrap().open_span, Span::new(100, 103));
        let x = doc.children(r).next().unwrap();
        assert_eq!(doc.get_node(x).unwrap().open_span, Span::new(103, 107));
    }

    #[test]
    fn test_split_tag_name_across_chunks() {
        let parsed = parse(["<par", "ent>", "</parent>"], 0, None).unwrap();
        let doc = &parsed.document;
        let root = doc.get_node(doc.root_element_id().unwrap()).unwrap();
        assert_eq!(root.name.as_ref().unwrap().local, "parent");
        assert_eq!(root.open_span, Span::new(0, 8));
    }

    #[test]
    fn test_mismatched_end_tag_location() {
        let err = parse_str("<a><b></a>", &ParseConfig::default(), None).unwrap_err();
        match err {
            Error::Parse(e) => {
                assert_eq!(e.offset, 6);
                assert_eq!(e.line, 1);
                assert_eq!(e.column, 7);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_cdata_merges_into_text() {
        let parsed = parse_str("<a>x<![CDATA[<y>]]>z</a>", &ParseConfig::default(), None).unwrap();
        let doc = &parsed.document;
        let a = doc.root_element_id().unwrap();
        assert_eq!(doc.get_node(a).unwrap().text.as_deref(), Some("x<y>z"));
        assert_eq!(doc.string_value(NodeRef::Node(a)), "x<y>z");
    }

    #[test]
    fn test_prolog_and_epilog_nodes() {
        let parsed = parse_str("<!--p--><r/><?pi x?>", &ParseConfig::default(), None).unwrap();
        let doc = &parsed.document;
        let kinds: Vec<_> = doc
            .children(crate::dom::DOCUMENT_NODE)
            .map(|id| doc.kind(id).unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Comment, NodeKind::Element, NodeKind::ProcessingInstruction]
        );
    }

    #[test]
    fn test_cancelled_parse_yields_no_tree() {
        let token = CancellationToken::new();
        token.cancel();
        let result = parse_str("<r/>", &ParseConfig::default(), Some(&token));
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_cancel_between_chunks() {
        let token = CancellationToken::new();
        let mut fed = 0;
        let chunks = chunk_str("<r><a/><b/><c/></r>", 4).inspect(|_| {
            fed += 1;
            if fed == 2 {
                token.cancel();
            }
        });
        let result = parse(chunks, 0, Some(&token));
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(fed, 2);
    }

    #[test]
    fn test_deep_nesting() {
        let depth = 70_000;
        let text = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
        let parsed = parse_str(&text, &ParseConfig::default(), None).unwrap();
        let doc = &parsed.document;
        assert_eq!(doc.node_count(), depth + 1);
        let innermost = doc.get_node(depth as u32).unwrap();
        assert_eq!(innermost.open_span, Span::new(3 * (depth - 1), 3 * depth));
        assert_eq!(innermost.close_span, Span::new(3 * depth, 3 * depth + 4));
    }

    #[test]
    fn test_crlf_text_is_normalized() {
        let parsed = parse_str("<r>\r\nx<a>y\rz</a></r>", &ParseConfig::default(), None).unwrap();
        let doc = &parsed.document;
        let r = doc.root_element_id().unwrap();
        assert_eq!(doc.get_node(r).unwrap().text.as_deref(), Some("\nx"));
        assert_eq!(doc.get_node(r + 1).unwrap().text.as_deref(), Some("y\nz"));
        assert_eq!(doc.get_node(r).unwrap().open_span, Span::new(0, 3));
        assert_eq!(doc.get_node(r + 1).unwrap().open_span, Span::new(6, 9));
    }

    #[test]
    fn test_entity_declared_after_its_first_use() {
        let text = "<!DOCTYPE r [<!ENTITY e \"&f;\"><!ENTITY f \"x\">]><r>&e;</r>";
        let parsed = parse_str(text, &ParseConfig::default(), None).unwrap();
        let r = parsed.document.root_element_id().unwrap();
        assert_eq!(parsed.document.get_node(r).unwrap().text.as_deref(), Some("x"));
    }

    #[test]
    fn test_chunk_str_respects_char_boundaries() {
        let pieces: Vec<_> = chunk_str("aé€b", 1).collect();
        assert_eq!(pieces, vec!["a", "é", "€", "b"]);
        assert_eq!(chunk_str("", 4).count(), 0);
    }
}
