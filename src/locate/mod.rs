//! Span-based node location
//!
//! Maps editor selections (absolute byte ranges, possibly empty) onto the
//! nodes whose source covers them. A node's source is cut into positions:
//! its own gaps (markup and text between children) and each child's full
//! extent. A range landing in a gap belongs to the node; a range landing
//! in a child is resolved inside that child, recursively. Ranges are
//! expected in document order, so the search never goes back.

pub mod path;

pub use path::{exact_path, exact_paths};

use crate::dom::{Document, NodeId};
use crate::span::{region_intersects, Span};

/// A node some of the ranges fell in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Index into the documents passed to [`locate`]
    pub document: usize,
    pub node: NodeId,
    /// Indices of the ranges that matched
    pub ranges: Vec<usize>,
    /// The part of the node's source that matched
    pub span: Span,
    /// `span` is one of the node's own gaps rather than a leaf child extent
    pub own_span: bool,
}

/// One cut of a node's source
struct Position {
    node: NodeId,
    span: Span,
    /// Nothing to descend into
    is_final: bool,
}

fn positions(doc: &Document, id: NodeId) -> Vec<Position> {
    let Some(node) = doc.get_node(id) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut pos = node.open_span.start;
    for child_id in doc.children(id) {
        let Some(child) = doc.get_node(child_id) else {
            continue;
        };
        out.push(Position {
            node: id,
            span: Span::new(pos, child.open_span.start),
            is_final: true,
        });
        pos = child.close_span.end;
        out.push(Position {
            node: child_id,
            span: Span::new(child.open_span.start, pos),
            is_final: !child.has_children(),
        });
    }
    out.push(Position {
        node: id,
        span: Span::new(pos, node.close_span.end),
        is_final: true,
    });
    out
}

struct Locator<'a> {
    ranges: &'a [Span],
    matches: Vec<Match>,
}

impl<'a> Locator<'a> {
    /// Ranges from `start` to `max` that intersect `span`.
    ///
    /// Stops at the first miss after a hit, or after three misses in a row
    /// at the start. Returns the hits plus the first and last hit index
    /// (`start`/`max` when there were none).
    fn match_span(&self, span: Span, start: usize, max: usize, include_beginning: bool) -> (Vec<usize>, usize, usize) {
        let mut found = Vec::new();
        for index in start..=max {
            if region_intersects(&span, &self.ranges[index], include_beginning) {
                found.push(index);
            } else if !found.is_empty() || index > start + 1 {
                break;
            }
        }
        let first = found.first().copied().unwrap_or(start);
        let last = found.last().copied().unwrap_or(max);
        (found, first, last)
    }

    fn visit(&mut self, doc_index: usize, doc: &Document, id: NodeId, mut next: usize, max: usize) -> usize {
        let mut found_last = false;
        for position in positions(doc, id) {
            let own = position.node == id;
            let (hits, first, last) = self.match_span(position.span, next, max, own);
            if !hits.is_empty() {
                if last == max {
                    found_last = true;
                }
                if position.is_final {
                    self.matches.push(Match {
                        document: doc_index,
                        node: position.node,
                        ranges: hits,
                        span: position.span,
                        own_span: own,
                    });
                    next = last;
                } else {
                    next = self.visit(doc_index, doc, position.node, first, last);
                }
            } else if found_last {
                break;
            }
        }
        next
    }
}

/// Find the nodes covering `ranges` across `documents`.
///
/// `documents` must be in source order and `ranges` sorted by position.
/// With more than one document, a document only takes part when its root
/// element's extent touches one of the remaining ranges.
pub fn locate(documents: &[&Document], ranges: &[Span]) -> Vec<Match> {
    let mut locator = Locator {
        ranges,
        matches: Vec::new(),
    };
    let Some(last_range) = ranges.len().checked_sub(1) else {
        return Vec::new();
    };

    let mut start = 0;
    for (doc_index, doc) in documents.iter().enumerate() {
        let Some(root) = doc.root_element_id() else {
            continue;
        };
        let mut max = last_range;
        if documents.len() > 1 {
            let Some(extent) = doc.cover_span(root) else {
                continue;
            };
            let (hits, first, last) = locator.match_span(extent, start, max, true);
            if hits.is_empty() {
                continue;
            }
            start = first;
            max = last;
        }
        start = locator.visit(doc_index, doc, root, start, max);
    }

    log::trace!("{} ranges matched {} nodes", ranges.len(), locator.matches.len());
    locator.matches
}

/// The innermost node at `offset`, with the index of its document
pub fn node_at(documents: &[&Document], offset: usize) -> Option<(usize, NodeId)> {
    locate(documents, &[Span::point(offset)])
        .first()
        .map(|m| (m.document, m.node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseConfig;
    use crate::parse::parse_str;

    fn doc(text: &str) -> Document {
        parse_str(text, &ParseConfig::default(), None).unwrap().document
    }

    fn names(doc: &Document, matches: &[Match]) -> Vec<String> {
        matches
            .iter()
            .map(|m| doc.tag_name(m.node).map(|t| t.full).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_range_over_child_tag_finds_child() {
        // <a><b/></a>
        let d = doc("<a><b/></a>");
        let found = locate(&[&d], &[Span::new(3, 7)]);
        assert_eq!(names(&d, &found), vec!["b"]);
        assert!(!found[0].own_span);
    }

    #[test]
    fn test_cursor_between_tags_belongs_to_parent() {
        let d = doc("<hello><world/></hello>");
        assert_eq!(node_at(&[&d], 7).map(|(_, n)| n), d.root_element_id());
    }

    #[test]
    fn test_cursor_inside_text() {
        let d = doc("<a><b>text</b><c/></a>");
        let (_, id) = node_at(&[&d], 8).unwrap();
        assert_eq!(d.tag_name(id).unwrap().full, "b");
    }

    #[test]
    fn test_several_ranges_in_one_pass() {
        let d = doc("<r><a/><b>x</b><c/></r>");
        let found = locate(&[&d], &[Span::new(3, 7), Span::new(15, 19)]);
        assert_eq!(names(&d, &found), vec!["a", "c"]);
        assert_eq!(found[0].ranges, vec![0]);
        assert_eq!(found[1].ranges, vec![1]);
    }

    #[test]
    fn test_open_span_locates_its_own_element() {
        let d = doc("<r>\n  <a x=\"1\">\n    <b>t</b>\n  </a>\n  <c/>\n  <!-- n -->\n</r>");
        for id in d.descendants(crate::dom::DOCUMENT_NODE) {
            let node = d.get_node(id).unwrap();
            let found = locate(&[&d], &[node.open_span]);
            assert_eq!(found.len(), 1, "node {}", id);
            assert_eq!(found[0].node, id);
        }
    }

    #[test]
    fn test_multiple_documents() {
        let config = ParseConfig::default().with_position_offset(10);
        let first = doc("<a><x/></a>");
        let second = parse_str("<b><y/></b>", &config, None).unwrap().document;
        let found = locate(&[&first, &second], &[Span::new(13, 17)]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].document, 1);
        assert_eq!(second.tag_name(found[0].node).unwrap().full, "y");
    }

    #[test]
    fn test_no_ranges() {
        let d = doc("<a/>");
        assert!(locate(&[&d], &[]).is_empty());
    }
}
