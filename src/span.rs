//! Source spans
//!
//! A `Span` is a pair of absolute byte offsets into the host text. The
//! intersection rules mirror an editor's region semantics: two spans
//! intersect when they are equal or when an endpoint of one lies strictly
//! inside the other, so abutting spans do not intersect.

use std::fmt;

/// Half-open byte range `start..end`, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span; reversed endpoints are swapped.
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Span { start, end }
        } else {
            Span { start: end, end: start }
        }
    }

    /// Zero-width span at `offset` (a cursor with no selection).
    #[inline]
    pub fn point(offset: usize) -> Self {
        Span { start: offset, end: offset }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Inclusive at both ends.
    #[inline]
    pub fn contains_point(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersects(&self, other: &Span) -> bool {
        let (lb, le) = (self.start, self.end);
        let (rb, re) = (other.start, other.end);
        (lb == rb && le == re)
            || (rb > lb && rb < le)
            || (re > lb && re < le)
            || (lb > rb && lb < re)
            || (le > rb && le < re)
    }

    /// Smallest span covering both.
    pub fn cover(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<(usize, usize)> for Span {
    fn from((start, end): (usize, usize)) -> Self {
        Span::new(start, end)
    }
}

/// Whether `inner` falls in `outer`.
///
/// An empty `inner` touching `outer` counts only when `include_beginning`
/// is set; the locator sets it for a node's own gaps so that a cursor at
/// `<a>|<b/></a>` resolves to `a` rather than the boundary of `b`.
#[inline]
pub fn region_intersects(outer: &Span, inner: &Span, include_beginning: bool) -> bool {
    outer.intersects(inner) || (include_beginning && inner.is_empty() && outer.contains_point(inner.start))
}

/// A resolved position: absolute byte offset plus 1-based line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Running line/column counter fed with consecutive slices of text.
///
/// Only `\n` starts a new line; columns count characters.
#[derive(Debug, Clone)]
pub struct LineCounter {
    offset: usize,
    line: usize,
    column: usize,
}

impl LineCounter {
    pub fn new(offset: usize) -> Self {
        LineCounter {
            offset,
            line: 1,
            column: 1,
        }
    }

    pub fn advance(&mut self, text: &str) {
        self.offset += text.len();
        match memchr::memrchr(b'\n', text.as_bytes()) {
            Some(last_newline) => {
                self.line += memchr::memchr_iter(b'\n', text.as_bytes()).count();
                self.column = 1 + text[last_newline + 1..].chars().count();
            }
            None => self.column += text.chars().count(),
        }
    }

    #[inline]
    pub fn position(&self) -> TextPosition {
        TextPosition {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abutting_spans_do_not_intersect() {
        let a = Span::new(0, 3);
        let b = Span::new(3, 7);
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));
        assert!(a.intersects(&Span::new(2, 5)));
        assert!(a.intersects(&Span::new(0, 3)));
    }

    #[test]
    fn empty_spans_need_include_beginning() {
        let node = Span::new(3, 7);
        let cursor = Span::point(3);
        assert!(!node.intersects(&cursor));
        assert!(!region_intersects(&node, &cursor, false));
        assert!(region_intersects(&node, &cursor, true));
        assert!(region_intersects(&node, &Span::point(7), true));
        assert!(!region_intersects(&node, &Span::point(8), true));
    }

    #[test]
    fn cursor_strictly_inside_intersects() {
        assert!(Span::new(3, 7).intersects(&Span::point(5)));
    }

    #[test]
    fn new_swaps_reversed_endpoints() {
        assert_eq!(Span::new(5, 2), Span { start: 2, end: 5 });
        assert_eq!(Span::new(1, 2).cover(&Span::new(4, 9)), Span::new(1, 9));
    }

    #[test]
    fn line_counter_counts_characters() {
        let mut counter = LineCounter::new(10);
        counter.advance("<a>é");
        assert_eq!(counter.position(), TextPosition { offset: 15, line: 1, column: 5 });
        counter.advance("\n\n  <b");
        let pos = counter.position();
        assert_eq!((pos.line, pos.column), (3, 5));
    }
}
