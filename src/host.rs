//! Host text surface
//!
//! The editor owns the text. It hands out substrings, pre-classified
//! regions (tag names, quoted attribute values) and a change counter that
//! moves on every edit. [`build_path`] turns those regions into a quick
//! element path for the cursor without building a tree.

use std::borrow::Cow;
use std::collections::HashMap;

use memchr::{memchr, memmem};

use crate::dom::{Document, NodeId};
use crate::span::Span;

/// Classification of tag-name tokens
pub const TAG_NAME_SELECTOR: &str = "entity.name.tag";
/// Classification of quoted attribute values, quotes included
pub const ATTRIBUTE_VALUE_SELECTOR: &str = "string.quoted";

/// What the core needs from the editor
pub trait TextSource {
    /// Text of `span`; spans past the end are clipped
    fn substring(&self, span: Span) -> Cow<'_, str>;

    /// Regions classified under `selector` (prefix match), in text order
    fn classified_regions(&self, selector: &str) -> Vec<Span>;

    /// Moves forward on every edit
    fn change_counter(&self) -> u64;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole tag around the tag name at `name`: from the `<` before it to
    /// just past the next `>` that is not inside quotes
    fn tag_extent(&self, name: Span) -> Span {
        let start = name.start.saturating_sub(1);
        let rest = self.substring(Span::new(name.end, self.len()));
        let mut quote = None;
        for (i, b) in rest.bytes().enumerate() {
            match (quote, b) {
                (Some(q), _) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'>') => return Span::new(start, name.end + i + 1),
                (None, _) => {}
            }
        }
        Span::new(start, self.len())
    }
}

/// A string that classifies its own tag names and attribute values
#[derive(Debug, Clone, Default)]
pub struct PlainText {
    text: String,
    change_counter: u64,
    tag_names: Vec<Span>,
    attribute_values: Vec<Span>,
}

impl PlainText {
    pub fn new(text: impl Into<String>) -> Self {
        let mut plain = PlainText {
            text: text.into(),
            ..Default::default()
        };
        plain.classify();
        plain
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace `span` with `replacement`
    pub fn edit(&mut self, span: Span, replacement: &str) {
        let start = floor_char_boundary(&self.text, span.start);
        let end = floor_char_boundary(&self.text, span.end);
        self.text.replace_range(start..end, replacement);
        self.change_counter += 1;
        self.classify();
    }

    fn classify(&mut self) {
        let (tag_names, attribute_values) = scan_markup(self.text.as_bytes());
        log::trace!(
            "classified {} tag names and {} attribute values",
            tag_names.len(),
            attribute_values.len()
        );
        self.tag_names = tag_names;
        self.attribute_values = attribute_values;
    }
}

impl TextSource for PlainText {
    fn substring(&self, span: Span) -> Cow<'_, str> {
        let start = floor_char_boundary(&self.text, span.start);
        let end = floor_char_boundary(&self.text, span.end);
        Cow::Borrowed(&self.text[start..end])
    }

    fn classified_regions(&self, selector: &str) -> Vec<Span> {
        if selector.starts_with(TAG_NAME_SELECTOR) {
            self.tag_names.clone()
        } else if selector.starts_with(ATTRIBUTE_VALUE_SELECTOR) {
            self.attribute_values.clone()
        } else {
            Vec::new()
        }
    }

    fn change_counter(&self) -> u64 {
        self.change_counter
    }

    fn len(&self) -> usize {
        self.text.len()
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn is_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'/' | b'>' | b'<')
}

/// End of the first `needle` at or after `from`, or the end of input
fn skip_past(bytes: &[u8], from: usize, needle: &[u8]) -> usize {
    match memmem::find(&bytes[from.min(bytes.len())..], needle) {
        Some(i) => from + i + needle.len(),
        None => bytes.len(),
    }
}

/// Tag-name spans and quoted attribute value spans of `bytes`. Comments,
/// CDATA sections, processing instructions and the DOCTYPE are skipped.
fn scan_markup(bytes: &[u8]) -> (Vec<Span>, Vec<Span>) {
    let mut names = Vec::new();
    let mut values = Vec::new();
    let mut pos = 0;

    while let Some(i) = memchr(b'<', &bytes[pos..]) {
        let lt = pos + i;
        let rest = &bytes[lt..];
        if rest.starts_with(b"<!--") {
            pos = skip_past(bytes, lt + 4, b"-->");
            continue;
        }
        if rest.starts_with(b"<![CDATA[") {
            pos = skip_past(bytes, lt + 9, b"]]>");
            continue;
        }
        if rest.starts_with(b"<?") {
            pos = skip_past(bytes, lt + 2, b"?>");
            continue;
        }
        if rest.starts_with(b"<!") {
            // an internal subset may hold `>` of its own
            let close = memchr(b'>', &rest[2..]).map(|j| lt + 2 + j);
            let open = memchr(b'[', &rest[2..]).map(|j| lt + 2 + j);
            pos = match (open, close) {
                (Some(o), Some(c)) if o < c => skip_past(bytes, skip_past(bytes, o, b"]"), b">"),
                (_, Some(c)) => c + 1,
                (_, None) => bytes.len(),
            };
            continue;
        }

        let closing = rest.get(1) == Some(&b'/');
        let name_start = lt + if closing { 2 } else { 1 };
        let mut name_end = name_start;
        while name_end < bytes.len() && !is_name_end(bytes[name_end]) {
            name_end += 1;
        }
        if name_end == name_start {
            pos = lt + 1;
            continue;
        }
        names.push(Span::new(name_start, name_end));

        pos = name_end;
        while pos < bytes.len() {
            match bytes[pos] {
                b'>' => {
                    pos += 1;
                    break;
                }
                b'<' => break,
                q @ (b'"' | b'\'') if !closing => {
                    let end = memchr(q, &bytes[pos + 1..]).map_or(bytes.len(), |j| pos + 1 + j + 1);
                    values.push(Span::new(pos, end));
                    pos = end;
                }
                _ => pos += 1,
            }
        }
    }

    (names, values)
}

/// Element path at a selection, and the range it stays valid in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPath {
    /// `name[n]` steps from the root down
    pub segments: Vec<String>,
    /// Selections inside this span yield the same path; `None` when the
    /// path must be recomputed for any other selection
    pub valid: Option<Span>,
}

impl StatusPath {
    pub fn to_xpath(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            path.push_str(segment);
        }
        path
    }
}

fn char_before<S: TextSource + ?Sized>(source: &S, offset: usize) -> Option<char> {
    let offset = offset.checked_sub(1)?;
    source.substring(Span::new(offset, offset + 1)).chars().next()
}

/// Approximate element path of `selection` from tag-name regions alone.
///
/// Tag names are walked in order up to the end of the selection: an open
/// tag pushes `name[n]` (counting same-named siblings), a close tag the
/// selection has passed pops. Self-closing tags pop once passed. `None`
/// when the text has no tag names.
pub fn build_path<S: TextSource + ?Sized>(source: &S, selection: Span) -> Option<StatusPath> {
    let regions = source.classified_regions(TAG_NAME_SELECTOR);

    let mut segments: Vec<String> = Vec::new();
    let mut counters: Vec<HashMap<String, usize>> = vec![HashMap::new()];
    let mut self_closing = false;
    let mut inside = false;
    let mut open_start = 0;
    let mut close_pos = 0;
    let mut tag = Span::default();
    let mut last_kind = None;
    let mut processed: Option<Span> = None;
    let mut looked_at: Option<Span> = None;

    for &region in &regions {
        looked_at = Some(region);
        if region.start > selection.end {
            break;
        }
        let before = char_before(source, region.start);

        if self_closing {
            segments.pop();
            counters.pop();
        }
        match before {
            Some('<') => {
                tag = source.tag_extent(region);
                self_closing = source.substring(tag).ends_with("/>");

                let name = source.substring(region).into_owned();
                if counters.is_empty() {
                    counters.push(HashMap::new());
                }
                let level = counters.last_mut().map_or(1, |c| {
                    let n = c.entry(name.clone()).or_insert(0);
                    *n += 1;
                    *n
                });
                segments.push(format!("{}[{}]", name, level));
                counters.push(HashMap::new());

                inside = true;
                open_start = region.start;
                close_pos = tag.end;
            }
            Some('/') => {
                if selection.end > region.end {
                    segments.pop();
                    counters.pop();
                    inside = false;
                    close_pos = region.end;
                }
                self_closing = false;
            }
            _ => {}
        }
        last_kind = before;
        processed = Some(region);
    }

    let processed = processed?;
    let region = looked_at.unwrap_or(processed);

    if self_closing && tag.end <= selection.start {
        segments.pop();
        inside = false;
    }

    let after_slash = char_before(source, region.start) == Some('/');
    let (start, end) = if inside {
        let end = if last_kind == Some('/') {
            processed.end
        } else if self_closing {
            tag.end.saturating_sub(1)
        } else if after_slash {
            region.end
        } else {
            region.start.saturating_sub(1)
        };
        (open_start, end)
    } else {
        let start = if self_closing { tag.end } else { close_pos + 1 };
        let end = if after_slash {
            region.end
        } else if start > processed.end {
            region.start.saturating_sub(1)
        } else {
            processed.end
        };
        (start, end)
    };

    Some(StatusPath {
        segments,
        valid: (start <= end).then(|| Span::new(start, end)),
    })
}

/// Last [`build_path`] answer, reused while the text is unchanged and the
/// selection stays in its valid span
#[derive(Debug, Clone, Default)]
pub struct PathCache {
    change_counter: Option<u64>,
    current: Option<StatusPath>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path<S: TextSource + ?Sized>(&mut self, source: &S, selection: Span) -> Option<&StatusPath> {
        let counter = source.change_counter();
        let reusable = self.change_counter.is_some_and(|c| counter <= c)
            && self
                .current
                .as_ref()
                .and_then(|p| p.valid)
                .is_some_and(|valid| valid.contains(&selection));
        if !reusable {
            log::trace!("status path recomputed at {}..{}", selection.start, selection.end);
            self.change_counter = Some(counter);
            self.current = build_path(source, selection);
        }
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.change_counter = None;
        self.current = None;
    }
}

/// Trim `text`, fold newlines, tabs and runs of spaces into single spaces,
/// and cut it to `max_len` characters with a `...` suffix when longer.
/// `None` means no limit.
pub fn collapse_whitespace(text: &str, max_len: Option<usize>) -> String {
    let trimmed = text.trim();
    let taken: String = match max_len {
        Some(max) => trimmed.chars().take(max.saturating_add(1)).collect(),
        None => trimmed.to_string(),
    };

    let mut out = String::with_capacity(taken.len());
    for c in taken.chars() {
        let c = if c == '\n' || c == '\t' { ' ' } else { c };
        if c == ' ' && out.ends_with(' ') {
            continue;
        }
        out.push(c);
    }

    match max_len {
        Some(max) if out.chars().count() > max => {
            let mut cut: String = out.chars().take(max.saturating_sub(3)).collect();
            cut.push_str("...");
            cut
        }
        _ => out,
    }
}

/// Collapsed source of element `id`, open tag through close tag
pub fn element_preview<S: TextSource + ?Sized>(
    source: &S,
    doc: &Document,
    id: NodeId,
    max_len: Option<usize>,
) -> Option<String> {
    let span = doc.cover_span(id)?;
    Some(collapse_whitespace(&source.substring(span), max_len))
}
