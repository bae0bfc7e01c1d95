//! XML Tokenizer
//!
//! Push tokenizer fed with pre-split fragments: runs of plain text and the
//! structural delimiters found by the [`Scanner`](super::scanner::Scanner).
//! It knows nothing about offsets; callers attach positions themselves.
//!
//! Well-formedness is checked as tokens complete: tag nesting, a single
//! root element, attribute syntax, entity references, comment and
//! processing-instruction syntax.

use super::attributes::{parse_attributes, Attribute};
use super::entities::{decode_text, normalize_line_endings, validate_xml_content, EntityTable, MAX_ENTITY_EXPANSION};
use super::scanner::{is_name, is_name_char, is_whitespace, Delimiter};

/// Input unit for the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment<'a> {
    Text(&'a str),
    Delimiter(Delimiter),
}

/// Completed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Character data, entities expanded
    Text(String),
    StartTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
    Doctype {
        name: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
}

/// Where a tokenizer error should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSite {
    /// Start of the markup construct being closed
    Markup,
    /// Start of the current text run
    Text,
    /// The fragment just fed
    Fragment,
    /// End of input
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenError {
    pub message: String,
    pub site: ErrorSite,
}

impl TokenError {
    fn new(message: impl Into<String>, site: ErrorSite) -> Self {
        TokenError {
            message: message.into(),
            site,
        }
    }
}

type TokenResult = Result<Option<Token>, TokenError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    /// Just saw `<`
    MarkupStart,
    StartTag { quote: Option<u8> },
    EndTag,
    Comment,
    Pi,
    Doctype { quote: Option<u8>, depth: usize },
    CData,
}

/// Streaming XML tokenizer
#[derive(Debug)]
pub struct Tokenizer {
    state: State,
    /// Markup text after `<` (or CDATA content)
    buffer: String,
    /// Names of open elements
    stack: Vec<String>,
    root_seen: bool,
    root_closed: bool,
    doctype_seen: bool,
    /// Anything other than the XML declaration has been seen
    started: bool,
    entities: EntityTable,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Tokenizer {
            state: State::Text,
            buffer: String::new(),
            stack: Vec::with_capacity(16),
            root_seen: false,
            root_closed: false,
            doctype_seen: false,
            started: false,
            entities: EntityTable::new(),
        }
    }

    /// Whether the tokenizer is between markup constructs
    #[inline]
    pub fn in_text(&self) -> bool {
        self.state == State::Text
    }

    /// Feed one fragment; returns the token it completes, if any
    pub fn feed(&mut self, fragment: Fragment<'_>) -> TokenResult {
        match fragment {
            Fragment::Text(text) => self.feed_text(text),
            Fragment::Delimiter(delimiter) => self.feed_delimiter(delimiter),
        }
    }

    /// Signal end of input
    pub fn finish(&mut self) -> Result<(), TokenError> {
        if self.state != State::Text {
            let what = match self.state {
                State::Comment => "comment",
                State::Pi => "processing instruction",
                State::Doctype { .. } => "DOCTYPE",
                State::CData => "CDATA section",
                _ => "tag",
            };
            return Err(TokenError::new(
                format!("Unexpected end of input inside {}", what),
                ErrorSite::End,
            ));
        }
        if let Some(open) = self.stack.last() {
            return Err(TokenError::new(
                format!("Unexpected end of input: element <{}> is not closed", open),
                ErrorSite::End,
            ));
        }
        if !self.root_seen {
            return Err(TokenError::new("Document is empty: no root element", ErrorSite::End));
        }
        Ok(())
    }

    fn feed_text(&mut self, text: &str) -> TokenResult {
        match self.state {
            State::Text => self.character_data(text),
            State::MarkupStart => {
                self.state = classify_markup(text);
                self.buffer.clear();
                self.feed_text(text)
            }
            State::StartTag { quote } => {
                self.buffer.push_str(text);
                self.state = State::StartTag {
                    quote: track_quotes(quote, text.as_bytes()),
                };
                Ok(None)
            }
            State::Doctype { quote, depth } => {
                self.buffer.push_str(text);
                let (quote, depth) = track_subset(quote, depth, text.as_bytes());
                self.state = State::Doctype { quote, depth };
                Ok(None)
            }
            State::EndTag | State::Comment | State::Pi | State::CData => {
                self.buffer.push_str(text);
                Ok(None)
            }
        }
    }

    fn feed_delimiter(&mut self, delimiter: Delimiter) -> TokenResult {
        match (self.state, delimiter) {
            (State::Text, Delimiter::Open) => {
                self.state = State::MarkupStart;
                self.buffer.clear();
                Ok(None)
            }
            (State::Text, Delimiter::Close) => self.character_data(">"),
            (State::Text, Delimiter::CdataOpen) => {
                if self.stack.is_empty() {
                    return Err(TokenError::new(
                        "CDATA section outside the root element",
                        ErrorSite::Fragment,
                    ));
                }
                self.state = State::CData;
                self.buffer.clear();
                Ok(None)
            }
            (State::Text, Delimiter::CdataClose) => Err(TokenError::new(
                "']]>' is not allowed in character data",
                ErrorSite::Fragment,
            )),

            (State::MarkupStart, Delimiter::Close) => {
                Err(TokenError::new("Empty tag '<>'", ErrorSite::Markup))
            }
            (State::MarkupStart, _) => Err(TokenError::new(
                "Expected a name after '<'",
                ErrorSite::Markup,
            )),

            (State::CData, Delimiter::CdataClose) => {
                self.state = State::Text;
                let content = std::mem::take(&mut self.buffer);
                validate_xml_content(&content).map_err(|m| TokenError::new(m, ErrorSite::Markup))?;
                let content = normalize_line_endings(&content).into_owned();
                self.started = true;
                if content.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Token::Text(content)))
                }
            }
            (State::CData, other) => {
                self.buffer.push_str(other.as_str());
                Ok(None)
            }

            // ']]>' outside CDATA is ']]' followed by '>'
            (_, Delimiter::CdataClose) => {
                self.feed_text("]]")?;
                self.feed_delimiter(Delimiter::Close)
            }

            (State::StartTag { quote }, Delimiter::Close) => {
                if quote.is_some() {
                    self.buffer.push('>');
                    Ok(None)
                } else {
                    self.finish_start_tag().map(Some)
                }
            }
            (State::StartTag { quote }, _) => {
                if quote.is_some() {
                    Err(TokenError::new("Attribute value cannot contain '<'", ErrorSite::Markup))
                } else {
                    Err(TokenError::new("Unexpected '<' inside tag", ErrorSite::Markup))
                }
            }

            (State::EndTag, Delimiter::Close) => self.finish_end_tag().map(Some),
            (State::EndTag, _) => Err(TokenError::new("Unexpected '<' inside end tag", ErrorSite::Markup)),

            (State::Comment, Delimiter::Close) => {
                if self.buffer.len() >= 5 && self.buffer.ends_with("--") {
                    self.finish_comment().map(Some)
                } else {
                    self.buffer.push('>');
                    Ok(None)
                }
            }
            (State::Pi, Delimiter::Close) => {
                if self.buffer.len() >= 2 && self.buffer.ends_with('?') {
                    self.finish_pi()
                } else {
                    self.buffer.push('>');
                    Ok(None)
                }
            }
            (State::Comment | State::Pi, other) => {
                self.buffer.push_str(other.as_str());
                Ok(None)
            }

            (State::Doctype { quote, depth }, Delimiter::Close) => {
                if quote.is_some() || depth > 0 {
                    self.buffer.push('>');
                    Ok(None)
                } else {
                    self.finish_doctype().map(Some)
                }
            }
            (State::Doctype { quote, depth }, other) => {
                if quote.is_none() && depth == 0 {
                    return Err(TokenError::new("Unexpected '<' inside DOCTYPE", ErrorSite::Markup));
                }
                self.buffer.push_str(other.as_str());
                Ok(None)
            }
        }
    }

    fn character_data(&mut self, text: &str) -> TokenResult {
        if self.stack.is_empty() {
            if text.bytes().all(is_whitespace) {
                return Ok(None);
            }
            let message = if self.root_closed {
                "Extra content at the end of the document"
            } else {
                "Text is not allowed before the root element"
            };
            return Err(TokenError::new(message, ErrorSite::Text));
        }
        let text = normalize_line_endings(text);
        let decoded = decode_text(&text, &self.entities).map_err(|m| TokenError::new(m, ErrorSite::Text))?;
        self.started = true;
        Ok(Some(Token::Text(decoded.into_owned())))
    }

    fn finish_start_tag(&mut self) -> Result<Token, TokenError> {
        self.state = State::Text;
        let markup = std::mem::take(&mut self.buffer);
        let bytes = markup.as_bytes();

        let name_len = bytes.iter().take_while(|&&b| is_name_char(b)).count();
        let name = &markup[..name_len];
        if !is_name(name) {
            return Err(TokenError::new("Invalid element name", ErrorSite::Markup));
        }

        let trimmed = markup.trim_end_matches(|c: char| c.is_ascii_whitespace());
        let self_closing = trimmed.len() > name_len && trimmed.ends_with('/');
        let attr_end = if self_closing { trimmed.len() - 1 } else { markup.len() };
        let attributes = parse_attributes(&markup[name_len..attr_end], &self.entities)
            .map_err(|m| TokenError::new(m, ErrorSite::Markup))?;

        if self.root_closed {
            return Err(TokenError::new(
                "Extra content at the end of the document: second root element",
                ErrorSite::Markup,
            ));
        }
        self.root_seen = true;
        self.started = true;
        if self_closing {
            if self.stack.is_empty() {
                self.root_closed = true;
            }
        } else {
            self.stack.push(name.to_string());
        }

        Ok(Token::StartTag {
            name: name.to_string(),
            attributes,
            self_closing,
        })
    }

    fn finish_end_tag(&mut self) -> Result<Token, TokenError> {
        self.state = State::Text;
        let markup = std::mem::take(&mut self.buffer);
        let name = markup[1..].trim_end_matches(|c: char| c.is_ascii_whitespace());
        if !is_name(name) {
            return Err(TokenError::new("Invalid end tag name", ErrorSite::Markup));
        }
        match self.stack.last() {
            Some(open) if open == name => {}
            Some(open) => {
                return Err(TokenError::new(
                    format!("Opening and ending tag mismatch: {} and {}", open, name),
                    ErrorSite::Markup,
                ))
            }
            None => {
                return Err(TokenError::new(
                    format!("Unexpected end tag </{}>", name),
                    ErrorSite::Markup,
                ))
            }
        }
        self.stack.pop();
        if self.stack.is_empty() {
            self.root_closed = true;
        }
        Ok(Token::EndTag { name: name.to_string() })
    }

    fn finish_comment(&mut self) -> Result<Token, TokenError> {
        self.state = State::Text;
        let markup = std::mem::take(&mut self.buffer);
        let content = &markup[3..markup.len() - 2];
        if content.contains("--") || content.ends_with('-') {
            return Err(TokenError::new("'--' is not allowed inside a comment", ErrorSite::Markup));
        }
        validate_xml_content(content).map_err(|m| TokenError::new(m, ErrorSite::Markup))?;
        self.started = true;
        Ok(Token::Comment(content.to_string()))
    }

    fn finish_pi(&mut self) -> TokenResult {
        self.state = State::Text;
        let markup = std::mem::take(&mut self.buffer);
        let body = &markup[1..markup.len() - 1];
        let target_len = body.bytes().take_while(|&b| !is_whitespace(b)).count();
        let target = &body[..target_len];
        let data = body[target_len..].trim_start_matches(|c: char| c.is_ascii_whitespace());

        if !is_name(target) {
            return Err(TokenError::new("Invalid processing instruction target", ErrorSite::Markup));
        }
        if target.eq_ignore_ascii_case("xml") {
            if self.started || target != "xml" {
                return Err(TokenError::new(
                    "XML declaration allowed only at the start of the document",
                    ErrorSite::Markup,
                ));
            }
            self.started = true;
            return Ok(None);
        }
        self.started = true;
        Ok(Some(Token::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        }))
    }

    fn finish_doctype(&mut self) -> Result<Token, TokenError> {
        self.state = State::Text;
        let markup = std::mem::take(&mut self.buffer);
        if self.root_seen {
            return Err(TokenError::new("DOCTYPE is not allowed after the root element", ErrorSite::Markup));
        }
        if self.doctype_seen {
            return Err(TokenError::new("Duplicate DOCTYPE declaration", ErrorSite::Markup));
        }
        self.doctype_seen = true;
        self.started = true;

        let decl = parse_doctype(&markup["!DOCTYPE".len()..], &mut self.entities)
            .map_err(|m| TokenError::new(m, ErrorSite::Markup))?;
        Ok(Token::Doctype {
            name: decl.name,
            public_id: decl.public_id,
            system_id: decl.system_id,
        })
    }
}

/// Decide what kind of markup follows `<` from the first text after it
fn classify_markup(text: &str) -> State {
    if text.starts_with("!--") {
        State::Comment
    } else if text.starts_with('?') {
        State::Pi
    } else if text.starts_with("!DOCTYPE") {
        State::Doctype { quote: None, depth: 0 }
    } else if text.starts_with('/') {
        State::EndTag
    } else {
        // invalid names (including '!') are rejected when the tag closes
        State::StartTag { quote: None }
    }
}

/// Update the open-quote state across a run of tag text
fn track_quotes(mut quote: Option<u8>, text: &[u8]) -> Option<u8> {
    for &b in text {
        match quote {
            Some(q) if b == q => quote = None,
            None if b == b'"' || b == b'\'' => quote = Some(b),
            _ => {}
        }
    }
    quote
}

/// Quote and internal-subset bracket tracking for DOCTYPE text
fn track_subset(mut quote: Option<u8>, mut depth: usize, text: &[u8]) -> (Option<u8>, usize) {
    for &b in text {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                _ => {}
            },
        }
    }
    (quote, depth)
}

struct DoctypeDecl {
    name: String,
    public_id: Option<String>,
    system_id: Option<String>,
}

/// Small cursor over declaration text
struct DeclCursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> DeclCursor<'a> {
    fn new(input: &'a str) -> Self {
        DeclCursor { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && is_whitespace(bytes[self.pos]) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn read_name(&mut self) -> Option<&'a str> {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && is_name_char(bytes[self.pos]) {
            self.pos += 1;
        }
        let name = &self.input[start..self.pos];
        if is_name(name) {
            Some(name)
        } else {
            None
        }
    }

    fn read_quoted(&mut self) -> Option<&'a str> {
        let quote = *self.input.as_bytes().get(self.pos)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        let len = memchr::memchr(quote, &self.input.as_bytes()[self.pos + 1..])?;
        let value = &self.input[self.pos + 1..self.pos + 1 + len];
        self.pos += len + 2;
        Some(value)
    }

    /// Skip to just past the next '>' outside quotes
    fn skip_declaration(&mut self) {
        let mut quote = None;
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() {
            let b = bytes[self.pos];
            self.pos += 1;
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None if b == b'>' => return,
                None => {}
            }
        }
    }
}

fn parse_doctype(input: &str, entities: &mut EntityTable) -> Result<DoctypeDecl, String> {
    let mut cursor = DeclCursor::new(input);
    if !cursor.skip_whitespace() {
        return Err("Whitespace required after DOCTYPE".to_string());
    }
    let name = cursor.read_name().ok_or("DOCTYPE name expected")?.to_string();
    cursor.skip_whitespace();

    let mut public_id = None;
    let mut system_id = None;
    if cursor.eat("PUBLIC") {
        cursor.skip_whitespace();
        public_id = Some(cursor.read_quoted().ok_or("Public identifier expected")?.to_string());
        cursor.skip_whitespace();
        system_id = Some(cursor.read_quoted().ok_or("System identifier expected")?.to_string());
    } else if cursor.eat("SYSTEM") {
        cursor.skip_whitespace();
        system_id = Some(cursor.read_quoted().ok_or("System identifier expected")?.to_string());
    }
    cursor.skip_whitespace();

    if cursor.eat("[") {
        let subset_start = cursor.pos;
        let subset_len = find_subset_end(cursor.rest()).ok_or("Unterminated internal subset")?;
        parse_internal_subset(&input[subset_start..subset_start + subset_len], entities)?;
        cursor.pos = subset_start + subset_len + 1;
        cursor.skip_whitespace();
    }

    if !cursor.is_eof() {
        return Err("Malformed DOCTYPE declaration".to_string());
    }
    Ok(DoctypeDecl {
        name,
        public_id,
        system_id,
    })
}

/// Position of the `]` closing the internal subset
fn find_subset_end(subset: &str) -> Option<usize> {
    let mut quote = None;
    for (i, b) in subset.bytes().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b']' => return Some(i),
            None => {}
        }
    }
    None
}

/// Collect internal general entity declarations; everything else in the
/// subset is skipped without validation.
fn parse_internal_subset(subset: &str, entities: &mut EntityTable) -> Result<(), String> {
    let mut cursor = DeclCursor::new(subset);
    loop {
        cursor.skip_whitespace();
        if cursor.is_eof() {
            return Ok(());
        }
        if cursor.eat("<!--") {
            match cursor.rest().find("-->") {
                Some(end) => cursor.pos += end + 3,
                None => return Err("Unterminated comment in internal subset".to_string()),
            }
        } else if cursor.eat("<!ENTITY") {
            let decl_start = cursor.pos;
            cursor.skip_whitespace();
            if cursor.eat("%") {
                // parameter entity
                cursor.pos = decl_start;
                cursor.skip_declaration();
                continue;
            }
            let name = cursor.read_name().ok_or("Entity name expected")?.to_string();
            cursor.skip_whitespace();
            if let Some(raw) = cursor.read_quoted() {
                validate_xml_content(raw)?;
                if raw.len() > MAX_ENTITY_EXPANSION {
                    return Err(format!("Entity '{}' exceeds the size limit", name));
                }
                // references inside are expanded where the entity is used;
                // the first declaration is binding
                let value = normalize_line_endings(raw).into_owned();
                entities.entry(name).or_insert(value);
            }
            cursor.skip_declaration();
        } else if cursor.rest().starts_with('<') {
            cursor.skip_declaration();
        } else if cursor.eat("%") {
            match cursor.rest().find(';') {
                Some(end) => cursor.pos += end + 1,
                None => return Err("Unterminated parameter entity reference".to_string()),
            }
        } else {
            return Err("Malformed internal subset".to_string());
        }
    }
}
