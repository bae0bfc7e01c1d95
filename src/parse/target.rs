//! Location-aware parser
//!
//! Drives the tokenizer with pieces from the [`SpanTracker`] and forwards
//! every completed construct to a [`ParseEventSink`] together with its
//! source span. The tokenizer never sees offsets: the parser remembers
//! where the current markup and text runs began and attaches those.

use super::tracker::{PieceKind, SpanTracker};
use crate::core::attributes::Attribute;
use crate::core::scanner::Delimiter;
use crate::core::tokenizer::{ErrorSite, Fragment, Token, TokenError, Tokenizer};
use crate::error::{Error, ParseError, Result, SinkError};
use crate::span::{LineCounter, Span, TextPosition};

/// Receiver of located parse events.
///
/// A self-closing element is reported as `element_start` followed by
/// `element_end` with the same span. Returning [`SinkError::Malformed`]
/// fails the parse with a [`ParseError`] at the construct being reported.
pub trait ParseEventSink {
    type Output;

    fn element_start(&mut self, name: &str, attributes: Vec<Attribute>, span: Span) -> std::result::Result<(), SinkError>;

    fn element_end(&mut self, name: &str, span: Span) -> std::result::Result<(), SinkError>;

    /// Character data, entities expanded; may arrive in several pieces
    fn text(&mut self, text: &str) -> std::result::Result<(), SinkError>;

    fn comment(&mut self, content: &str, span: Span) -> std::result::Result<(), SinkError>;

    fn processing_instruction(&mut self, target: &str, data: &str, span: Span) -> std::result::Result<(), SinkError>;

    fn doctype(
        &mut self,
        _name: &str,
        _public_id: Option<&str>,
        _system_id: Option<&str>,
        _span: Span,
    ) -> std::result::Result<(), SinkError> {
        Ok(())
    }

    /// Called once input is exhausted; resets the sink for reuse
    fn document_end(&mut self) -> std::result::Result<Self::Output, SinkError>;
}

struct Target<S> {
    tokenizer: Tokenizer,
    sink: S,
    lines: LineCounter,
    /// Where the markup construct in progress began
    markup_start: TextPosition,
    /// Where the current text run began
    text_start: TextPosition,
}

impl<S: ParseEventSink> Target<S> {
    fn new(sink: S, position_offset: usize) -> Self {
        let lines = LineCounter::new(position_offset);
        let start = lines.position();
        Target {
            tokenizer: Tokenizer::new(),
            sink,
            lines,
            markup_start: start,
            text_start: start,
        }
    }

    fn reset(&mut self, position_offset: usize) {
        self.tokenizer = Tokenizer::new();
        self.lines = LineCounter::new(position_offset);
        self.markup_start = self.lines.position();
        self.text_start = self.markup_start;
    }

    fn handle(&mut self, kind: PieceKind, span: Span, text: &str) -> Result<()> {
        let at = self.lines.position();
        let fragment = match kind {
            PieceKind::Gap => {
                if self.tokenizer.in_text() {
                    self.text_start = at;
                }
                Fragment::Text(text)
            }
            PieceKind::Delimiter(delimiter) => {
                if self.tokenizer.in_text() && matches!(delimiter, Delimiter::Open | Delimiter::CdataOpen) {
                    self.markup_start = at;
                }
                Fragment::Delimiter(delimiter)
            }
        };
        self.lines.advance(text);

        match self.tokenizer.feed(fragment) {
            Ok(Some(token)) => self.dispatch(token, span.end),
            Ok(None) => Ok(()),
            Err(err) => Err(self.token_error(err, at)),
        }
    }

    fn dispatch(&mut self, token: Token, end: usize) -> Result<()> {
        let span = Span::new(self.markup_start.offset, end);
        let result = match &token {
            Token::Text(text) => self.sink.text(text),
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                let started = self.sink.element_start(name, attributes.clone(), span);
                if started.is_ok() && *self_closing {
                    self.sink.element_end(name, span)
                } else {
                    started
                }
            }
            Token::EndTag { name } => self.sink.element_end(name, span),
            Token::Comment(content) => self.sink.comment(content, span),
            Token::ProcessingInstruction { target, data } => self.sink.processing_instruction(target, data, span),
            Token::Doctype {
                name,
                public_id,
                system_id,
            } => self
                .sink
                .doctype(name, public_id.as_deref(), system_id.as_deref(), span),
        };
        let anchor = if matches!(token, Token::Text(_)) {
            self.text_start
        } else {
            self.markup_start
        };
        result.map_err(|err| sink_error(err, anchor))
    }

    fn token_error(&self, err: TokenError, fragment_start: TextPosition) -> Error {
        let at = match err.site {
            ErrorSite::Markup => self.markup_start,
            ErrorSite::Text => self.text_start,
            ErrorSite::Fragment => fragment_start,
            ErrorSite::End => self.lines.position(),
        };
        located(err.message, at)
    }

    fn finish(&mut self) -> Result<S::Output> {
        if let Err(err) = self.tokenizer.finish() {
            return Err(self.token_error(err, self.lines.position()));
        }
        let end = self.lines.position();
        self.sink.document_end().map_err(|err| sink_error(err, end))
    }
}

fn located(message: String, at: TextPosition) -> Error {
    Error::Parse(ParseError {
        line: at.line,
        column: at.column,
        offset: at.offset,
        message,
    })
}

fn sink_error(err: SinkError, at: TextPosition) -> Error {
    match err {
        SinkError::Malformed(message) => located(message, at),
        SinkError::Invariant(message) => Error::Internal(message),
    }
}

/// Incremental XML parser reporting source spans.
///
/// Feed chunks of any size, split anywhere on character boundaries, then
/// call [`close`](Self::close) for the sink's output. After `close` the
/// parser starts over at the configured position offset.
pub struct LocationAwareParser<S: ParseEventSink> {
    position_offset: usize,
    tracker: SpanTracker,
    target: Target<S>,
}

impl<S: ParseEventSink> LocationAwareParser<S> {
    pub fn new(sink: S, position_offset: usize) -> Self {
        LocationAwareParser {
            position_offset,
            tracker: SpanTracker::new(position_offset),
            target: Target::new(sink, position_offset),
        }
    }

    pub fn feed(&mut self, chunk: &str) -> Result<()> {
        for piece in self.tracker.feed(chunk) {
            self.target.handle(piece.kind, piece.span, piece.text)?;
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<S::Output> {
        let mut result = Ok(());
        for piece in self.tracker.close() {
            result = self.target.handle(piece.kind, piece.span, piece.text);
            if result.is_err() {
                break;
            }
        }
        let output = result.and_then(|()| self.target.finish());
        self.target.reset(self.position_offset);
        if let Err(err) = &output {
            log::debug!("parse failed: {}", err);
        }
        output
    }
}
