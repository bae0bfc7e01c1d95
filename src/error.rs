//! Error types
//!
//! Parse failures carry a source location so callers can place a cursor on
//! the offending markup. Query failures carry a short message. Neither is
//! fatal to the caller; only `Error::Internal` signals a logic bug.

use thiserror::Error;

/// Malformed XML, anchored to a source location.
///
/// `line` and `column` are 1-based and relative to the parsed text; `column`
/// counts characters. `offset` is the absolute byte offset (position offset
/// included).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub message: String,
}

/// XPath compile or evaluation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid query: {0}")]
    Compile(String),
    #[error("query evaluation failed: {0}")]
    Evaluation(String),
}

impl QueryError {
    /// The bare message, for display next to the query input.
    pub fn message(&self) -> &str {
        match self {
            QueryError::Compile(m) | QueryError::Evaluation(m) => m,
        }
    }
}

/// Returned by a [`ParseEventSink`](crate::parse::ParseEventSink).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Input-level problem (e.g. unbound prefix); reported as a `ParseError`.
    #[error("{0}")]
    Malformed(String),
    /// Sink state is inconsistent; aborts the parse as `Error::Internal`.
    #[error("{0}")]
    Invariant(String),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("parse cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("unknown session {0}")]
    UnknownSession(u64),
    #[error("unknown direction \"{0}\"")]
    InvalidDirection(String),
}

pub type Result<T> = std::result::Result<T, Error>;
