//! xml-locator - Location-aware XML parsing and querying for editors
//!
//! Layers:
//! A: Chunked, span-tracking parser (parse, parse_str)
//! B: Arena DOM with source spans on every node (dom)
//! C: Offset-to-node lookup and exact paths (locate)
//! D: XPath 1.0 with namespace remapping (query, xpath)
//! E: Per-session state, parallel refresh, debounced input (session, debounce)
//! F: Tree-free status path from host classifications (host)

pub mod config;
pub mod core;
pub mod debounce;
pub mod dom;
pub mod error;
pub mod host;
pub mod locate;
pub mod parse;
pub mod query;
pub mod session;
pub mod span;
pub mod xpath;

pub use config::{Config, DebounceConfig, NamespaceConfig, ParseConfig, PreviewConfig, QueryConfig};
pub use debounce::Debouncer;
pub use dom::{Direction, Document, NamespaceTable, NodeId, NodeKind, NodeRef, TagName, TagPart, DOCUMENT_NODE};
pub use error::{Error, ParseError, QueryError, Result};
pub use host::{build_path, collapse_whitespace, element_preview, PathCache, PlainText, StatusPath, TextSource};
pub use locate::{exact_path, exact_paths, locate, node_at, Match};
pub use parse::{parse, parse_str, ParsedDocument};
pub use query::{regions_of_nodes, unique_namespace_prefixes, PrefixMap, QueryEngine, QueryResult, RegionKind, Scalar};
pub use session::{DocumentState, RefreshRequest, SessionId, SessionRegistry};
pub use span::Span;
pub use tokio_util::sync::CancellationToken;
pub use xpath::{FunctionRegistry, Variables, XPathValue};
