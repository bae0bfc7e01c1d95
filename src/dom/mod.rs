//! DOM Module - Arena-based XML tree with source spans
//!
//! - Arena allocation for nodes, NodeId (u32) indices
//! - Open/close tag spans on every node
//! - Text held as `text`/`tail` on neighbouring nodes
//! - Namespace resolution stack and per-document namespace table

pub mod builder;
pub mod document;
pub mod namespace;
pub mod node;

pub use builder::TreeBuilder;
pub use document::{Direction, Document, TagName, TagPart, DOCUMENT_NODE};
pub use namespace::{NamespaceResolver, NamespaceTable};
pub use node::{NodeId, NodeKind, NodeRef, QName, XmlAttribute, XmlNode};
