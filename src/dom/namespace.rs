//! Namespace Resolution
//!
//! Stack-based namespace resolver for XML namespace handling, plus the
//! document-ordered table of every prefix/URI pair a document declares.

use indexmap::IndexMap;

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Namespace binding (prefix -> URI)
#[derive(Debug, Clone)]
struct NsBinding {
    /// `None` for the default namespace
    prefix: Option<String>,
    /// Empty for an `xmlns=""` undeclaration
    uri: String,
    depth: usize,
}

/// Stack-based namespace resolver
#[derive(Debug)]
pub struct NamespaceResolver {
    /// Stack of namespace bindings
    bindings: Vec<NsBinding>,
    /// Current element depth
    depth: usize,
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceResolver {
    /// Create a new namespace resolver with the pre-declared xml prefix
    pub fn new() -> Self {
        let mut bindings = Vec::with_capacity(16);
        bindings.push(NsBinding {
            prefix: Some("xml".to_string()),
            uri: ns::XML.to_string(),
            depth: 0,
        });
        NamespaceResolver { bindings, depth: 0 }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a namespace binding for the current scope
    pub fn declare(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), String> {
        match prefix {
            Some("xml") if uri != ns::XML => {
                return Err("The xml prefix cannot be rebound".to_string());
            }
            Some("xml") => return Ok(()),
            Some("xmlns") => return Err("The xmlns prefix cannot be declared".to_string()),
            Some(p) if uri.is_empty() => {
                return Err(format!("Namespace prefix {} cannot be bound to an empty URI", p));
            }
            _ => {}
        }
        if uri == ns::XMLNS || (uri == ns::XML && prefix != Some("xml")) {
            return Err(format!("Namespace {} is reserved", uri));
        }

        self.bindings.push(NsBinding {
            prefix: prefix.map(str::to_string),
            uri: uri.to_string(),
            depth: self.depth,
        });
        Ok(())
    }

    /// Resolve a prefix (`None` = default namespace) to a namespace URI
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        // Search from most recent to oldest
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix.as_deref() == prefix)
            .map(|b| b.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }
}

/// Every prefix seen in a document and the URIs bound to it, both in
/// first-declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceTable {
    entries: IndexMap<Option<String>, Vec<String>>,
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration; repeated pairs are ignored
    pub fn record(&mut self, prefix: Option<&str>, uri: &str) {
        let uris = self.entries.entry(prefix.map(str::to_string)).or_default();
        if !uris.iter().any(|u| u == uri) {
            uris.push(uri.to_string());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &[String])> {
        self.entries.iter().map(|(p, uris)| (p.as_deref(), uris.as_slice()))
    }

    pub fn uris(&self, prefix: Option<&str>) -> Option<&[String]> {
        self.entries
            .get(&prefix.map(str::to_string))
            .map(Vec::as_slice)
    }

    /// Prefixes actually written in the document (the default namespace excluded)
    pub fn real_prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().filter_map(|p| p.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespaces() {
        let resolver = NamespaceResolver::new();
        assert_eq!(resolver.resolve(Some("xml")), Some(ns::XML));
        assert_eq!(resolver.resolve(None), None);
    }

    #[test]
    fn test_declare_and_resolve() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare(Some("svg"), "http://www.w3.org/2000/svg").unwrap();
        assert_eq!(resolver.resolve(Some("svg")), Some("http://www.w3.org/2000/svg"));
    }

    #[test]
    fn test_scope_pop() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare(Some("foo"), "http://example.com/foo").unwrap();
        assert_eq!(resolver.resolve(Some("foo")), Some("http://example.com/foo"));

        resolver.pop_scope();
        assert_eq!(resolver.resolve(Some("foo")), None);
    }

    #[test]
    fn test_scopes_deeper_than_u16() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare(Some("outer"), "urn:outer").unwrap();
        for _ in 0..70_000 {
            resolver.push_scope();
        }
        resolver.declare(Some("inner"), "urn:inner").unwrap();
        resolver.pop_scope();
        assert_eq!(resolver.resolve(Some("inner")), None);
        assert_eq!(resolver.resolve(Some("outer")), Some("urn:outer"));
        for _ in 0..70_000 {
            resolver.pop_scope();
        }
        assert_eq!(resolver.resolve(Some("outer")), None);
    }

    #[test]
    fn test_shadow_binding_and_undeclare_default() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        resolver.declare(None, "urn:one").unwrap();

        resolver.push_scope();
        resolver.declare(None, "").unwrap();
        assert_eq!(resolver.resolve(None), None);

        resolver.pop_scope();
        assert_eq!(resolver.resolve(None), Some("urn:one"));
    }

    #[test]
    fn test_reserved_prefixes() {
        let mut resolver = NamespaceResolver::new();
        resolver.push_scope();
        assert!(resolver.declare(Some("xmlns"), "urn:x").is_err());
        assert!(resolver.declare(Some("xml"), "urn:x").is_err());
        assert!(resolver.declare(Some("p"), "").is_err());
    }

    #[test]
    fn test_table_keeps_document_order() {
        let mut table = NamespaceTable::new();
        table.record(Some("b"), "urn:b");
        table.record(None, "urn:d");
        table.record(Some("b"), "urn:b2");
        table.record(Some("b"), "urn:b");
        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries[0].0, Some("b"));
        assert_eq!(entries[0].1, ["urn:b".to_string(), "urn:b2".to_string()]);
        assert_eq!(entries[1].0, None);
        assert_eq!(table.real_prefixes().collect::<Vec<_>>(), vec!["b"]);
    }
}
