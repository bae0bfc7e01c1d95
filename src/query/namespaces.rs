//! Namespace prefixes for queries
//!
//! XPath needs one prefix per namespace URI, but a document may bind the
//! same prefix to several URIs (or use a default namespace, which has no
//! prefix at all). [`unique_namespace_prefixes`] turns a document's
//! [`NamespaceTable`] into a map where every prefix names exactly one URI.

use indexmap::IndexMap;

use crate::config::NamespaceConfig;
use crate::dom::NamespaceTable;

/// Where a synthesized prefix came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefixBinding {
    pub uri: String,
    /// The prefix used in the document; `None` for the default namespace
    pub source_prefix: Option<String>,
}

/// Unique prefix -> URI assignments, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixMap {
    entries: IndexMap<String, PrefixBinding>,
}

impl PrefixMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>, source_prefix: Option<&str>) {
        self.entries.insert(
            prefix.into(),
            PrefixBinding {
                uri: uri.into(),
                source_prefix: source_prefix.map(str::to_string),
            },
        );
    }

    pub fn get(&self, prefix: &str) -> Option<&PrefixBinding> {
        self.entries.get(prefix)
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.entries.contains_key(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PrefixBinding)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bindings to hand to the XPath compiler; undeclarations (empty URIs)
    /// are left out
    pub fn xpath_namespaces(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|(_, b)| !b.uri.is_empty())
            .map(|(p, b)| (p.clone(), b.uri.clone()))
            .collect()
    }

    /// Prefix to write for `uri`, preferring the one that maps back to
    /// `source_prefix`
    pub fn prefix_for(&self, uri: &str, source_prefix: Option<&str>) -> Option<&str> {
        if uri.is_empty() {
            return None;
        }
        let mut candidates = self.entries.iter().filter(|(_, b)| b.uri == uri);
        let first = candidates.clone().next().map(|(p, _)| p.as_str());
        candidates
            .find(|(_, b)| b.source_prefix.as_deref() == source_prefix)
            .map(|(p, _)| p.as_str())
            .or(first)
    }
}

/// Give every (prefix, URI) pair in `table` its own prefix.
///
/// A prefix bound to a single URI keeps its name. A prefix bound to several
/// URIs gets numbered variants (`p1`, `p2`, ... from `suffix_start`). The
/// default namespace uses `default_prefix`, numbered the same way when it
/// has several URIs or when that name is already a real prefix. Numbered
/// candidates skip every name already chosen and every real prefix.
pub fn unique_namespace_prefixes(table: &NamespaceTable, config: &NamespaceConfig) -> PrefixMap {
    let real: Vec<&str> = table.real_prefixes().collect();
    let mut unique = PrefixMap::new();

    let numbered = |unique: &PrefixMap, base: &str, index: &mut usize| -> String {
        loop {
            let candidate = format!("{}{}", base, index);
            *index += 1;
            if !unique.contains(&candidate) && !real.contains(&candidate.as_str()) {
                return candidate;
            }
        }
    };

    for (prefix, uris) in table.iter() {
        let base = prefix.unwrap_or(config.default_prefix.as_str());
        let mut index = config.suffix_start;
        match uris {
            [uri] => {
                let clashes = prefix.is_none() && (unique.contains(base) || real.contains(&base));
                let name = if clashes {
                    numbered(&unique, base, &mut index)
                } else {
                    base.to_string()
                };
                unique.insert(name, uri.clone(), prefix);
            }
            _ => {
                for uri in uris {
                    let name = numbered(&unique, base, &mut index);
                    unique.insert(name, uri.clone(), prefix);
                }
            }
        }
    }

    log::trace!("synthesized {} namespace prefixes", unique.len());
    unique
}
