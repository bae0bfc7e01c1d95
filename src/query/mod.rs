//! Query façade
//!
//! Compiles an expression against a document's prefix map (caching the
//! compiled form), evaluates it from one or more context nodes and tags
//! the answer as nodes or scalar values. Failures come back as
//! [`QueryError`] messages; nothing here panics on bad input.

pub mod namespaces;
pub mod regions;

pub use namespaces::{unique_namespace_prefixes, PrefixBinding, PrefixMap};
pub use regions::{regions_of_nodes, RegionKind};

use std::fmt;
use std::sync::Arc;

use lru::LruCache;

use crate::config::QueryConfig;
use crate::dom::{Document, NodeRef, DOCUMENT_NODE};
use crate::error::QueryError;
use crate::locate::exact_paths;
use crate::xpath::value::format_number;
use crate::xpath::{compile, evaluate_compiled, Bindings, CompiledExpr, EvalContext, FunctionRegistry, Variables, XPathValue};

/// A non-node query result
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => f.write_str(&format_number(*n)),
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

/// What a query produced
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Document order, no duplicates
    Nodes(Vec<NodeRef>),
    /// One value per context node (string lists contribute every member)
    Scalars(Vec<Scalar>),
}

impl QueryResult {
    pub fn is_nodes(&self) -> bool {
        matches!(self, QueryResult::Nodes(_))
    }

    pub fn nodes(&self) -> &[NodeRef] {
        match self {
            QueryResult::Nodes(nodes) => nodes,
            QueryResult::Scalars(_) => &[],
        }
    }

    /// Exact paths of node results
    pub fn paths(&self, doc: &Document, prefixes: &PrefixMap) -> Vec<String> {
        exact_paths(doc, self.nodes(), prefixes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    expression: String,
    namespaces: Vec<(String, String)>,
}

/// Compiles, caches and runs queries
pub struct QueryEngine {
    cache: LruCache<CacheKey, Arc<CompiledExpr>>,
    functions: FunctionRegistry,
}

impl fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("cached", &self.cache.len())
            .field("functions", &self.functions)
            .finish()
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(&QueryConfig::default())
    }
}

impl QueryEngine {
    /// Engine with the default extension functions
    pub fn new(config: &QueryConfig) -> Self {
        QueryEngine {
            cache: LruCache::new(config.cache_capacity),
            functions: FunctionRegistry::with_defaults(),
        }
    }

    /// Register additional functions here
    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Compile `expression` with the prefixes of `prefixes`, reusing an
    /// earlier compilation when the bindings are the same
    pub fn compile(&mut self, expression: &str, prefixes: &PrefixMap) -> Result<Arc<CompiledExpr>, QueryError> {
        let key = CacheKey {
            expression: expression.to_string(),
            namespaces: prefixes.xpath_namespaces(),
        };
        if let Some(compiled) = self.cache.get(&key) {
            log::debug!("query cache hit: {}", expression);
            return Ok(Arc::clone(compiled));
        }
        log::debug!("query cache miss: {}", expression);
        let compiled = Arc::new(compile(expression, &key.namespaces).map_err(QueryError::Compile)?);
        self.cache.put(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Run `expression` from every node in `context` (the document node
    /// when empty). Node-sets are merged into one document-ordered list;
    /// other values are collected per context node. A query that yields
    /// nodes for some context nodes and values for others is an error.
    pub fn query(
        &mut self,
        doc: &Document,
        expression: &str,
        prefixes: &PrefixMap,
        context: &[NodeRef],
        variables: &Variables,
    ) -> Result<QueryResult, QueryError> {
        let compiled = self.compile(expression, prefixes)?;
        let bindings = Bindings {
            variables,
            functions: &self.functions,
            prefixes,
        };

        let document_node = [NodeRef::Node(DOCUMENT_NODE)];
        let context = if context.is_empty() { &document_node[..] } else { context };

        let mut nodes = Vec::new();
        let mut scalars = Vec::new();
        let mut saw_nodes = false;
        let mut saw_scalars = false;
        for &node in context {
            if !doc.contains(node) {
                return Err(QueryError::Evaluation(format!("context node {:?} is not in the document", node)));
            }
            let value = evaluate_compiled(&compiled, &EvalContext::new(doc, node, bindings))
                .map_err(QueryError::Evaluation)?;
            match value {
                XPathValue::NodeSet(found) => {
                    saw_nodes = true;
                    nodes.extend(found);
                }
                XPathValue::StringList(list) => {
                    saw_scalars = true;
                    scalars.extend(list.into_iter().map(Scalar::String));
                }
                XPathValue::Boolean(b) => {
                    saw_scalars = true;
                    scalars.push(Scalar::Boolean(b));
                }
                XPathValue::Number(n) => {
                    saw_scalars = true;
                    scalars.push(Scalar::Number(n));
                }
                XPathValue::String(s) => {
                    saw_scalars = true;
                    scalars.push(Scalar::String(s));
                }
            }
        }

        if saw_nodes && saw_scalars {
            return Err(QueryError::Evaluation(
                "query returned nodes for some context nodes and values for others".to_string(),
            ));
        }
        if saw_scalars {
            return Ok(QueryResult::Scalars(scalars));
        }
        doc.sort_document_order(&mut nodes);
        Ok(QueryResult::Nodes(nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NamespaceConfig, ParseConfig};
    use crate::dom::NodeKind;
    use crate::locate::exact_path;
    use crate::parse::parse_str;

    fn parsed(text: &str) -> (Document, PrefixMap) {
        let parsed = parse_str(text, &ParseConfig::default(), None).unwrap();
        let prefixes = unique_namespace_prefixes(&parsed.namespaces, &NamespaceConfig::default());
        (parsed.document, prefixes)
    }

    fn run(engine: &mut QueryEngine, doc: &Document, prefixes: &PrefixMap, expr: &str) -> Result<QueryResult, QueryError> {
        engine.query(doc, expr, prefixes, &[], &Variables::new())
    }

    #[test]
    fn test_default_namespace_gets_synthesized_prefix() {
        let (doc, prefixes) = parsed("<x xmlns=\"urn:foo\"><y/></x>");
        let mut engine = QueryEngine::default();
        let by_local_name = run(&mut engine, &doc, &prefixes, "//*[local-name()='y']").unwrap();
        assert_eq!(by_local_name.nodes(), &[NodeRef::Node(2)]);
        let by_prefix = run(&mut engine, &doc, &prefixes, "//default:y").unwrap();
        assert_eq!(by_prefix, by_local_name);
        let unmapped = run(&mut engine, &doc, &PrefixMap::new(), "//*[local-name()='y']").unwrap();
        assert_eq!(unmapped, by_local_name);
    }

    #[test]
    fn test_exact_path_selects_the_element_again() {
        let text = "<r xmlns=\"urn:d\" xmlns:p=\"urn:p\">\n  <a/><p:a k=\"1\"/>\n  <a><b/><!--c--><b/></a>\n  <?pi x?>\n</r>";
        let (doc, prefixes) = parsed(text);
        let mut engine = QueryEngine::default();
        for id in doc.all_nodes() {
            let node = NodeRef::Node(id);
            let path = exact_path(&doc, node, &prefixes);
            let found = run(&mut engine, &doc, &prefixes, &path).unwrap();
            assert_eq!(found.nodes(), &[node], "{}", path);
        }
    }

    #[test]
    fn test_scalar_results() {
        let (doc, prefixes) = parsed("<r><i>1</i><i>2</i></r>");
        let mut engine = QueryEngine::default();
        assert_eq!(
            run(&mut engine, &doc, &prefixes, "count(//i)").unwrap(),
            QueryResult::Scalars(vec![Scalar::Number(2.0)])
        );
        assert_eq!(
            run(&mut engine, &doc, &prefixes, "tokenize('a b', ' ')").unwrap(),
            QueryResult::Scalars(vec![Scalar::String("a".to_string()), Scalar::String("b".to_string())])
        );
        assert_eq!(Scalar::Number(2.0).to_string(), "2");
    }

    #[test]
    fn test_several_context_nodes() {
        let (doc, prefixes) = parsed("<r><i><v/></i><i><v/><v/></i></r>");
        let mut engine = QueryEngine::default();
        let items = run(&mut engine, &doc, &prefixes, "//i").unwrap().nodes().to_vec();
        let vars = Variables::new();
        let children = engine.query(&doc, "v", &prefixes, &items, &vars).unwrap();
        assert_eq!(children.nodes().len(), 3);
        let counts = engine.query(&doc, "count(v)", &prefixes, &items, &vars).unwrap();
        assert_eq!(counts, QueryResult::Scalars(vec![Scalar::Number(1.0), Scalar::Number(2.0)]));
        let parents = engine.query(&doc, "..", &prefixes, &items, &vars).unwrap();
        assert_eq!(parents.nodes(), &[NodeRef::Node(1)]);
    }

    #[test]
    fn test_errors_are_reported_as_messages() {
        let (doc, prefixes) = parsed("<r/>");
        let mut engine = QueryEngine::default();
        assert!(matches!(run(&mut engine, &doc, &prefixes, "//r["), Err(QueryError::Compile(_))));
        assert!(matches!(run(&mut engine, &doc, &prefixes, "//q:r"), Err(QueryError::Compile(_))));
        assert!(matches!(run(&mut engine, &doc, &prefixes, "$v"), Err(QueryError::Evaluation(_))));
        assert!(matches!(
            run(&mut engine, &doc, &prefixes, "matches('a', '(')"),
            Err(QueryError::Evaluation(_))
        ));
    }

    #[test]
    fn test_mixed_results_are_rejected() {
        let (doc, prefixes) = parsed("<r><a/>t</r>");
        let mut engine = QueryEngine::default();
        // nodes for elements, a string for anything else
        engine.functions_mut().register("self-or-text", |ctx, _| match ctx.node {
            NodeRef::Node(_) => Ok(XPathValue::single_node(ctx.node)),
            other => Ok(XPathValue::String(ctx.doc.string_value(other))),
        });
        let vars = Variables::new();
        let elements = engine.query(&doc, "self-or-text()", &prefixes, &[NodeRef::Node(1)], &vars);
        assert_eq!(elements.unwrap().nodes(), &[NodeRef::Node(1)]);
        let mixed = engine.query(&doc, "self-or-text()", &prefixes, &[NodeRef::Node(1), NodeRef::Tail(2)], &vars);
        assert!(matches!(mixed, Err(QueryError::Evaluation(_))));
    }

    #[test]
    fn test_compiled_expressions_are_cached_per_bindings() {
        let (doc, prefixes) = parsed("<r xmlns:p=\"urn:p\"><p:a/></r>");
        let mut engine = QueryEngine::new(&QueryConfig::default().with_cache_capacity(2));
        let first = engine.compile("//p:a", &prefixes).unwrap();
        let second = engine.compile("//p:a", &prefixes).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(engine.compile("//p:a", &PrefixMap::new()).is_err());
        assert_eq!(run(&mut engine, &doc, &prefixes, "//p:a").unwrap().nodes().len(), 1);
    }

    #[test]
    fn test_custom_function() {
        let (doc, prefixes) = parsed("<r/>");
        let mut engine = QueryEngine::default();
        engine.functions_mut().register("kind", |ctx, _| {
            let kind = match ctx.node {
                NodeRef::Node(id) => ctx.doc.kind(id) == Some(NodeKind::Element),
                _ => false,
            };
            Ok(XPathValue::Boolean(kind))
        });
        assert_eq!(
            run(&mut engine, &doc, &prefixes, "/r[kind()]").unwrap().nodes(),
            &[NodeRef::Node(1)]
        );
    }
}
