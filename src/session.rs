//! Per-session document state
//!
//! One [`DocumentState`] per editing session, owned by a
//! [`SessionRegistry`] and reached only through it. A session is re-parsed
//! when the host's change counter moves; nothing else invalidates it.

use std::collections::HashMap;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::dom::{Document, NamespaceTable, NodeId, NodeRef};
use crate::error::{Error, QueryError, Result};
use crate::host::{element_preview, TextSource};
use crate::locate::{self, Match};
use crate::parse::{chunk_str, parse};
use crate::query::{unique_namespace_prefixes, PrefixMap, QueryEngine, QueryResult};
use crate::span::Span;
use crate::xpath::Variables;

pub type SessionId = u64;

/// A parseable stretch of the host text: absolute offset and content
pub type Region<'a> = (usize, &'a str);

/// One session in a [`SessionRegistry::refresh_many`] batch
#[derive(Debug, Clone)]
pub struct RefreshRequest<'a> {
    pub id: SessionId,
    pub change_counter: u64,
    pub regions: Vec<Region<'a>>,
}

/// Everything known about one session's text
#[derive(Debug)]
pub struct DocumentState {
    /// Counter of the last successful parse
    pub change_counter: Option<u64>,
    /// One tree per region, in source order
    pub documents: Vec<Document>,
    /// Declarations of all documents, in document order
    pub namespaces: NamespaceTable,
    pub prefixes: PrefixMap,
    last_located: Option<(Vec<Span>, Vec<Match>)>,
    engine: QueryEngine,
}

impl DocumentState {
    fn new(config: &Config) -> Self {
        DocumentState {
            change_counter: None,
            documents: Vec::new(),
            namespaces: NamespaceTable::new(),
            prefixes: PrefixMap::new(),
            last_located: None,
            engine: QueryEngine::new(&config.query),
        }
    }

    pub fn is_stale(&self, change_counter: u64) -> bool {
        self.change_counter != Some(change_counter)
    }

    fn clear(&mut self) {
        self.change_counter = None;
        self.documents.clear();
        self.namespaces = NamespaceTable::new();
        self.prefixes = PrefixMap::new();
        self.last_located = None;
    }

    /// Re-parse every region unless `change_counter` is the one already
    /// parsed. Returns whether a parse happened. A failed parse leaves the
    /// state empty and stale.
    fn refresh(
        &mut self,
        change_counter: u64,
        regions: &[Region<'_>],
        cancel: Option<&CancellationToken>,
        config: &Config,
    ) -> Result<bool> {
        if !self.is_stale(change_counter) {
            return Ok(false);
        }
        self.clear();

        let mut documents = Vec::with_capacity(regions.len());
        let mut namespaces = NamespaceTable::new();
        for &(offset, text) in regions {
            let parsed = parse(chunk_str(text, config.parse.chunk_size), offset, cancel)?;
            for (prefix, uris) in parsed.namespaces.iter() {
                for uri in uris {
                    namespaces.record(prefix, uri);
                }
            }
            documents.push(parsed.document);
        }

        self.prefixes = unique_namespace_prefixes(&namespaces, &config.namespaces);
        self.namespaces = namespaces;
        self.documents = documents;
        self.change_counter = Some(change_counter);
        Ok(true)
    }

    fn document(&self, index: usize) -> Result<&Document> {
        self.documents
            .get(index)
            .ok_or_else(|| Error::Query(QueryError::Evaluation(format!("no document {} in this session", index))))
    }
}

/// Owner of every open session
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, DocumentState>,
    config: Config,
}

impl SessionRegistry {
    pub fn new(config: Config) -> Self {
        SessionRegistry {
            sessions: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start tracking `id`; an already open session is kept as it is
    pub fn open(&mut self, id: SessionId) -> &mut DocumentState {
        let config = &self.config;
        self.sessions.entry(id).or_insert_with(|| {
            log::debug!("session {} opened", id);
            DocumentState::new(config)
        })
    }

    /// Drop everything held for `id`; false when it was not open
    pub fn close(&mut self, id: SessionId) -> bool {
        let closed = self.sessions.remove(&id).is_some();
        if closed {
            log::debug!("session {} closed", id);
        }
        closed
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn state(&self, id: SessionId) -> Result<&DocumentState> {
        self.sessions.get(&id).ok_or(Error::UnknownSession(id))
    }

    fn state_mut(&mut self, id: SessionId) -> Result<&mut DocumentState> {
        self.sessions.get_mut(&id).ok_or(Error::UnknownSession(id))
    }

    /// Whether the text changed since the last successful parse
    pub fn is_stale(&self, id: SessionId, change_counter: u64) -> Result<bool> {
        Ok(self.state(id)?.is_stale(change_counter))
    }

    /// Re-parse `id` from `regions` if `change_counter` moved. On error
    /// the session holds no trees until the next successful refresh.
    pub fn refresh(
        &mut self,
        id: SessionId,
        change_counter: u64,
        regions: &[Region<'_>],
        cancel: Option<&CancellationToken>,
    ) -> Result<bool> {
        let config = &self.config;
        let state = self.sessions.get_mut(&id).ok_or(Error::UnknownSession(id))?;
        let result = state.refresh(change_counter, regions, cancel, config);
        log_refresh(id, &result);
        result
    }

    /// Refresh several sessions at once, each on its own worker. Results
    /// come back in request order.
    pub fn refresh_many(
        &mut self,
        batch: &[RefreshRequest<'_>],
        cancel: Option<&CancellationToken>,
    ) -> Vec<(SessionId, Result<bool>)> {
        let mut wanted: HashMap<SessionId, usize> = HashMap::with_capacity(batch.len());
        for (index, request) in batch.iter().enumerate() {
            wanted.insert(request.id, index);
        }

        let config = &self.config;
        let work: Vec<(usize, &mut DocumentState)> = self
            .sessions
            .iter_mut()
            .filter_map(|(id, state)| wanted.get(id).map(|&index| (index, state)))
            .collect();

        let mut results: Vec<(usize, SessionId, Result<bool>)> = work
            .into_par_iter()
            .map(|(index, state)| {
                let request = &batch[index];
                let result = state.refresh(request.change_counter, &request.regions, cancel, config);
                log_refresh(request.id, &result);
                (index, request.id, result)
            })
            .collect();

        for (index, request) in batch.iter().enumerate() {
            if !self.sessions.contains_key(&request.id) {
                results.push((index, request.id, Err(Error::UnknownSession(request.id))));
            } else if wanted.get(&request.id) != Some(&index) {
                // an earlier duplicate; the last request for an id wins
                results.push((index, request.id, Ok(false)));
            }
        }

        results.sort_by_key(|(index, _, _)| *index);
        results.into_iter().map(|(_, id, result)| (id, result)).collect()
    }

    /// Nodes covering `ranges`, reusing the previous answer while neither
    /// the ranges nor the trees changed
    pub fn locate_cached(&mut self, id: SessionId, ranges: &[Span]) -> Result<Vec<Match>> {
        let state = self.state_mut(id)?;
        if let Some((cached_ranges, matches)) = &state.last_located {
            if cached_ranges.as_slice() == ranges {
                return Ok(matches.clone());
            }
        }
        let documents: Vec<&Document> = state.documents.iter().collect();
        let matches = locate::locate(&documents, ranges);
        state.last_located = Some((ranges.to_vec(), matches.clone()));
        Ok(matches)
    }

    /// Innermost node at `offset`, with the index of its document
    pub fn node_at(&self, id: SessionId, offset: usize) -> Result<Option<(usize, NodeId)>> {
        let state = self.state(id)?;
        let documents: Vec<&Document> = state.documents.iter().collect();
        Ok(locate::node_at(&documents, offset))
    }

    /// Run `expression` against one of the session's documents
    pub fn query(
        &mut self,
        id: SessionId,
        document: usize,
        expression: &str,
        context: &[NodeRef],
        variables: &Variables,
    ) -> Result<QueryResult> {
        let state = self.state_mut(id)?;
        let doc = state.documents.get(document).ok_or_else(|| {
            Error::Query(QueryError::Evaluation(format!("no document {} in this session", document)))
        })?;
        Ok(state.engine.query(doc, expression, &state.prefixes, context, variables)?)
    }

    /// Re-queryable path of `node` in one of the session's documents
    pub fn exact_path(&self, id: SessionId, document: usize, node: NodeRef) -> Result<String> {
        let state = self.state(id)?;
        Ok(locate::exact_path(state.document(document)?, node, &state.prefixes))
    }

    /// One-line source preview of element `node`, cut to the configured length
    pub fn preview<S: TextSource + ?Sized>(
        &self,
        id: SessionId,
        document: usize,
        node: NodeId,
        source: &S,
    ) -> Result<Option<String>> {
        let state = self.state(id)?;
        Ok(element_preview(
            source,
            state.document(document)?,
            node,
            Some(self.config.preview.max_len),
        ))
    }
}

fn log_refresh(id: SessionId, result: &Result<bool>) {
    match result {
        Ok(true) => log::debug!("session {} re-parsed", id),
        Ok(false) => {}
        Err(Error::Cancelled) => log::warn!("session {} refresh abandoned: text changed", id),
        Err(e) => log::debug!("session {} refresh failed: {}", id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        let mut registry = SessionRegistry::default();
        registry.open(1);
        registry
    }

    #[test]
    fn test_unknown_session() {
        let mut registry = SessionRegistry::default();
        assert!(matches!(registry.is_stale(9, 0), Err(Error::UnknownSession(9))));
        assert!(matches!(registry.refresh(9, 0, &[], None), Err(Error::UnknownSession(9))));
        assert!(!registry.close(9));
    }

    #[test]
    fn test_refresh_only_when_counter_moves() {
        let mut registry = registry();
        assert!(registry.is_stale(1, 1).unwrap());
        assert!(registry.refresh(1, 1, &[(0, "<a/>")], None).unwrap());
        assert!(!registry.is_stale(1, 1).unwrap());
        assert!(!registry.refresh(1, 1, &[(0, "<b/>")], None).unwrap());
        assert!(registry.refresh(1, 2, &[(0, "<b/>")], None).unwrap());
        assert_eq!(registry.state(1).unwrap().documents.len(), 1);
    }

    #[test]
    fn test_failed_refresh_clears_state() {
        let mut registry = registry();
        registry.refresh(1, 1, &[(0, "<a/>")], None).unwrap();
        let err = registry.refresh(1, 2, &[(0, "<a><b></a>")], None).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        let state = registry.state(1).unwrap();
        assert!(state.documents.is_empty());
        assert_eq!(state.change_counter, None);
        assert!(registry.is_stale(1, 2).unwrap());
    }

    #[test]
    fn test_cancelled_refresh() {
        let mut registry = registry();
        let token = CancellationToken::new();
        token.cancel();
        let err = registry.refresh(1, 1, &[(0, "<a/>")], Some(&token)).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(registry.is_stale(1, 1).unwrap());
    }

    #[test]
    fn test_regions_share_one_prefix_map() {
        let mut registry = registry();
        let first = "<a xmlns=\"urn:1\"/>";
        let second = "<b xmlns=\"urn:2\"/>";
        registry
            .refresh(1, 1, &[(0, first), (first.len() + 5, second)], None)
            .unwrap();
        let state = registry.state(1).unwrap();
        assert_eq!(state.documents.len(), 2);
        assert!(state.prefixes.contains("default1"));
        assert!(state.prefixes.contains("default2"));
        assert_eq!(registry.node_at(1, first.len() + 6).unwrap(), Some((1, 1)));
    }

    #[test]
    fn test_locate_reuses_last_answer() {
        let mut registry = registry();
        registry.refresh(1, 1, &[(0, "<r><a>x</a><b/></r>")], None).unwrap();
        let ranges = [Span::point(5)];
        let first = registry.locate_cached(1, &ranges).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].node, 2);
        assert!(registry.state(1).unwrap().last_located.is_some());
        assert_eq!(registry.locate_cached(1, &ranges).unwrap(), first);

        registry.refresh(1, 2, &[(0, "<r><b/></r>")], None).unwrap();
        assert!(registry.state(1).unwrap().last_located.is_none());
    }

    #[test]
    fn test_query_and_exact_path() {
        let mut registry = registry();
        registry
            .refresh(1, 1, &[(0, "<r xmlns=\"urn:d\"><a/><a/></r>")], None)
            .unwrap();
        let result = registry
            .query(1, 0, "//default:a", &[], &Variables::new())
            .unwrap();
        let nodes = result.nodes().to_vec();
        assert_eq!(nodes, vec![NodeRef::Node(2), NodeRef::Node(3)]);
        assert_eq!(registry.exact_path(1, 0, nodes[1]).unwrap(), "/default:r[1]/default:a[2]");

        let err = registry.query(1, 3, "/", &[], &Variables::new()).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::Evaluation(_))));
        let err = registry.query(1, 0, "//(", &[], &Variables::new()).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::Compile(_))));
    }

    #[test]
    fn test_refresh_many_keeps_request_order() {
        let mut registry = registry();
        registry.open(2);
        let batch = [
            RefreshRequest {
                id: 2,
                change_counter: 1,
                regions: vec![(0, "<a/>")],
            },
            RefreshRequest {
                id: 7,
                change_counter: 1,
                regions: vec![(0, "<a/>")],
            },
            RefreshRequest {
                id: 1,
                change_counter: 1,
                regions: vec![(0, "<a>")],
            },
        ];
        let results = registry.refresh_many(&batch, None);
        let ids: Vec<SessionId> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 7, 1]);
        assert!(matches!(results[0].1, Ok(true)));
        assert!(matches!(results[1].1, Err(Error::UnknownSession(7))));
        assert!(matches!(results[2].1, Err(Error::Parse(_))));
        assert!(!registry.is_stale(2, 1).unwrap());
    }

    #[test]
    fn test_preview_uses_configured_length() {
        let mut config = Config::default();
        config.preview.max_len = 8;
        let mut registry = SessionRegistry::new(config);
        registry.open(1);
        let text = "<r>\n\t<a>some text</a></r>";
        registry.refresh(1, 1, &[(0, text)], None).unwrap();
        let source = crate::host::PlainText::new(text);
        assert_eq!(registry.preview(1, 0, 2, &source).unwrap().as_deref(), Some("<a>so..."));
        assert_eq!(registry.preview(1, 0, 9, &source).unwrap(), None);
    }

    #[test]
    fn test_open_keeps_existing_state() {
        let mut registry = registry();
        registry.refresh(1, 4, &[(0, "<a/>")], None).unwrap();
        registry.open(1);
        assert_eq!(registry.state(1).unwrap().change_counter, Some(4));
        assert!(registry.close(1));
        assert!(registry.is_empty());
    }
}
