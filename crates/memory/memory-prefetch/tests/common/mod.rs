//! Scripted `RetrievalTool` / `VectorSearchBackend` used by the prefetch tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use memory_core::{MemoryError, Result, SearchHit, TurnRole, VectorHit};
use memory_tool::{RetrievalTool, SearchRequest, UriCandidate, VectorQuery, VectorSearchBackend};
use serde_json::Value;

/// In-memory tool whose answers are set up per test.
///
/// Unset answers behave like an empty backend: no hits, no candidates, and
/// `read` failing with `read_failed`.
#[derive(Clone, Default)]
pub struct MockRetrievalTool {
    pub unavailable: bool,
    pub search_result: Arc<Mutex<Option<Result<Vec<SearchHit>>>>>,
    pub find_results: Arc<Mutex<HashMap<String, Result<Vec<UriCandidate>>>>>,
    pub documents: Arc<Mutex<HashMap<String, String>>>,
    pub search_requests: Arc<Mutex<Vec<SearchRequest>>>,
    pub reads: Arc<Mutex<Vec<String>>>,
}

impl MockRetrievalTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(self, hits: Vec<SearchHit>) -> Self {
        *self.search_result.lock().unwrap() = Some(Ok(hits));
        self
    }

    pub fn with_search_error(self, error: MemoryError) -> Self {
        *self.search_result.lock().unwrap() = Some(Err(error));
        self
    }

    pub fn with_candidates(self, target: &str, candidates: Vec<(f64, &str)>) -> Self {
        let candidates = candidates
            .into_iter()
            .map(|(score, uri)| UriCandidate {
                score,
                uri: uri.to_string(),
            })
            .collect();
        self.find_results
            .lock()
            .unwrap()
            .insert(target.to_string(), Ok(candidates));
        self
    }

    pub fn with_find_error(self, target: &str, error: MemoryError) -> Self {
        self.find_results
            .lock()
            .unwrap()
            .insert(target.to_string(), Err(error));
        self
    }

    pub fn with_document(self, uri: &str, content: &str) -> Self {
        self.documents
            .lock()
            .unwrap()
            .insert(uri.to_string(), content.to_string());
        self
    }

    pub fn search_requests(&self) -> Vec<SearchRequest> {
        self.search_requests.lock().unwrap().clone()
    }
}

fn clone_error(error: &MemoryError) -> MemoryError {
    match error {
        MemoryError::ToolInvocation { verb, reason } => {
            MemoryError::tool(verb.clone(), reason.clone())
        }
        other => MemoryError::Parse(other.to_string()),
    }
}

fn clone_result<T: Clone>(result: &Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value.clone()),
        Err(e) => Err(clone_error(e)),
    }
}

#[async_trait]
impl RetrievalTool for MockRetrievalTool {
    async fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        self.search_requests.lock().unwrap().push(request.clone());
        match self.search_result.lock().unwrap().as_ref() {
            Some(result) => clone_result(result),
            None => Ok(Vec::new()),
        }
    }

    async fn find_uris(
        &self,
        _query: &str,
        target: &str,
        limit: usize,
    ) -> Result<Vec<UriCandidate>> {
        match self.find_results.lock().unwrap().get(target) {
            Some(result) => clone_result(result).map(|mut c| {
                c.truncate(limit);
                c
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn read(&self, uri: &str) -> Result<String> {
        self.reads.lock().unwrap().push(uri.to_string());
        self.documents
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .ok_or_else(|| MemoryError::tool("read", "exit 1: not found"))
    }

    async fn session_create(&self) -> Result<Value> {
        Ok(serde_json::json!({"id": "mock-session"}))
    }

    async fn session_message(&self, _session_id: &str, _role: TurnRole, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn session_commit(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }

    async fn write_file(&self, uri: &str, content: &str) -> Result<()> {
        self.documents
            .lock()
            .unwrap()
            .insert(uri.to_string(), content.to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockVectorBackend {
    pub hits: Vec<VectorHit>,
    pub fail: bool,
    pub queries: Arc<Mutex<Vec<VectorQuery>>>,
}

#[async_trait]
impl VectorSearchBackend for MockVectorBackend {
    async fn is_available(&self) -> bool {
        true
    }

    async fn query(&self, query: &VectorQuery) -> Result<Vec<VectorHit>> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail {
            return Err(MemoryError::tool("query", "timeout"));
        }
        Ok(self.hits.clone())
    }
}

pub fn hit(score: f64, category: &str, source: &str, snippet: &str) -> SearchHit {
    SearchHit {
        score,
        category: category.to_string(),
        source: source.to_string(),
        snippet: snippet.to_string(),
    }
}
