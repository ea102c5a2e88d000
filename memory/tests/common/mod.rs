#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use memory::{EscalationClassifier, MemoryError, RetrievalTool, TurnRole};
use memory_core::{Result, SearchHit};
use memory_tool::{SearchRequest, UriCandidate};
use serde_json::{json, Value};

/// Backend that always returns the same hits and accepts every write.
#[derive(Clone, Default)]
pub struct MockTool {
    pub hits: Vec<SearchHit>,
    pub searches: Arc<Mutex<Vec<SearchRequest>>>,
    pub messages: Arc<Mutex<Vec<(TurnRole, String)>>>,
}

impl MockTool {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().unwrap().len()
    }
}

#[async_trait]
impl RetrievalTool for MockTool {
    async fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        self.searches.lock().unwrap().push(request.clone());
        Ok(self.hits.clone())
    }

    async fn find_uris(
        &self,
        _query: &str,
        _target: &str,
        _limit: usize,
    ) -> Result<Vec<UriCandidate>> {
        Ok(Vec::new())
    }

    async fn read(&self, _uri: &str) -> Result<String> {
        Err(MemoryError::tool("read", "exit 1: not found"))
    }

    async fn session_create(&self) -> Result<Value> {
        Ok(json!({"id": "sess-engine"}))
    }

    async fn session_message(&self, _session_id: &str, role: TurnRole, text: &str) -> Result<()> {
        self.messages.lock().unwrap().push((role, text.to_string()));
        Ok(())
    }

    async fn session_commit(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }

    async fn write_file(&self, _uri: &str, _content: &str) -> Result<()> {
        Ok(())
    }
}

/// Classifier with a canned answer, or a failure when `answer` is `None`.
pub struct MockClassifier {
    pub answer: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EscalationClassifier for MockClassifier {
    async fn classify(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer
            .clone()
            .ok_or_else(|| MemoryError::tool("classify", "timeout"))
    }
}

pub fn hit(score: f64, snippet: &str) -> SearchHit {
    SearchHit {
        score,
        category: "memories".to_string(),
        source: "mem://prefs".to_string(),
        snippet: snippet.to_string(),
    }
}
