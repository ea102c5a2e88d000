//! Session-oriented mock of `RetrievalTool` for the synchronizer tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use memory_core::{MemoryError, Result, SearchHit, TurnRole};
use memory_tool::{RetrievalTool, SearchRequest, UriCandidate};
use serde_json::{json, Value};

#[derive(Clone)]
pub struct MockSessionTool {
    pub create_response: Value,
    pub create_delay: Duration,
    pub fail_user_writes: bool,
    pub fail_assistant_writes: bool,
    pub fail_commit: bool,
    pub create_count: Arc<AtomicUsize>,
    pub messages: Arc<Mutex<Vec<(String, TurnRole, String)>>>,
    pub commits: Arc<Mutex<Vec<String>>>,
    pub files: Arc<Mutex<HashMap<String, String>>>,
    pub file_writes: Arc<Mutex<Vec<String>>>,
}

impl Default for MockSessionTool {
    fn default() -> Self {
        Self {
            create_response: json!({"result": {"session_id": "sess-1"}}),
            create_delay: Duration::from_millis(0),
            fail_user_writes: false,
            fail_assistant_writes: false,
            fail_commit: false,
            create_count: Arc::new(AtomicUsize::new(0)),
            messages: Arc::new(Mutex::new(Vec::new())),
            commits: Arc::new(Mutex::new(Vec::new())),
            files: Arc::new(Mutex::new(HashMap::new())),
            file_writes: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockSessionTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_count(&self) -> usize {
        self.create_count.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<(String, TurnRole, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn file(&self, uri: &str) -> Option<String> {
        self.files.lock().unwrap().get(uri).cloned()
    }
}

#[async_trait]
impl RetrievalTool for MockSessionTool {
    async fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, _request: &SearchRequest) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }

    async fn find_uris(
        &self,
        _query: &str,
        _target: &str,
        _limit: usize,
    ) -> Result<Vec<UriCandidate>> {
        Ok(Vec::new())
    }

    async fn read(&self, uri: &str) -> Result<String> {
        self.file(uri)
            .ok_or_else(|| MemoryError::tool("read", "exit 1: not found"))
    }

    async fn session_create(&self) -> Result<Value> {
        tokio::time::sleep(self.create_delay).await;
        let n = self.create_count.fetch_add(1, Ordering::SeqCst);
        let mut response = self.create_response.clone();
        if n > 0 {
            if let Some(id) = response.pointer_mut("/result/session_id") {
                *id = json!(format!("sess-{}", n + 1));
            }
        }
        Ok(response)
    }

    async fn session_message(&self, session_id: &str, role: TurnRole, text: &str) -> Result<()> {
        let fail = match role {
            TurnRole::User => self.fail_user_writes,
            TurnRole::Assistant => self.fail_assistant_writes,
        };
        if fail {
            return Err(MemoryError::tool("session-message", "exit 1: backend down"));
        }
        self.messages
            .lock()
            .unwrap()
            .push((session_id.to_string(), role, text.to_string()));
        Ok(())
    }

    async fn session_commit(&self, session_id: &str) -> Result<()> {
        self.commits.lock().unwrap().push(session_id.to_string());
        if self.fail_commit {
            return Err(MemoryError::tool("session-commit", "timeout"));
        }
        Ok(())
    }

    async fn write_file(&self, uri: &str, content: &str) -> Result<()> {
        self.file_writes.lock().unwrap().push(uri.to_string());
        self.files
            .lock()
            .unwrap()
            .insert(uri.to_string(), content.to_string());
        Ok(())
    }
}
