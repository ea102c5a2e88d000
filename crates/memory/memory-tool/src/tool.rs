//! Rich retrieval/session tool.
//!
//! [`RetrievalTool`] is the contract the prefetch and sync crates use;
//! [`CliRetrievalTool`] implements it by spawning the tool binary once per
//! call. Read verbs (`search`, `find-uris`, `read`) run under the prefetch
//! timeout, session and write verbs under the longer commit timeout.

use std::time::Duration;

use async_trait::async_trait;
use memory_core::{parse_tool_json, MemoryError, Result, SearchHit, TurnRole};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::process::{program_exists, run_tool};

/// Arguments of the native `search` verb.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub score_threshold: Option<f64>,
    pub session_id: Option<String>,
}

/// One `score<TAB>uri` line of `find-uris` output.
#[derive(Debug, Clone, PartialEq)]
pub struct UriCandidate {
    pub score: f64,
    pub uri: String,
}

/// Verbs of the retrieval/session tool.
///
/// # External Interactions
///
/// - **Retrieval backend**: every method is one round-trip to the backend
/// - **Errors**: non-zero exit, timeout and unparseable JSON all surface as
///   `MemoryError`; callers decide whether that means tier fallback or
///   legacy writeback
#[async_trait]
pub trait RetrievalTool: Send + Sync {
    /// Whether the tool can be invoked at all for this deployment.
    async fn is_available(&self) -> bool;

    /// Structured search; hits in the order the backend returned them.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>>;

    /// Semantic URI lookup within one target.
    async fn find_uris(&self, query: &str, target: &str, limit: usize) -> Result<Vec<UriCandidate>>;

    /// Raw content of a URI.
    async fn read(&self, uri: &str) -> Result<String>;

    /// Creates a backend session and returns the raw JSON response.
    async fn session_create(&self) -> Result<Value>;

    /// Appends one message to a session.
    async fn session_message(&self, session_id: &str, role: TurnRole, text: &str) -> Result<()>;

    /// Commits (closes) a session.
    async fn session_commit(&self, session_id: &str) -> Result<()>;

    /// Writes a file on the backend, replacing any previous content.
    async fn write_file(&self, uri: &str, content: &str) -> Result<()>;
}

/// Flattens a `search` response into hits, preserving return order.
///
/// Accepted shapes, optionally wrapped in `{"result": ...}`: a plain array,
/// an object with a `hits` / `results` / `items` array, or an object of
/// category buckets (`{"memories": [...], "resources": [...]}`).
pub fn parse_search_hits(value: &Value) -> Vec<SearchHit> {
    let root = match value.get("result") {
        Some(inner) if inner.is_object() || inner.is_array() => inner,
        _ => value,
    };

    match root {
        Value::Array(items) => items.iter().filter_map(|item| hit_from(item, None)).collect(),
        Value::Object(map) => {
            for key in ["hits", "results", "items"] {
                if let Some(Value::Array(items)) = map.get(key) {
                    return items.iter().filter_map(|item| hit_from(item, None)).collect();
                }
            }
            map.iter()
                .filter_map(|(category, items)| items.as_array().map(|items| (category, items)))
                .flat_map(|(category, items)| {
                    items
                        .iter()
                        .filter_map(move |item| hit_from(item, Some(category.as_str())))
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

fn first_str<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| item.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Reads a score that may be encoded as a number or a numeric string.
pub fn score_of(item: &Value) -> f64 {
    match item.get("score") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn hit_from(item: &Value, bucket: Option<&str>) -> Option<SearchHit> {
    let snippet = first_str(item, &["abstract", "snippet", "content", "text", "overview"])?;
    let category = bucket
        .map(str::to_string)
        .or_else(|| first_str(item, &["category", "context_type"]).map(str::to_string))
        .unwrap_or_else(|| "other".to_string());
    Some(SearchHit {
        score: score_of(item),
        category,
        source: first_str(item, &["uri", "source", "path", "title"])
            .unwrap_or_default()
            .to_string(),
        snippet: snippet.to_string(),
    })
}

/// Parses `score<TAB>uri` lines; malformed lines are skipped.
pub fn parse_uri_lines(output: &str) -> Vec<UriCandidate> {
    output
        .lines()
        .filter_map(|line| {
            let (score, uri) = line.trim().split_once('\t')?;
            let score = score.trim().parse::<f64>().ok()?;
            let uri = uri.trim();
            (!uri.is_empty()).then(|| UriCandidate {
                score,
                uri: uri.to_string(),
            })
        })
        .collect()
}

/// [`RetrievalTool`] backed by a command-line binary.
#[derive(Debug, Clone)]
pub struct CliRetrievalTool {
    program: String,
    prefetch_timeout: Duration,
    commit_timeout: Duration,
}

impl CliRetrievalTool {
    pub fn new(
        program: impl Into<String>,
        prefetch_timeout: Duration,
        commit_timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            prefetch_timeout,
            commit_timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run_json(
        &self,
        verb: &str,
        args: Vec<String>,
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<Value> {
        let output = run_tool(&self.program, verb, &args, stdin, timeout).await?;
        parse_tool_json(verb, &output)
    }
}

/// Rejects `{"ok": false}` / `{"status": "error"}` style replies of session verbs.
fn ensure_ok(verb: &str, value: &Value) -> Result<()> {
    let failed = value.get("ok").and_then(Value::as_bool) == Some(false)
        || value.get("status").and_then(Value::as_str) == Some("error")
        || value.get("error").map(|e| !e.is_null()).unwrap_or(false);
    if failed {
        let detail = value
            .get("error")
            .map(|e| e.to_string())
            .unwrap_or_else(|| "backend reported failure".to_string());
        return Err(MemoryError::tool(verb, detail));
    }
    Ok(())
}

#[async_trait]
impl RetrievalTool for CliRetrievalTool {
    async fn is_available(&self) -> bool {
        program_exists(&self.program).await
    }

    #[instrument(
        skip(self, request),
        fields(limit = request.limit, has_session = request.session_id.is_some())
    )]
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let mut args = vec!["--limit".to_string(), request.limit.to_string()];
        if let Some(threshold) = request.score_threshold {
            args.push("--threshold".to_string());
            args.push(threshold.to_string());
        }
        if let Some(session_id) = &request.session_id {
            args.push("--session".to_string());
            args.push(session_id.clone());
        }
        args.push("--json".to_string());
        args.push("--".to_string());
        args.push(request.query.clone());

        let value = self.run_json("search", args, None, self.prefetch_timeout).await?;
        let hits = parse_search_hits(&value);
        debug!(hit_count = hits.len(), "search returned");
        Ok(hits)
    }

    async fn find_uris(
        &self,
        query: &str,
        target: &str,
        limit: usize,
    ) -> Result<Vec<UriCandidate>> {
        let args = vec![
            "--target".to_string(),
            target.to_string(),
            "--limit".to_string(),
            limit.to_string(),
            "--".to_string(),
            query.to_string(),
        ];
        let output =
            run_tool(&self.program, "find-uris", &args, None, self.prefetch_timeout).await?;
        Ok(parse_uri_lines(&output))
    }

    async fn read(&self, uri: &str) -> Result<String> {
        run_tool(&self.program, "read", &[uri.to_string()], None, self.prefetch_timeout).await
    }

    async fn session_create(&self) -> Result<Value> {
        let value = self
            .run_json("session-create", vec!["--json".to_string()], None, self.commit_timeout)
            .await?;
        ensure_ok("session-create", &value)?;
        Ok(value)
    }

    async fn session_message(&self, session_id: &str, role: TurnRole, text: &str) -> Result<()> {
        let args = vec![
            session_id.to_string(),
            "--role".to_string(),
            role.as_str().to_string(),
            "--json".to_string(),
        ];
        let value = self
            .run_json("session-message", args, Some(text), self.commit_timeout)
            .await?;
        ensure_ok("session-message", &value)
    }

    async fn session_commit(&self, session_id: &str) -> Result<()> {
        let args = vec![session_id.to_string(), "--json".to_string()];
        let value = self
            .run_json("session-commit", args, None, self.commit_timeout)
            .await?;
        ensure_ok("session-commit", &value)
    }

    async fn write_file(&self, uri: &str, content: &str) -> Result<()> {
        run_tool(
            &self.program,
            "write-file",
            &[uri.to_string()],
            Some(content),
            self.commit_timeout,
        )
        .await
        .map(|_| ())
    }
}
