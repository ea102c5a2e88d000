//! Lightweight vector-search backend.

use std::time::Duration;

use async_trait::async_trait;
use memory_core::{parse_tool_json, Result, VectorHit};
use serde_json::Value;
use tracing::debug;

use crate::process::{program_exists, run_tool};
use crate::tool::score_of;

/// One query against the vector backend.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub query: String,
    pub collection: String,
    pub top_k: usize,
    pub min_score: f64,
}

/// Lightweight backend used when `backend = vector`.
#[async_trait]
pub trait VectorSearchBackend: Send + Sync {
    async fn is_available(&self) -> bool;

    /// Hits in backend order.
    async fn query(&self, query: &VectorQuery) -> Result<Vec<VectorHit>>;
}

/// Parses a JSON array, or `{"results": [...]}`, into vector hits.
///
/// Rows without any text are dropped.
pub fn parse_vector_rows(value: &Value) -> Vec<VectorHit> {
    let rows = match value {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(rows)) => rows.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    rows.iter()
        .filter_map(|row| {
            let snippet = text_field(row, &["snippet", "context", "text", "content"])?;
            Some(VectorHit {
                score: score_of(row),
                snippet,
                source: text_field(row, &["path", "file", "source", "title"]).unwrap_or_default(),
            })
        })
        .collect()
}

fn text_field(row: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| row.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// [`VectorSearchBackend`] backed by a command-line binary.
#[derive(Debug, Clone)]
pub struct CliVectorSearch {
    program: String,
    timeout: Duration,
}

impl CliVectorSearch {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl VectorSearchBackend for CliVectorSearch {
    async fn is_available(&self) -> bool {
        program_exists(&self.program).await
    }

    async fn query(&self, query: &VectorQuery) -> Result<Vec<VectorHit>> {
        let args = vec![
            "--collection".to_string(),
            query.collection.clone(),
            "--top-k".to_string(),
            query.top_k.to_string(),
            "--min-score".to_string(),
            query.min_score.to_string(),
            "--json".to_string(),
            "--".to_string(),
            query.query.clone(),
        ];
        let output = run_tool(&self.program, "query", &args, None, self.timeout).await?;
        let value = parse_tool_json("query", &output)?;
        let hits = parse_vector_rows(&value);
        debug!(collection = %query.collection, hit_count = hits.len(), "vector query returned");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_vector_rows_array() {
        let hits = parse_vector_rows(&json!([
            {"score": 0.82, "snippet": "deploy on fridays", "file": "notes/ops.md"},
            {"score": "0.4", "content": "misc"},
            {"score": 0.9}
        ]));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, "notes/ops.md");
        assert_eq!(hits[1].score, 0.4);
        assert_eq!(hits[1].source, "");
    }

    #[test]
    fn test_parse_vector_rows_results_envelope() {
        let rows = json!({"results": [{"score": 1, "context": "c", "path": "p"}]});
        let hits = parse_vector_rows(&rows);
        assert_eq!(
            hits,
            vec![VectorHit { score: 1.0, snippet: "c".into(), source: "p".into() }]
        );
        assert!(parse_vector_rows(&json!({"other": 1})).is_empty());
    }
}
