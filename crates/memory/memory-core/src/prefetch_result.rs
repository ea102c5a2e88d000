//! # Prefetch Result
//!
//! Result type returned by the retrieval orchestrator. Recomputed per request
//! and never persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which fallback level produced the block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchTier {
    /// Structured search on the rich backend (or the lightweight vector backend).
    Native,
    /// Semantic URI lookup or full-text read of the legacy transcripts.
    Legacy,
    /// Nothing usable was found.
    None,
}

impl PrefetchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefetchTier::Native => "native",
            PrefetchTier::Legacy => "legacy",
            PrefetchTier::None => "none",
        }
    }
}

/// Bounded context block plus the trail of how it was obtained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrefetchResult {
    /// Formatted snippet block, without delimiters. Never longer than the char budget.
    pub block: String,
    pub tier: PrefetchTier,
    /// Ordered, machine-parseable notes (e.g. `native_search_error=search_timeout`).
    pub diagnostics: Vec<String>,
    /// Why the native tier was not used, when it was attempted.
    pub fallback_reason: Option<String>,
    /// Hit count per category for the hits that made it into a native block.
    pub hit_distribution: Option<BTreeMap<String, usize>>,
}

impl PrefetchResult {
    /// Empty result carrying a single diagnostic.
    pub fn empty(reason: impl Into<String>) -> Self {
        Self {
            block: String::new(),
            tier: PrefetchTier::None,
            diagnostics: vec![reason.into()],
            fallback_reason: None,
            hit_distribution: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }
}

/// One row returned by the native `search` verb.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub score: f64,
    /// Bucket the backend filed the hit under (e.g. `memories`, `resources`).
    pub category: String,
    /// URI, path or title identifying where the snippet came from.
    pub source: String,
    pub snippet: String,
}

/// One row returned by the lightweight vector-search backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorHit {
    pub score: f64,
    pub snippet: String,
    pub source: String,
}
