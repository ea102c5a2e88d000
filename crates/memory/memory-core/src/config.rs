//! # Memory Config
//!
//! Resolved per-agent settings consumed by the gate, prefetch and sync crates.
//! Resolution (environment, settings file, defaults, floors) lives in the
//! `memory` facade; this module only carries the values and the layout
//! helpers derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::MemoryError;

/// Which retrieval backend answers prefetch queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Rich retrieval/session tool with native search and legacy transcripts.
    #[default]
    Native,
    /// Lightweight vector-search backend.
    Vector,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Vector => "vector",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(BackendKind::Native),
            "vector" => Ok(BackendKind::Vector),
            other => Err(MemoryError::Configuration(format!("unknown backend: {}", other))),
        }
    }
}

/// Fully resolved configuration for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    pub backend: BackendKind,

    pub prefetch_enabled: bool,
    pub native_search_enabled: bool,
    pub native_session_enabled: bool,
    pub legacy_sync_enabled: bool,
    pub archive_mirror_enabled: bool,
    pub debug_dump_enabled: bool,

    pub gate_enabled: bool,
    pub gate_escalation_enabled: bool,
    pub gate_threshold: f64,
    pub gate_ambiguity_low: f64,
    pub gate_ambiguity_high: f64,
    pub gate_force_patterns: Vec<String>,
    pub gate_skip_patterns: Vec<String>,

    /// Applies to search, find-uris, read and vector queries.
    pub prefetch_timeout: Duration,
    /// Applies to session verbs and write-file.
    pub commit_timeout: Duration,
    pub prefetch_max_chars: usize,
    pub prefetch_max_turns: usize,
    pub prefetch_max_hits: usize,
    pub search_score_threshold: Option<f64>,
    pub legacy_search_limit: usize,

    pub tool_bin: String,
    pub state_dir: PathBuf,
    /// Root URI of the remote transcript mirror, without trailing slash.
    pub remote_root: String,

    pub vector_bin: String,
    pub vector_collection: String,
    pub vector_top_k: usize,
    pub vector_min_score: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Native,
            prefetch_enabled: true,
            native_search_enabled: true,
            native_session_enabled: true,
            legacy_sync_enabled: true,
            archive_mirror_enabled: true,
            debug_dump_enabled: false,
            gate_enabled: true,
            gate_escalation_enabled: false,
            gate_threshold: 2.0,
            gate_ambiguity_low: 1.0,
            gate_ambiguity_high: 1.0,
            gate_force_patterns: Vec::new(),
            gate_skip_patterns: Vec::new(),
            prefetch_timeout: Duration::from_millis(5_000),
            commit_timeout: Duration::from_millis(20_000),
            prefetch_max_chars: 2_000,
            prefetch_max_turns: 6,
            prefetch_max_hits: 6,
            search_score_threshold: None,
            legacy_search_limit: 10,
            tool_bin: "memory-tool".to_string(),
            state_dir: PathBuf::from(".memory"),
            remote_root: "mem://transcripts".to_string(),
            vector_bin: "vector-search".to_string(),
            vector_collection: "memory".to_string(),
            vector_top_k: 5,
            vector_min_score: 0.3,
        }
    }
}

/// Replaces characters that are unsafe in a path segment with `_`.
pub fn safe_segment(id: &str) -> String {
    let cleaned: String = id
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Local paths and remote URIs that belong to one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentContext {
    pub agent_id: String,
    agent_dir: PathBuf,
    remote_dir: String,
}

impl AgentContext {
    pub fn new(agent_id: impl Into<String>, state_dir: &Path, remote_root: &str) -> Self {
        let agent_id = agent_id.into();
        let segment = safe_segment(&agent_id);
        Self {
            agent_dir: state_dir.join(&segment),
            remote_dir: format!("{}/{}", remote_root.trim_end_matches('/'), segment),
            agent_id,
        }
    }

    pub fn from_config(agent_id: impl Into<String>, config: &MemoryConfig) -> Self {
        Self::new(agent_id, &config.state_dir, &config.remote_root)
    }

    pub fn agent_dir(&self) -> &Path {
        &self.agent_dir
    }

    /// `<state_dir>/<agent>/active.md`
    pub fn local_transcript_path(&self) -> PathBuf {
        self.agent_dir.join("active.md")
    }

    /// `<state_dir>/<agent>/last-prefetch.json`
    pub fn debug_dump_path(&self) -> PathBuf {
        self.agent_dir.join("last-prefetch.json")
    }

    /// `<remote_root>/<agent>/active.md`
    pub fn active_uri(&self) -> String {
        format!("{}/active.md", self.remote_dir)
    }

    /// `<remote_root>/<agent>/archive`
    pub fn archive_uri(&self) -> String {
        format!("{}/archive", self.remote_dir)
    }

    /// `<remote_root>/<agent>/archive/<safe_ts>.md`
    pub fn archive_file_uri(&self, safe_ts: &str) -> String {
        format!("{}/{}.md", self.archive_uri(), safe_ts)
    }

    /// Targets searched and read by the legacy tiers, active transcript first.
    pub fn legacy_targets(&self) -> Vec<String> {
        vec![self.active_uri(), self.archive_uri()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_context_layout() {
        let ctx = AgentContext::new("ops/bot", Path::new("/tmp/state"), "mem://transcripts/");

        assert_eq!(ctx.local_transcript_path(), PathBuf::from("/tmp/state/ops_bot/active.md"));
        assert_eq!(ctx.debug_dump_path(), PathBuf::from("/tmp/state/ops_bot/last-prefetch.json"));
        assert_eq!(ctx.active_uri(), "mem://transcripts/ops_bot/active.md");
        assert_eq!(
            ctx.archive_file_uri("20260101T000000000Z"),
            "mem://transcripts/ops_bot/archive/20260101T000000000Z.md"
        );
        assert_eq!(ctx.agent_id, "ops/bot");
    }

    #[test]
    fn test_safe_segment() {
        assert_eq!(safe_segment(".."), "_");
        assert_eq!(safe_segment(""), "_");
        assert_eq!(safe_segment("agent-1.main"), "agent-1.main");
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("Vector".parse::<BackendKind>().unwrap(), BackendKind::Vector);
        assert!("sqlite".parse::<BackendKind>().is_err());
    }
}
