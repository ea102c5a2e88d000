//! # memory-core
//!
//! Shared data model and helpers for conversation memory: turns, session
//! identity, gate verdicts, prefetch results, the error taxonomy, the
//! anti-feedback markers, the char-budget block formatter, the legacy
//! transcript format and tolerant JSON parsing.
//!
//! ## Modules
//!
//! - [`types`] - Turns, channels, session keys and handles, gate verdicts
//! - [`prefetch_result`] - Prefetch result, tiers and hit rows
//! - [`config`] - Resolved [`MemoryConfig`] and per-agent layout
//! - [`error`] - [`MemoryError`] and reason codes
//! - [`markers`] - Inject / sanitize of the delimited context block
//! - [`block`] - [`format_block`]
//! - [`transcript`] - Render and parse legacy transcripts
//! - [`json`] - JSON extraction, repair and session id lookup

pub mod block;
pub mod config;
pub mod error;
pub mod json;
pub mod markers;
pub mod prefetch_result;
pub mod transcript;
pub mod types;

pub use block::{fitting_prefix_len, format_block};
pub use config::{safe_segment, AgentContext, BackendKind, MemoryConfig};
pub use error::{MemoryError, Result};
pub use json::{extract_json_object, extract_session_id, parse_tool_json, repair_json};
pub use markers::{
    contains_marker, inject, sanitize, wrap_block, CONTEXT_BEGIN, CONTEXT_END, CONTEXT_SEPARATOR,
};
pub use prefetch_result::{PrefetchResult, PrefetchTier, SearchHit, VectorHit};
pub use transcript::{
    format_timestamp, parse_turns, render_footer, render_header, render_turn, safe_timestamp,
};
pub use types::{
    Channel, ConversationTurn, GateVerdict, SessionHandle, SessionMappingKey, TurnRole, Verdict,
};
