//! # Memory Crate
//!
//! Conversation memory for agents: decides whether a message needs history,
//! fetches a bounded context block, injects it between the anti-feedback
//! markers, and persists each turn without ever writing injected context
//! back into history.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memory::{Channel, MemoryEngine, SessionMappingKey};
//!
//! # async fn run() {
//! let engine = MemoryEngine::from_env();
//! let key = SessionMappingKey::new(Channel::Telegram, "1001", "main");
//!
//! let augmented = engine.augment(&key, "what did we decide last time?").await;
//! let pending = engine.begin_turn(&key, "msg-1", &augmented.text, false).await;
//! // ... call the model with augmented.text ...
//! engine.complete_turn(pending, "We picked Monday.").await;
//! engine.shutdown().await;
//! # }
//! ```
//!
//! ## Crates
//!
//! - `memory-core` - Types, errors, markers, block formatting, transcripts
//! - `memory-gate` - Lookup decision
//! - `memory-tool` - Subprocess clients for the retrieval backends
//! - `memory-prefetch` - Tiered retrieval
//! - `memory-sync` - Session mapping and turn persistence
//!
//! ## External Interactions
//!
//! - **Retrieval backends**: command-line tools configured by `MEMORY_TOOL_BIN`
//!   and `MEMORY_VECTOR_BIN`
//! - **File system**: session map and transcripts under `MEMORY_STATE_DIR`

pub mod config;
pub mod engine;

pub use config::{env_name, resolve, resolve_with, MemorySettings, SETTINGS_FILE_ENV};
pub use engine::{Augmented, EnvLookup, MemoryEngine};

pub use memory_core::{
    inject, sanitize, AgentContext, BackendKind, Channel, ConversationTurn, GateVerdict,
    MemoryConfig, MemoryError, PrefetchResult, PrefetchTier, SessionHandle, SessionMappingKey,
    TurnRole, Verdict,
};
pub use memory_sync::{PendingTurn, TurnOutcome};
pub use memory_tool::{EscalationClassifier, RetrievalTool, VectorSearchBackend};
