//! # memory-sync
//!
//! Session state synchronizer: maps each conversation to a backend session,
//! persists turns through the native session and/or the legacy transcript,
//! and closes both on reset.
//!
//! ## Write ordering
//!
//! Every legacy append, finalize and remote mirror for an agent runs on that
//! agent's [`SyncChain`], one task at a time in submission order. Nothing is
//! ordered across agents or between the native and legacy paths.
//!
//! ## Anti-feedback
//!
//! All persisted text goes through [`sanitize_for_persistence`] first, so an
//! injected context block is never written back into history.

pub mod chain;
pub mod session_map;
pub mod synchronizer;
pub mod writer;

pub use chain::{ChainHandle, SyncChain};
pub use session_map::SessionMap;
pub use synchronizer::{sanitize_for_persistence, PendingTurn, SessionSynchronizer, TurnOutcome};
pub use writer::{LegacyTranscriptWriter, NativeSessionWriter, TurnWriter};
