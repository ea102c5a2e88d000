//! Session identity, dual writeback and reset.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use memory_core::{
    contains_marker, extract_session_id, safe_segment, sanitize, AgentContext, ConversationTurn,
    MemoryConfig, MemoryError, Result, SessionHandle, SessionMappingKey, TurnRole,
};
use memory_tool::RetrievalTool;
use tracing::{debug, info, instrument, warn};

use crate::chain::{ChainHandle, SyncChain};
use crate::session_map::SessionMap;
use crate::writer::{LegacyTranscriptWriter, NativeSessionWriter, TurnWriter};

/// Strips every injected context block before text is persisted anywhere.
pub fn sanitize_for_persistence(text: &str) -> String {
    sanitize(text)
}

/// A turn whose user side has been handled and whose response is pending.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub key: SessionMappingKey,
    pub message_id: String,
    /// Sanitized user text.
    pub user_text: String,
    pub is_internal: bool,
    pub received_at: DateTime<Utc>,
    pub handle: Option<SessionHandle>,
    pub native_write_failed: bool,
    pub fallback_reasons: Vec<String>,
}

/// What happened to a completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub session_id: Option<String>,
    /// Both sides reached the backend session.
    pub native_written: bool,
    /// A legacy writeback was submitted to the agent's chain.
    pub legacy_queued: bool,
    pub fallback_reasons: Vec<String>,
}

/// Session state synchronizer.
///
/// Owns the session map, the per-key resolution locks and the per-agent
/// [`SyncChain`]. Nothing here raises past a turn: failures become fallback
/// reasons and warnings.
///
/// # External Interactions
///
/// - **Rich backend**: `session-create`, `session-message`, `session-commit`, `write-file`
/// - **File system**: `session-map.json` and the per-agent transcripts under the state dir
pub struct SessionSynchronizer {
    tool: Arc<dyn RetrievalTool>,
    sessions: SessionMap,
    key_locks: Mutex<HashMap<SessionMappingKey, Arc<tokio::sync::Mutex<()>>>>,
    chain: SyncChain,
}

impl SessionSynchronizer {
    pub fn new(tool: Arc<dyn RetrievalTool>, state_dir: &Path) -> Self {
        Self {
            tool,
            sessions: SessionMap::new(state_dir),
            key_locks: Mutex::new(HashMap::new()),
            chain: SyncChain::new(),
        }
    }

    pub fn chain(&self) -> &SyncChain {
        &self.chain
    }

    fn key_lock(&self, key: &SessionMappingKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }

    /// Drops the lock entry for `key` when nobody else holds it.
    fn release_key_lock(&self, key: &SessionMappingKey, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map, one in `lock`.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    /// Number of keys with a live resolution lock.
    pub fn tracked_keys(&self) -> usize {
        self.key_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn legacy_writer(&self, config: &MemoryConfig, agent_id: &str) -> LegacyTranscriptWriter {
        LegacyTranscriptWriter::new(
            self.tool.clone(),
            AgentContext::from_config(agent_id, config),
            config.archive_mirror_enabled,
        )
    }

    /// Existing handle for `key`, or a new backend session.
    ///
    /// Concurrent callers for one key are serialized, so at most one session
    /// is ever created per key.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn resolve_or_create_session(
        &self,
        config: &MemoryConfig,
        key: &SessionMappingKey,
    ) -> Result<SessionHandle> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        if let Some(handle) = self.sessions.get(key).await {
            return Ok(handle);
        }
        if !config.native_session_enabled {
            return Err(MemoryError::Configuration("native session mode disabled".to_string()));
        }

        let response = self.tool.session_create().await?;
        let session_id = extract_session_id(&response).ok_or(MemoryError::SessionIdUnavailable)?;
        let handle = SessionHandle::new(session_id);

        if let Err(e) = self.sessions.insert(key.clone(), &handle).await {
            warn!(error = %e, "Failed to persist session map, keeping handle in memory");
        }
        info!(session_id = %handle.session_id, "step: session created");
        Ok(handle)
    }

    /// Existing handle for `key`, without creating one.
    pub async fn lookup_session(&self, key: &SessionMappingKey) -> Option<SessionHandle> {
        self.sessions.get(key).await
    }

    /// Sends one sanitized message to the backend session.
    pub async fn append_turn(
        &self,
        handle: &SessionHandle,
        role: TurnRole,
        text: &str,
    ) -> Result<()> {
        let clean = sanitize_for_persistence(text);
        self.tool
            .session_message(&handle.session_id, role, &clean)
            .await
    }

    /// Commits the session for `key` if one exists, then forgets the mapping.
    ///
    /// The mapping is removed even when the commit fails; the commit error is
    /// still returned.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn commit_and_clear(&self, key: &SessionMappingKey) -> Result<()> {
        let lock = self.key_lock(key);
        let committed = {
            let _guard = lock.lock().await;
            self.commit_locked(key).await
        };
        self.release_key_lock(key, lock);
        committed
    }

    async fn commit_locked(&self, key: &SessionMappingKey) -> Result<()> {
        let Some(handle) = self.sessions.get(key).await else {
            debug!("No session to commit");
            return Ok(());
        };

        let committed = self.tool.session_commit(&handle.session_id).await;
        if let Err(e) = self.sessions.remove(key).await {
            warn!(error = %e, "Failed to persist session map after removal");
        }
        match &committed {
            Ok(()) => info!(session_id = %handle.session_id, "step: session committed"),
            Err(e) => warn!(
                session_id = %handle.session_id,
                reason = %e.reason_code(),
                "Session commit failed"
            ),
        }
        committed
    }

    /// Queues a transcript append (and mirror) on the agent's chain.
    ///
    /// Chains are keyed by the transcript's path segment, so agent ids that
    /// share a transcript file share a chain.
    pub fn writeback_legacy(
        &self,
        config: &MemoryConfig,
        agent_id: &str,
        turn: ConversationTurn,
    ) -> ChainHandle {
        let writer = self.legacy_writer(config, agent_id);
        let agent = agent_id.to_string();
        self.chain.submit(&safe_segment(agent_id), async move {
            if let Err(e) = writer.record_assistant(&turn).await {
                warn!(
                    agent_id = %agent,
                    reason = %e.reason_code(),
                    error = %e,
                    "Legacy writeback failed"
                );
            }
        })
    }

    /// Queues transcript finalization on the agent's chain.
    pub fn finalize_legacy(&self, config: &MemoryConfig, agent_id: &str) -> ChainHandle {
        let writer = self.legacy_writer(config, agent_id);
        let agent = agent_id.to_string();
        self.chain.submit(&safe_segment(agent_id), async move {
            if let Err(e) = writer.finalize().await {
                warn!(
                    agent_id = %agent,
                    reason = %e.reason_code(),
                    error = %e,
                    "Transcript finalize failed"
                );
            }
        })
    }

    /// Handles the user side of a turn as soon as the request arrives.
    #[instrument(skip_all, fields(key = %key, message_id = %message_id))]
    pub async fn begin_turn(
        &self,
        config: &MemoryConfig,
        key: &SessionMappingKey,
        message_id: &str,
        user_text: &str,
        is_internal: bool,
    ) -> PendingTurn {
        let mut pending = PendingTurn {
            key: key.clone(),
            message_id: message_id.to_string(),
            user_text: sanitize_for_persistence(user_text),
            is_internal,
            received_at: Utc::now(),
            handle: None,
            native_write_failed: false,
            fallback_reasons: Vec::new(),
        };

        if is_internal {
            return pending;
        }
        if !config.native_session_enabled {
            pending.fallback_reasons.push("native_session_disabled".to_string());
            return pending;
        }

        let handle = match self.resolve_or_create_session(config, key).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(reason = %e.reason_code(), error = %e, "No native session for turn");
                pending.fallback_reasons.push(e.reason_code());
                return pending;
            }
        };

        let writer = NativeSessionWriter::new(self.tool.clone(), handle.clone());
        let partial = ConversationTurn::new(message_id, pending.user_text.clone(), "", false);
        if let Err(e) = writer.record_user(&partial).await {
            warn!(reason = %e.reason_code(), "Native user write failed");
            pending.native_write_failed = true;
            pending
                .fallback_reasons
                .push(format!("native_user_write_failed={}", e.reason_code()));
        }
        pending.handle = Some(handle);
        pending
    }

    /// Handles the assistant side and decides whether the legacy path runs.
    ///
    /// The legacy append runs whenever the native path did not take the whole
    /// turn; `legacy_sync_enabled` only governs reset finalization.
    #[instrument(skip_all, fields(key = %pending.key, message_id = %pending.message_id))]
    pub async fn complete_turn(
        &self,
        config: &MemoryConfig,
        mut pending: PendingTurn,
        assistant_text: &str,
    ) -> TurnOutcome {
        if contains_marker(assistant_text) {
            let warning = MemoryError::Consistency(
                "response contains a retrieval marker literal".to_string(),
            );
            warn!(reason = %warning.reason_code(), "{}", warning);
        }

        let turn = ConversationTurn {
            message_id: pending.message_id.clone(),
            timestamp_utc: pending.received_at,
            user_text: pending.user_text.clone(),
            assistant_text: sanitize_for_persistence(assistant_text),
            is_internal: pending.is_internal,
        };

        let mut native_written = false;
        if let Some(handle) = pending.handle.clone() {
            if !pending.native_write_failed {
                let writer = NativeSessionWriter::new(self.tool.clone(), handle);
                match writer.record_assistant(&turn).await {
                    Ok(()) => native_written = true,
                    Err(e) => {
                        warn!(reason = %e.reason_code(), "Native assistant write failed");
                        pending.native_write_failed = true;
                        pending
                            .fallback_reasons
                            .push(format!("native_assistant_write_failed={}", e.reason_code()));
                    }
                }
            }
        }

        let needs_legacy = pending.is_internal
            || !config.native_session_enabled
            || pending.handle.is_none()
            || pending.native_write_failed;

        let legacy_queued = needs_legacy;
        if legacy_queued {
            let _ = self.writeback_legacy(config, &pending.key.agent_id, turn);
        }

        info!(
            native_written = native_written,
            legacy_queued = legacy_queued,
            fallback_reasons = ?pending.fallback_reasons,
            "step: turn persisted"
        );

        TurnOutcome {
            session_id: pending.handle.map(|h| h.session_id),
            native_written,
            legacy_queued,
            fallback_reasons: pending.fallback_reasons,
        }
    }

    /// Persists a completed turn through both paths.
    pub async fn persist_turn(
        &self,
        config: &MemoryConfig,
        key: &SessionMappingKey,
        turn: &ConversationTurn,
    ) -> TurnOutcome {
        let mut pending = self
            .begin_turn(config, key, &turn.message_id, &turn.user_text, turn.is_internal)
            .await;
        pending.received_at = turn.timestamp_utc;
        self.complete_turn(config, pending, &turn.assistant_text).await
    }

    /// Explicit reset: commit and forget the native session, then close the
    /// legacy transcript. Waits for the finalize task before returning.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn reset_session(&self, config: &MemoryConfig, key: &SessionMappingKey) {
        if let Err(e) = self.commit_and_clear(key).await {
            warn!(reason = %e.reason_code(), "Commit on reset failed, mapping cleared anyway");
        }
        if config.legacy_sync_enabled {
            self.finalize_legacy(config, &key.agent_id).await;
        }
        info!("step: session reset");
    }

    /// Waits for every outstanding chain across all agents.
    pub async fn drain(&self) {
        self.chain.drain().await;
    }
}
