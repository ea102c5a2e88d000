//! Turn persistence paths.
//!
//! A [`TurnWriter`] sees a turn twice: once when the request arrives (user
//! side only) and once when the response is known. The native writer streams
//! each side into the backend session; the legacy writer appends the complete
//! turn to the agent's transcript and mirrors it remotely.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use memory_core::{
    render_footer, render_header, render_turn, safe_timestamp, AgentContext, ConversationTurn,
    Result, SessionHandle, TurnRole,
};
use memory_tool::RetrievalTool;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

#[async_trait]
pub trait TurnWriter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called as soon as the request is known; `turn.assistant_text` is empty.
    async fn record_user(&self, _turn: &ConversationTurn) -> Result<()> {
        Ok(())
    }

    /// Called with the completed turn.
    async fn record_assistant(&self, turn: &ConversationTurn) -> Result<()>;
}

/// Writes each side of a turn as one `session-message` call.
pub struct NativeSessionWriter {
    tool: Arc<dyn RetrievalTool>,
    handle: SessionHandle,
}

impl NativeSessionWriter {
    pub fn new(tool: Arc<dyn RetrievalTool>, handle: SessionHandle) -> Self {
        Self { tool, handle }
    }
}

#[async_trait]
impl TurnWriter for NativeSessionWriter {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn record_user(&self, turn: &ConversationTurn) -> Result<()> {
        self.tool
            .session_message(&self.handle.session_id, TurnRole::User, &turn.user_text)
            .await
    }

    async fn record_assistant(&self, turn: &ConversationTurn) -> Result<()> {
        self.tool
            .session_message(&self.handle.session_id, TurnRole::Assistant, &turn.assistant_text)
            .await
    }
}

/// Append-only transcript at `<state_dir>/<agent>/active.md`.
///
/// # External Interactions
///
/// - **File system**: creates, appends to and finally deletes the local transcript
/// - **Rich backend**: `write-file` mirrors of the active transcript and the
///   closed archive copy (best effort, only when mirroring is enabled)
pub struct LegacyTranscriptWriter {
    tool: Arc<dyn RetrievalTool>,
    context: AgentContext,
    mirror_enabled: bool,
}

impl LegacyTranscriptWriter {
    pub fn new(tool: Arc<dyn RetrievalTool>, context: AgentContext, mirror_enabled: bool) -> Self {
        Self {
            tool,
            context,
            mirror_enabled,
        }
    }

    pub fn context(&self) -> &AgentContext {
        &self.context
    }

    /// Appends one turn, writing the header first when the file is new.
    pub async fn append(&self, turn: &ConversationTurn) -> Result<()> {
        let path = self.context.local_transcript_path();
        tokio::fs::create_dir_all(self.context.agent_dir()).await?;

        let is_new = !tokio::fs::try_exists(&path).await.unwrap_or(false);
        let mut chunk = String::new();
        if is_new {
            chunk.push_str(&render_header(&Utc::now()));
        }
        chunk.push_str(&render_turn(turn));

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(chunk.as_bytes()).await?;
        file.flush().await?;

        debug!(
            agent_id = %self.context.agent_id,
            message_id = %turn.message_id,
            created = is_new,
            "Appended turn to transcript"
        );

        if self.mirror_enabled {
            let content = tokio::fs::read_to_string(&path).await?;
            self.mirror(&self.context.active_uri(), &content).await;
        }
        Ok(())
    }

    /// Closes the transcript: footer, archive mirror, blank remote active copy,
    /// delete the local file. A missing transcript is a no-op.
    pub async fn finalize(&self) -> Result<()> {
        let path = self.context.local_transcript_path();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(agent_id = %self.context.agent_id, "No transcript to finalize");
            return Ok(());
        }

        let closed_at = Utc::now();
        let mut file = tokio::fs::OpenOptions::new().append(true).open(&path).await?;
        file.write_all(render_footer(&closed_at).as_bytes()).await?;
        file.flush().await?;
        drop(file);

        if self.mirror_enabled {
            let content = tokio::fs::read_to_string(&path).await?;
            let archive_uri = self.context.archive_file_uri(&safe_timestamp(&closed_at));
            self.mirror(&archive_uri, &content).await;
            self.mirror(&self.context.active_uri(), "").await;
        }

        tokio::fs::remove_file(&path).await?;
        info!(agent_id = %self.context.agent_id, "step: transcript finalized");
        Ok(())
    }

    async fn mirror(&self, uri: &str, content: &str) {
        if let Err(e) = self.tool.write_file(uri, content).await {
            warn!(uri = %uri, reason = %e.reason_code(), error = %e, "Transcript mirror failed");
        }
    }
}

#[async_trait]
impl TurnWriter for LegacyTranscriptWriter {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn record_assistant(&self, turn: &ConversationTurn) -> Result<()> {
        self.append(turn).await
    }
}
