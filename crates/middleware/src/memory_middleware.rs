//! # Memory Middleware
//!
//! ## MemoryMiddleware
//!
//! `before()` runs the gate and prefetch for the inbound message, rewrites
//! `request.outbound` with the injected context block and records the user
//! side of the turn. `after()` records the assistant side when the chain
//! produced a `Reply`. A message equal to the reset command ends the
//! conversation's session and stops the chain.
//!
//! # External Interactions
//!
//! - **MemoryEngine**: all retrieval and persistence goes through it; its
//!   failures are logged and never fail the chain

use std::collections::HashMap;
use std::sync::Arc;

use agent_core::{AgentRequest, HandlerResponse, Middleware, Result};
use async_trait::async_trait;
use memory::{MemoryEngine, PendingTurn};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

pub const DEFAULT_RESET_COMMAND: &str = "/reset";

pub struct MemoryMiddleware {
    engine: Arc<MemoryEngine>,
    reset_command: String,
    /// User halves waiting for their reply, by inbound message id.
    pub(crate) pending: Mutex<HashMap<String, PendingTurn>>,
}

impl MemoryMiddleware {
    pub fn new(engine: Arc<MemoryEngine>) -> Self {
        Self {
            engine,
            reset_command: DEFAULT_RESET_COMMAND.to_string(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_reset_command(mut self, command: impl Into<String>) -> Self {
        self.reset_command = command.into();
        self
    }

    pub fn engine(&self) -> &Arc<MemoryEngine> {
        &self.engine
    }

    /// Drains queued transcript writes. Call once before exit.
    pub async fn shutdown(&self) {
        let dropped = {
            let mut pending = self.pending.lock().await;
            let count = pending.len();
            pending.clear();
            count
        };
        if dropped > 0 {
            warn!(dropped, "Pending turns without a reply dropped at shutdown");
        }
        self.engine.shutdown().await;
    }

    fn is_reset(&self, content: &str) -> bool {
        !self.reset_command.is_empty() && content.trim() == self.reset_command
    }
}

#[async_trait]
impl Middleware for MemoryMiddleware {
    #[instrument(
        skip_all,
        fields(message_id = %request.message.id, agent_id = %request.message.agent_id)
    )]
    async fn before(&self, request: &mut AgentRequest) -> Result<bool> {
        let key = request.message.session_key();

        if self.is_reset(&request.message.content) {
            info!(key = %key, "step: MemoryMiddleware before, resetting session");
            self.engine.reset_session(&key).await;
            return Ok(false);
        }

        let augmented = self.engine.augment(&key, &request.outbound).await;
        let injected = augmented.text.len() != request.outbound.len();
        request.outbound = augmented.text;

        let pending = self
            .engine
            .begin_turn(
                &key,
                &request.message.id,
                &request.message.content,
                request.message.is_internal,
            )
            .await;
        self.pending
            .lock()
            .await
            .insert(request.message.id.clone(), pending);

        info!(
            key = %key,
            injected,
            verdict = ?augmented.verdict.as_ref().map(|v| v.verdict),
            tier = ?augmented.prefetch.as_ref().map(|p| p.tier),
            "step: MemoryMiddleware before done"
        );
        Ok(true)
    }

    #[instrument(
        skip_all,
        fields(message_id = %request.message.id, agent_id = %request.message.agent_id)
    )]
    async fn after(&self, request: &AgentRequest, response: &HandlerResponse) -> Result<()> {
        let pending = self.pending.lock().await.remove(&request.message.id);
        let Some(pending) = pending else {
            return Ok(());
        };

        match response {
            HandlerResponse::Reply(text) => {
                let outcome = self.engine.complete_turn(pending, text).await;
                info!(
                    native_written = outcome.native_written,
                    legacy_queued = outcome.legacy_queued,
                    fallback_reasons = ?outcome.fallback_reasons,
                    "step: MemoryMiddleware after done, turn persisted"
                );
            }
            _ => {
                info!("step: MemoryMiddleware after done (no Reply, turn not persisted)");
            }
        }
        Ok(())
    }
}
