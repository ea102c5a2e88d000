//! Memory engine: the single entry point used by the agent pipeline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use memory_core::{
    inject, sanitize, AgentContext, ConversationTurn, GateVerdict, MemoryConfig, PrefetchResult,
    SessionMappingKey, Verdict,
};
use memory_gate::{build_escalation_prompt, evaluate, parse_escalation_response, GateConfig};
use memory_prefetch::Prefetcher;
use memory_sync::{PendingTurn, SessionSynchronizer, TurnOutcome};
use memory_tool::{
    CliRetrievalTool, CliVectorSearch, EscalationClassifier, RetrievalTool, VectorSearchBackend,
};
use tracing::{debug, info, instrument, warn};

use crate::config::{resolve_with, MemorySettings};

/// Environment variable lookup used for config resolution.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Outbound text after the gate and prefetch ran.
#[derive(Debug, Clone, PartialEq)]
pub struct Augmented {
    /// Original message, plus the delimited block when one was found.
    pub text: String,
    /// `None` when the gate is disabled.
    pub verdict: Option<GateVerdict>,
    /// Classifier answer for an `ambiguous` verdict, when one was asked.
    pub escalated: Option<bool>,
    /// `None` when the gate decided no lookup was needed.
    pub prefetch: Option<PrefetchResult>,
}

/// Gate, prefetch and persistence for every agent of the process.
///
/// Retrieval and persistence failures never surface from here; they end up
/// in diagnostics, fallback reasons and logs.
///
/// # External Interactions
///
/// - **Rich backend / vector backend**: through the [`RetrievalTool`] and
///   [`VectorSearchBackend`] handed to the engine
/// - **Escalation model**: optional [`EscalationClassifier`] for ambiguous verdicts
/// - **File system**: state dir of the global config (session map, transcripts)
pub struct MemoryEngine {
    settings: MemorySettings,
    env: EnvLookup,
    global: MemoryConfig,
    configs: Mutex<HashMap<String, Arc<MemoryConfig>>>,
    prefetcher: Prefetcher,
    sync: SessionSynchronizer,
    classifier: Option<Arc<dyn EscalationClassifier>>,
}

impl MemoryEngine {
    /// Engine with CLI tool clients built from the global config.
    pub fn new(settings: MemorySettings) -> Self {
        let env: EnvLookup = Arc::new(|name: &str| std::env::var(name).ok());
        let global = resolve_with(&settings, None, |name| env(name));
        let tool: Arc<dyn RetrievalTool> = Arc::new(CliRetrievalTool::new(
            global.tool_bin.clone(),
            global.prefetch_timeout,
            global.commit_timeout,
        ));
        let vector: Arc<dyn VectorSearchBackend> = Arc::new(CliVectorSearch::new(
            global.vector_bin.clone(),
            global.prefetch_timeout,
        ));
        Self::with_parts(settings, env, tool, Some(vector))
    }

    /// Loads `.env`, the settings file named by `MEMORY_SETTINGS_FILE`, and builds the engine.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::new(MemorySettings::from_env())
    }

    /// Engine over explicit collaborators and environment lookup.
    pub fn with_parts(
        settings: MemorySettings,
        env: EnvLookup,
        tool: Arc<dyn RetrievalTool>,
        vector: Option<Arc<dyn VectorSearchBackend>>,
    ) -> Self {
        let global = resolve_with(&settings, None, |name| env(name));
        let mut prefetcher = Prefetcher::new(tool.clone());
        if let Some(vector) = vector {
            prefetcher = prefetcher.with_vector_backend(vector);
        }
        let sync = SessionSynchronizer::new(tool, &global.state_dir);
        info!(
            backend = %global.backend,
            state_dir = %global.state_dir.display(),
            tool_bin = %global.tool_bin,
            "step: memory engine initialized"
        );
        Self {
            settings,
            env,
            global,
            configs: Mutex::new(HashMap::new()),
            prefetcher,
            sync,
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn EscalationClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn global_config(&self) -> &MemoryConfig {
        &self.global
    }

    pub fn synchronizer(&self) -> &SessionSynchronizer {
        &self.sync
    }

    /// Resolved config for `agent_id`, cached after the first call.
    ///
    /// Process-level options (tool binaries, timeouts, state dir) are taken
    /// from the global config so every agent shares one tool client and one
    /// session map.
    pub fn config_for(&self, agent_id: &str) -> Arc<MemoryConfig> {
        let mut configs = self
            .configs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        configs
            .entry(agent_id.to_string())
            .or_insert_with(|| {
                let env = self.env.clone();
                let mut config = resolve_with(&self.settings, Some(agent_id), |name| env(name));
                config.tool_bin = self.global.tool_bin.clone();
                config.vector_bin = self.global.vector_bin.clone();
                config.prefetch_timeout = self.global.prefetch_timeout;
                config.commit_timeout = self.global.commit_timeout;
                config.state_dir = self.global.state_dir.clone();
                Arc::new(config)
            })
            .clone()
    }

    /// Gate verdict plus the final lookup decision.
    ///
    /// `ambiguous` counts as "no" unless escalation is enabled and a
    /// classifier is attached; then the classifier decides and any failure is "no".
    pub async fn decide(
        &self,
        config: &MemoryConfig,
        message: &str,
    ) -> (Option<GateVerdict>, Option<bool>, bool) {
        if !config.gate_enabled {
            return (None, None, true);
        }

        let verdict = evaluate(message, &GateConfig::from(config));
        debug!(verdict = verdict.verdict.as_str(), reason = %verdict.reason, "Gate evaluated");

        match verdict.verdict {
            Verdict::Yes => (Some(verdict), None, true),
            Verdict::No => (Some(verdict), None, false),
            Verdict::Ambiguous => {
                let escalated = match (&self.classifier, config.gate_escalation_enabled) {
                    (Some(classifier), true) => {
                        Some(self.escalate(classifier.as_ref(), message).await)
                    }
                    _ => None,
                };
                let need = escalated.unwrap_or(false);
                (Some(verdict), escalated, need)
            }
        }
    }

    async fn escalate(&self, classifier: &dyn EscalationClassifier, message: &str) -> bool {
        let prompt = build_escalation_prompt(message);
        let answer = match classifier.classify(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(
                    reason = %e.reason_code(),
                    error = %e,
                    "Gate escalation failed, treating as no"
                );
                return false;
            }
        };
        match parse_escalation_response(&answer) {
            Ok(verdict) => {
                info!(
                    need_memory = verdict.need_memory,
                    reason = %verdict.reason,
                    "step: gate escalated"
                );
                verdict.need_memory
            }
            Err(e) => {
                warn!(
                    reason = %e.reason_code(),
                    error = %e,
                    "Unparseable escalation answer, treating as no"
                );
                false
            }
        }
    }

    /// Gate, prefetch and inject for one inbound message.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn augment(&self, key: &SessionMappingKey, message: &str) -> Augmented {
        let config = self.config_for(&key.agent_id);
        let query = sanitize(message);

        let (verdict, escalated, need_lookup) = self.decide(&config, &query).await;
        if !need_lookup {
            return Augmented {
                text: message.to_string(),
                verdict,
                escalated,
                prefetch: None,
            };
        }

        let context = AgentContext::from_config(&key.agent_id, &config);
        let session_id = self.sync.lookup_session(key).await.map(|h| h.session_id);
        let result = self
            .prefetcher
            .fetch(&config, &context, &query, session_id.as_deref())
            .await;

        info!(
            tier = result.tier.as_str(),
            block_chars = result.block.chars().count(),
            diagnostics = ?result.diagnostics,
            fallback_reason = ?result.fallback_reason,
            "step: context prefetched"
        );

        Augmented {
            text: inject(message, &result.block),
            verdict,
            escalated,
            prefetch: Some(result),
        }
    }

    /// User side of a turn, called before the model runs.
    pub async fn begin_turn(
        &self,
        key: &SessionMappingKey,
        message_id: &str,
        user_text: &str,
        is_internal: bool,
    ) -> PendingTurn {
        let config = self.config_for(&key.agent_id);
        self.sync
            .begin_turn(&config, key, message_id, user_text, is_internal)
            .await
    }

    /// Assistant side of a turn, called once the response is known.
    pub async fn complete_turn(&self, pending: PendingTurn, assistant_text: &str) -> TurnOutcome {
        let config = self.config_for(&pending.key.agent_id);
        self.sync.complete_turn(&config, pending, assistant_text).await
    }

    /// Persists a complete turn in one call.
    pub async fn persist_turn(
        &self,
        key: &SessionMappingKey,
        turn: &ConversationTurn,
    ) -> TurnOutcome {
        let config = self.config_for(&key.agent_id);
        self.sync.persist_turn(&config, key, turn).await
    }

    /// Explicit conversation reset.
    pub async fn reset_session(&self, key: &SessionMappingKey) {
        let config = self.config_for(&key.agent_id);
        self.sync.reset_session(&config, key).await;
    }

    /// Waits for every outstanding write before the process exits.
    pub async fn shutdown(&self) {
        info!(pending_agents = self.sync.chain().pending_agents(), "step: draining memory writes");
        self.sync.drain().await;
    }
}
