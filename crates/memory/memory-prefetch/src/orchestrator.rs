//! Walks the tiers for one request.

use std::sync::Arc;

use memory_core::{AgentContext, BackendKind, MemoryConfig, PrefetchResult, PrefetchTier};
use memory_tool::{RetrievalTool, VectorSearchBackend};
use tracing::{info, instrument};

use crate::legacy::{FullTextTier, LegacySemanticTier};
use crate::native::NativeSearchTier;
use crate::tier::{RetrievalTier, TierOutcome, TierRequest};
use crate::vector::VectorTier;

/// Retrieval orchestrator.
///
/// # External Interactions
///
/// - **Rich backend**: `search`, `find-uris` and `read` through [`RetrievalTool`]
/// - **Vector backend**: `query` through [`VectorSearchBackend`] when configured
/// - **File system**: optional debug dump under the agent's state dir
pub struct Prefetcher {
    tool: Arc<dyn RetrievalTool>,
    vector: Option<Arc<dyn VectorSearchBackend>>,
}

impl Prefetcher {
    pub fn new(tool: Arc<dyn RetrievalTool>) -> Self {
        Self { tool, vector: None }
    }

    pub fn with_vector_backend(mut self, backend: Arc<dyn VectorSearchBackend>) -> Self {
        self.vector = Some(backend);
        self
    }

    /// Produces a bounded block for `query`. Never fails; every problem is a diagnostic.
    #[instrument(
        skip(self, config, context, query),
        fields(agent_id = %context.agent_id, backend = %config.backend)
    )]
    pub async fn fetch(
        &self,
        config: &MemoryConfig,
        context: &AgentContext,
        query: &str,
        session_id: Option<&str>,
    ) -> PrefetchResult {
        if !config.prefetch_enabled {
            return PrefetchResult::empty("prefetch_disabled");
        }

        let tiers: Vec<Box<dyn RetrievalTier>> = match config.backend {
            BackendKind::Vector => {
                let Some(backend) = self.vector.clone() else {
                    return PrefetchResult::empty("tool_unavailable");
                };
                if !backend.is_available().await {
                    return PrefetchResult::empty("tool_unavailable");
                }
                vec![Box::new(VectorTier::new(backend))]
            }
            BackendKind::Native => {
                if !self.tool.is_available().await {
                    return PrefetchResult::empty("tool_unavailable");
                }
                let mut tiers: Vec<Box<dyn RetrievalTier>> = Vec::with_capacity(3);
                if config.native_search_enabled {
                    tiers.push(Box::new(NativeSearchTier::new(self.tool.clone())));
                }
                tiers.push(Box::new(LegacySemanticTier::new(self.tool.clone())));
                tiers.push(Box::new(FullTextTier::new(self.tool.clone())));
                tiers
            }
        };

        let request = TierRequest {
            config,
            context,
            query,
            session_id,
        };
        walk(&tiers, &request).await
    }
}

async fn walk(tiers: &[Box<dyn RetrievalTier>], request: &TierRequest<'_>) -> PrefetchResult {
    let mut diagnostics = Vec::new();
    let mut fallback_reason: Option<String> = None;

    for tier in tiers {
        match tier.attempt(request, &mut diagnostics).await {
            TierOutcome::Found {
                block,
                tier: found_tier,
                hit_distribution,
            } => {
                let tier_used = if block.is_empty() {
                    PrefetchTier::None
                } else {
                    found_tier
                };
                info!(
                    tier = tier_used.as_str(),
                    via = tier.name(),
                    block_chars = block.chars().count(),
                    "step: prefetch finished"
                );
                return PrefetchResult {
                    block,
                    tier: tier_used,
                    diagnostics,
                    fallback_reason,
                    hit_distribution,
                };
            }
            TierOutcome::Miss {
                fallback_reason: reason,
            } => {
                if fallback_reason.is_none() {
                    fallback_reason = reason;
                }
            }
        }
    }

    info!(tier = "none", "step: prefetch finished without a block");
    PrefetchResult {
        block: String::new(),
        tier: PrefetchTier::None,
        diagnostics,
        fallback_reason,
        hit_distribution: None,
    }
}
