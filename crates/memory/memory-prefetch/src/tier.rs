//! Tier contract walked by the orchestrator.

use async_trait::async_trait;
use memory_core::{AgentContext, MemoryConfig, PrefetchTier};
use std::collections::BTreeMap;

/// Inputs shared by every tier of one fetch.
#[derive(Debug, Clone, Copy)]
pub struct TierRequest<'a> {
    pub config: &'a MemoryConfig,
    pub context: &'a AgentContext,
    pub query: &'a str,
    pub session_id: Option<&'a str>,
}

/// Result of one tier attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    /// The walk stops here. An empty block is reported as tier `none`.
    Found {
        block: String,
        tier: PrefetchTier,
        hit_distribution: Option<BTreeMap<String, usize>>,
    },
    /// Fall through to the next tier.
    Miss { fallback_reason: Option<String> },
}

impl TierOutcome {
    pub fn miss() -> Self {
        TierOutcome::Miss {
            fallback_reason: None,
        }
    }

    pub fn miss_because(reason: impl Into<String>) -> Self {
        TierOutcome::Miss {
            fallback_reason: Some(reason.into()),
        }
    }
}

/// One level of the fallback chain.
///
/// Tiers never fail: errors become diagnostics plus a [`TierOutcome::Miss`].
#[async_trait]
pub trait RetrievalTier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(
        &self,
        request: &TierRequest<'_>,
        diagnostics: &mut Vec<String>,
    ) -> TierOutcome;
}
