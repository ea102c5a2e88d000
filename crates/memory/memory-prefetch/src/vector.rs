//! Lightweight backend tier.

use std::sync::Arc;

use async_trait::async_trait;
use memory_core::{format_block, PrefetchTier, VectorHit};
use memory_tool::{VectorQuery, VectorSearchBackend};
use tracing::warn;

use crate::native::single_line;
use crate::tier::{RetrievalTier, TierOutcome, TierRequest};

/// `- [<score:.2>] <source>: <snippet>`
pub fn format_vector_hit(hit: &VectorHit) -> String {
    format!("- [{:.2}] {}: {}", hit.score, hit.source, single_line(&hit.snippet))
}

pub struct VectorTier {
    backend: Arc<dyn VectorSearchBackend>,
}

impl VectorTier {
    pub fn new(backend: Arc<dyn VectorSearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl RetrievalTier for VectorTier {
    fn name(&self) -> &'static str {
        "vector"
    }

    async fn attempt(
        &self,
        request: &TierRequest<'_>,
        diagnostics: &mut Vec<String>,
    ) -> TierOutcome {
        let config = request.config;
        let query = VectorQuery {
            query: request.query.to_string(),
            collection: config.vector_collection.clone(),
            top_k: config.vector_top_k,
            min_score: config.vector_min_score,
        };

        let hits = match self.backend.query(&query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Vector search failed");
                diagnostics.push(format!("vector_search_error={}", e.reason_code()));
                return TierOutcome::miss();
            }
        };

        let entries: Vec<String> = hits.iter().map(format_vector_hit).collect();
        let block = format_block(&entries, config.prefetch_max_chars);
        if block.is_empty() {
            diagnostics.push(format!("vector_hits={}", hits.len()));
            return TierOutcome::miss();
        }

        diagnostics.push("backend=vector".to_string());
        diagnostics.push(format!("vector_hits={}", hits.len()));
        TierOutcome::Found {
            block,
            tier: PrefetchTier::Native,
            hit_distribution: None,
        }
    }
}
