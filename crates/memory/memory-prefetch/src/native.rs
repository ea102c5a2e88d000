//! Tier 1: structured search on the rich backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use memory_core::{fitting_prefix_len, format_block, format_timestamp, PrefetchTier, SearchHit};
use memory_tool::{RetrievalTool, SearchRequest};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::tier::{RetrievalTier, TierOutcome, TierRequest};

/// `- [<score:.2>] (<category>:<source>) <snippet>`
pub fn format_hit(hit: &SearchHit) -> String {
    format!(
        "- [{:.2}] ({}:{}) {}",
        hit.score,
        hit.category,
        hit.source,
        single_line(&hit.snippet)
    )
}

pub(crate) fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable sort by descending score, then keep the first `max_hits`.
pub fn select_top_hits(mut hits: Vec<SearchHit>, max_hits: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(max_hits);
    hits
}

pub fn hit_distribution(hits: &[SearchHit]) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for hit in hits {
        *distribution.entry(hit.category.clone()).or_insert(0) += 1;
    }
    distribution
}

#[derive(Serialize)]
struct DebugDump<'a> {
    written_at: String,
    agent_id: &'a str,
    query: &'a str,
    session_id: Option<&'a str>,
    hit_count: usize,
    kept: &'a [SearchHit],
    block: &'a str,
}

pub struct NativeSearchTier {
    tool: Arc<dyn RetrievalTool>,
}

impl NativeSearchTier {
    pub fn new(tool: Arc<dyn RetrievalTool>) -> Self {
        Self { tool }
    }

    async fn write_debug_dump(
        &self,
        request: &TierRequest<'_>,
        hit_count: usize,
        kept: &[SearchHit],
        block: &str,
    ) {
        let path = request.context.debug_dump_path();
        let dump = DebugDump {
            written_at: format_timestamp(&Utc::now()),
            agent_id: &request.context.agent_id,
            query: request.query,
            session_id: request.session_id,
            hit_count,
            kept,
            block,
        };
        let body = match serde_json::to_string_pretty(&dump) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to serialize prefetch debug dump");
                return;
            }
        };
        if let Err(e) = tokio::fs::create_dir_all(request.context.agent_dir()).await {
            warn!(error = %e, path = %path.display(), "Failed to create agent state dir");
            return;
        }
        if let Err(e) = tokio::fs::write(&path, body).await {
            warn!(error = %e, path = %path.display(), "Failed to write prefetch debug dump");
        }
    }
}

#[async_trait]
impl RetrievalTier for NativeSearchTier {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn attempt(
        &self,
        request: &TierRequest<'_>,
        diagnostics: &mut Vec<String>,
    ) -> TierOutcome {
        let config = request.config;
        let search = SearchRequest {
            query: request.query.to_string(),
            limit: config.prefetch_max_hits.max(1).saturating_mul(2),
            score_threshold: config.search_score_threshold,
            session_id: request.session_id.map(str::to_string),
        };

        let hits = match self.tool.search(&search).await {
            Ok(hits) => hits,
            Err(e) => {
                let code = e.reason_code();
                warn!(error = %e, reason = %code, "Native search failed, falling back");
                diagnostics.push(format!("native_search_error={}", code));
                return TierOutcome::miss_because(format!("native_search_error={}", code));
            }
        };

        if hits.is_empty() {
            debug!("Native search returned no hits");
            diagnostics.push("native_empty".to_string());
            return TierOutcome::miss_because("native_empty");
        }

        let hit_count = hits.len();
        let kept = select_top_hits(hits, config.prefetch_max_hits);
        let entries: Vec<String> = kept.iter().map(format_hit).collect();
        let block = format_block(&entries, config.prefetch_max_chars);

        diagnostics.push(format!("native_hits={}", hit_count));
        diagnostics.push(format!("native_kept={}", kept.len()));
        diagnostics.push(format!("session_id_used={}", request.session_id.is_some()));

        if block.is_empty() {
            diagnostics.push("native_over_budget".to_string());
            return TierOutcome::miss_because("native_over_budget");
        }

        if config.debug_dump_enabled {
            self.write_debug_dump(request, hit_count, &kept, &block).await;
        }

        info!(
            hit_count = hit_count,
            kept = kept.len(),
            block_chars = block.chars().count(),
            "step: native search produced block"
        );

        let in_block = fitting_prefix_len(&entries, config.prefetch_max_chars);
        TierOutcome::Found {
            block,
            tier: PrefetchTier::Native,
            hit_distribution: Some(hit_distribution(&kept[..in_block])),
        }
    }
}
