//! Tiers 2 and 3: legacy transcripts, by semantic URI lookup and then by full read.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use memory_core::{
    format_block, format_timestamp, parse_turns, ConversationTurn, MemoryConfig, PrefetchTier,
};
use memory_tool::{RetrievalTool, UriCandidate};
use tracing::{debug, info, warn};

use crate::native::single_line;
use crate::tier::{RetrievalTier, TierOutcome, TierRequest};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TurnKey {
    Message(String, String),
    Content(String, String, String),
}

fn turn_key(turn: &ConversationTurn) -> TurnKey {
    let ts = format_timestamp(&turn.timestamp_utc);
    if turn.message_id.trim().is_empty() {
        TurnKey::Content(ts, turn.user_text.clone(), turn.assistant_text.clone())
    } else {
        TurnKey::Message(turn.message_id.clone(), ts)
    }
}

/// Dedups turns; the last duplicate wins but keeps the slot of the first.
pub fn dedup_turns(turns: Vec<ConversationTurn>) -> Vec<ConversationTurn> {
    let mut slots: HashMap<TurnKey, usize> = HashMap::new();
    let mut out: Vec<ConversationTurn> = Vec::with_capacity(turns.len());
    for turn in turns {
        let key = turn_key(&turn);
        match slots.get(&key) {
            Some(&index) => out[index] = turn,
            None => {
                slots.insert(key, out.len());
                out.push(turn);
            }
        }
    }
    out
}

/// `[<timestamp>] user: <u>\nassistant: <a>`
pub fn format_turn(turn: &ConversationTurn) -> String {
    format!(
        "[{}] user: {}\nassistant: {}",
        format_timestamp(&turn.timestamp_utc),
        single_line(&turn.user_text),
        single_line(&turn.assistant_text)
    )
}

/// Dedup, cap at `max_turns`, then format within the char budget.
pub fn turns_to_block(turns: Vec<ConversationTurn>, config: &MemoryConfig) -> String {
    let mut turns = dedup_turns(turns);
    turns.truncate(config.prefetch_max_turns);
    let entries: Vec<String> = turns.iter().map(format_turn).collect();
    format_block(&entries, config.prefetch_max_chars)
}

/// Merges candidates across targets, dedups by uri in first-seen order, caps at `limit`.
pub fn merge_candidates(candidates: Vec<UriCandidate>, limit: usize) -> Vec<UriCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.uri.clone()))
        .take(limit)
        .collect()
}

pub struct LegacySemanticTier {
    tool: Arc<dyn RetrievalTool>,
}

impl LegacySemanticTier {
    pub fn new(tool: Arc<dyn RetrievalTool>) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl RetrievalTier for LegacySemanticTier {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn attempt(
        &self,
        request: &TierRequest<'_>,
        diagnostics: &mut Vec<String>,
    ) -> TierOutcome {
        let limit = request.config.legacy_search_limit;
        let mut candidates = Vec::new();
        for target in request.context.legacy_targets() {
            match self.tool.find_uris(request.query, &target, limit).await {
                Ok(found) => candidates.extend(found),
                Err(e) => {
                    warn!(target = %target, error = %e, "Legacy uri lookup failed");
                    diagnostics.push(format!("legacy_find_error[{}]={}", target, e.reason_code()));
                }
            }
        }

        let candidates = merge_candidates(candidates, limit);
        diagnostics.push(format!("legacy_candidates={}", candidates.len()));

        let mut turns = Vec::new();
        for candidate in &candidates {
            match self.tool.read(&candidate.uri).await {
                Ok(content) => turns.extend(parse_turns(&content)),
                Err(e) => {
                    debug!(uri = %candidate.uri, error = %e, "Legacy read failed");
                    diagnostics.push(format!(
                        "legacy_read_error[{}]={}",
                        candidate.uri,
                        e.reason_code()
                    ));
                }
            }
        }
        diagnostics.push(format!("legacy_turns={}", turns.len()));

        if turns.is_empty() {
            return TierOutcome::miss();
        }

        let block = turns_to_block(turns, request.config);
        info!(block_chars = block.chars().count(), "step: legacy lookup produced block");
        TierOutcome::Found {
            block,
            tier: PrefetchTier::Legacy,
            hit_distribution: None,
        }
    }
}

pub struct FullTextTier {
    tool: Arc<dyn RetrievalTool>,
}

impl FullTextTier {
    pub fn new(tool: Arc<dyn RetrievalTool>) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl RetrievalTier for FullTextTier {
    fn name(&self) -> &'static str {
        "fulltext"
    }

    async fn attempt(
        &self,
        request: &TierRequest<'_>,
        diagnostics: &mut Vec<String>,
    ) -> TierOutcome {
        let mut turns = Vec::new();
        for target in request.context.legacy_targets() {
            match self.tool.read(&target).await {
                Ok(content) => {
                    let parsed = parse_turns(&content);
                    diagnostics.push(format!(
                        "fulltext[{}] chars={} turns={}",
                        target,
                        content.chars().count(),
                        parsed.len()
                    ));
                    turns.extend(parsed);
                }
                Err(e) => {
                    diagnostics.push(format!("fulltext_error[{}]={}", target, e.reason_code()));
                }
            }
        }

        let block = turns_to_block(turns, request.config);
        TierOutcome::Found {
            block,
            tier: PrefetchTier::Legacy,
            hit_distribution: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn turn(id: &str, secs: i64, user: &str, assistant: &str) -> ConversationTurn {
        ConversationTurn::new(id, user, assistant, false)
            .at(Utc.timestamp_opt(1_790_000_000 + secs, 0).unwrap())
    }

    #[test]
    fn test_dedup_last_wins_at_first_position() {
        let turns = vec![
            turn("m1", 0, "hi", "old answer"),
            turn("m2", 1, "q2", "a2"),
            turn("m1", 0, "hi", "new answer"),
        ];
        let deduped = dedup_turns(turns);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].assistant_text, "new answer");
        assert_eq!(deduped[1].message_id, "m2");
    }

    #[test]
    fn test_dedup_without_message_id_uses_content() {
        let turns = vec![
            turn("", 0, "hi", "a"),
            turn("", 0, "hi", "b"),
            turn("", 0, "hi", "a"),
        ];
        assert_eq!(dedup_turns(turns).len(), 2);
    }

    #[test]
    fn test_merge_candidates() {
        let c = |score: f64, uri: &str| UriCandidate { score, uri: uri.to_string() };
        let merged = merge_candidates(vec![c(0.9, "a"), c(0.8, "b"), c(0.7, "a"), c(0.6, "c")], 2);
        assert_eq!(merged, vec![c(0.9, "a"), c(0.8, "b")]);
    }

    #[test]
    fn test_format_turn() {
        let t = turn("m1", 0, "where is\nthe doc", "in the wiki");
        assert_eq!(
            format_turn(&t),
            format!(
                "[{}] user: where is the doc\nassistant: in the wiki",
                format_timestamp(&t.timestamp_utc)
            )
        );
    }
}
