//! # memory-prefetch
//!
//! Retrieval orchestrator: given a query, produce a context block no longer
//! than the configured char budget, trying each tier in turn.
//!
//! | Tier | Source | Block tier |
//! |------|--------|------------|
//! | [`NativeSearchTier`] | structured `search` | `native` |
//! | [`LegacySemanticTier`] | `find-uris` + `read` of transcripts | `legacy` |
//! | [`FullTextTier`] | `read` of whole transcripts | `legacy` |
//! | [`VectorTier`] | lightweight backend (`backend = vector`) | `native` |
//!
//! The block is returned without delimiters; the caller brackets it before
//! injecting it into the outbound message.

pub mod legacy;
pub mod native;
pub mod orchestrator;
pub mod tier;
pub mod vector;

pub use legacy::{
    dedup_turns, format_turn, merge_candidates, turns_to_block, FullTextTier, LegacySemanticTier,
};
pub use native::{format_hit, hit_distribution, select_top_hits, NativeSearchTier};
pub use orchestrator::Prefetcher;
pub use tier::{RetrievalTier, TierOutcome, TierRequest};
pub use vector::{format_vector_hit, VectorTier};
