//! Fixed weighted lexicon used when no force or skip pattern applies.
//!
//! Positive weights are recall / history cues, negative weights are real-time
//! or tool-execution cues. English and Chinese entries live side by side.

/// A lexicon entry: normalized pattern and its weight.
pub type WeightedPattern = (&'static str, i32);

pub const RECALL_CUES: &[WeightedPattern] = &[
    ("remember", 2),
    ("recall", 2),
    ("last time", 2),
    ("previously", 2),
    ("earlier", 1),
    ("we discussed", 3),
    ("we talked about", 3),
    ("you said", 2),
    ("you told me", 2),
    ("i told you", 3),
    ("i mentioned", 2),
    ("as before", 1),
    ("our conversation", 2),
    ("history", 1),
    ("记得", 2),
    ("上次", 2),
    ("之前", 2),
    ("以前", 1),
    ("我们聊过", 3),
    ("你说过", 2),
    ("我说过", 2),
    ("提到过", 2),
    ("历史", 1),
];

pub const REALTIME_CUES: &[WeightedPattern] = &[
    ("right now", -1),
    ("today", -1),
    ("latest", -1),
    ("current", -1),
    ("run", -1),
    ("execute", -2),
    ("search the web", -2),
    ("look up online", -2),
    ("install", -1),
    ("现在", -1),
    ("今天", -1),
    ("最新", -1),
    ("执行", -2),
    ("运行", -1),
    ("搜索网页", -2),
];

/// Every entry, recall cues first.
pub fn entries() -> impl Iterator<Item = &'static WeightedPattern> {
    RECALL_CUES.iter().chain(REALTIME_CUES.iter())
}
