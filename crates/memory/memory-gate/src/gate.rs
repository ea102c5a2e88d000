//! Gate decision: force / skip patterns, then the weighted lexicon score.

use memory_core::{GateVerdict, MemoryConfig, Verdict};
use tracing::debug;

use crate::lexicon;
use crate::normalize::{contains_term, normalize};

/// Default patterns that always trigger a lookup.
pub const DEFAULT_FORCE_PATTERNS: &[&str] = &[
    "based on memory",
    "from memory",
    "check your memory",
    "search your memory",
    "use your memory",
    "根据记忆",
    "查一下记忆",
    "翻一下记忆",
    "回忆一下",
];

/// Default patterns that always skip a lookup.
pub const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    "weather",
    "what time is it",
    "translate this",
    "天气",
    "几点了",
    "翻译一下",
];

/// Tunables for [`evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    /// Score needed for `yes`. Floored, minimum 1.
    pub threshold: f64,
    /// Lower bound of the ambiguous band. Clamped to `[0, threshold - 1]`.
    pub ambiguity_low: f64,
    /// Upper bound of the ambiguous band. Clamped to `[0, threshold - 1]`.
    pub ambiguity_high: f64,
    pub force_patterns: Vec<String>,
    pub skip_patterns: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold: 2.0,
            ambiguity_low: 1.0,
            ambiguity_high: 1.0,
            force_patterns: DEFAULT_FORCE_PATTERNS.iter().map(|p| p.to_string()).collect(),
            skip_patterns: DEFAULT_SKIP_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl From<&MemoryConfig> for GateConfig {
    /// Empty pattern lists in the memory config mean "use the built-in lists".
    fn from(config: &MemoryConfig) -> Self {
        let defaults = GateConfig::default();
        let or_default = |configured: &Vec<String>, fallback: Vec<String>| {
            if configured.is_empty() {
                fallback
            } else {
                configured.clone()
            }
        };
        Self {
            threshold: config.gate_threshold,
            ambiguity_low: config.gate_ambiguity_low,
            ambiguity_high: config.gate_ambiguity_high,
            force_patterns: or_default(&config.gate_force_patterns, defaults.force_patterns),
            skip_patterns: or_default(&config.gate_skip_patterns, defaults.skip_patterns),
        }
    }
}

/// Integer bounds derived from a [`GateConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateBounds {
    pub threshold: i32,
    pub ambiguity_low: i32,
    pub ambiguity_high: i32,
}

impl GateConfig {
    pub fn bounds(&self) -> GateBounds {
        let threshold = floor_to_i32(self.threshold).max(1);
        let clamp = |value: f64| floor_to_i32(value).clamp(0, threshold - 1);
        let low = clamp(self.ambiguity_low);
        let high = clamp(self.ambiguity_high);
        GateBounds {
            threshold,
            ambiguity_low: low.min(high),
            ambiguity_high: low.max(high),
        }
    }
}

fn floor_to_i32(value: f64) -> i32 {
    if value.is_nan() {
        0
    } else {
        value.floor().clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }
}

fn first_matching<'a>(normalized: &str, patterns: &'a [String]) -> Option<&'a str> {
    patterns
        .iter()
        .map(|pattern| pattern.trim())
        .filter(|pattern| !pattern.is_empty())
        .find(|pattern| {
            let normalized_pattern = normalize(pattern);
            !normalized_pattern.is_empty() && normalized.contains(&normalized_pattern)
        })
}

/// Sum of matched lexicon weights and the matched pattern names, in lexicon order.
pub fn lexicon_score(normalized: &str) -> (i32, Vec<&'static str>) {
    let mut score = 0;
    let mut matched = Vec::new();
    for (pattern, weight) in lexicon::entries() {
        if contains_term(normalized, pattern) {
            score += weight;
            matched.push(*pattern);
        }
    }
    (score, matched)
}

/// Decides whether a history lookup is warranted for `message`. Pure.
pub fn evaluate(message: &str, config: &GateConfig) -> GateVerdict {
    let normalized = normalize(message);
    let bounds = config.bounds();

    if let Some(pattern) = first_matching(&normalized, &config.force_patterns) {
        return GateVerdict {
            verdict: Verdict::Yes,
            reason: format!("force_pattern:{}", pattern),
            score: bounds.threshold + 1,
        };
    }

    if let Some(pattern) = first_matching(&normalized, &config.skip_patterns) {
        return GateVerdict {
            verdict: Verdict::No,
            reason: format!("skip_pattern:{}", pattern),
            score: -1,
        };
    }

    let (score, matched) = lexicon_score(&normalized);
    let matched = format!("[{}]", matched.join(","));

    let (verdict, reason) = if score >= bounds.threshold {
        (
            Verdict::Yes,
            format!("score={}>=threshold={} matched={}", score, bounds.threshold, matched),
        )
    } else if bounds.ambiguity_low <= score && score <= bounds.ambiguity_high {
        (
            Verdict::Ambiguous,
            format!(
                "score={} in ambiguity=[{},{}] threshold={} matched={}",
                score, bounds.ambiguity_low, bounds.ambiguity_high, bounds.threshold, matched
            ),
        )
    } else {
        (
            Verdict::No,
            format!(
                "score={}<threshold={} outside ambiguity=[{},{}] matched={}",
                score, bounds.threshold, bounds.ambiguity_low, bounds.ambiguity_high, matched
            ),
        )
    };

    debug!(verdict = verdict.as_str(), score, reason = %reason, "gate evaluated");

    GateVerdict {
        verdict,
        reason,
        score,
    }
}
