//! Behavioural tests for the gate decision.

use memory_core::Verdict;
use memory_gate::{evaluate, lexicon_score, normalize, GateConfig};

#[test]
fn test_force_pattern_scenario() {
    let verdict = evaluate("please answer based on memory", &GateConfig::default());

    assert_eq!(verdict.verdict, Verdict::Yes);
    assert!(verdict.reason.starts_with("force_pattern:"));
    assert_eq!(verdict.score, 3);
}

#[test]
fn test_skip_pattern_scenario() {
    let verdict = evaluate("what's the weather today", &GateConfig::default());

    assert_eq!(verdict.verdict, Verdict::No);
    assert!(verdict.reason.starts_with("skip_pattern:"));
    assert_eq!(verdict.score, -1);
}

#[test]
fn test_force_wins_over_skip_and_score() {
    let config = GateConfig {
        force_patterns: vec!["Per Memory".to_string()],
        skip_patterns: vec!["weather".to_string()],
        threshold: 50.0,
        ..Default::default()
    };

    let verdict = evaluate("Weather today, per memory: execute run install", &config);

    assert_eq!(verdict.verdict, Verdict::Yes);
    assert_eq!(verdict.reason, "force_pattern:Per Memory");
    assert_eq!(verdict.score, 51);
}

#[test]
fn test_skip_without_force_is_no_even_with_recall_cues() {
    let verdict = evaluate(
        "do you remember the weather last time we discussed it",
        &GateConfig::default(),
    );
    assert_eq!(verdict.verdict, Verdict::No);
    assert_eq!(verdict.reason, "skip_pattern:weather");
}

#[test]
fn test_score_is_sum_of_matched_weights() {
    let config = GateConfig {
        force_patterns: Vec::new(),
        skip_patterns: Vec::new(),
        ..Default::default()
    };
    let message = "Do you remember what we discussed last time?";
    let (expected, matched) = lexicon_score(&normalize(message));
    assert_eq!(expected, 7);
    assert_eq!(matched, vec!["remember", "last time", "we discussed"]);

    let verdict = evaluate(message, &config);
    assert_eq!(verdict.score, 7);
    assert_eq!(verdict.verdict, Verdict::Yes);
    assert!(verdict.reason.contains("threshold=2"));
    assert!(verdict.reason.contains("matched=[remember,last time,we discussed]"));
}

#[test]
fn test_verdict_law_over_thresholds() {
    let messages = [
        "hello there",
        "you said something earlier",
        "remember this",
        "run the latest build right now",
        "我们聊过的那个方案，你还记得吗",
        "现在执行最新的脚本",
    ];
    for threshold in 1..6 {
        for (low, high) in [(0.0, 0.0), (1.0, 2.0), (3.0, 1.0)] {
            let config = GateConfig {
                threshold: threshold as f64,
                ambiguity_low: low,
                ambiguity_high: high,
                force_patterns: Vec::new(),
                skip_patterns: Vec::new(),
            };
            let bounds = config.bounds();
            for message in messages {
                let verdict = evaluate(message, &config);
                let (score, _) = lexicon_score(&normalize(message));
                assert_eq!(verdict.score, score);
                let expected = if score >= bounds.threshold {
                    Verdict::Yes
                } else if bounds.ambiguity_low <= score && score <= bounds.ambiguity_high {
                    Verdict::Ambiguous
                } else {
                    Verdict::No
                };
                assert_eq!(verdict.verdict, expected, "message={message} threshold={threshold}");
                assert!(verdict.reason.contains(&format!("score={}", score)));
                assert!(verdict.reason.contains("matched=["));
            }
        }
    }
}

#[test]
fn test_ambiguous_band() {
    let verdict = evaluate("tell me about it earlier", &GateConfig::default());
    assert_eq!(verdict.score, 1);
    assert_eq!(verdict.verdict, Verdict::Ambiguous);
    assert_eq!(
        verdict.reason,
        "score=1 in ambiguity=[1,1] threshold=2 matched=[earlier]"
    );
}

#[test]
fn test_no_match_reason_has_empty_list() {
    let verdict = evaluate("hello there", &GateConfig::default());
    assert_eq!(verdict.verdict, Verdict::No);
    assert_eq!(
        verdict.reason,
        "score=0<threshold=2 outside ambiguity=[1,1] matched=[]"
    );
}

#[test]
fn test_chinese_cues() {
    let verdict = evaluate("我们聊过的那个方案，你还记得吗", &GateConfig::default());
    assert_eq!(verdict.verdict, Verdict::Yes);
    assert_eq!(verdict.score, 5);
}
