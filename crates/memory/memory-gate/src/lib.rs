//! # memory-gate
//!
//! Decides whether an inbound message warrants a history lookup before the
//! model call. [`evaluate`] is a pure function of the message and a
//! [`GateConfig`]:
//!
//! 1. Force patterns short-circuit to `yes`.
//! 2. Skip patterns short-circuit to `no`.
//! 3. Otherwise the weighted bilingual lexicon is summed and compared with the
//!    threshold and the ambiguity band.
//!
//! `ambiguous` verdicts can optionally be escalated to the model with
//! [`build_escalation_prompt`] / [`parse_escalation_response`].

pub mod escalation;
pub mod gate;
pub mod lexicon;
pub mod normalize;

pub use escalation::{build_escalation_prompt, parse_escalation_response, EscalationVerdict};
pub use gate::{
    evaluate, lexicon_score, GateBounds, GateConfig, DEFAULT_FORCE_PATTERNS,
    DEFAULT_SKIP_PATTERNS,
};
pub use normalize::normalize;
