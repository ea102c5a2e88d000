//! Model-backed classifier for ambiguous gate verdicts.

use async_trait::async_trait;
use memory_core::Result;

/// Answers a strict-JSON classification prompt with raw model text.
///
/// The engine only consults it for `ambiguous` verdicts when gate escalation
/// is enabled; any error is treated as "no memory needed".
#[async_trait]
pub trait EscalationClassifier: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<String>;
}
