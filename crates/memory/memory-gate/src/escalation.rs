//! Model-assisted classification for `ambiguous` verdicts.
//!
//! The prompt asks for a strict JSON object; the parser tolerates prose
//! around it but fails with `Parse` when no usable object is present.

use memory_core::{extract_json_object, MemoryError, Result};
use serde::Deserialize;

/// Parsed answer of the escalation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EscalationVerdict {
    pub need_memory: bool,
    #[serde(default)]
    pub reason: String,
}

/// Builds the classification prompt for an ambiguous message.
pub fn build_escalation_prompt(message: &str) -> String {
    format!(
        "You decide whether answering a chat message requires looking up earlier \
conversation history with this user.\n\
Reply with exactly one JSON object and nothing else:\n\
{{\"need_memory\": true|false, \"reason\": \"<short reason>\"}}\n\
Answer true only when the message refers to past conversations, earlier \
decisions, or facts the user shared before. Answer false for questions about \
the present moment, general knowledge, or tasks to execute.\n\n\
Message:\n\"\"\"\n{}\n\"\"\"",
        message.trim()
    )
}

/// Extracts and parses the first balanced JSON object in the model reply.
pub fn parse_escalation_response(text: &str) -> Result<EscalationVerdict> {
    let object = extract_json_object(text)
        .ok_or_else(|| MemoryError::Parse("no JSON object in escalation reply".to_string()))?;
    serde_json::from_str::<EscalationVerdict>(object)
        .map_err(|e| MemoryError::Parse(format!("invalid escalation reply: {}", e)))
}
