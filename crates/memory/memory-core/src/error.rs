use thiserror::Error;

/// Failure taxonomy of the retrieval and persistence paths.
///
/// None of these are fatal: callers catch them at their own boundary and degrade
/// (tier fallback, legacy writeback, default config value, warning log).
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Tool invocation failed ({verb}): {reason}")]
    ToolInvocation { verb: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Consistency warning: {0}")]
    Consistency(String),

    #[error("Session id unavailable")]
    SessionIdUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    pub fn tool(verb: impl Into<String>, reason: impl Into<String>) -> Self {
        MemoryError::ToolInvocation {
            verb: verb.into(),
            reason: reason.into(),
        }
    }

    /// Machine-parseable code used in diagnostics and fallback reasons.
    pub fn reason_code(&self) -> String {
        match self {
            MemoryError::Configuration(_) => "configuration_error".to_string(),
            MemoryError::ToolInvocation { verb, reason } if reason == "timeout" => {
                format!("{}_timeout", verb.replace('-', "_"))
            }
            MemoryError::ToolInvocation { verb, .. } => {
                format!("{}_failed", verb.replace('-', "_"))
            }
            MemoryError::Parse(_) => "parse_error".to_string(),
            MemoryError::Consistency(_) => "consistency_warning".to_string(),
            MemoryError::SessionIdUnavailable => "session_id_unavailable".to_string(),
            MemoryError::Io(_) => "io_error".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
