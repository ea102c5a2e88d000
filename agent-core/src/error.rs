use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Middleware error: {0}")]
    Middleware(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
