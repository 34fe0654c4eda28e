//! Error types for the toi dialogue engine.

/// Top-level error type for the dialogue engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration error (missing credential, bad contract definition).
    #[error("config error: {0}")]
    Config(String),

    /// Rejected user input (empty or over the input cap).
    #[error("input error: {0}")]
    Input(String),

    /// Speech synthesis error.
    #[error("speech error: {0}")]
    Speech(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
