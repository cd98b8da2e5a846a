//! Error types for the packreplay pipeline.
//!
//! Transient replay failures (the `"ERROR"` sentinel) and exhausted retries are
//! not represented here: they are states of [`crate::replay::ReplayOutcome`].
//! Everything in this enum either ends one sample or halts the whole batch.

use thiserror::Error;

/// Main error type for packreplay operations.
#[derive(Debug, Error)]
pub enum PackReplayError {
    /// An external tool exited with a non-zero status; the batch aborts.
    #[error("Tool '{tool}' failed with exit code {code}")]
    FatalTool {
        tool: String,
        code: i32,
        stderr: String,
    },

    /// Replay output that is neither the sentinel nor a decodable object
    #[error("Malformed replay blob: {0}")]
    MalformedBlob(String),

    /// A tool invocation exceeded the per-attempt wall-clock bound
    #[error("Replay attempt timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PackReplayError {
    /// Process exit status the batch should terminate with.
    ///
    /// Tool failures propagate the child's own code untranslated.
    pub fn exit_code(&self) -> i32 {
        match self {
            PackReplayError::FatalTool { code, .. } => *code,
            _ => 1,
        }
    }
}

impl From<serde_json::Error> for PackReplayError {
    fn from(err: serde_json::Error) -> Self {
        PackReplayError::Serialization(err.to_string())
    }
}

/// Result type alias for packreplay operations
pub type Result<T> = std::result::Result<T, PackReplayError>;
