//! Error types for the device-bridge layer.

/// Errors produced while running a bridge command.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge executable not found: {executable} (check PATH)")]
    ExecutableNotFound { executable: String },

    #[error("command failed ({command}): {}", .stderr.trim())]
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("unterminated quote in command: {0}")]
    UnterminatedQuote(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether this error should abort the whole run rather than one unit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::ExecutableNotFound { .. })
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
