//! Error types for the TradeQ framework

use thiserror::Error;

/// Core error type for agent operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Replay buffer holds fewer transitions than a sample requires
    #[error("Replay buffer underfilled: {required} transitions required, {available} available")]
    BufferUnderfilled {
        /// Transitions the sample asked for
        required: usize,
        /// Transitions currently stored
        available: usize,
    },

    /// Tensor shape disagrees with the configured dimensions
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected dimensions
        expected: Vec<usize>,
        /// Dimensions actually supplied
        actual: Vec<usize>,
    },

    /// Invalid action
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// NaN or infinity surfaced in a training quantity
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
