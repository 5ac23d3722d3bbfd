//! Error types for bman-rl

use thiserror::Error;

/// Result type for bman-rl operations
pub type Result<T> = std::result::Result<T, BmanError>;

/// bman-rl error types
#[derive(Debug, Error)]
pub enum BmanError {
    /// Engine map does not match the shape it claims
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Action index outside the configured action space
    #[error("Invalid action {action}: action space has {n_actions} actions")]
    InvalidAction { action: i64, n_actions: usize },

    /// Render requested in a mode other than human
    #[error("Unsupported render mode: {0}")]
    UnsupportedRenderMode(String),

    /// Step called before the first reset
    #[error("Episode not started, call reset")]
    EpisodeNotStarted,

    /// Step called after the episode ended
    #[error("Episode terminated, call reset")]
    EpisodeTerminated,

    /// One action per slot is required
    #[error("Expected {expected} actions, got {actual}")]
    ActionCountMismatch { expected: usize, actual: usize },

    /// Display surface failure
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Checkpoint is missing, corrupted, or belongs to another algorithm
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BmanError {
    fn from(err: serde_json::Error) -> Self {
        BmanError::SerializationError(err.to_string())
    }
}
