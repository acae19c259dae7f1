//! Error types for the policy engine

use thiserror::Error;

/// Policy engine errors
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Malformed field index, arity mismatch, unknown ptype or field name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Lookup of something that must exist (e.g. an undefined field name)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence adapter failed after the in-memory change was applied
    #[error("Adapter failure: {0}")]
    AdapterFailure(String),

    /// A watcher failed after the in-memory change was applied
    #[error("Watcher failure: {0}")]
    WatcherFailure(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PolicyError {
    /// Whether the error was raised after the in-memory model already changed
    pub fn is_post_commit(&self) -> bool {
        matches!(self, Self::AdapterFailure(_) | Self::WatcherFailure(_))
    }
}

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
