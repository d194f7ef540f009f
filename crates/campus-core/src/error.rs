use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Count mismatch: {vectors} vectors for {passages} passages")]
    CountMismatch { vectors: usize, passages: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Snapshot missing, truncated, corrupt or written for another model.
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Another index build is already in progress")]
    BuildInProgress,

    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("Query exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("Build cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
