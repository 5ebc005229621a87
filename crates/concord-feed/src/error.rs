//! Error types for the feed module.

use thiserror::Error;

/// Errors that can occur during feed operations.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A replicated block did not land at the end of its feed.
    #[error("out-of-order block for feed {feed}: expected seq {expected}, got {got}")]
    OutOfOrder { feed: String, expected: u64, got: u64 },

    /// Encoding or decoding of block contents failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// The writer's pipeline has been closed.
    #[error("writer for feed {0} is closed")]
    WriterClosed(String),

    /// A blocking task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
