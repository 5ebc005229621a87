//! Error types for the pipeline module.

use thiserror::Error;

/// Errors that can occur while running a pipeline.
///
/// Untrusted feed contents never surface here: undecodable blocks and
/// unadmissible credentials are logged and skipped.
#[derive(Debug, Error)]
pub enum EchoError {
    /// The pipeline was closed and cannot be reopened.
    #[error("pipeline closed")]
    Closed,

    /// `open` called on a running pipeline.
    #[error("pipeline already open")]
    AlreadyOpen,

    /// A write was attempted before a writable feed was set.
    #[error("no writable feed")]
    NoWritableFeed,

    /// Encoding a feed message failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Decoding a feed message failed.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Feed store operation failed.
    #[error("feed error: {0}")]
    Feed(#[from] concord_feed::FeedError),

    /// Credential state operation failed.
    #[error("halo error: {0}")]
    Halo(#[from] concord_halo::HaloError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, EchoError>;
