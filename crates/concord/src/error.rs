//! Error types for the party core.

use concord_core::{CoreError, PublicKey};
use concord_echo::EchoError;
use concord_feed::FeedError;
use concord_halo::HaloError;
use thiserror::Error;

/// Errors that can occur during party operations.
#[derive(Debug, Error)]
pub enum PartyError {
    /// The operation needs an open party.
    #[error("party {0} is not open")]
    NotOpen(PublicKey),

    /// A snapshot was taken from another party.
    #[error("snapshot belongs to party {actual}, expected {expected}")]
    SnapshotMismatch {
        expected: PublicKey,
        actual: PublicKey,
    },

    /// Snapshot encoding or decoding failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// The database rejected a message or a restore.
    #[error("database error: {0}")]
    Database(String),

    /// A lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Pipeline error.
    #[error("pipeline error: {0}")]
    Echo(#[from] EchoError),

    /// HALO error.
    #[error("halo error: {0}")]
    Halo(#[from] HaloError),

    /// Feed store error.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
}

/// Result type for party operations.
pub type Result<T> = std::result::Result<T, PartyError>;
