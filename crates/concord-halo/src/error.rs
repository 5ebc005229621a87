//! Error types for the HALO admission layer.
//!
//! Invalid signatures and unauthorized claims are not errors here; they
//! simply fail to change state. These variants cover caller mistakes.

use thiserror::Error;

/// Errors that can occur during HALO state operations.
#[derive(Debug, Error)]
pub enum HaloError {
    /// A snapshot was restored into a manager that already holds state.
    #[error("cannot restore snapshot: manager already holds {messages} message(s)")]
    NotPristine { messages: usize },

    /// A snapshot belongs to a different party.
    #[error("snapshot party mismatch: expected {expected}, got {actual}")]
    PartyMismatch { expected: String, actual: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] concord_core::CoreError),
}

/// Result type for HALO operations.
pub type Result<T> = std::result::Result<T, HaloError>;
