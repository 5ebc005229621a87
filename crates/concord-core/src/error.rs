//! Error types for Concord Core.

use thiserror::Error;

/// Core errors that can occur while encoding, decoding, or signing credentials.
///
/// Signature verification failures are deliberately *not* surfaced here by
/// the credential layer: [`crate::verify_proof`] reports them as `false`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed claim: {0}")]
    MalformedClaim(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
