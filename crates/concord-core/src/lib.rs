//! # Concord Core
//!
//! Pure primitives for Concord: keys, claims, credentials, and timeframes.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`PublicKey`] - Identifies parties, identities, devices, and feeds
//! - [`Claim`] - Tagged union of the facts a credential can assert
//! - [`Credential`] - A claim plus one or more [`Proof`]s
//! - [`VerifiedCredential`] - A credential with only its valid proofs
//! - [`Timeframe`] - Per-feed sequence vector used for causal gating
//!
//! ## Canonicalization
//!
//! Proofs sign deterministic CBOR. See the [`canonical`] module.

pub mod canonical;
pub mod claim;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod timeframe;
pub mod types;

pub use canonical::{credential_bytes, signed_payload};
pub use claim::{tags, Claim};
pub use credential::{
    now_millis, sign_credential, verify_credential, verify_proof, Credential, CredentialBuilder,
    Proof, ProofType, VerifiedCredential,
};
pub use crypto::{Keypair, PublicKey, Signature};
pub use error::{CoreError, Result};
pub use timeframe::Timeframe;
pub use types::CredentialId;
