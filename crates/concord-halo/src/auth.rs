//! Challenge/response authentication payloads.
//!
//! The verifier issues an [`AuthChallenge`] with a fresh nonce. The peer
//! answers with an `AuthClaim{party, identity, device}` signed by `device`
//! with that nonce, plus any credentials (typically a device chain) needed
//! to show that `device` belongs to `identity`. Verification lives in
//! [`crate::PartyStateManager::authenticate`].

use bytes::Bytes;
use concord_core::{Claim, Credential, CredentialBuilder, Keypair, PublicKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Length of generated challenge nonces.
pub const NONCE_LEN: usize = 32;

/// A challenge issued by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub nonce: Bytes,
}

impl AuthChallenge {
    /// A challenge with a fresh random nonce.
    pub fn generate() -> Self {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self {
            nonce: Bytes::copy_from_slice(&nonce),
        }
    }

    pub fn with_nonce(nonce: impl Into<Bytes>) -> Self {
        Self {
            nonce: nonce.into(),
        }
    }
}

/// A peer's answer to an [`AuthChallenge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub auth: Credential,

    /// Credentials folded into a throwaway copy of the verifier's state.
    #[serde(default)]
    pub supporting: Vec<Credential>,
}

impl AuthResponse {
    /// Sign an `AuthClaim` with `device`, bound to `challenge`.
    pub fn create(
        party: PublicKey,
        identity: PublicKey,
        device: &Keypair,
        challenge: &AuthChallenge,
        supporting: Vec<Credential>,
    ) -> Result<Self> {
        let auth = CredentialBuilder::new(Claim::Auth {
            party,
            identity,
            device: device.public_key(),
        })
        .nonce(challenge.nonce.clone())
        .sign(&[device])?;

        Ok(Self { auth, supporting })
    }
}
