//! Credentials, proofs, and their verification.
//!
//! A [`Credential`] is created once and never mutated. Each [`Proof`] is an
//! independent Ed25519 signature by one key over the canonical payload
//! `{claim, created, nonce}` (see [`crate::canonical::signed_payload`]).
//!
//! Verification never fails loudly: a bad proof is simply excluded from the
//! resulting [`VerifiedCredential`], and a credential with no surviving
//! proofs contributes nothing to any state machine.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::canonical::{credential_bytes, signed_payload};
use crate::claim::Claim;
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::error::Result;
use crate::types::CredentialId;

/// Signature scheme of a proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofType {
    #[serde(rename = "ED25519")]
    Ed25519,
}

impl ProofType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofType::Ed25519 => "ED25519",
        }
    }
}

/// One signature over a credential's canonical payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    pub signer: PublicKey,

    /// Unix milliseconds at signing time.
    pub created: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Bytes>,

    pub signature: Signature,

    #[serde(rename = "type")]
    pub proof_type: ProofType,
}

/// A signed claim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub claim: Claim,

    /// Unix milliseconds.
    pub issued: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,

    pub proofs: Vec<Proof>,
}

impl Credential {
    /// Content address over the canonical encoding, proofs included.
    pub fn id(&self) -> Result<CredentialId> {
        Ok(CredentialId::hash(&credential_bytes(self)?))
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry.map_or(false, |expiry| now >= expiry)
    }

    /// Keys that attached a proof, valid or not.
    pub fn signers(&self) -> impl Iterator<Item = &PublicKey> {
        self.proofs.iter().map(|p| &p.signer)
    }
}

/// Builder for signing credentials.
///
/// # Example
///
/// ```rust,ignore
/// let credential = CredentialBuilder::new(claim)
///     .nonce(challenge.nonce.clone())
///     .sign(&[&device])?;
/// ```
pub struct CredentialBuilder {
    claim: Claim,
    created: Option<i64>,
    nonce: Option<Bytes>,
    expiry: Option<i64>,
}

impl CredentialBuilder {
    pub fn new(claim: Claim) -> Self {
        Self {
            claim,
            created: None,
            nonce: None,
            expiry: None,
        }
    }

    /// Override the signing timestamp (defaults to now).
    pub fn created(mut self, created: i64) -> Self {
        self.created = Some(created);
        self
    }

    pub fn nonce(mut self, nonce: impl Into<Bytes>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn expiry(mut self, expiry: i64) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Sign with every key, one proof per key, in the order given.
    ///
    /// Repeated keys are signed once.
    pub fn sign(self, signing_keys: &[&Keypair]) -> Result<Credential> {
        let created = self.created.unwrap_or_else(now_millis);
        let payload = signed_payload(&self.claim, created, self.nonce.as_deref(), self.expiry)?;

        let mut proofs: Vec<Proof> = Vec::with_capacity(signing_keys.len());
        for keypair in signing_keys {
            let signer = keypair.public_key();
            if proofs.iter().any(|p| p.signer == signer) {
                continue;
            }
            proofs.push(Proof {
                signer,
                created,
                nonce: self.nonce.clone(),
                signature: keypair.sign(&payload),
                proof_type: ProofType::Ed25519,
            });
        }

        Ok(Credential {
            claim: self.claim,
            issued: created,
            expiry: self.expiry,
            proofs,
        })
    }
}

/// Sign `claim` with each key in `signing_keys`.
pub fn sign_credential(
    claim: Claim,
    signing_keys: &[&Keypair],
    nonce: Option<Bytes>,
    expiry: Option<i64>,
) -> Result<Credential> {
    let mut builder = CredentialBuilder::new(claim);
    if let Some(nonce) = nonce {
        builder = builder.nonce(nonce);
    }
    if let Some(expiry) = expiry {
        builder = builder.expiry(expiry);
    }
    builder.sign(signing_keys)
}

/// Check one proof against the credential it is attached to.
///
/// Returns `false` for anything short of a valid signature by
/// `proof.signer` over the recomputed canonical payload.
pub fn verify_proof(credential: &Credential, proof: &Proof) -> bool {
    if proof.signature == Signature::ZERO {
        return false;
    }
    let payload = match signed_payload(
        &credential.claim,
        proof.created,
        proof.nonce.as_deref(),
        credential.expiry,
    ) {
        Ok(payload) => payload,
        Err(_) => return false,
    };
    proof.signer.verify(&payload, &proof.signature).is_ok()
}

/// A credential together with the subset of its proofs that verified.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifiedCredential {
    credential: Credential,
    proofs: Vec<Proof>,
    feed_key: Option<PublicKey>,
}

impl VerifiedCredential {
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn claim(&self) -> &Claim {
        &self.credential.claim
    }

    /// Proofs that passed verification. Always a subset of the
    /// credential's own proofs, at most one per signer.
    pub fn proofs(&self) -> &[Proof] {
        &self.proofs
    }

    /// The feed this credential was read from, if any.
    pub fn feed_key(&self) -> Option<&PublicKey> {
        self.feed_key.as_ref()
    }

    /// True if no proof verified.
    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }

    /// First verified proof whose signer satisfies `is_authorized`.
    pub fn find_proof(&self, is_authorized: impl Fn(&PublicKey) -> bool) -> Option<&Proof> {
        self.proofs.iter().find(|p| is_authorized(&p.signer))
    }

    /// Verified proof by a specific signer.
    pub fn proof_by(&self, signer: &PublicKey) -> Option<&Proof> {
        self.proofs.iter().find(|p| &p.signer == signer)
    }
}

/// Verify every proof of `credential` and keep the ones that pass.
pub fn verify_credential(credential: &Credential, feed_key: Option<PublicKey>) -> VerifiedCredential {
    let mut proofs: Vec<Proof> = Vec::new();
    for proof in &credential.proofs {
        if proofs.iter().any(|p| p.signer == proof.signer) {
            continue;
        }
        if verify_proof(credential, proof) {
            proofs.push(proof.clone());
        }
    }

    VerifiedCredential {
        credential: credential.clone(),
        proofs,
        feed_key,
    }
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
