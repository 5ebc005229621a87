//! Canonical CBOR encoding for deterministic signing payloads.
//!
//! Rules:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! Public keys and binary blobs are converted to fixed-width hex text before
//! encoding, so two semantically equal credentials produce identical bytes
//! regardless of field insertion order or the format they were decoded from.

use ciborium::value::Value;

use crate::claim::Claim;
use crate::credential::{Credential, Proof};
use crate::error::{CoreError, Result};

/// Text keys of the signed payload and credential maps.
pub mod keys {
    pub const TYPE: &str = "@type";
    pub const CLAIM: &str = "claim";
    pub const CREATED: &str = "created";
    pub const NONCE: &str = "nonce";
    pub const EXPIRY: &str = "expiry";
    pub const ISSUED: &str = "issued";
    pub const PROOFS: &str = "proofs";
    pub const SIGNER: &str = "signer";
    pub const SIGNATURE: &str = "signature";
    pub const PROOF_TYPE: &str = "type";
}

/// Build the bytes a proof signs: `{claim, created, nonce}` plus `expiry`
/// when the credential carries one. The credential's proofs are never part
/// of the payload.
pub fn signed_payload(
    claim: &Claim,
    created: i64,
    nonce: Option<&[u8]>,
    expiry: Option<i64>,
) -> Result<Vec<u8>> {
    let mut entries = vec![
        (text(keys::CLAIM), claim.to_value()),
        (text(keys::CREATED), Value::Integer(created.into())),
        (text(keys::NONCE), nonce_value(nonce)),
    ];
    if let Some(expiry) = expiry {
        entries.push((text(keys::EXPIRY), Value::Integer(expiry.into())));
    }
    encode_canonical(&Value::Map(entries))
}

/// Encode a whole credential, proofs included.
///
/// Used for content addressing (see [`crate::CredentialId`]).
pub fn credential_bytes(credential: &Credential) -> Result<Vec<u8>> {
    let proofs: Vec<Value> = credential.proofs.iter().map(proof_value).collect();

    let mut entries = vec![
        (text(keys::CLAIM), credential.claim.to_value()),
        (text(keys::ISSUED), Value::Integer(credential.issued.into())),
        (text(keys::PROOFS), Value::Array(proofs)),
    ];
    if let Some(expiry) = credential.expiry {
        entries.push((text(keys::EXPIRY), Value::Integer(expiry.into())));
    }
    encode_canonical(&Value::Map(entries))
}

fn proof_value(proof: &Proof) -> Value {
    Value::Map(vec![
        (text(keys::SIGNER), Value::Text(proof.signer.to_hex())),
        (text(keys::CREATED), Value::Integer(proof.created.into())),
        (text(keys::NONCE), nonce_value(proof.nonce.as_deref())),
        (text(keys::SIGNATURE), Value::Text(proof.signature.to_hex())),
        (text(keys::PROOF_TYPE), Value::Text(proof.proof_type.as_str().into())),
    ])
}

fn nonce_value(nonce: Option<&[u8]>) -> Value {
    match nonce {
        Some(n) => Value::Text(hex::encode(n)),
        None => Value::Null,
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Encode a CBOR Value to canonical bytes.
///
/// This function ensures:
/// - Map keys are sorted by encoded byte comparison
/// - Integers use smallest encoding
/// - Definite lengths only
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr)?,
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner)?;
        }
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::EncodingError(
                "floats not supported in canonical encoding".into(),
            ))
        }
        _ => {
            return Err(CoreError::EncodingError(
                "unsupported CBOR value type".into(),
            ))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) -> Result<()> {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item)?;
    }
    Ok(())
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut key_value_pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        key_value_pairs.push((key_buf, v));
    }

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);

    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
