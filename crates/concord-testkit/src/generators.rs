//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use bytes::Bytes;
use concord_core::{Claim, Credential, CredentialBuilder, Keypair, PublicKey, Timeframe};
use proptest::prelude::*;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random public key (not necessarily a valid curve point).
pub fn public_key() -> impl Strategy<Value = PublicKey> {
    any::<[u8; 32]>().prop_map(PublicKey::from_bytes)
}

/// A key drawn from a small pool, so collisions actually happen.
pub fn pooled_key(pool: u8) -> impl Strategy<Value = PublicKey> {
    (0..pool).prop_map(|b| PublicKey::from_bytes([b; 32]))
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800_000i64
}

/// Generate a timeframe over a pool of feeds.
pub fn timeframe(feeds: u8, max_seq: u64) -> impl Strategy<Value = Timeframe> {
    prop::collection::vec((pooled_key(feeds), 0..=max_seq), 0..=feeds as usize)
        .prop_map(|frames| frames.into_iter().collect())
}

/// Generate any claim, including unknown ones.
pub fn claim() -> impl Strategy<Value = Claim> {
    prop_oneof![
        (public_key(), public_key(), public_key()).prop_map(|(party, identity, feed)| {
            Claim::PartyGenesis {
                party,
                identity,
                feed,
            }
        }),
        (public_key(), public_key())
            .prop_map(|(party, identity)| Claim::Member { party, identity }),
        (public_key(), public_key())
            .prop_map(|(identity, device)| Claim::Device { identity, device }),
        (public_key(), public_key()).prop_map(|(party, feed)| Claim::FeedAdmit { party, feed }),
        (public_key(), public_key(), public_key()).prop_map(|(party, identity, device)| {
            Claim::Auth {
                party,
                identity,
                device,
            }
        }),
        ("[a-z]{1,8}\\.[A-Z][a-zA-Z]{0,12}", prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..4))
            .prop_map(|(type_url, fields)| Claim::Unknown {
                type_url,
                fields: fields
                    .into_iter()
                    .map(|(k, v)| (k, ciborium::value::Value::Integer(v.into())))
                    .collect::<BTreeMap<_, _>>(),
            }),
    ]
}

/// Parameters for generating a credential.
#[derive(Debug, Clone)]
pub struct CredentialParams {
    pub claim: Claim,
    pub signers: Vec<Keypair>,
    pub created: i64,
    pub nonce: Option<Vec<u8>>,
    pub expiry: Option<i64>,
}

impl Arbitrary for CredentialParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            claim(),
            prop::collection::vec(keypair(), 1..4),
            timestamp(),
            prop::option::of(prop::collection::vec(any::<u8>(), 0..32)),
            prop::option::of(timestamp()),
        )
            .prop_map(|(claim, signers, created, nonce, expiry)| CredentialParams {
                claim,
                signers,
                created,
                nonce,
                expiry,
            })
            .boxed()
    }
}

/// Sign a credential from parameters.
pub fn credential_from_params(params: &CredentialParams) -> concord_core::Result<Credential> {
    let mut builder = CredentialBuilder::new(params.claim.clone()).created(params.created);
    if let Some(nonce) = &params.nonce {
        builder = builder.nonce(Bytes::from(nonce.clone()));
    }
    if let Some(expiry) = params.expiry {
        builder = builder.expiry(expiry);
    }
    let signers: Vec<&Keypair> = params.signers.iter().collect();
    builder.sign(&signers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{credential_bytes, verify_credential, verify_proof, Signature};

    proptest! {
        #[test]
        fn test_credential_id_deterministic(params: CredentialParams) {
            let c1 = credential_from_params(&params).unwrap();
            let c2 = credential_from_params(&params).unwrap();

            prop_assert_eq!(credential_bytes(&c1).unwrap(), credential_bytes(&c2).unwrap());
            prop_assert_eq!(c1.id().unwrap(), c2.id().unwrap());
        }

        #[test]
        fn test_every_signer_verifies(params: CredentialParams) {
            let credential = credential_from_params(&params).unwrap();
            let verified = verify_credential(&credential, None);

            for signer in &params.signers {
                prop_assert!(verified.proof_by(&signer.public_key()).is_some());
            }
        }

        #[test]
        fn test_tampered_signature_is_excluded(params: CredentialParams, flip in 0usize..64) {
            let mut credential = credential_from_params(&params).unwrap();
            let mut bytes = *credential.proofs[0].signature.as_bytes();
            bytes[flip] ^= 0x01;
            credential.proofs[0].signature = Signature::from_bytes(bytes);

            prop_assert!(!verify_proof(&credential, &credential.proofs[0]));
        }

        #[test]
        fn test_claim_survives_cbor(claim in claim()) {
            let mut buf = Vec::new();
            ciborium::into_writer(&claim, &mut buf).unwrap();
            let decoded: Claim = ciborium::from_reader(buf.as_slice()).unwrap();
            prop_assert_eq!(decoded, claim);
        }

        #[test]
        fn test_merge_is_commutative(a in timeframe(4, 20), b in timeframe(4, 20)) {
            let mut ab = a.clone();
            ab.merge(&b);
            let mut ba = b.clone();
            ba.merge(&a);
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn test_merged_timeframe_has_no_dependencies(a in timeframe(4, 20), b in timeframe(4, 20)) {
            let mut merged = a.clone();
            merged.merge(&b);
            prop_assert!(Timeframe::dependencies(&a, &merged).is_empty());
            prop_assert!(Timeframe::dependencies(&b, &merged).is_empty());
        }
    }
}
