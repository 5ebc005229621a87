//! Golden test vectors for deterministic verification.
//!
//! Every implementation must produce the same signing payload and the same
//! (deterministic Ed25519) signature for these inputs. Keys are derived
//! from single-byte seeds repeated 32 times.

use concord_core::{
    signed_payload, verify_credential, Claim, Credential, CredentialBuilder, Keypair, PublicKey,
};
use serde::Serialize;

/// Claim inputs, as seed bytes of the keys involved.
#[derive(Debug, Clone, Copy, Serialize)]
pub enum GoldenClaim {
    PartyGenesis { party: u8, identity: u8, feed: u8 },
    FeedAdmit { party: u8, feed: u8 },
    Auth { party: u8, identity: u8, device: u8 },
}

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    pub name: &'static str,
    pub claim: GoldenClaim,
    /// Seed byte of the signing key.
    pub signer_seed: u8,
    pub created: i64,
    pub nonce: Option<&'static [u8]>,
    pub expiry: Option<i64>,

    pub expected_signer: &'static str,
    pub expected_payload: &'static str,
    pub expected_signature: &'static str,
}

/// Deterministic keypair from a repeated seed byte.
pub fn seeded_keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

fn seeded_key(seed: u8) -> PublicKey {
    seeded_keypair(seed).public_key()
}

impl GoldenClaim {
    pub fn to_claim(self) -> Claim {
        match self {
            GoldenClaim::PartyGenesis {
                party,
                identity,
                feed,
            } => Claim::PartyGenesis {
                party: seeded_key(party),
                identity: seeded_key(identity),
                feed: seeded_key(feed),
            },
            GoldenClaim::FeedAdmit { party, feed } => Claim::FeedAdmit {
                party: seeded_key(party),
                feed: seeded_key(feed),
            },
            GoldenClaim::Auth {
                party,
                identity,
                device,
            } => Claim::Auth {
                party: seeded_key(party),
                identity: seeded_key(identity),
                device: seeded_key(device),
            },
        }
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "party genesis signed by the party key",
            claim: GoldenClaim::PartyGenesis {
                party: 0x01,
                identity: 0x02,
                feed: 0x03,
            },
            signer_seed: 0x01,
            created: 1736870400000,
            nonce: None,
            expiry: None,
            expected_signer: "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c",
            expected_payload: "a365636c61696da464666565647840656434393238633632386431633263366561653930333338393035393935363132393539323733613563363366393336333663313436313461633837333764316540747970657819636f6e636f72642e68616c6f2e506172747947656e65736973657061727479784038613838653364643734303966313935666435326462326433636261356437326361363730396266316439343132316266333734383830316234306636663563686964656e74697479784038313339373730656138376431373566353661333534363663333463376563636362386438613931623465653337613235646636306635623866633962333934656e6f6e6365f667637265617465641b00000194658b1000",
            expected_signature: "cce695f519e8b6bc15ab3f292f18f098d538bff925835637bf55b2bbc161c2497947933210b965d4e53def610db54518eaac0a3a693d8481ec4d1b68f180f809",
        },
        GoldenVector {
            name: "feed admission signed by a member",
            claim: GoldenClaim::FeedAdmit {
                party: 0x01,
                feed: 0x04,
            },
            signer_seed: 0x02,
            created: 1736870401000,
            nonce: None,
            expiry: None,
            expected_signer: "8139770ea87d175f56a35466c34c7ecccb8d8a91b4ee37a25df60f5b8fc9b394",
            expected_payload: "a365636c61696da36466656564784063613933616331373035313837303731643637623833633766663065666538313038653865633435333035373564373732363837393333336462646162653763654074797065781b636f6e636f72642e68616c6f2e4665656441646d6974436c61696d657061727479784038613838653364643734303966313935666435326462326433636261356437326361363730396266316439343132316266333734383830316234306636663563656e6f6e6365f667637265617465641b00000194658b13e8",
            expected_signature: "e4747e1498e8406a44f7b1862a760977d75914b7364c51e615041eed7b412dfdf129d11865ce8a5c50ff34ecf6287146a3183aeb66d385eb75a4e8c3f1bd2804",
        },
        GoldenVector {
            name: "auth claim with nonce and expiry",
            claim: GoldenClaim::Auth {
                party: 0x01,
                identity: 0x02,
                device: 0x06,
            },
            signer_seed: 0x06,
            created: 1736870400500,
            nonce: Some(&[0x05; 16]),
            expiry: Some(1736870460000),
            expected_signer: "8a875fff1eb38451577acd5afee405456568dd7c89e090863a0557bc7af49f17",
            expected_payload: "a465636c61696da465407479706576636f6e636f72642e68616c6f2e41757468436c61696d65706172747978403861383865336464373430396631393566643532646232643363626135643732636136373039626631643934313231626633373438383031623430663666356366646576696365784038613837356666663165623338343531353737616364356166656534303534353635363864643763383965303930383633613035353762633761663439663137686964656e74697479784038313339373730656138376431373566353661333534363663333463376563636362386438613931623465653337613235646636306635623866633962333934656e6f6e636578203035303530353035303530353035303530353035303530353035303530353035666578706972791b00000194658bfa6067637265617465641b00000194658b11f4",
            expected_signature: "045acb048e72f45477b9de83b9ec097f3910811f0d400bae089eae372bf067579cab2fd7e0096ca251a1f4640a4c2fa55d629433f2c198bbccff9ea347f3070a",
        },
    ]
}

/// Sign the vector's claim with its signer.
pub fn generate_credential_from_vector(vector: &GoldenVector) -> concord_core::Result<Credential> {
    let mut builder = CredentialBuilder::new(vector.claim.to_claim()).created(vector.created);
    if let Some(nonce) = vector.nonce {
        builder = builder.nonce(nonce.to_vec());
    }
    if let Some(expiry) = vector.expiry {
        builder = builder.expiry(expiry);
    }
    builder.sign(&[&seeded_keypair(vector.signer_seed)])
}

/// Check one vector: (payload matches, signature matches and verifies).
pub fn check_vector(vector: &GoldenVector) -> concord_core::Result<(bool, bool)> {
    let claim = vector.claim.to_claim();
    let payload = signed_payload(&claim, vector.created, vector.nonce, vector.expiry)?;
    let payload_ok = hex::encode(&payload) == vector.expected_payload;

    let credential = generate_credential_from_vector(vector)?;
    let verified = verify_credential(&credential, None);
    let signature_ok = credential
        .proofs
        .first()
        .is_some_and(|p| p.signature.to_hex() == vector.expected_signature)
        && !verified.is_empty();
    Ok((payload_ok, signature_ok))
}

/// Verify every vector, reporting `(name, ok)`.
pub fn verify_all_vectors() -> Vec<(String, bool)> {
    all_vectors()
        .iter()
        .map(|v| {
            let ok = matches!(check_vector(v), Ok((true, true)));
            (v.name.to_string(), ok)
        })
        .collect()
}

/// Export the vectors as JSON for other implementations.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}
