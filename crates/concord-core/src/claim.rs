//! Claims: the typed facts a credential asserts.
//!
//! On the wire a claim is a map with an `@type` discriminator followed by
//! its fields. Tags this crate does not recognize decode to
//! [`Claim::Unknown`], which keeps the fields verbatim so the credential
//! still canonicalizes and verifies, and reducers can ignore it.

use std::collections::BTreeMap;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::canonical::keys;
use crate::crypto::PublicKey;
use crate::error::CoreError;

/// `@type` tags for the claims this crate understands.
pub mod tags {
    pub const PARTY_GENESIS: &str = "concord.halo.PartyGenesis";
    pub const MEMBER: &str = "concord.halo.MemberClaim";
    pub const DEVICE: &str = "concord.halo.DeviceClaim";
    pub const FEED_ADMIT: &str = "concord.halo.FeedAdmitClaim";
    pub const AUTH: &str = "concord.halo.AuthClaim";
}

/// A claim carried by a [`crate::Credential`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawClaim", into = "RawClaim")]
pub enum Claim {
    /// Founds a party: admits the first member and the first feed.
    /// Signed by the party key itself.
    PartyGenesis {
        party: PublicKey,
        identity: PublicKey,
        feed: PublicKey,
    },

    /// Admits `identity` as a member of `party`.
    Member { party: PublicKey, identity: PublicKey },

    /// Admits `device` as a device of `identity`.
    Device { identity: PublicKey, device: PublicKey },

    /// Admits `feed` as a writable feed of `party`.
    FeedAdmit { party: PublicKey, feed: PublicKey },

    /// Binds `device` of `identity` to an authentication challenge.
    Auth {
        party: PublicKey,
        identity: PublicKey,
        device: PublicKey,
    },

    /// A claim with a tag this version does not understand.
    Unknown {
        type_url: String,
        fields: BTreeMap<String, Value>,
    },
}

impl Claim {
    /// The `@type` discriminator.
    pub fn type_url(&self) -> &str {
        match self {
            Claim::PartyGenesis { .. } => tags::PARTY_GENESIS,
            Claim::Member { .. } => tags::MEMBER,
            Claim::Device { .. } => tags::DEVICE,
            Claim::FeedAdmit { .. } => tags::FEED_ADMIT,
            Claim::Auth { .. } => tags::AUTH,
            Claim::Unknown { type_url, .. } => type_url,
        }
    }

    /// The party this claim is scoped to, if any.
    pub fn party(&self) -> Option<&PublicKey> {
        match self {
            Claim::PartyGenesis { party, .. }
            | Claim::Member { party, .. }
            | Claim::FeedAdmit { party, .. }
            | Claim::Auth { party, .. } => Some(party),
            Claim::Device { .. } | Claim::Unknown { .. } => None,
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self, Claim::PartyGenesis { .. })
    }

    /// Named key fields of a known claim, in declaration order.
    fn key_fields(&self) -> Vec<(&'static str, &PublicKey)> {
        match self {
            Claim::PartyGenesis {
                party,
                identity,
                feed,
            } => vec![("party", party), ("identity", identity), ("feed", feed)],
            Claim::Member { party, identity } => vec![("party", party), ("identity", identity)],
            Claim::Device { identity, device } => vec![("identity", identity), ("device", device)],
            Claim::FeedAdmit { party, feed } => vec![("party", party), ("feed", feed)],
            Claim::Auth {
                party,
                identity,
                device,
            } => vec![("party", party), ("identity", identity), ("device", device)],
            Claim::Unknown { .. } => Vec::new(),
        }
    }

    /// Convert to the CBOR value used for canonical encoding.
    ///
    /// Keys and byte strings become hex text.
    pub fn to_value(&self) -> Value {
        let mut entries = vec![(
            Value::Text(keys::TYPE.to_string()),
            Value::Text(self.type_url().to_string()),
        )];
        match self {
            Claim::Unknown { fields, .. } => {
                entries.extend(
                    fields
                        .iter()
                        .map(|(k, v)| (Value::Text(k.clone()), bytes_to_hex(v.clone()))),
                );
            }
            _ => {
                entries.extend(
                    self.key_fields()
                        .into_iter()
                        .map(|(name, key)| (Value::Text(name.to_string()), Value::Text(key.to_hex()))),
                );
            }
        }
        Value::Map(entries)
    }
}

/// Wire form of a claim: the tag plus every other field, untyped.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawClaim {
    #[serde(rename = "@type")]
    type_url: String,

    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

impl From<Claim> for RawClaim {
    fn from(claim: Claim) -> Self {
        match claim {
            Claim::Unknown { type_url, fields } => RawClaim {
                type_url,
                fields: fields
                    .into_iter()
                    .map(|(k, v)| (k, bytes_to_hex(v)))
                    .collect(),
            },
            known => RawClaim {
                type_url: known.type_url().to_string(),
                fields: known
                    .key_fields()
                    .into_iter()
                    .map(|(name, key)| (name.to_string(), Value::Text(key.to_hex())))
                    .collect(),
            },
        }
    }
}

impl TryFrom<RawClaim> for Claim {
    type Error = CoreError;

    fn try_from(raw: RawClaim) -> Result<Self, Self::Error> {
        let key = |name: &str| field_key(&raw.fields, &raw.type_url, name);

        let claim = match raw.type_url.as_str() {
            tags::PARTY_GENESIS => Claim::PartyGenesis {
                party: key("party")?,
                identity: key("identity")?,
                feed: key("feed")?,
            },
            tags::MEMBER => Claim::Member {
                party: key("party")?,
                identity: key("identity")?,
            },
            tags::DEVICE => Claim::Device {
                identity: key("identity")?,
                device: key("device")?,
            },
            tags::FEED_ADMIT => Claim::FeedAdmit {
                party: key("party")?,
                feed: key("feed")?,
            },
            tags::AUTH => Claim::Auth {
                party: key("party")?,
                identity: key("identity")?,
                device: key("device")?,
            },
            _ => Claim::Unknown {
                type_url: raw.type_url,
                fields: raw.fields,
            },
        };
        Ok(claim)
    }
}

/// Replace every byte string in `value`, at any depth, with its hex text.
///
/// JSON has no byte strings, so unknown claim fields must look the same
/// whichever format they were decoded from.
fn bytes_to_hex(value: Value) -> Value {
    match value {
        Value::Bytes(bytes) => Value::Text(hex::encode(bytes)),
        Value::Array(items) => Value::Array(items.into_iter().map(bytes_to_hex).collect()),
        Value::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (bytes_to_hex(k), bytes_to_hex(v)))
                .collect(),
        ),
        Value::Tag(tag, inner) => Value::Tag(tag, Box::new(bytes_to_hex(*inner))),
        other => other,
    }
}

fn field_key(
    fields: &BTreeMap<String, Value>,
    type_url: &str,
    name: &str,
) -> Result<PublicKey, CoreError> {
    match fields.get(name) {
        Some(Value::Text(hex)) => PublicKey::from_hex(hex)
            .map_err(|e| CoreError::MalformedClaim(format!("{type_url}.{name}: {e}"))),
        Some(Value::Bytes(bytes)) => PublicKey::try_from(bytes.as_slice())
            .map_err(|_| CoreError::MalformedClaim(format!("{type_url}.{name}: expected 32 bytes"))),
        Some(_) => Err(CoreError::MalformedClaim(format!(
            "{type_url}.{name}: expected a public key"
        ))),
        None => Err(CoreError::MalformedClaim(format!(
            "{type_url}: missing field {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> PublicKey {
        PublicKey::from_bytes([b; 32])
    }

    #[test]
    fn test_known_claim_json_shape() {
        let claim = Claim::Member {
            party: key(1),
            identity: key(2),
        };
        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["@type"], tags::MEMBER);
        assert_eq!(json["party"], key(1).to_hex());
        assert_eq!(json["identity"], key(2).to_hex());

        let back: Claim = serde_json::from_value(json).unwrap();
        assert_eq!(back, claim);
    }

    #[test]
    fn test_unknown_tag_preserved_verbatim() {
        let json = serde_json::json!({
            "@type": "example.FutureClaim",
            "level": "admin",
        });
        let claim: Claim = serde_json::from_value(json).unwrap();
        match &claim {
            Claim::Unknown { type_url, fields } => {
                assert_eq!(type_url, "example.FutureClaim");
                assert_eq!(fields.get("level"), Some(&Value::Text("admin".into())));
            }
            other => panic!("expected unknown claim, got {:?}", other),
        }
        assert_eq!(claim.type_url(), "example.FutureClaim");
        assert!(claim.party().is_none());
    }

    #[test]
    fn test_unknown_byte_fields_serialize_as_hex() {
        let claim = Claim::Unknown {
            type_url: "example.Blob".into(),
            fields: BTreeMap::from([(
                "nested".to_string(),
                Value::Array(vec![Value::Bytes(vec![0xab, 0xcd])]),
            )]),
        };
        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["nested"][0], "abcd");

        let back: Claim = serde_json::from_value(json).unwrap();
        assert_eq!(back.to_value(), claim.to_value());
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let json = serde_json::json!({
            "@type": tags::DEVICE,
            "identity": key(3).to_hex(),
        });
        assert!(serde_json::from_value::<Claim>(json).is_err());
    }

    #[test]
    fn test_cbor_roundtrip() {
        let claim = Claim::Auth {
            party: key(4),
            identity: key(5),
            device: key(6),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&claim, &mut buf).unwrap();
        let back: Claim = ciborium::from_reader(&buf[..]).unwrap();
        assert_eq!(back, claim);
    }

    #[test]
    fn test_party_scope() {
        let genesis = Claim::PartyGenesis {
            party: key(1),
            identity: key(2),
            feed: key(3),
        };
        assert!(genesis.is_genesis());
        assert_eq!(genesis.party(), Some(&key(1)));

        let device = Claim::Device {
            identity: key(2),
            device: key(3),
        };
        assert!(device.party().is_none());
    }
}
