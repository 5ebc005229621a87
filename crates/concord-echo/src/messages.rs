//! Feed message types.
//!
//! Every block on a party feed is one CBOR-encoded [`FeedMessage`]: the
//! author's timeframe at write time plus either a HALO credential or an
//! ECHO envelope.

use bytes::Bytes;
use concord_core::{Credential, Timeframe};
use serde::{Deserialize, Serialize};

use crate::error::{EchoError, Result};

/// A message as stored in a feed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
    /// What the author had consumed when writing this message.
    pub timeframe: Timeframe,
    pub payload: Payload,
}

/// The two message families a party feed carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    /// Credential for the admission state machines.
    Halo(Credential),
    /// Application data for the downstream database.
    Echo(EchoEnvelope),
}

/// Application mutation addressed to one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoEnvelope {
    pub item_id: String,
    pub mutation: Bytes,
}

impl EchoEnvelope {
    pub fn new(item_id: impl Into<String>, mutation: impl Into<Bytes>) -> Self {
        Self {
            item_id: item_id.into(),
            mutation: mutation.into(),
        }
    }
}

impl FeedMessage {
    pub fn halo(timeframe: Timeframe, credential: Credential) -> Self {
        Self {
            timeframe,
            payload: Payload::Halo(credential),
        }
    }

    pub fn echo(timeframe: Timeframe, envelope: EchoEnvelope) -> Self {
        Self {
            timeframe,
            payload: Payload::Echo(envelope),
        }
    }

    /// Encode for a feed block.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| EchoError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Decode a feed block.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| EchoError::Decoding(e.to_string()))
    }

    pub fn is_halo(&self) -> bool {
        matches!(self.payload, Payload::Halo(_))
    }

    pub fn credential(&self) -> Option<&Credential> {
        match &self.payload {
            Payload::Halo(credential) => Some(credential),
            Payload::Echo(_) => None,
        }
    }
}
