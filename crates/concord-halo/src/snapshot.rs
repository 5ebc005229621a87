//! Replay-log snapshots of HALO state.

use concord_core::{Credential, PublicKey};
use serde::{Deserialize, Serialize};

use crate::error::{HaloError, Result};

/// One logged credential with the feed it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMessage {
    pub credential: Credential,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_key: Option<PublicKey>,
}

/// Every credential that changed a party's state, in fold order.
///
/// Re-folding `messages` from an empty state reproduces the party state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaloStateSnapshot {
    pub party: PublicKey,
    pub messages: Vec<SnapshotMessage>,
}

impl HaloStateSnapshot {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| HaloError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| HaloError::SerializationError(e.to_string()))
    }

    pub fn credentials(&self) -> impl Iterator<Item = &Credential> {
        self.messages.iter().map(|m| &m.credential)
    }
}
