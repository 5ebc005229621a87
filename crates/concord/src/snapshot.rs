//! Party snapshots and the store that keeps them.

use std::collections::HashMap;
use std::sync::RwLock;

use concord_core::{PublicKey, Timeframe};
use concord_halo::HaloStateSnapshot;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::DatabaseSnapshot;
use crate::error::{PartyError, Result};

/// Everything needed to reopen a party without re-reading its feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartySnapshot {
    pub party_key: PublicKey,
    /// The pipeline resumes reading after this timeframe.
    pub timeframe: Timeframe,
    pub halo: HaloStateSnapshot,
    pub database: DatabaseSnapshot,
}

impl PartySnapshot {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| PartyError::Snapshot(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| PartyError::Snapshot(e.to_string()))
    }
}

/// Latest encoded snapshot per party.
///
/// Constructed explicitly and handed to the parties that use it.
#[derive(Default)]
pub struct SnapshotStore {
    snapshots: RwLock<HashMap<PublicKey, Vec<u8>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `snapshot`, replacing any earlier one for the same party.
    pub fn save(&self, snapshot: &PartySnapshot) -> Result<()> {
        let bytes = snapshot.to_bytes()?;
        debug!(party = %snapshot.party_key, size = bytes.len(), "snapshot saved");
        self.snapshots
            .write()
            .map_err(|e| PartyError::LockPoisoned(e.to_string()))?
            .insert(snapshot.party_key, bytes);
        Ok(())
    }

    pub fn load(&self, party_key: &PublicKey) -> Result<Option<PartySnapshot>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|e| PartyError::LockPoisoned(e.to_string()))?;
        snapshots
            .get(party_key)
            .map(|bytes| PartySnapshot::from_bytes(bytes))
            .transpose()
    }

    pub fn remove(&self, party_key: &PublicKey) -> Result<bool> {
        Ok(self
            .snapshots
            .write()
            .map_err(|e| PartyError::LockPoisoned(e.to_string()))?
            .remove(party_key)
            .is_some())
    }

    pub fn parties(&self) -> Result<Vec<PublicKey>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|e| PartyError::LockPoisoned(e.to_string()))?;
        let mut parties: Vec<_> = snapshots.keys().copied().collect();
        parties.sort();
        Ok(parties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::database::ItemSnapshot;

    fn key(b: u8) -> PublicKey {
        PublicKey::from_bytes([b; 32])
    }

    fn snapshot(party: u8) -> PartySnapshot {
        PartySnapshot {
            party_key: key(party),
            timeframe: [(key(9), 4)].into_iter().collect(),
            halo: HaloStateSnapshot {
                party: key(party),
                messages: vec![],
            },
            database: DatabaseSnapshot {
                timeframe: [(key(9), 4)].into_iter().collect(),
                items: vec![ItemSnapshot {
                    item_id: "item".into(),
                    mutations: vec![Bytes::from_static(b"m")],
                }],
            },
        }
    }

    #[test]
    fn test_bytes_roundtrip() {
        let original = snapshot(1);
        let decoded = PartySnapshot::from_bytes(&original.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, original);
        assert!(matches!(
            PartySnapshot::from_bytes(b"\xff"),
            Err(PartyError::Snapshot(_))
        ));
    }

    #[test]
    fn test_store_keeps_latest_per_party() {
        let store = SnapshotStore::new();
        assert!(store.load(&key(1)).unwrap().is_none());

        store.save(&snapshot(1)).unwrap();
        store.save(&snapshot(2)).unwrap();
        let mut newer = snapshot(1);
        newer.timeframe.set(key(9), 7);
        store.save(&newer).unwrap();

        assert_eq!(store.parties().unwrap(), vec![key(1), key(2)]);
        assert_eq!(store.load(&key(1)).unwrap().unwrap().timeframe.get(&key(9)), Some(7));

        assert!(store.remove(&key(1)).unwrap());
        assert!(!store.remove(&key(1)).unwrap());
        assert!(store.load(&key(1)).unwrap().is_none());
    }
}
