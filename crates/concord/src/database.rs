//! Database boundary: where ordered ECHO messages end up.
//!
//! The pipeline hands every released ECHO envelope to a [`Database`] through
//! [`DatabaseConsumer`]. A database also records the timeframe it has
//! applied, so a message delivered twice (for example after restoring a
//! snapshot that raced with delivery) is applied once.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use concord_core::Timeframe;
use concord_echo::{InboundMessage, MessageConsumer};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{PartyError, Result};

/// Serializable state of a database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    /// Highest seq applied per feed.
    pub timeframe: Timeframe,
    pub items: Vec<ItemSnapshot>,
}

/// One item and its mutations in delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub item_id: String,
    pub mutations: Vec<Bytes>,
}

/// Consumer of ordered ECHO messages.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Apply one message. Called in delivery order.
    async fn process(&self, message: &InboundMessage) -> Result<()>;

    /// Capture the current state.
    async fn snapshot(&self) -> Result<DatabaseSnapshot>;

    /// Replace the current state with `snapshot`.
    async fn restore(&self, snapshot: &DatabaseSnapshot) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    timeframe: Timeframe,
    items: BTreeMap<String, Vec<Bytes>>,
}

/// In-memory database: items keyed by id, mutations appended in order.
#[derive(Default)]
pub struct MemoryDatabase {
    state: RwLock<MemoryState>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every item seen so far.
    pub fn item_ids(&self) -> Result<Vec<String>> {
        let state = self.read()?;
        Ok(state.items.keys().cloned().collect())
    }

    /// Mutations of one item, oldest first.
    pub fn mutations(&self, item_id: &str) -> Result<Option<Vec<Bytes>>> {
        let state = self.read()?;
        Ok(state.items.get(item_id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.items.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Highest seq applied per feed.
    pub fn timeframe(&self) -> Result<Timeframe> {
        Ok(self.read()?.timeframe.clone())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|e| PartyError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|e| PartyError::LockPoisoned(e.to_string()))
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn process(&self, message: &InboundMessage) -> Result<()> {
        let mut state = self.write()?;
        if state
            .timeframe
            .get(&message.feed_key)
            .is_some_and(|applied| applied >= message.seq)
        {
            debug!(feed = %message.feed_key, seq = message.seq, "already applied");
            return Ok(());
        }
        state
            .items
            .entry(message.envelope.item_id.clone())
            .or_default()
            .push(message.envelope.mutation.clone());
        state.timeframe.set(message.feed_key, message.seq);
        Ok(())
    }

    async fn snapshot(&self) -> Result<DatabaseSnapshot> {
        let state = self.read()?;
        Ok(DatabaseSnapshot {
            timeframe: state.timeframe.clone(),
            items: state
                .items
                .iter()
                .map(|(item_id, mutations)| ItemSnapshot {
                    item_id: item_id.clone(),
                    mutations: mutations.clone(),
                })
                .collect(),
        })
    }

    async fn restore(&self, snapshot: &DatabaseSnapshot) -> Result<()> {
        let mut state = self.write()?;
        state.timeframe = snapshot.timeframe.clone();
        state.items = snapshot
            .items
            .iter()
            .map(|item| (item.item_id.clone(), item.mutations.clone()))
            .collect();
        Ok(())
    }
}

/// Adapts a [`Database`] to the pipeline's [`MessageConsumer`] seam.
///
/// A message the database rejects is logged; delivery continues.
pub struct DatabaseConsumer<D: Database + ?Sized> {
    database: Arc<D>,
}

impl<D: Database + ?Sized> DatabaseConsumer<D> {
    pub fn new(database: Arc<D>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl<D: Database + ?Sized> MessageConsumer for DatabaseConsumer<D> {
    async fn consume(&self, message: InboundMessage) {
        if let Err(e) = self.database.process(&message).await {
            error!(
                feed = %message.feed_key,
                seq = message.seq,
                item = %message.envelope.item_id,
                error = %e,
                "database rejected message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::PublicKey;
    use concord_echo::EchoEnvelope;

    fn key(b: u8) -> PublicKey {
        PublicKey::from_bytes([b; 32])
    }

    fn message(feed: u8, seq: u64, item: &str, mutation: &[u8]) -> InboundMessage {
        InboundMessage {
            feed_key: key(feed),
            seq,
            timeframe: Timeframe::new(),
            envelope: EchoEnvelope::new(item, mutation.to_vec()),
        }
    }

    #[tokio::test]
    async fn test_mutations_append_in_order() {
        let db = MemoryDatabase::new();
        db.process(&message(1, 0, "a", b"1")).await.unwrap();
        db.process(&message(2, 0, "b", b"x")).await.unwrap();
        db.process(&message(1, 1, "a", b"2")).await.unwrap();

        assert_eq!(db.item_ids().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            db.mutations("a").unwrap().unwrap(),
            vec![Bytes::from_static(b"1"), Bytes::from_static(b"2")]
        );
        assert!(db.mutations("missing").unwrap().is_none());
        assert_eq!(db.timeframe().unwrap().get(&key(1)), Some(1));
    }

    #[tokio::test]
    async fn test_redelivery_is_ignored() {
        let db = MemoryDatabase::new();
        db.process(&message(1, 0, "a", b"1")).await.unwrap();
        db.process(&message(1, 1, "a", b"2")).await.unwrap();
        db.process(&message(1, 1, "a", b"2")).await.unwrap();
        db.process(&message(1, 0, "a", b"1")).await.unwrap();

        assert_eq!(db.mutations("a").unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_restore_replaces_state() {
        let db = MemoryDatabase::new();
        db.process(&message(1, 0, "a", b"1")).await.unwrap();
        let snapshot = db.snapshot().await.unwrap();

        db.process(&message(1, 1, "b", b"2")).await.unwrap();
        assert_eq!(db.len().unwrap(), 2);

        db.restore(&snapshot).await.unwrap();
        assert_eq!(db.len().unwrap(), 1);
        assert_eq!(db.snapshot().await.unwrap(), snapshot);

        let fresh = MemoryDatabase::new();
        assert!(fresh.is_empty().unwrap());
        fresh.restore(&snapshot).await.unwrap();
        assert_eq!(fresh.mutations("a").unwrap().unwrap(), vec![Bytes::from_static(b"1")]);
    }

    proptest::proptest! {
        #[test]
        fn prop_redelivery_matches_single_delivery(
            lengths in proptest::collection::vec(0u64..6, 1..4),
            repeats in proptest::collection::vec(0usize..3, 0..8),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let once = MemoryDatabase::new();
                let twice = MemoryDatabase::new();
                for (feed, length) in lengths.iter().enumerate() {
                    for seq in 0..*length {
                        let m = message(feed as u8, seq, "item", &[feed as u8, seq as u8]);
                        once.process(&m).await.unwrap();
                        twice.process(&m).await.unwrap();
                        // Replay an earlier prefix of the same feed.
                        for back in repeats.iter().filter(|r| (**r as u64) <= seq) {
                            let old = seq - *back as u64;
                            let replay = message(feed as u8, old, "item", &[feed as u8, old as u8]);
                            twice.process(&replay).await.unwrap();
                        }
                    }
                }
                assert_eq!(once.snapshot().await.unwrap(), twice.snapshot().await.unwrap());
            });
        }
    }

    #[tokio::test]
    async fn test_consumer_forwards_to_database() {
        let db = Arc::new(MemoryDatabase::new());
        let consumer = DatabaseConsumer::new(db.clone());
        consumer.consume(message(3, 0, "c", b"z")).await;
        assert_eq!(db.item_ids().unwrap(), vec!["c".to_string()]);
    }
}
