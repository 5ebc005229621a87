//! In-memory implementation of the FeedStore trait.
//!
//! Same semantics as SQLite, no persistence. Used by tests and by peers
//! that only need a transient party.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use concord_core::PublicKey;
use tokio::sync::broadcast;

use crate::error::{FeedError, Result};
use crate::traits::{BlockAppended, FeedBlock, FeedStore, FeedWriter, InsertResult, WriteReceipt};

/// Capacity of the append notification channel.
pub(crate) const NOTIFY_CAPACITY: usize = 1024;

/// In-memory feed store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryFeedStore {
    feeds: RwLock<HashMap<PublicKey, Vec<Bytes>>>,
    notify: broadcast::Sender<BlockAppended>,
}

impl MemoryFeedStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            feeds: RwLock::new(HashMap::new()),
            notify,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<PublicKey, Vec<Bytes>>>> {
        self.feeds
            .read()
            .map_err(|e| FeedError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<PublicKey, Vec<Bytes>>>> {
        self.feeds
            .write()
            .map_err(|e| FeedError::LockPoisoned(e.to_string()))
    }

    fn announce(&self, feed_key: PublicKey, seq: u64) {
        // No subscribers is fine.
        let _ = self.notify.send(BlockAppended { feed_key, seq });
    }
}

impl Default for MemoryFeedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedStore for MemoryFeedStore {
    async fn append(&self, feed_key: &PublicKey, data: Bytes) -> Result<u64> {
        let seq = {
            let mut feeds = self.write()?;
            let blocks = feeds.entry(*feed_key).or_default();
            blocks.push(data);
            (blocks.len() - 1) as u64
        };
        self.announce(*feed_key, seq);
        Ok(seq)
    }

    async fn insert_block(&self, block: FeedBlock) -> Result<InsertResult> {
        {
            let mut feeds = self.write()?;
            let blocks = feeds.entry(block.feed_key).or_default();
            let len = blocks.len() as u64;

            if block.seq < len {
                let existing = &blocks[block.seq as usize];
                return Ok(if *existing == block.data {
                    InsertResult::AlreadyExists
                } else {
                    InsertResult::Conflict
                });
            }
            if block.seq > len {
                return Err(FeedError::OutOfOrder {
                    feed: block.feed_key.to_hex(),
                    expected: len,
                    got: block.seq,
                });
            }
            blocks.push(block.data);
        }
        self.announce(block.feed_key, block.seq);
        Ok(InsertResult::Inserted)
    }

    async fn get_block(&self, feed_key: &PublicKey, seq: u64) -> Result<Option<FeedBlock>> {
        let feeds = self.read()?;
        Ok(feeds
            .get(feed_key)
            .and_then(|blocks| blocks.get(seq as usize))
            .map(|data| FeedBlock {
                feed_key: *feed_key,
                seq,
                data: data.clone(),
            }))
    }

    async fn get_range(&self, feed_key: &PublicKey, from: u64, limit: u64) -> Result<Vec<FeedBlock>> {
        let feeds = self.read()?;
        let blocks = match feeds.get(feed_key) {
            Some(blocks) => blocks,
            None => return Ok(Vec::new()),
        };
        Ok(blocks
            .iter()
            .enumerate()
            .skip(from as usize)
            .take(limit as usize)
            .map(|(seq, data)| FeedBlock {
                feed_key: *feed_key,
                seq: seq as u64,
                data: data.clone(),
            })
            .collect())
    }

    async fn feed_length(&self, feed_key: &PublicKey) -> Result<u64> {
        let feeds = self.read()?;
        Ok(feeds.get(feed_key).map_or(0, |blocks| blocks.len() as u64))
    }

    async fn list_feeds(&self) -> Result<Vec<PublicKey>> {
        let feeds = self.read()?;
        let mut keys: Vec<PublicKey> = feeds
            .iter()
            .filter(|(_, blocks)| !blocks.is_empty())
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn subscribe(&self) -> broadcast::Receiver<BlockAppended> {
        self.notify.subscribe()
    }
}

/// Writes raw bytes to one feed of any store.
pub struct RawFeedWriter<S: FeedStore + ?Sized> {
    store: Arc<S>,
    feed_key: PublicKey,
}

impl<S: FeedStore + ?Sized> RawFeedWriter<S> {
    pub fn new(store: Arc<S>, feed_key: PublicKey) -> Self {
        Self { store, feed_key }
    }
}

#[async_trait]
impl<S: FeedStore + ?Sized> FeedWriter<Bytes> for RawFeedWriter<S> {
    fn feed_key(&self) -> &PublicKey {
        &self.feed_key
    }

    async fn write(&self, item: Bytes) -> Result<WriteReceipt> {
        let seq = self.store.append(&self.feed_key, item).await?;
        Ok(WriteReceipt {
            feed_key: self.feed_key,
            seq,
        })
    }
}
