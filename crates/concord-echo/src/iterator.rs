//! Read cursors over a set of feeds.
//!
//! The iterator keeps one cursor per tracked feed and a decoded head
//! (the block at the cursor) for each feed that has one. The pipeline asks
//! for the heads, lets the selector choose, and takes the chosen head,
//! which moves that feed's cursor forward by one.

use std::collections::BTreeMap;
use std::sync::Arc;

use concord_core::{PublicKey, Timeframe};
use concord_feed::FeedStore;

use crate::error::Result;
use crate::selector::Candidate;

pub struct FeedSetIterator<S: FeedStore + ?Sized> {
    store: Arc<S>,
    start: Timeframe,
    cursors: BTreeMap<PublicKey, u64>,
    heads: BTreeMap<PublicKey, Candidate>,
}

impl<S: FeedStore + ?Sized> FeedSetIterator<S> {
    /// Read every feed from just after its position in `start`.
    pub fn new(store: Arc<S>, start: Timeframe) -> Self {
        Self {
            store,
            start,
            cursors: BTreeMap::new(),
            heads: BTreeMap::new(),
        }
    }

    /// Start tracking a feed. Returns false if it was already tracked.
    pub fn add_feed(&mut self, feed_key: PublicKey) -> bool {
        if self.cursors.contains_key(&feed_key) {
            return false;
        }
        let cursor = self.start.get(&feed_key).map_or(0, |seq| seq + 1);
        self.cursors.insert(feed_key, cursor);
        true
    }

    pub fn has_feed(&self, feed_key: &PublicKey) -> bool {
        self.cursors.contains_key(feed_key)
    }

    pub fn feeds(&self) -> impl Iterator<Item = &PublicKey> {
        self.cursors.keys()
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Next seq to be read from a feed.
    pub fn cursor(&self, feed_key: &PublicKey) -> Option<u64> {
        self.cursors.get(feed_key).copied()
    }

    /// Load missing heads and return every feed's current head.
    pub async fn poll_heads(&mut self) -> Result<Vec<Candidate>> {
        for (feed_key, cursor) in &self.cursors {
            if self.heads.contains_key(feed_key) {
                continue;
            }
            if let Some(block) = self.store.get_block(feed_key, *cursor).await? {
                self.heads.insert(*feed_key, Candidate::decode(&block));
            }
        }
        Ok(self.heads.values().cloned().collect())
    }

    /// Consume the head of `feed_key`, advancing its cursor.
    pub fn take(&mut self, feed_key: &PublicKey) -> Option<Candidate> {
        let candidate = self.heads.remove(feed_key)?;
        self.cursors.insert(*feed_key, candidate.seq + 1);
        Some(candidate)
    }

    /// Positions currently waiting at the head of each feed.
    pub fn pending(&self) -> Vec<(PublicKey, u64)> {
        self.heads.values().map(|c| (c.feed_key, c.seq)).collect()
    }
}
