//! Feed traits: the abstract interface to append-only logs.
//!
//! A feed is an append-only sequence of opaque blocks owned by one writer
//! and addressed by `(feed_key, seq)`, with `seq` starting at 0. How blocks
//! travel between peers is not this crate's concern; replication layers
//! land remote blocks with [`FeedStore::insert_block`].

use async_trait::async_trait;
use bytes::Bytes;
use concord_core::PublicKey;
use tokio::sync::broadcast;

use crate::error::Result;

/// One block of a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedBlock {
    pub feed_key: PublicKey,
    pub seq: u64,
    pub data: Bytes,
}

/// Notification that a block landed in a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAppended {
    pub feed_key: PublicKey,
    pub seq: u64,
}

/// Result of inserting a replicated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Block was appended.
    Inserted,
    /// Identical block already present (idempotent - not an error).
    AlreadyExists,
    /// A different block already occupies this position.
    Conflict,
}

/// Where a write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReceipt {
    pub feed_key: PublicKey,
    pub seq: u64,
}

/// Async interface for feed persistence.
///
/// # Design Notes
///
/// - **Append-only**: blocks are never modified or removed.
/// - **Contiguous**: a feed of length `n` holds exactly seqs `0..n`.
/// - **Notifying**: every successful append or insert is published to
///   [`FeedStore::subscribe`] receivers, which is what wakes a blocked
///   pipeline.
#[async_trait]
pub trait FeedStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a block to the end of `feed_key`, returning its seq.
    async fn append(&self, feed_key: &PublicKey, data: Bytes) -> Result<u64>;

    /// Land a replicated block at its declared position.
    ///
    /// The block must extend the feed by exactly one, or match what is
    /// already stored at that position.
    async fn insert_block(&self, block: FeedBlock) -> Result<InsertResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the block at `(feed_key, seq)`.
    async fn get_block(&self, feed_key: &PublicKey, seq: u64) -> Result<Option<FeedBlock>>;

    /// Get up to `limit` blocks starting at `from`.
    async fn get_range(&self, feed_key: &PublicKey, from: u64, limit: u64) -> Result<Vec<FeedBlock>>;

    /// Number of blocks in a feed (0 for unknown feeds).
    async fn feed_length(&self, feed_key: &PublicKey) -> Result<u64>;

    /// Every feed holding at least one block.
    async fn list_feeds(&self) -> Result<Vec<PublicKey>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Notifications
    // ─────────────────────────────────────────────────────────────────────────

    /// Receive a notification for each block stored from now on.
    fn subscribe(&self) -> broadcast::Receiver<BlockAppended>;
}

/// Something that turns items into blocks on one writable feed.
#[async_trait]
pub trait FeedWriter<T: Send + 'static>: Send + Sync {
    /// The feed this writer appends to.
    fn feed_key(&self) -> &PublicKey;

    async fn write(&self, item: T) -> Result<WriteReceipt>;
}
