//! # Concord Feed
//!
//! Append-only feed storage for Concord. Provides a trait-based interface
//! with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! Every writer in a party owns one feed: an ordered log of opaque blocks
//! addressed by `(feed_key, seq)`. The [`FeedStore`] trait hides where those
//! blocks live so the pipeline can be storage-agnostic. [`SqliteFeedStore`]
//! persists them; [`MemoryFeedStore`] keeps them in memory for tests.
//!
//! ## Key Types
//!
//! - [`FeedStore`] - The async trait for all feed operations
//! - [`FeedWriter`] - Appends typed items to one feed
//! - [`SqliteFeedStore`] - SQLite-based persistent storage
//! - [`MemoryFeedStore`] - In-memory storage
//! - [`BlockAppended`] - Notification published on every stored block
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use concord_core::Keypair;
//! use concord_feed::{FeedStore, SqliteFeedStore};
//!
//! async fn example() -> concord_feed::Result<()> {
//!     let store = SqliteFeedStore::open("feeds.db")?;
//!     let feed = Keypair::generate().public_key();
//!
//!     let mut appended = store.subscribe();
//!     let seq = store.append(&feed, Bytes::from_static(b"hello")).await?;
//!     assert_eq!(appended.recv().await.ok().map(|e| e.seq), Some(seq));
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: Re-inserting an identical block returns `AlreadyExists`
//! - **Conflict detection**: A different block at an occupied seq returns `Conflict`
//! - **No gaps**: Replicated blocks must arrive in order per feed

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{FeedError, Result};
pub use memory::{MemoryFeedStore, RawFeedWriter};
pub use sqlite::SqliteFeedStore;
pub use traits::{BlockAppended, FeedBlock, FeedStore, FeedWriter, InsertResult, WriteReceipt};
