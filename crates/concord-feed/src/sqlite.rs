//! SQLite implementation of the FeedStore trait.
//!
//! The persistent backend. Uses rusqlite with bundled SQLite, wrapped in
//! async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use concord_core::PublicKey;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;

use crate::error::{FeedError, Result};
use crate::memory::NOTIFY_CAPACITY;
use crate::migration;
use crate::traits::{BlockAppended, FeedBlock, FeedStore, InsertResult};

/// SQLite-based feed store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteFeedStore {
    conn: Arc<Mutex<Connection>>,
    notify: broadcast::Sender<BlockAppended>,
}

impl SqliteFeedStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            notify,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| FeedError::LockPoisoned(format!("connection mutex: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| FeedError::Task(format!("spawn_blocking failed: {}", e)))?
    }

    fn announce(&self, feed_key: PublicKey, seq: u64) {
        let _ = self.notify.send(BlockAppended { feed_key, seq });
    }
}

fn feed_length_in(conn: &Connection, feed_key: &PublicKey) -> Result<u64> {
    let len: i64 = conn.query_row(
        "SELECT COUNT(*) FROM blocks WHERE feed_key = ?1",
        params![feed_key.as_bytes().as_slice()],
        |row| row.get(0),
    )?;
    Ok(len as u64)
}

fn insert_at(conn: &Connection, feed_key: &PublicKey, seq: u64, data: &[u8]) -> Result<()> {
    conn.execute(
        "INSERT INTO blocks (feed_key, seq, data, stored_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            feed_key.as_bytes().as_slice(),
            seq as i64,
            data,
            concord_core::now_millis()
        ],
    )?;
    Ok(())
}

fn key_from_column(bytes: Vec<u8>) -> Result<PublicKey> {
    PublicKey::try_from(bytes.as_slice())
        .map_err(|_| FeedError::InvalidData(format!("feed key of {} bytes", bytes.len())))
}

#[async_trait]
impl FeedStore for SqliteFeedStore {
    async fn append(&self, feed_key: &PublicKey, data: Bytes) -> Result<u64> {
        let key = *feed_key;
        let seq = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let seq = feed_length_in(&tx, &key)?;
                insert_at(&tx, &key, seq, &data)?;
                tx.commit()?;
                Ok(seq)
            })
            .await?;
        self.announce(*feed_key, seq);
        Ok(seq)
    }

    async fn insert_block(&self, block: FeedBlock) -> Result<InsertResult> {
        let FeedBlock { feed_key, seq, data } = block;
        let result = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let existing: Option<Vec<u8>> = tx
                    .query_row(
                        "SELECT data FROM blocks WHERE feed_key = ?1 AND seq = ?2",
                        params![feed_key.as_bytes().as_slice(), seq as i64],
                        |row| row.get(0),
                    )
                    .optional()?;

                if let Some(existing) = existing {
                    return Ok(if existing.as_slice() == &data[..] {
                        InsertResult::AlreadyExists
                    } else {
                        InsertResult::Conflict
                    });
                }

                let len = feed_length_in(&tx, &feed_key)?;
                if seq != len {
                    return Err(FeedError::OutOfOrder {
                        feed: feed_key.to_hex(),
                        expected: len,
                        got: seq,
                    });
                }

                insert_at(&tx, &feed_key, seq, &data)?;
                tx.commit()?;
                Ok(InsertResult::Inserted)
            })
            .await?;

        if result == InsertResult::Inserted {
            self.announce(feed_key, seq);
        }
        Ok(result)
    }

    async fn get_block(&self, feed_key: &PublicKey, seq: u64) -> Result<Option<FeedBlock>> {
        let key = *feed_key;
        self.with_conn(move |conn| {
            let data: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT data FROM blocks WHERE feed_key = ?1 AND seq = ?2",
                    params![key.as_bytes().as_slice(), seq as i64],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(data.map(|data| FeedBlock {
                feed_key: key,
                seq,
                data: Bytes::from(data),
            }))
        })
        .await
    }

    async fn get_range(&self, feed_key: &PublicKey, from: u64, limit: u64) -> Result<Vec<FeedBlock>> {
        let key = *feed_key;
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, data FROM blocks
                 WHERE feed_key = ?1 AND seq >= ?2
                 ORDER BY seq LIMIT ?3",
            )?;
            let rows = stmt.query_map(
                params![key.as_bytes().as_slice(), from as i64, limit as i64],
                |row| {
                    let seq: i64 = row.get(0)?;
                    let data: Vec<u8> = row.get(1)?;
                    Ok(FeedBlock {
                        feed_key: key,
                        seq: seq as u64,
                        data: Bytes::from(data),
                    })
                },
            )?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(FeedError::from)
        })
        .await
    }

    async fn feed_length(&self, feed_key: &PublicKey) -> Result<u64> {
        let key = *feed_key;
        self.with_conn(move |conn| feed_length_in(conn, &key)).await
    }

    async fn list_feeds(&self) -> Result<Vec<PublicKey>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT feed_key FROM blocks ORDER BY feed_key")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            keys.into_iter().map(key_from_column).collect()
        })
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<BlockAppended> {
        self.notify.subscribe()
    }
}
