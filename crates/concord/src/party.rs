//! PartyCore: the open/close lifecycle of one party.
//!
//! A party owns a pipeline while open. Opening restores from a snapshot
//! when one is given (or found in the attached [`SnapshotStore`]), tracks
//! the initial feeds and starts delivering ECHO messages to the
//! [`Database`]. Closing stops the pipeline and optionally saves a
//! snapshot. Open and close run inside one critical section per party.

use std::sync::Arc;

use bytes::Bytes;
use concord_core::{Credential, PublicKey, Timeframe};
use concord_echo::{
    EchoEnvelope, PartyProcessor, Payload, Pipeline, PipelineConfig, PipelineWriter,
    TimeframeClock,
};
use concord_feed::{FeedStore, FeedWriter, WriteReceipt};
use concord_halo::{AdmissionEvent, AuthChallenge, AuthResponse, PartyState};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info};

use crate::database::{Database, DatabaseConsumer, MemoryDatabase};
use crate::error::{PartyError, Result};
use crate::snapshot::{PartySnapshot, SnapshotStore};

/// Configuration for a party.
#[derive(Debug, Clone, Default)]
pub struct PartyConfig {
    /// Pipeline tuning.
    pub pipeline: PipelineConfig,
    /// Save a snapshot to the attached store on close.
    pub snapshot_on_close: bool,
}

/// What to track when a party opens.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Feed holding the party genesis.
    pub genesis_feed: Option<PublicKey>,
    /// Feed this peer appends to.
    pub write_feed: Option<PublicKey>,
    /// Other feeds known to belong to the party.
    pub feeds: Vec<PublicKey>,
    /// Resume from this snapshot instead of reading from the start.
    pub snapshot: Option<PartySnapshot>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn genesis_feed(mut self, feed_key: PublicKey) -> Self {
        self.genesis_feed = Some(feed_key);
        self
    }

    pub fn write_feed(mut self, feed_key: PublicKey) -> Self {
        self.write_feed = Some(feed_key);
        self
    }

    pub fn feed(mut self, feed_key: PublicKey) -> Self {
        self.feeds.push(feed_key);
        self
    }

    pub fn snapshot(mut self, snapshot: PartySnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// One party: HALO admission state plus the ECHO stream feeding a database.
pub struct PartyCore<S: FeedStore + ?Sized + 'static, D: Database = MemoryDatabase> {
    party_key: PublicKey,
    store: Arc<S>,
    database: Arc<D>,
    snapshots: Option<Arc<SnapshotStore>>,
    config: PartyConfig,
    /// Lifecycle critical section; `Some` while open.
    pipeline: Mutex<Option<Pipeline<S>>>,
}

impl<S: FeedStore + ?Sized + 'static, D: Database> PartyCore<S, D> {
    pub fn new(party_key: PublicKey, store: Arc<S>, database: Arc<D>, config: PartyConfig) -> Self {
        Self {
            party_key,
            store,
            database,
            snapshots: None,
            config,
            pipeline: Mutex::new(None),
        }
    }

    /// Attach a snapshot store, used on open and (if configured) on close.
    pub fn with_snapshot_store(mut self, snapshots: Arc<SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn party_key(&self) -> &PublicKey {
        &self.party_key
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn database(&self) -> &Arc<D> {
        &self.database
    }

    pub async fn is_open(&self) -> bool {
        self.pipeline.lock().await.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Open the party. Does nothing if it is already open.
    ///
    /// Each open after a close builds a fresh pipeline.
    pub async fn open(&self, options: OpenOptions) -> Result<()> {
        let mut slot = self.pipeline.lock().await;
        if slot.is_some() {
            debug!(party = %self.party_key, "already open");
            return Ok(());
        }

        let snapshot = match options.snapshot {
            Some(snapshot) => Some(snapshot),
            None => match &self.snapshots {
                Some(store) => store.load(&self.party_key)?,
                None => None,
            },
        };

        let mut processor = PartyProcessor::new(self.party_key);
        let mut cursor = None;
        if let Some(snapshot) = snapshot {
            if snapshot.party_key != self.party_key {
                return Err(PartyError::SnapshotMismatch {
                    expected: self.party_key,
                    actual: snapshot.party_key,
                });
            }
            processor.restore_snapshot(&snapshot.halo)?;
            self.database.restore(&snapshot.database).await?;
            info!(
                party = %self.party_key,
                timeframe = ?snapshot.timeframe,
                messages = snapshot.halo.messages.len(),
                "restored from snapshot"
            );
            cursor = Some(snapshot.timeframe);
        }

        let mut pipeline = Pipeline::new(self.store.clone(), processor, self.config.pipeline.clone());
        if let Some(timeframe) = cursor {
            pipeline.set_cursor(timeframe)?;
        }
        for feed_key in options.genesis_feed.iter().chain(&options.feeds) {
            pipeline.add_feed(*feed_key);
        }
        if let Some(feed_key) = options.write_feed {
            pipeline.set_write_feed(feed_key);
        }
        pipeline.open(DatabaseConsumer::new(self.database.clone()))?;

        info!(party = %self.party_key, "party opened");
        *slot = Some(pipeline);
        Ok(())
    }

    /// Close the party. Does nothing if it is not open.
    pub async fn close(&self) -> Result<()> {
        let mut slot = self.pipeline.lock().await;
        let Some(mut pipeline) = slot.take() else {
            return Ok(());
        };
        pipeline.close().await;

        if self.config.snapshot_on_close {
            if let Some(store) = &self.snapshots {
                let snapshot = capture(
                    self.party_key,
                    pipeline.processor(),
                    pipeline.clock(),
                    &*self.database,
                )
                .await?;
                store.save(&snapshot)?;
            }
        }

        info!(party = %self.party_key, "party closed");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writing
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an ECHO mutation to the writable feed.
    pub async fn write_echo(
        &self,
        item_id: impl Into<String>,
        mutation: impl Into<Bytes>,
    ) -> Result<WriteReceipt> {
        let writer = self.writer().await?;
        let envelope = EchoEnvelope::new(item_id, mutation);
        Ok(writer.write(Payload::Echo(envelope)).await?)
    }

    /// Append a HALO credential to the writable feed.
    pub async fn write_credential(&self, credential: Credential) -> Result<WriteReceipt> {
        let writer = self.writer().await?;
        Ok(writer.write(Payload::Halo(credential)).await?)
    }

    /// Start tracking another feed.
    pub async fn add_feed(&self, feed_key: PublicKey) -> Result<()> {
        let slot = self.pipeline.lock().await;
        let pipeline = slot.as_ref().ok_or(PartyError::NotOpen(self.party_key))?;
        pipeline.add_feed(feed_key);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Clock
    // ─────────────────────────────────────────────────────────────────────────

    /// Highest seq consumed per feed.
    pub async fn timeframe(&self) -> Result<Timeframe> {
        Ok(self.clock().await?.timeframe())
    }

    /// Resolve once every feed in `target` has been consumed up to its seq.
    ///
    /// Closing the party does not wake a pending wait; wrap it in a timeout
    /// when the target may never be reached.
    pub async fn wait_until_reached(&self, target: &Timeframe) -> Result<()> {
        let clock = self.clock().await?;
        clock.wait_until_reached(target).await;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // HALO state
    // ─────────────────────────────────────────────────────────────────────────

    /// A copy of the committed admission state.
    pub async fn state(&self) -> Result<PartyState> {
        let processor = self.processor().await?;
        let state = processor.read().await.state().clone();
        Ok(state)
    }

    pub async fn is_member(&self, identity: &PublicKey) -> Result<bool> {
        let processor = self.processor().await?;
        let admitted = processor.read().await.state().is_admitted_member(identity);
        Ok(admitted)
    }

    pub async fn is_feed_admitted(&self, feed_key: &PublicKey) -> Result<bool> {
        let processor = self.processor().await?;
        let admitted = processor.read().await.state().is_feed_admitted(feed_key);
        Ok(admitted)
    }

    pub async fn member_keys(&self) -> Result<Vec<PublicKey>> {
        let processor = self.processor().await?;
        let keys = processor.read().await.member_keys();
        Ok(keys)
    }

    pub async fn feed_keys(&self) -> Result<Vec<PublicKey>> {
        let processor = self.processor().await?;
        let keys = processor.read().await.feed_keys();
        Ok(keys)
    }

    /// Admission events from now on.
    pub async fn subscribe(&self) -> Result<broadcast::Receiver<AdmissionEvent>> {
        let processor = self.processor().await?;
        let rx = processor.read().await.subscribe();
        Ok(rx)
    }

    /// Check a peer's answer to `challenge` against the committed state.
    pub async fn authenticate(&self, challenge: &AuthChallenge, response: &AuthResponse) -> Result<bool> {
        let processor = self.processor().await?;
        let ok = processor.read().await.authenticate(challenge, response);
        Ok(ok)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Capture the party while it keeps running.
    pub async fn create_snapshot(&self) -> Result<PartySnapshot> {
        let (processor, clock) = {
            let slot = self.pipeline.lock().await;
            let pipeline = slot.as_ref().ok_or(PartyError::NotOpen(self.party_key))?;
            (pipeline.processor().clone(), pipeline.clock().clone())
        };
        capture(self.party_key, &processor, &clock, &*self.database).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    async fn processor(&self) -> Result<Arc<RwLock<PartyProcessor>>> {
        let slot = self.pipeline.lock().await;
        let pipeline = slot.as_ref().ok_or(PartyError::NotOpen(self.party_key))?;
        Ok(pipeline.processor().clone())
    }

    async fn clock(&self) -> Result<Arc<TimeframeClock>> {
        let slot = self.pipeline.lock().await;
        let pipeline = slot.as_ref().ok_or(PartyError::NotOpen(self.party_key))?;
        Ok(pipeline.clock().clone())
    }

    async fn writer(&self) -> Result<PipelineWriter<S>> {
        let slot = self.pipeline.lock().await;
        let pipeline = slot.as_ref().ok_or(PartyError::NotOpen(self.party_key))?;
        Ok(pipeline.writer()?)
    }
}

/// Build a snapshot from live components.
///
/// The timeframe is read first. HALO state and the database may run ahead
/// of it; on restore those messages are read again, and both sides skip
/// what they already hold.
async fn capture<D: Database + ?Sized>(
    party_key: PublicKey,
    processor: &RwLock<PartyProcessor>,
    clock: &TimeframeClock,
    database: &D,
) -> Result<PartySnapshot> {
    let timeframe = clock.timeframe();
    let halo = processor.read().await.create_snapshot();
    let database = database.snapshot().await?;
    debug!(%party_key, ?timeframe, "snapshot captured");
    Ok(PartySnapshot {
        party_key,
        timeframe,
        halo,
        database,
    })
}
