//! The party pipeline.
//!
//! Two transforms over a set of feeds:
//!
//! - **Inbound**: a background task reads the tracked feeds, asks the
//!   [`MessageSelector`] which head to consume, folds HALO credentials into
//!   the [`PartyProcessor`], hands ECHO envelopes to a [`MessageConsumer`],
//!   and advances the [`TimeframeClock`].
//! - **Outbound**: [`PipelineWriter`] stamps the current timeframe onto
//!   locally authored payloads before appending them to the writable feed.
//!
//! A pipeline opens once. After `close` it stays closed, and so does every
//! writer taken from it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use concord_core::{PublicKey, Timeframe};
use concord_feed::{BlockAppended, FeedError, FeedStore, FeedWriter, WriteReceipt};
use concord_halo::AdmissionEvent;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::clock::TimeframeClock;
use crate::error::{EchoError, Result};
use crate::iterator::FeedSetIterator;
use crate::messages::{EchoEnvelope, FeedMessage, Payload};
use crate::processor::PartyProcessor;
use crate::selector::{Candidate, MessageSelector};

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How long the selector may stay "not ready" before a stall is logged.
    pub stall_timeout: Duration,
    /// Capacity of the channel returned by [`Pipeline::open_channel`].
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stall_timeout: Duration::from_secs(5),
            channel_capacity: 256,
        }
    }
}

/// An ECHO message released by the pipeline, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub feed_key: PublicKey,
    pub seq: u64,
    /// The author's timeframe when it was written.
    pub timeframe: Timeframe,
    pub envelope: EchoEnvelope,
}

/// Downstream receiver of ordered ECHO messages.
///
/// The clock advances past a message only after `consume` returns. If the
/// pipeline closes while `consume` is pending, the future is dropped.
#[async_trait]
pub trait MessageConsumer: Send + Sync + 'static {
    async fn consume(&self, message: InboundMessage);
}

#[async_trait]
impl MessageConsumer for mpsc::Sender<InboundMessage> {
    async fn consume(&self, message: InboundMessage) {
        if self.send(message).await.is_err() {
            debug!("inbound receiver dropped");
        }
    }
}

enum Lifecycle {
    Idle,
    Running {
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
    },
    Closed,
}

/// Multi-feed reader with a single optional writable feed.
pub struct Pipeline<S: FeedStore + ?Sized + 'static> {
    store: Arc<S>,
    processor: Arc<RwLock<PartyProcessor>>,
    clock: Arc<TimeframeClock>,
    config: PipelineConfig,
    start: Timeframe,
    feed_tx: mpsc::UnboundedSender<PublicKey>,
    feed_rx: Option<mpsc::UnboundedReceiver<PublicKey>>,
    write_feed: Option<PublicKey>,
    lifecycle: Lifecycle,
    closed: Arc<AtomicBool>,
}

impl<S: FeedStore + ?Sized + 'static> Pipeline<S> {
    pub fn new(store: Arc<S>, processor: PartyProcessor, config: PipelineConfig) -> Self {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        Self {
            store,
            processor: Arc::new(RwLock::new(processor)),
            clock: Arc::new(TimeframeClock::default()),
            config,
            start: Timeframe::new(),
            feed_tx,
            feed_rx: Some(feed_rx),
            write_feed: None,
            lifecycle: Lifecycle::Idle,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn processor(&self) -> &Arc<RwLock<PartyProcessor>> {
        &self.processor
    }

    pub fn clock(&self) -> &Arc<TimeframeClock> {
        &self.clock
    }

    /// The timeframe reading started after.
    pub fn start_timeframe(&self) -> &Timeframe {
        &self.start
    }

    pub fn is_open(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running { .. })
    }

    /// Resume reading after `timeframe` instead of from the beginning.
    ///
    /// Only valid before `open`.
    pub fn set_cursor(&mut self, timeframe: Timeframe) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Idle => {
                self.clock.set_timeframe(timeframe.clone());
                self.start = timeframe;
                Ok(())
            }
            Lifecycle::Running { .. } => Err(EchoError::AlreadyOpen),
            Lifecycle::Closed => Err(EchoError::Closed),
        }
    }

    /// Track another feed. Its blocks are still subject to the selector.
    pub fn add_feed(&self, feed_key: PublicKey) {
        // The receiver only goes away with the task, after close.
        let _ = self.feed_tx.send(feed_key);
    }

    pub fn set_write_feed(&mut self, feed_key: PublicKey) {
        self.add_feed(feed_key);
        self.write_feed = Some(feed_key);
    }

    pub fn write_feed(&self) -> Option<&PublicKey> {
        self.write_feed.as_ref()
    }

    /// Outbound transform for the writable feed.
    pub fn writer(&self) -> Result<PipelineWriter<S>> {
        if matches!(self.lifecycle, Lifecycle::Closed) {
            return Err(EchoError::Closed);
        }
        let feed_key = self.write_feed.ok_or(EchoError::NoWritableFeed)?;
        Ok(PipelineWriter {
            store: self.store.clone(),
            clock: self.clock.clone(),
            feed_key,
            closed: self.closed.clone(),
        })
    }

    /// Start the inbound task, delivering into a bounded channel.
    pub fn open_channel(&mut self) -> Result<mpsc::Receiver<InboundMessage>> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        self.open(tx)?;
        Ok(rx)
    }

    /// Start the inbound task, delivering to `consumer`.
    pub fn open<C: MessageConsumer>(&mut self, consumer: C) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running { .. } => return Err(EchoError::AlreadyOpen),
            Lifecycle::Closed => return Err(EchoError::Closed),
        }
        let added = self.feed_rx.take().ok_or(EchoError::Closed)?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = PipelineTask {
            iterator: FeedSetIterator::new(self.store.clone(), self.start.clone()),
            // Subscribe before the first read so no append is missed.
            appended: self.store.subscribe(),
            processor: self.processor.clone(),
            clock: self.clock.clone(),
            consumer,
            added,
            shutdown: shutdown_rx,
            stall_timeout: self.config.stall_timeout,
        };

        info!(start = ?self.start, "pipeline opened");
        self.lifecycle = Lifecycle::Running {
            shutdown,
            task: tokio::spawn(task.run()),
        };
        Ok(())
    }

    /// Stop both transforms and wait for the inbound task. Idempotent.
    pub async fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Closed) {
            Lifecycle::Running { shutdown, task } => {
                let _ = shutdown.send(true);
                if let Err(e) = task.await {
                    error!(error = %e, "pipeline task failed");
                }
                info!(timeframe = ?self.clock.timeframe(), "pipeline closed");
            }
            Lifecycle::Idle | Lifecycle::Closed => {}
        }
    }
}

struct PipelineTask<S: FeedStore + ?Sized, C> {
    iterator: FeedSetIterator<S>,
    appended: broadcast::Receiver<BlockAppended>,
    processor: Arc<RwLock<PartyProcessor>>,
    clock: Arc<TimeframeClock>,
    consumer: C,
    added: mpsc::UnboundedReceiver<PublicKey>,
    shutdown: watch::Receiver<bool>,
    stall_timeout: Duration,
}

impl<S: FeedStore + ?Sized + 'static, C: MessageConsumer> PipelineTask<S, C> {
    async fn run(self) {
        let PipelineTask {
            mut iterator,
            mut appended,
            processor,
            clock,
            consumer,
            mut added,
            mut shutdown,
            stall_timeout,
        } = self;

        for feed_key in processor.read().await.feed_keys() {
            iterator.add_feed(feed_key);
        }

        let mut stalled = false;
        let mut last_progress = Instant::now();
        loop {
            if *shutdown.borrow() {
                break;
            }
            while let Ok(feed_key) = added.try_recv() {
                if iterator.add_feed(feed_key) {
                    debug!(feed = %feed_key, "tracking feed");
                }
            }

            let selected = match next_ready(&mut iterator, &processor, &clock).await {
                Ok(selected) => selected,
                Err(e) => {
                    error!(error = %e, "failed to read feed heads");
                    None
                }
            };

            if let Some(candidate) = selected {
                stalled = false;
                last_progress = Instant::now();
                let Candidate {
                    feed_key,
                    seq,
                    message,
                } = candidate;

                match message.map(|m| (m.timeframe, m.payload)) {
                    Some((_, Payload::Halo(credential))) => {
                        let events = processor.write().await.process_message(&credential, feed_key);
                        for event in events {
                            if let AdmissionEvent::FeedAdmitted { feed, .. } = event {
                                if iterator.add_feed(feed) {
                                    debug!(%feed, "tracking admitted feed");
                                }
                            }
                        }
                    }
                    Some((timeframe, Payload::Echo(envelope))) if !envelope.item_id.is_empty() => {
                        let message = InboundMessage {
                            feed_key,
                            seq,
                            timeframe,
                            envelope,
                        };
                        tokio::select! {
                            _ = consumer.consume(message) => {}
                            _ = shutdown.changed() => break,
                        }
                    }
                    Some((_, Payload::Echo(_))) => {
                        warn!(feed = %feed_key, seq, "echo message without item id; dropping");
                    }
                    None => {
                        warn!(feed = %feed_key, seq, "malformed feed block; dropping");
                    }
                }
                clock.update_timeframe(feed_key, seq);
                continue;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                result = appended.recv() => match result {
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "append notifications lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(feed_key) = added.recv() => {
                    if iterator.add_feed(feed_key) {
                        debug!(feed = %feed_key, "tracking feed");
                    }
                }
                _ = tokio::time::sleep_until(last_progress + stall_timeout), if !stalled => {
                    stalled = true;
                    warn!(
                        timeout = ?stall_timeout,
                        feeds = iterator.len(),
                        pending = ?iterator.pending(),
                        "pipeline stalled"
                    );
                }
            }
        }
        debug!("pipeline task exited");
    }
}

/// Choose and take the next head, if any is ready.
async fn next_ready<S: FeedStore + ?Sized>(
    iterator: &mut FeedSetIterator<S>,
    processor: &RwLock<PartyProcessor>,
    clock: &TimeframeClock,
) -> Result<Option<Candidate>> {
    let heads = iterator.poll_heads().await?;
    if heads.is_empty() {
        return Ok(None);
    }
    let local = clock.timeframe();
    let index = {
        let processor = processor.read().await;
        MessageSelector::new(&*processor, &local).select(&heads)
    };
    Ok(index.and_then(|i| iterator.take(&heads[i].feed_key)))
}

/// Outbound transform: stamps the clock's timeframe and appends.
///
/// Fails with [`FeedError::WriterClosed`] once its pipeline is closed.
pub struct PipelineWriter<S: FeedStore + ?Sized> {
    store: Arc<S>,
    clock: Arc<TimeframeClock>,
    feed_key: PublicKey,
    closed: Arc<AtomicBool>,
}

impl<S: FeedStore + ?Sized> Clone for PipelineWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            feed_key: self.feed_key,
            closed: self.closed.clone(),
        }
    }
}

#[async_trait]
impl<S: FeedStore + ?Sized + 'static> FeedWriter<Payload> for PipelineWriter<S> {
    fn feed_key(&self) -> &PublicKey {
        &self.feed_key
    }

    async fn write(&self, payload: Payload) -> concord_feed::Result<WriteReceipt> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FeedError::WriterClosed(self.feed_key.to_hex()));
        }
        let message = FeedMessage {
            timeframe: self.clock.timeframe(),
            payload,
        };
        let data = message
            .to_bytes()
            .map_err(|e| FeedError::Serialization(e.to_string()))?;
        let seq = self.store.append(&self.feed_key, Bytes::from(data)).await?;
        debug!(feed = %self.feed_key, seq, "wrote message");
        Ok(WriteReceipt {
            feed_key: self.feed_key,
            seq,
        })
    }
}
