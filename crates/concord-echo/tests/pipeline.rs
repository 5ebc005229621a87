//! End-to-end ordering through the pipeline.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use concord_core::{Claim, Credential, CredentialBuilder, Keypair, PublicKey, Timeframe};
use concord_echo::{
    EchoEnvelope, EchoError, FeedMessage, InboundMessage, PartyProcessor, Payload, Pipeline,
    PipelineConfig,
};
use concord_feed::{FeedError, FeedStore, FeedWriter, MemoryFeedStore, SqliteFeedStore};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct Party {
    party: Keypair,
    identity: Keypair,
    genesis_feed: PublicKey,
}

impl Party {
    fn new() -> Self {
        Self {
            party: Keypair::generate(),
            identity: Keypair::generate(),
            genesis_feed: Keypair::generate().public_key(),
        }
    }

    fn genesis(&self) -> Credential {
        CredentialBuilder::new(Claim::PartyGenesis {
            party: self.party.public_key(),
            identity: self.identity.public_key(),
            feed: self.genesis_feed,
        })
        .sign(&[&self.party])
        .unwrap()
    }

    fn admit_feed(&self, feed: PublicKey, signer: &Keypair) -> Credential {
        CredentialBuilder::new(Claim::FeedAdmit {
            party: self.party.public_key(),
            feed,
        })
        .sign(&[signer])
        .unwrap()
    }

    fn pipeline<S: FeedStore + 'static>(&self, store: Arc<S>) -> Pipeline<S> {
        Pipeline::new(
            store,
            PartyProcessor::new(self.party.public_key()),
            PipelineConfig::default(),
        )
    }
}

async fn append(store: &impl FeedStore, feed: PublicKey, message: FeedMessage) -> u64 {
    store
        .append(&feed, Bytes::from(message.to_bytes().unwrap()))
        .await
        .unwrap()
}

fn echo(item: &str) -> FeedMessage {
    FeedMessage::echo(Timeframe::new(), EchoEnvelope::new(item, item.as_bytes().to_vec()))
}

async fn recv(rx: &mut mpsc::Receiver<InboundMessage>) -> InboundMessage {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("pipeline channel closed")
}

async fn assert_quiet(rx: &mut mpsc::Receiver<InboundMessage>) {
    let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(result.is_err(), "unexpected message: {:?}", result);
}

#[tokio::test]
async fn test_genesis_bootstraps_and_echo_is_delivered() {
    init_tracing();
    let party = Party::new();
    let store = Arc::new(MemoryFeedStore::new());
    let mut pipeline = party.pipeline(store.clone());
    pipeline.set_write_feed(party.genesis_feed);
    let mut rx = pipeline.open_channel().unwrap();

    let writer = pipeline.writer().unwrap();
    writer.write(Payload::Halo(party.genesis())).await.unwrap();
    writer
        .write(Payload::Echo(EchoEnvelope::new("item-1", b"hello".to_vec())))
        .await
        .unwrap();

    let message = recv(&mut rx).await;
    assert_eq!(message.envelope.item_id, "item-1");
    assert_eq!(message.feed_key, party.genesis_feed);
    assert_eq!(message.seq, 1);

    let target: Timeframe = [(party.genesis_feed, 1)].into_iter().collect();
    tokio::time::timeout(WAIT, pipeline.clock().wait_until_reached(&target))
        .await
        .unwrap();

    let processor = pipeline.processor().read().await;
    assert!(processor.state().is_admitted_member(&party.identity.public_key()));
    drop(processor);
    pipeline.close().await;
}

#[tokio::test]
async fn test_writer_stamps_consumed_timeframe() {
    let party = Party::new();
    let store = Arc::new(MemoryFeedStore::new());
    let mut pipeline = party.pipeline(store.clone());
    pipeline.set_write_feed(party.genesis_feed);
    let _rx = pipeline.open_channel().unwrap();

    let writer = pipeline.writer().unwrap();
    writer.write(Payload::Halo(party.genesis())).await.unwrap();
    let target: Timeframe = [(party.genesis_feed, 0)].into_iter().collect();
    tokio::time::timeout(WAIT, pipeline.clock().wait_until_reached(&target))
        .await
        .unwrap();

    let receipt = writer
        .write(Payload::Echo(EchoEnvelope::new("x", vec![])))
        .await
        .unwrap();
    let block = store
        .get_block(&party.genesis_feed, receipt.seq)
        .await
        .unwrap()
        .unwrap();
    let stamped = FeedMessage::from_bytes(&block.data).unwrap();
    assert_eq!(stamped.timeframe, target);

    pipeline.close().await;
}

#[tokio::test]
async fn test_unadmitted_feed_waits_for_admission() {
    let party = Party::new();
    let store = Arc::new(MemoryFeedStore::new());
    let other_feed = Keypair::generate().public_key();

    append(&*store, other_feed, echo("early")).await;
    append(&*store, party.genesis_feed, FeedMessage::halo(Timeframe::new(), party.genesis())).await;

    let mut pipeline = party.pipeline(store.clone());
    pipeline.add_feed(party.genesis_feed);
    pipeline.add_feed(other_feed);
    let mut rx = pipeline.open_channel().unwrap();

    assert_quiet(&mut rx).await;

    append(
        &*store,
        party.genesis_feed,
        FeedMessage::halo(Timeframe::new(), party.admit_feed(other_feed, &party.identity)),
    )
    .await;

    let message = recv(&mut rx).await;
    assert_eq!(message.envelope.item_id, "early");
    assert_eq!(message.feed_key, other_feed);

    let processor = pipeline.processor().read().await;
    let info = processor.state().get_feed_info(&other_feed).unwrap();
    assert_eq!(info.parent_feed, Some(party.genesis_feed));
    assert_eq!(info.added_by, party.identity.public_key());
    drop(processor);
    pipeline.close().await;
}

#[tokio::test]
async fn test_feed_admitting_itself_is_tracked_automatically() {
    let party = Party::new();
    let store = Arc::new(MemoryFeedStore::new());
    let device_feed = Keypair::generate().public_key();

    append(&*store, party.genesis_feed, FeedMessage::halo(Timeframe::new(), party.genesis())).await;
    append(
        &*store,
        device_feed,
        FeedMessage::halo(Timeframe::new(), party.admit_feed(device_feed, &party.identity)),
    )
    .await;
    append(&*store, device_feed, echo("from-device")).await;

    let mut pipeline = party.pipeline(store.clone());
    pipeline.add_feed(party.genesis_feed);
    pipeline.add_feed(device_feed);
    let mut rx = pipeline.open_channel().unwrap();

    let message = recv(&mut rx).await;
    assert_eq!(message.envelope.item_id, "from-device");
    assert_eq!(message.seq, 1);
    pipeline.close().await;
}

#[tokio::test]
async fn test_echo_waits_for_declared_dependencies() {
    let party = Party::new();
    let store = Arc::new(MemoryFeedStore::new());
    let other_feed = Keypair::generate().public_key();

    // Genesis feed: genesis, admission of the other feed.
    append(&*store, party.genesis_feed, FeedMessage::halo(Timeframe::new(), party.genesis())).await;
    append(
        &*store,
        party.genesis_feed,
        FeedMessage::halo(Timeframe::new(), party.admit_feed(other_feed, &party.party)),
    )
    .await;

    // Written by a peer that had consumed the genesis feed up to seq 3.
    let declared: Timeframe = [(party.genesis_feed, 3)].into_iter().collect();
    append(
        &*store,
        other_feed,
        FeedMessage::echo(declared, EchoEnvelope::new("dependent", vec![])),
    )
    .await;

    let mut pipeline = party.pipeline(store.clone());
    pipeline.add_feed(party.genesis_feed);
    let mut rx = pipeline.open_channel().unwrap();

    // Local clock stops at genesis seq 1.
    assert_quiet(&mut rx).await;
    assert_eq!(pipeline.clock().timeframe().get(&party.genesis_feed), Some(1));

    append(&*store, party.genesis_feed, echo("catch-up")).await;

    assert_eq!(recv(&mut rx).await.envelope.item_id, "catch-up");
    assert_eq!(recv(&mut rx).await.envelope.item_id, "dependent");
    pipeline.close().await;
}

#[tokio::test]
async fn test_malformed_blocks_are_dropped_without_stalling() {
    let party = Party::new();
    let store = Arc::new(MemoryFeedStore::new());

    append(&*store, party.genesis_feed, FeedMessage::halo(Timeframe::new(), party.genesis())).await;
    store
        .append(&party.genesis_feed, Bytes::from_static(b"\xde\xad\xbe\xef"))
        .await
        .unwrap();
    append(&*store, party.genesis_feed, echo("")).await;
    append(&*store, party.genesis_feed, echo("after")).await;

    let mut pipeline = party.pipeline(store.clone());
    pipeline.add_feed(party.genesis_feed);
    let mut rx = pipeline.open_channel().unwrap();

    let message = recv(&mut rx).await;
    assert_eq!(message.envelope.item_id, "after");
    assert_eq!(message.seq, 3);

    let target: Timeframe = [(party.genesis_feed, 3)].into_iter().collect();
    tokio::time::timeout(WAIT, pipeline.clock().wait_until_reached(&target))
        .await
        .unwrap();
    pipeline.close().await;
}

#[tokio::test]
async fn test_resumes_after_cursor() {
    let party = Party::new();
    let store = Arc::new(MemoryFeedStore::new());
    let genesis = party.genesis();

    append(&*store, party.genesis_feed, FeedMessage::halo(Timeframe::new(), genesis.clone())).await;
    append(&*store, party.genesis_feed, echo("seen")).await;
    append(&*store, party.genesis_feed, echo("new")).await;

    let mut processor = PartyProcessor::new(party.party.public_key());
    processor.process_message(&genesis, party.genesis_feed);

    let mut pipeline = Pipeline::new(store.clone(), processor, PipelineConfig::default());
    pipeline
        .set_cursor([(party.genesis_feed, 1)].into_iter().collect())
        .unwrap();
    let mut rx = pipeline.open_channel().unwrap();

    let message = recv(&mut rx).await;
    assert_eq!(message.envelope.item_id, "new");
    assert_eq!(message.seq, 2);
    pipeline.close().await;
}

#[tokio::test]
async fn test_lifecycle_is_one_shot() {
    let party = Party::new();
    let store = Arc::new(MemoryFeedStore::new());
    let mut pipeline = party.pipeline(store.clone());

    assert!(matches!(pipeline.writer(), Err(EchoError::NoWritableFeed)));
    pipeline.set_write_feed(party.genesis_feed);
    let writer = pipeline.writer().unwrap();

    let _rx = pipeline.open_channel().unwrap();
    assert!(pipeline.is_open());
    assert!(matches!(pipeline.open_channel(), Err(EchoError::AlreadyOpen)));
    assert!(matches!(
        pipeline.set_cursor(Timeframe::new()),
        Err(EchoError::AlreadyOpen)
    ));

    pipeline.close().await;
    pipeline.close().await;
    assert!(!pipeline.is_open());
    assert!(matches!(pipeline.open_channel(), Err(EchoError::Closed)));
    assert!(matches!(pipeline.writer(), Err(EchoError::Closed)));

    let written = writer
        .write(Payload::Echo(EchoEnvelope::new("late", vec![1])))
        .await;
    assert!(matches!(written, Err(FeedError::WriterClosed(_))));
    assert_eq!(store.feed_length(&party.genesis_feed).await.unwrap(), 0);
}

#[tokio::test]
async fn test_runs_over_sqlite_feeds() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteFeedStore::open(dir.path().join("party.db")).unwrap());
    let party = Party::new();

    let mut pipeline = party.pipeline(store.clone());
    pipeline.set_write_feed(party.genesis_feed);
    let mut rx = pipeline.open_channel().unwrap();

    let writer = pipeline.writer().unwrap();
    writer.write(Payload::Halo(party.genesis())).await.unwrap();
    writer
        .write(Payload::Echo(EchoEnvelope::new("persisted", vec![7])))
        .await
        .unwrap();

    let message = recv(&mut rx).await;
    assert_eq!(message.envelope.mutation, Bytes::from_static(&[7]));
    pipeline.close().await;
}
