//! # Concord Echo
//!
//! Causally-ordered delivery of messages from many untrusted feeds.
//!
//! ## Overview
//!
//! Every party member writes to its own feed. Each block carries either a
//! HALO credential (admission state) or an ECHO envelope (application data),
//! stamped with the [`Timeframe`](concord_core::Timeframe) its author had
//! consumed. The [`Pipeline`] merges the tracked feeds into one stream that
//! respects trust and causality:
//!
//! - a block is consumed only when its feed is admitted (or it is the
//!   party genesis, or a feed admission naming its own feed),
//! - an ECHO block waits until the local clock covers its timeframe,
//! - per-feed append order is always preserved.
//!
//! ## Key Types
//!
//! - [`Pipeline`] - Inbound task plus the outbound [`PipelineWriter`]
//! - [`MessageSelector`] - Chooses which candidate is safe to consume next
//! - [`PartyProcessor`] - HALO state as seen by the pipeline
//! - [`TimeframeClock`] - Vector clock gating delivery
//! - [`FeedMessage`] - The block format
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use concord_core::Keypair;
//! use concord_echo::{EchoEnvelope, PartyProcessor, Payload, Pipeline, PipelineConfig};
//! use concord_feed::{FeedWriter, MemoryFeedStore};
//!
//! async fn example() -> concord_echo::Result<()> {
//!     let party = Keypair::generate();
//!     let feed = Keypair::generate().public_key();
//!     let store = Arc::new(MemoryFeedStore::new());
//!
//!     let mut pipeline = Pipeline::new(
//!         store,
//!         PartyProcessor::new(party.public_key()),
//!         PipelineConfig::default(),
//!     );
//!     pipeline.set_write_feed(feed);
//!     let mut inbound = pipeline.open_channel()?;
//!
//!     // ... write a genesis credential to `feed`, then:
//!     pipeline
//!         .writer()?
//!         .write(Payload::Echo(EchoEnvelope::new("item-1", b"hello".to_vec())))
//!         .await?;
//!
//!     let message = inbound.recv().await;
//!     pipeline.close().await;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod error;
pub mod iterator;
pub mod messages;
pub mod pipeline;
pub mod processor;
pub mod selector;

pub use clock::{has_gaps, TimeframeClock};
pub use error::{EchoError, Result};
pub use iterator::FeedSetIterator;
pub use messages::{EchoEnvelope, FeedMessage, Payload};
pub use pipeline::{InboundMessage, MessageConsumer, Pipeline, PipelineConfig, PipelineWriter};
pub use processor::PartyProcessor;
pub use selector::{Candidate, MessageSelector, PartyTrust};
