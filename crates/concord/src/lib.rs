//! # Concord
//!
//! Party core for Concord: a trust-gated, causally-ordered replicated log
//! shared by a group of peers.
//!
//! ## Overview
//!
//! A party is a set of members, their devices and their feeds. Every peer
//! appends to its own feed; HALO credentials on those feeds decide who and
//! which feeds are admitted, and ECHO envelopes carry application data.
//! [`PartyCore`] ties the pieces together:
//!
//! - **Admission**: credentials are folded into the party state in the
//!   order the pipeline releases them
//! - **Ordering**: ECHO messages reach the [`Database`] only once their feed
//!   is admitted and their declared timeframe is covered locally
//! - **Snapshots**: HALO replay log, database state and timeframe are
//!   captured together so a party can reopen without re-reading its feeds
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use concord::core::{Claim, CredentialBuilder, Keypair};
//! use concord::feed::MemoryFeedStore;
//! use concord::{MemoryDatabase, OpenOptions, PartyConfig, PartyCore};
//!
//! async fn example() -> concord::Result<()> {
//!     let party = Keypair::generate();
//!     let identity = Keypair::generate();
//!     let feed = Keypair::generate().public_key();
//!
//!     let core = PartyCore::new(
//!         party.public_key(),
//!         Arc::new(MemoryFeedStore::new()),
//!         Arc::new(MemoryDatabase::new()),
//!         PartyConfig::default(),
//!     );
//!     core.open(OpenOptions::new().genesis_feed(feed).write_feed(feed)).await?;
//!
//!     let genesis = CredentialBuilder::new(Claim::PartyGenesis {
//!         party: party.public_key(),
//!         identity: identity.public_key(),
//!         feed,
//!     })
//!     .sign(&[&party])?;
//!     core.write_credential(genesis).await?;
//!     core.write_echo("item-1", b"hello".to_vec()).await?;
//!
//!     core.close().await
//! }
//! ```
//!
//! ## Re-exports
//!
//! The component crates are available as modules:
//!
//! - `concord::core` - Keys, claims, credentials, timeframes
//! - `concord::halo` - Admission state machines and authentication
//! - `concord::feed` - Feed stores
//! - `concord::echo` - Clock, selector and pipeline

pub mod database;
pub mod error;
pub mod party;
pub mod snapshot;

// Re-export component crates
pub use concord_core as core;
pub use concord_echo as echo;
pub use concord_feed as feed;
pub use concord_halo as halo;

pub use database::{Database, DatabaseConsumer, DatabaseSnapshot, ItemSnapshot, MemoryDatabase};
pub use error::{PartyError, Result};
pub use party::{OpenOptions, PartyConfig, PartyCore};
pub use snapshot::{PartySnapshot, SnapshotStore};

// Re-export commonly used types
pub use concord_core::{Credential, Keypair, PublicKey, Timeframe};
pub use concord_halo::{AdmissionEvent, AuthChallenge, AuthResponse, PartyState};
