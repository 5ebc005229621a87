//! # Concord HALO
//!
//! Credential-based admission for parties.
//!
//! ## Overview
//!
//! A party's trust state is never stored as mutable flags. It is derived by
//! folding verified credentials, in order, through pure reducers. Each
//! reducer takes the previous state by reference and returns a new one, so
//! earlier states remain valid snapshots.
//!
//! ## Key Concepts
//!
//! - **Members**: identities admitted by the party key or an existing member
//! - **Devices**: keys an identity (or one of its devices) vouched for
//! - **Feeds**: append-only logs admitted to carry party messages
//! - **Authentication**: a device proves membership by signing a challenge
//!   nonce; supporting credentials are checked against a throwaway copy of
//!   the state and never committed
//!
//! ## Usage
//!
//! ```rust,no_run
//! use concord_core::{Claim, CredentialBuilder, Keypair};
//! use concord_halo::PartyStateManager;
//!
//! let party = Keypair::generate();
//! let identity = Keypair::generate();
//! let mut manager = PartyStateManager::new(party.public_key());
//!
//! let credential = CredentialBuilder::new(Claim::Member {
//!     party: party.public_key(),
//!     identity: identity.public_key(),
//! })
//! .sign(&[&party])
//! .unwrap();
//!
//! manager.process_credential(&credential);
//! assert!(manager.state().is_admitted_member(&identity.public_key()));
//! ```

pub mod auth;
pub mod devices;
pub mod error;
pub mod feeds;
pub mod manager;
pub mod members;
pub mod party_state;
pub mod snapshot;

pub use auth::{AuthChallenge, AuthResponse};
pub use devices::{DeviceInfo, DevicesState};
pub use error::{HaloError, Result};
pub use feeds::{FeedInfo, FeedsState};
pub use manager::{AdmissionEvent, PartyStateManager};
pub use members::{MemberInfo, MembersState};
pub use party_state::{process_party_credential, PartyState};
pub use snapshot::{HaloStateSnapshot, SnapshotMessage};
