//! # Concord Testkit
//!
//! Testing utilities for Concord.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known signing payloads and signatures for cross-implementation checks
//! - **Generators**: Proptest strategies for claims, credentials and timeframes
//! - **Fixtures**: A ready-made party plus helpers to encode and replicate feed blocks
//!
//! ## Golden Vectors
//!
//! ```rust
//! use concord_testkit::vectors::{all_vectors, verify_all_vectors};
//!
//! for (name, ok) in verify_all_vectors() {
//!     assert!(ok, "{name}");
//! }
//! assert!(!all_vectors().is_empty());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use concord_testkit::generators::{credential_from_params, CredentialParams};
//!
//! proptest! {
//!     #[test]
//!     fn credential_id_is_deterministic(params: CredentialParams) {
//!         let a = credential_from_params(&params).unwrap();
//!         let b = credential_from_params(&params).unwrap();
//!         prop_assert_eq!(a.id().unwrap(), b.id().unwrap());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use concord_testkit::fixtures::PartyFixture;
//!
//! let fixture = PartyFixture::new();
//! let genesis = fixture.genesis().unwrap();
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{echo_block, halo_block, multi_party_fixtures, replicate_feed, PartyFixture};
pub use generators::{credential_from_params, CredentialParams};
pub use vectors::{all_vectors, generate_credential_from_vector, verify_all_vectors, GoldenVector};
