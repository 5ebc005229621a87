//! Admitted feeds of a party.
//!
//! Each entry remembers the feed its admitting credential was read from
//! (`parent_feed`), which links admissions into a DAG rooted at the
//! genesis feed.

use concord_core::{Claim, PublicKey, VerifiedCredential};
use serde::{Deserialize, Serialize};

/// An admitted feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub key: PublicKey,
    pub added_by: PublicKey,

    /// Feed on which the admitting credential was written.
    pub parent_feed: Option<PublicKey>,
}

/// Feeds of one party, in admission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedsState {
    party: PublicKey,
    feeds: Vec<FeedInfo>,
}

impl FeedsState {
    pub fn create(party: PublicKey) -> Self {
        Self {
            party,
            feeds: Vec::new(),
        }
    }

    pub fn party(&self) -> &PublicKey {
        &self.party
    }

    pub fn feeds(&self) -> &[FeedInfo] {
        &self.feeds
    }

    pub fn get(&self, key: &PublicKey) -> Option<&FeedInfo> {
        self.feeds.iter().find(|f| &f.key == key)
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.feeds.iter().map(|f| &f.key)
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

/// Fold one credential into `state`.
///
/// Handles `FeedAdmitClaim` (any authorized signer) and the feed half of
/// `PartyGenesis` (party key only). Claims scoped to another party are
/// ignored. Re-admitting a known feed keeps the first entry.
pub fn reduce(
    state: &FeedsState,
    credential: &VerifiedCredential,
    is_authorized: impl Fn(&PublicKey) -> bool,
) -> FeedsState {
    let (feed, proof) = match credential.claim() {
        Claim::FeedAdmit { party, feed } if party == state.party() => {
            (feed, credential.find_proof(is_authorized))
        }
        Claim::PartyGenesis { party, feed, .. } if party == state.party() => {
            (feed, credential.proof_by(party))
        }
        _ => return state.clone(),
    };

    match proof {
        Some(proof) if !state.contains(feed) => {
            let mut next = state.clone();
            next.feeds.push(FeedInfo {
                key: *feed,
                added_by: proof.signer,
                parent_feed: credential.feed_key().copied(),
            });
            next
        }
        _ => state.clone(),
    }
}

/// Bind an authorization predicate into a reducer.
pub fn processor<F>(is_authorized: F) -> impl Fn(&FeedsState, &VerifiedCredential) -> FeedsState
where
    F: Fn(&PublicKey) -> bool,
{
    move |state: &FeedsState, credential: &VerifiedCredential| reduce(state, credential, &is_authorized)
}
