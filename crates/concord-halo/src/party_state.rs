//! Composite party state.
//!
//! Routes each verified credential to the sub-state machine that owns its
//! claim, supplying the authorization predicate derived from the state as it
//! stood *before* that credential:
//!
//! - `MemberClaim`, `FeedAdmitClaim`: the party key, or any member or
//!   device of a member
//! - `DeviceClaim`: the claimed identity, or a device it already admitted
//! - `PartyGenesis`: the party key (checked by the reducers)

use std::collections::BTreeMap;

use concord_core::{Claim, PublicKey, VerifiedCredential};
use serde::{Deserialize, Serialize};

use crate::devices::{self, DevicesState};
use crate::feeds::{self, FeedInfo, FeedsState};
use crate::members::{self, MemberInfo, MembersState};

/// Everything a party has admitted so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyState {
    party: PublicKey,
    members: MembersState,
    member_devices: BTreeMap<PublicKey, DevicesState>,
    feeds: FeedsState,
}

impl PartyState {
    pub fn create(party: PublicKey) -> Self {
        Self {
            party,
            members: MembersState::create(party),
            member_devices: BTreeMap::new(),
            feeds: FeedsState::create(party),
        }
    }

    pub fn party(&self) -> &PublicKey {
        &self.party
    }

    pub fn members(&self) -> &MembersState {
        &self.members
    }

    pub fn feeds(&self) -> &FeedsState {
        &self.feeds
    }

    /// Device state for `identity`, if any device claim for it took effect.
    pub fn devices_of(&self, identity: &PublicKey) -> Option<&DevicesState> {
        self.member_devices.get(identity)
    }

    pub fn member_devices(&self) -> impl Iterator<Item = (&PublicKey, &DevicesState)> {
        self.member_devices.iter()
    }

    /// True if `key` is an admitted member, or an admitted device of an
    /// admitted member.
    pub fn is_party_member_identity_or_device(&self, key: &PublicKey) -> bool {
        self.members.contains(key)
            || self
                .member_devices
                .iter()
                .any(|(identity, devices)| devices.contains(key) && self.members.contains(identity))
    }

    pub fn is_admitted_member(&self, identity: &PublicKey) -> bool {
        self.members.contains(identity)
    }

    /// True if `identity` is a member and `device` one of its admitted devices.
    pub fn is_admitted_member_with_device(&self, identity: &PublicKey, device: &PublicKey) -> bool {
        self.is_admitted_member(identity)
            && self
                .devices_of(identity)
                .map_or(false, |devices| devices.contains(device))
    }

    pub fn is_feed_admitted(&self, feed: &PublicKey) -> bool {
        self.feeds.contains(feed)
    }

    pub fn get_feed_info(&self, feed: &PublicKey) -> Option<&FeedInfo> {
        self.feeds.get(feed)
    }

    pub fn get_member_info(&self, identity: &PublicKey) -> Option<&MemberInfo> {
        self.members.get(identity)
    }

    pub fn member_keys(&self) -> Vec<PublicKey> {
        self.members.keys().copied().collect()
    }

    pub fn feed_keys(&self) -> Vec<PublicKey> {
        self.feeds.keys().copied().collect()
    }

    /// True if nothing has been admitted yet.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.feeds.is_empty() && self.member_devices.is_empty()
    }

    /// The party key or any member/device may admit members and feeds.
    pub fn can_admit(&self, key: &PublicKey) -> bool {
        key == &self.party || self.is_party_member_identity_or_device(key)
    }
}

/// Fold one verified credential into `state`, producing the next state.
///
/// Unrecognized and `AuthClaim` credentials leave the state unchanged.
pub fn process_party_credential(state: &PartyState, credential: &VerifiedCredential) -> PartyState {
    match credential.claim() {
        Claim::PartyGenesis { .. } => {
            let mut next = state.clone();
            next.members = members::reduce(&state.members, credential, |k| state.can_admit(k));
            next.feeds = feeds::reduce(&state.feeds, credential, |k| state.can_admit(k));
            next
        }
        Claim::Member { .. } => {
            let mut next = state.clone();
            next.members = members::reduce(&state.members, credential, |k| state.can_admit(k));
            next
        }
        Claim::FeedAdmit { .. } => {
            let mut next = state.clone();
            next.feeds = feeds::reduce(&state.feeds, credential, |k| state.can_admit(k));
            next
        }
        Claim::Device { identity, .. } => {
            let current = state
                .member_devices
                .get(identity)
                .cloned()
                .unwrap_or_else(|| DevicesState::create(*identity));
            let updated = devices::reduce(&current, credential, |k| current.is_identity_or_device(k));
            if updated == current {
                return state.clone();
            }
            let mut next = state.clone();
            next.member_devices.insert(*identity, updated);
            next
        }
        Claim::Auth { .. } | Claim::Unknown { .. } => state.clone(),
    }
}
