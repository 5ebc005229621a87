//! Stateful owner of a party's committed [`PartyState`].
//!
//! The manager is the only place committed state changes. It verifies raw
//! credentials, folds them through [`process_party_credential`], records the
//! ones that took effect, and reports what was admitted both as a return
//! value and on a broadcast channel.

use std::collections::HashSet;

use concord_core::{
    now_millis, verify_credential, Claim, Credential, CredentialId, PublicKey,
};
use tokio::sync::broadcast;
use tracing::debug;

use crate::auth::{AuthChallenge, AuthResponse};
use crate::error::{HaloError, Result};
use crate::party_state::{process_party_credential, PartyState};
use crate::snapshot::{HaloStateSnapshot, SnapshotMessage};

/// Capacity of the admission event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something a fold admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionEvent {
    MemberAdmitted {
        identity: PublicKey,
        added_by: PublicKey,
    },
    DeviceAdmitted {
        identity: PublicKey,
        device: PublicKey,
        added_by: PublicKey,
    },
    FeedAdmitted {
        feed: PublicKey,
        added_by: PublicKey,
        parent_feed: Option<PublicKey>,
    },
}

/// Owns and mutates one party's committed state.
pub struct PartyStateManager {
    state: PartyState,
    messages: Vec<SnapshotMessage>,
    applied: HashSet<CredentialId>,
    events: broadcast::Sender<AdmissionEvent>,
}

impl PartyStateManager {
    pub fn new(party: PublicKey) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: PartyState::create(party),
            messages: Vec::new(),
            applied: HashSet::new(),
            events,
        }
    }

    pub fn party_key(&self) -> &PublicKey {
        self.state.party()
    }

    /// The committed state.
    pub fn state(&self) -> &PartyState {
        &self.state
    }

    /// Number of credentials that changed state.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// True if no credential has taken effect yet.
    pub fn is_pristine(&self) -> bool {
        self.messages.is_empty()
    }

    /// Receive admission events from every subsequent fold.
    pub fn subscribe(&self) -> broadcast::Receiver<AdmissionEvent> {
        self.events.subscribe()
    }

    /// Verify and fold a credential that did not come from a feed.
    pub fn process_credential(&mut self, credential: &Credential) -> Vec<AdmissionEvent> {
        self.process_credential_from(credential, None)
    }

    /// Verify and fold a credential read from `feed_key`.
    ///
    /// Invalid or unauthorized credentials leave the state unchanged and
    /// yield no events.
    pub fn process_credential_from(
        &mut self,
        credential: &Credential,
        feed_key: Option<PublicKey>,
    ) -> Vec<AdmissionEvent> {
        let id = credential.id().ok();
        if let Some(id) = &id {
            if self.applied.contains(id) {
                debug!(credential = %id, "credential already applied");
                return Vec::new();
            }
        }

        let verified = verify_credential(credential, feed_key);
        if verified.is_empty() {
            debug!(claim = credential.claim.type_url(), "no valid proofs; ignoring credential");
            return Vec::new();
        }

        let next = process_party_credential(&self.state, &verified);
        if next == self.state {
            debug!(claim = credential.claim.type_url(), "credential had no effect");
            return Vec::new();
        }

        let events = admission_events(&self.state, &next);
        self.state = next;
        self.messages.push(SnapshotMessage {
            credential: credential.clone(),
            feed_key,
        });
        if let Some(id) = id {
            self.applied.insert(id);
        }

        for event in &events {
            debug!(?event, "admitted");
            // No subscribers is fine.
            let _ = self.events.send(event.clone());
        }
        events
    }

    /// Check a challenge response against a derived copy of the state.
    ///
    /// The supporting credentials are folded into a clone of the committed
    /// state that is dropped before returning, so nothing a remote peer
    /// supplies here is ever admitted durably.
    pub fn authenticate(&self, challenge: &AuthChallenge, response: &AuthResponse) -> bool {
        let auth = verify_credential(&response.auth, None);

        let (party, identity, device) = match auth.claim() {
            Claim::Auth {
                party,
                identity,
                device,
            } => (party, identity, device),
            other => {
                debug!(claim = other.type_url(), "auth response is not an AuthClaim");
                return false;
            }
        };

        if party != self.party_key() {
            debug!(%party, "auth claim for another party");
            return false;
        }

        let proof = match auth.proof_by(device) {
            Some(proof) => proof,
            None => {
                debug!(%device, "auth claim not signed by its device");
                return false;
            }
        };

        if proof.nonce.as_deref() != Some(challenge.nonce.as_ref()) {
            debug!(%device, "auth nonce does not match challenge");
            return false;
        }

        if response.auth.is_expired(now_millis()) {
            debug!(%device, "auth credential expired");
            return false;
        }

        let derived = response.supporting.iter().fold(self.state.clone(), |state, credential| {
            process_party_credential(&state, &verify_credential(credential, None))
        });

        let ok = derived.is_admitted_member_with_device(identity, device);
        debug!(%identity, %device, ok, "authentication result");
        ok
    }

    /// Snapshot the replay log.
    pub fn create_snapshot(&self) -> HaloStateSnapshot {
        HaloStateSnapshot {
            party: *self.party_key(),
            messages: self.messages.clone(),
        }
    }

    /// Rebuild state by replaying `snapshot` into this (pristine) manager.
    pub fn restore_snapshot(&mut self, snapshot: &HaloStateSnapshot) -> Result<Vec<AdmissionEvent>> {
        if !self.is_pristine() {
            return Err(HaloError::NotPristine {
                messages: self.messages.len(),
            });
        }
        if &snapshot.party != self.party_key() {
            return Err(HaloError::PartyMismatch {
                expected: self.party_key().to_hex(),
                actual: snapshot.party.to_hex(),
            });
        }

        let mut events = Vec::new();
        for message in &snapshot.messages {
            events.extend(self.process_credential_from(&message.credential, message.feed_key));
        }
        Ok(events)
    }
}

/// Diff two states into the admissions that separate them.
fn admission_events(prev: &PartyState, next: &PartyState) -> Vec<AdmissionEvent> {
    let mut events = Vec::new();

    for member in next.members().members() {
        if !prev.members().contains(&member.key) {
            events.push(AdmissionEvent::MemberAdmitted {
                identity: member.key,
                added_by: member.added_by,
            });
        }
    }

    for (identity, devices) in next.member_devices() {
        let before = prev.devices_of(identity);
        for device in devices.devices() {
            if !before.map_or(false, |b| b.contains(&device.key)) {
                events.push(AdmissionEvent::DeviceAdmitted {
                    identity: *identity,
                    device: device.key,
                    added_by: device.added_by,
                });
            }
        }
    }

    for feed in next.feeds().feeds() {
        if !prev.feeds().contains(&feed.key) {
            events.push(AdmissionEvent::FeedAdmitted {
                feed: feed.key,
                added_by: feed.added_by,
                parent_feed: feed.parent_feed,
            });
        }
    }

    events
}
