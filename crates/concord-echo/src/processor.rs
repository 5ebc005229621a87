//! Party processor: the HALO side of the pipeline.
//!
//! Wraps the [`PartyStateManager`] with the feed provenance the pipeline
//! knows about, and answers the selector's trust questions.

use concord_core::{Credential, PublicKey};
use concord_halo::{
    AdmissionEvent, AuthChallenge, AuthResponse, HaloStateSnapshot, PartyState, PartyStateManager,
};
use tokio::sync::broadcast;

use crate::error::Result;
use crate::selector::PartyTrust;

/// Owns a party's committed admission state on behalf of a pipeline.
pub struct PartyProcessor {
    manager: PartyStateManager,
}

impl PartyProcessor {
    pub fn new(party_key: PublicKey) -> Self {
        Self {
            manager: PartyStateManager::new(party_key),
        }
    }

    pub fn state(&self) -> &PartyState {
        self.manager.state()
    }

    pub fn manager(&self) -> &PartyStateManager {
        &self.manager
    }

    pub fn feed_keys(&self) -> Vec<PublicKey> {
        self.state().feed_keys()
    }

    pub fn member_keys(&self) -> Vec<PublicKey> {
        self.state().member_keys()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AdmissionEvent> {
        self.manager.subscribe()
    }

    /// Fold a credential read from `feed_key`.
    pub fn process_message(&mut self, credential: &Credential, feed_key: PublicKey) -> Vec<AdmissionEvent> {
        self.manager.process_credential_from(credential, Some(feed_key))
    }

    pub fn authenticate(&self, challenge: &AuthChallenge, response: &AuthResponse) -> bool {
        self.manager.authenticate(challenge, response)
    }

    pub fn create_snapshot(&self) -> HaloStateSnapshot {
        self.manager.create_snapshot()
    }

    pub fn restore_snapshot(&mut self, snapshot: &HaloStateSnapshot) -> Result<Vec<AdmissionEvent>> {
        Ok(self.manager.restore_snapshot(snapshot)?)
    }
}

impl PartyTrust for PartyProcessor {
    fn party_key(&self) -> &PublicKey {
        self.manager.party_key()
    }

    fn is_feed_admitted(&self, feed_key: &PublicKey) -> bool {
        self.state().is_feed_admitted(feed_key)
    }

    fn genesis_required(&self) -> bool {
        let state = self.state();
        state.members().is_empty() && state.feeds().is_empty()
    }

    fn can_admit(&self, key: &PublicKey) -> bool {
        self.state().can_admit(key)
    }
}
