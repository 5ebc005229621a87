//! Devices of one identity.
//!
//! The authorization predicate is normally recursive over the state being
//! folded: the identity itself, or any device it (transitively) admitted.
//! Folding must therefore be strictly sequential.

use concord_core::{Claim, PublicKey, VerifiedCredential};
use serde::{Deserialize, Serialize};

/// An admitted device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub key: PublicKey,
    pub added_by: PublicKey,
}

/// Devices of one identity, in admission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicesState {
    identity: PublicKey,
    devices: Vec<DeviceInfo>,
}

impl DevicesState {
    pub fn create(identity: PublicKey) -> Self {
        Self {
            identity,
            devices: Vec::new(),
        }
    }

    pub fn identity(&self) -> &PublicKey {
        &self.identity
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    pub fn get(&self, key: &PublicKey) -> Option<&DeviceInfo> {
        self.devices.iter().find(|d| &d.key == key)
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.devices.iter().map(|d| &d.key)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// True for the identity itself or any of its admitted devices.
    pub fn is_identity_or_device(&self, key: &PublicKey) -> bool {
        key == &self.identity || self.contains(key)
    }
}

/// Fold one `DeviceClaim` for this identity into `state`.
pub fn reduce(
    state: &DevicesState,
    credential: &VerifiedCredential,
    is_authorized: impl Fn(&PublicKey) -> bool,
) -> DevicesState {
    let device = match credential.claim() {
        Claim::Device { identity, device } if identity == state.identity() => device,
        _ => return state.clone(),
    };

    if state.contains(device) {
        return state.clone();
    }

    match credential.find_proof(is_authorized) {
        Some(proof) => {
            let mut next = state.clone();
            next.devices.push(DeviceInfo {
                key: *device,
                added_by: proof.signer,
            });
            next
        }
        None => state.clone(),
    }
}

/// Bind an authorization predicate into a reducer.
pub fn processor<F>(is_authorized: F) -> impl Fn(&DevicesState, &VerifiedCredential) -> DevicesState
where
    F: Fn(&PublicKey) -> bool,
{
    move |state: &DevicesState, credential: &VerifiedCredential| reduce(state, credential, &is_authorized)
}
