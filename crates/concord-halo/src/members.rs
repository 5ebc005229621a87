//! Party membership.
//!
//! Built by folding verified credentials in order. A member is admitted only
//! when one of the credential's verified signers satisfies the caller's
//! authorization predicate; everything else leaves the state unchanged.

use concord_core::{Claim, PublicKey, VerifiedCredential};
use serde::{Deserialize, Serialize};

/// An admitted member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub key: PublicKey,

    /// Signer of the proof that admitted this member.
    pub added_by: PublicKey,
}

/// Members of one party, in admission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersState {
    party: PublicKey,
    members: Vec<MemberInfo>,
}

impl MembersState {
    /// Empty membership for `party`.
    pub fn create(party: PublicKey) -> Self {
        Self {
            party,
            members: Vec::new(),
        }
    }

    pub fn party(&self) -> &PublicKey {
        &self.party
    }

    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub fn get(&self, key: &PublicKey) -> Option<&MemberInfo> {
        self.members.iter().find(|m| &m.key == key)
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.members.iter().map(|m| &m.key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn admit(&self, key: PublicKey, added_by: PublicKey) -> Self {
        let mut next = self.clone();
        next.members.push(MemberInfo { key, added_by });
        next
    }
}

/// Fold one credential into `state`.
///
/// `MemberClaim`s for this party admit their identity if a verified signer
/// satisfies `is_authorized`. A `PartyGenesis` claim admits its identity only
/// when signed by the party key itself. Known members are never re-added.
pub fn reduce(
    state: &MembersState,
    credential: &VerifiedCredential,
    is_authorized: impl Fn(&PublicKey) -> bool,
) -> MembersState {
    let (identity, proof) = match credential.claim() {
        Claim::Member { party, identity } if party == state.party() => {
            (identity, credential.find_proof(is_authorized))
        }
        Claim::PartyGenesis {
            party, identity, ..
        } if party == state.party() => (identity, credential.proof_by(party)),
        _ => return state.clone(),
    };

    match proof {
        Some(proof) if !state.contains(identity) => state.admit(*identity, proof.signer),
        _ => state.clone(),
    }
}

/// Bind an authorization predicate into a reducer.
pub fn processor<F>(is_authorized: F) -> impl Fn(&MembersState, &VerifiedCredential) -> MembersState
where
    F: Fn(&PublicKey) -> bool,
{
    move |state: &MembersState, credential: &VerifiedCredential| reduce(state, credential, &is_authorized)
}
