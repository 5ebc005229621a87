//! The ordering oracle.
//!
//! At every pipeline step each tracked feed offers its next unread block as
//! a [`Candidate`]. [`MessageSelector::select`] picks the one that is safe
//! to consume now, or none if every candidate is still waiting on trust or
//! on causal dependencies.

use concord_core::{verify_credential, Claim, PublicKey, Timeframe};
use concord_feed::FeedBlock;
use tracing::debug;

use crate::clock::has_gaps;
use crate::messages::{FeedMessage, Payload};

/// The next unread block of one feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub feed_key: PublicKey,
    pub seq: u64,
    /// `None` if the block did not decode.
    pub message: Option<FeedMessage>,
}

impl Candidate {
    /// Decode a stored block, keeping undecodable blocks as `None`.
    pub fn decode(block: &FeedBlock) -> Self {
        let message = match FeedMessage::from_bytes(&block.data) {
            Ok(message) => Some(message),
            Err(e) => {
                debug!(feed = %block.feed_key, seq = block.seq, error = %e, "undecodable block");
                None
            }
        };
        Self {
            feed_key: block.feed_key,
            seq: block.seq,
            message,
        }
    }
}

/// What the selector needs to know about the party's trust state.
pub trait PartyTrust {
    fn party_key(&self) -> &PublicKey;

    fn is_feed_admitted(&self, feed_key: &PublicKey) -> bool;

    /// True while nothing has been admitted, so only a genesis can start the party.
    fn genesis_required(&self) -> bool;

    /// True if `key` may sign admissions (the party key or a member/device).
    fn can_admit(&self, key: &PublicKey) -> bool;
}

/// Picks the next candidate to consume.
pub struct MessageSelector<'a, T: PartyTrust + ?Sized> {
    trust: &'a T,
    local: &'a Timeframe,
}

impl<'a, T: PartyTrust + ?Sized> MessageSelector<'a, T> {
    /// `local` is the timeframe consumed so far.
    pub fn new(trust: &'a T, local: &'a Timeframe) -> Self {
        Self { trust, local }
    }

    /// Index of the candidate to consume next, or `None` if none is ready.
    ///
    /// ECHO candidates are checked first since they need no signature
    /// verification. Ties go to the earliest candidate.
    pub fn select(&self, candidates: &[Candidate]) -> Option<usize> {
        candidates
            .iter()
            .position(|c| self.echo_ready(c))
            .or_else(|| candidates.iter().position(|c| self.halo_ready(c)))
    }

    fn echo_ready(&self, candidate: &Candidate) -> bool {
        match &candidate.message {
            Some(FeedMessage {
                timeframe,
                payload: Payload::Echo(_),
            }) => self.trust.is_feed_admitted(&candidate.feed_key) && !has_gaps(self.local, timeframe),
            // Consumed and dropped by the pipeline so the feed keeps moving.
            None => self.trust.is_feed_admitted(&candidate.feed_key),
            Some(_) => false,
        }
    }

    fn halo_ready(&self, candidate: &Candidate) -> bool {
        let credential = match candidate.message.as_ref().and_then(FeedMessage::credential) {
            Some(credential) => credential,
            None => return false,
        };

        if self.trust.is_feed_admitted(&candidate.feed_key) {
            return true;
        }

        match &credential.claim {
            Claim::PartyGenesis { party, .. } => {
                self.trust.genesis_required() && party == self.trust.party_key()
            }
            Claim::FeedAdmit { party, feed } => {
                feed == &candidate.feed_key
                    && party == self.trust.party_key()
                    && verify_credential(credential, Some(candidate.feed_key))
                        .find_proof(|signer| self.trust.can_admit(signer))
                        .is_some()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use concord_core::{Credential, CredentialBuilder, Keypair};

    use crate::messages::EchoEnvelope;

    /// Trust state driven directly by the test.
    struct FixedTrust {
        party: PublicKey,
        feeds: BTreeSet<PublicKey>,
        admitters: BTreeSet<PublicKey>,
    }

    impl FixedTrust {
        fn new(party: PublicKey) -> Self {
            Self {
                party,
                feeds: BTreeSet::new(),
                admitters: BTreeSet::new(),
            }
        }
    }

    impl PartyTrust for FixedTrust {
        fn party_key(&self) -> &PublicKey {
            &self.party
        }

        fn is_feed_admitted(&self, feed_key: &PublicKey) -> bool {
            self.feeds.contains(feed_key)
        }

        fn genesis_required(&self) -> bool {
            self.feeds.is_empty() && self.admitters.is_empty()
        }

        fn can_admit(&self, key: &PublicKey) -> bool {
            key == &self.party || self.admitters.contains(key)
        }
    }

    fn key(b: u8) -> PublicKey {
        PublicKey::from_bytes([b; 32])
    }

    fn echo(feed: u8, seq: u64, timeframe: Timeframe) -> Candidate {
        Candidate {
            feed_key: key(feed),
            seq,
            message: Some(FeedMessage::echo(timeframe, EchoEnvelope::new("item", vec![]))),
        }
    }

    fn halo(feed: PublicKey, credential: Credential) -> Candidate {
        Candidate {
            feed_key: feed,
            seq: 0,
            message: Some(FeedMessage::halo(Timeframe::new(), credential)),
        }
    }

    fn genesis(party: &Keypair, feed: PublicKey) -> Credential {
        CredentialBuilder::new(Claim::PartyGenesis {
            party: party.public_key(),
            identity: key(50),
            feed,
        })
        .sign(&[party])
        .unwrap()
    }

    #[test]
    fn test_echo_preferred_over_halo() {
        let party = Keypair::generate();
        let mut trust = FixedTrust::new(party.public_key());
        trust.feeds.insert(key(1));
        trust.feeds.insert(key(2));

        let candidates = vec![
            halo(key(1), genesis(&party, key(1))),
            echo(2, 0, Timeframe::new()),
        ];
        let local = Timeframe::new();
        assert_eq!(MessageSelector::new(&trust, &local).select(&candidates), Some(1));
    }

    #[test]
    fn test_echo_gated_on_gaps() {
        let party = Keypair::generate();
        let mut trust = FixedTrust::new(party.public_key());
        trust.feeds.insert(key(1));
        trust.feeds.insert(key(2));

        let declared: Timeframe = [(key(1), 5)].into_iter().collect();
        let candidates = vec![echo(2, 0, declared)];

        let behind: Timeframe = [(key(1), 3)].into_iter().collect();
        assert_eq!(MessageSelector::new(&trust, &behind).select(&candidates), None);

        let caught_up: Timeframe = [(key(1), 4)].into_iter().collect();
        assert_eq!(MessageSelector::new(&trust, &caught_up).select(&candidates), Some(0));
    }

    #[test]
    fn test_echo_from_unadmitted_feed_waits() {
        let trust = FixedTrust::new(key(100));
        let local = Timeframe::new();
        assert_eq!(
            MessageSelector::new(&trust, &local).select(&[echo(1, 0, Timeframe::new())]),
            None
        );
    }

    #[test]
    fn test_genesis_bootstrap() {
        let party = Keypair::generate();
        let trust = FixedTrust::new(party.public_key());
        let local = Timeframe::new();
        let stranger = Keypair::generate();

        let member = CredentialBuilder::new(Claim::Member {
            party: party.public_key(),
            identity: stranger.public_key(),
        })
        .sign(&[&party])
        .unwrap();

        let candidates = vec![halo(key(1), member), halo(key(2), genesis(&party, key(2)))];
        assert_eq!(MessageSelector::new(&trust, &local).select(&candidates), Some(1));

        // Only the non-genesis message left: not ready.
        assert_eq!(MessageSelector::new(&trust, &local).select(&candidates[..1]), None);
    }

    #[test]
    fn test_genesis_ignored_once_party_exists() {
        let party = Keypair::generate();
        let mut trust = FixedTrust::new(party.public_key());
        trust.feeds.insert(key(1));
        let local = Timeframe::new();

        let candidates = vec![halo(key(2), genesis(&party, key(2)))];
        assert_eq!(MessageSelector::new(&trust, &local).select(&candidates), None);
    }

    #[test]
    fn test_genesis_for_other_party_not_selected() {
        let party = Keypair::generate();
        let other = Keypair::generate();
        let trust = FixedTrust::new(party.public_key());
        let local = Timeframe::new();

        let candidates = vec![halo(key(2), genesis(&other, key(2)))];
        assert_eq!(MessageSelector::new(&trust, &local).select(&candidates), None);
    }

    #[test]
    fn test_feed_admit_naming_own_feed() {
        let party = Keypair::generate();
        let member = Keypair::generate();
        let new_feed = Keypair::generate().public_key();
        let mut trust = FixedTrust::new(party.public_key());
        trust.feeds.insert(key(1));
        trust.admitters.insert(member.public_key());
        let local = Timeframe::new();

        let admit = |feed: PublicKey, signer: &Keypair| {
            CredentialBuilder::new(Claim::FeedAdmit {
                party: party.public_key(),
                feed,
            })
            .sign(&[signer])
            .unwrap()
        };

        let selector = MessageSelector::new(&trust, &local);
        assert_eq!(selector.select(&[halo(new_feed, admit(new_feed, &member))]), Some(0));
        assert_eq!(selector.select(&[halo(new_feed, admit(new_feed, &party))]), Some(0));

        // Names some other feed.
        assert_eq!(selector.select(&[halo(new_feed, admit(key(9), &member))]), None);

        // Signed by nobody trusted.
        let stranger = Keypair::generate();
        assert_eq!(selector.select(&[halo(new_feed, admit(new_feed, &stranger))]), None);
    }

    #[test]
    fn test_undecodable_block_selectable_once_feed_admitted() {
        let mut trust = FixedTrust::new(key(100));
        let local = Timeframe::new();
        let broken = Candidate {
            feed_key: key(1),
            seq: 0,
            message: None,
        };

        assert_eq!(MessageSelector::new(&trust, &local).select(&[broken.clone()]), None);
        trust.feeds.insert(key(1));
        assert_eq!(MessageSelector::new(&trust, &local).select(&[broken]), Some(0));
    }

    #[test]
    fn test_decode_keeps_broken_blocks() {
        let block = FeedBlock {
            feed_key: key(3),
            seq: 7,
            data: bytes::Bytes::from_static(b"\xff\xff"),
        };
        let candidate = Candidate::decode(&block);
        assert_eq!(candidate.seq, 7);
        assert!(candidate.message.is_none());
    }
}
