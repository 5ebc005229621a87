//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use bytes::Bytes;
use concord::OpenOptions;
use concord_core::{Claim, Credential, CredentialBuilder, Keypair, PublicKey, Timeframe};
use concord_echo::{EchoEnvelope, FeedMessage};
use concord_feed::{FeedStore, InsertResult};
use concord_halo::{AuthChallenge, AuthResponse};

/// Signing time used by every fixture credential.
pub const FIXTURE_TIME: i64 = 1736870400000;

/// A party with one member, one device and one genesis feed.
pub struct PartyFixture {
    pub party: Keypair,
    pub identity: Keypair,
    pub device: Keypair,
    pub feed: Keypair,
}

impl PartyFixture {
    /// Create a fixture with random keys.
    pub fn new() -> Self {
        Self {
            party: Keypair::generate(),
            identity: Keypair::generate(),
            device: Keypair::generate(),
            feed: Keypair::generate(),
        }
    }

    /// Create with deterministic keys derived from `seed`.
    pub fn with_seed(seed: u8) -> Self {
        let key = |role: u8| {
            let mut bytes = [seed; 32];
            bytes[0] = role;
            Keypair::from_seed(&bytes)
        };
        Self {
            party: key(1),
            identity: key(2),
            device: key(3),
            feed: key(4),
        }
    }

    pub fn party_key(&self) -> PublicKey {
        self.party.public_key()
    }

    pub fn identity_key(&self) -> PublicKey {
        self.identity.public_key()
    }

    pub fn device_key(&self) -> PublicKey {
        self.device.public_key()
    }

    pub fn feed_key(&self) -> PublicKey {
        self.feed.public_key()
    }

    /// Sign `claim` at [`FIXTURE_TIME`].
    pub fn sign(&self, claim: Claim, signer: &Keypair) -> concord_core::Result<Credential> {
        CredentialBuilder::new(claim)
            .created(FIXTURE_TIME)
            .sign(&[signer])
    }

    /// The party genesis, signed by the party key.
    pub fn genesis(&self) -> concord_core::Result<Credential> {
        self.sign(
            Claim::PartyGenesis {
                party: self.party_key(),
                identity: self.identity_key(),
                feed: self.feed_key(),
            },
            &self.party,
        )
    }

    pub fn member(&self, identity: PublicKey, signer: &Keypair) -> concord_core::Result<Credential> {
        self.sign(
            Claim::Member {
                party: self.party_key(),
                identity,
            },
            signer,
        )
    }

    /// Admits the fixture device for the fixture identity.
    pub fn device_claim(&self) -> concord_core::Result<Credential> {
        self.sign(
            Claim::Device {
                identity: self.identity_key(),
                device: self.device_key(),
            },
            &self.identity,
        )
    }

    pub fn feed_admit(&self, feed: PublicKey, signer: &Keypair) -> concord_core::Result<Credential> {
        self.sign(
            Claim::FeedAdmit {
                party: self.party_key(),
                feed,
            },
            signer,
        )
    }

    /// Answer `challenge` as the fixture device, supported by its device claim.
    pub fn auth_response(&self, challenge: &AuthChallenge) -> concord_halo::Result<AuthResponse> {
        AuthResponse::create(
            self.party_key(),
            self.identity_key(),
            &self.device,
            challenge,
            vec![self.device_claim()?],
        )
    }

    /// Open with the genesis feed as both first and writable feed.
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::new()
            .genesis_feed(self.feed_key())
            .write_feed(self.feed_key())
    }
}

impl Default for PartyFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a credential as a feed block.
pub fn halo_block(credential: Credential) -> concord_echo::Result<Bytes> {
    Ok(Bytes::from(
        FeedMessage::halo(Timeframe::new(), credential).to_bytes()?,
    ))
}

/// Encode an ECHO mutation as a feed block.
pub fn echo_block(
    timeframe: Timeframe,
    item_id: &str,
    mutation: impl Into<Bytes>,
) -> concord_echo::Result<Bytes> {
    Ok(Bytes::from(
        FeedMessage::echo(timeframe, EchoEnvelope::new(item_id, mutation)).to_bytes()?,
    ))
}

/// Copy every block of `feed_key` that `to` is missing.
///
/// Returns the number of blocks inserted.
pub async fn replicate_feed<A, B>(from: &A, to: &B, feed_key: &PublicKey) -> concord_feed::Result<usize>
where
    A: FeedStore + ?Sized,
    B: FeedStore + ?Sized,
{
    let start = to.feed_length(feed_key).await?;
    let length = from.feed_length(feed_key).await?;
    if start >= length {
        return Ok(0);
    }
    let mut inserted = 0;
    for block in from.get_range(feed_key, start, length - start).await? {
        if to.insert_block(block).await? == InsertResult::Inserted {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Create multiple deterministic fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<PartyFixture> {
    (0..count).map(|i| PartyFixture::with_seed(i as u8)).collect()
}
