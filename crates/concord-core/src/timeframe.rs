//! Timeframes: per-feed sequence vectors.
//!
//! A timeframe maps each feed key to the highest sequence number consumed
//! from it. Writers stamp their current timeframe onto outgoing messages;
//! readers use it to defer a message until its dependencies are local.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;

/// A vector clock keyed by feed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeframe(BTreeMap<PublicKey, u64>);

impl Timeframe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feed_key: &PublicKey) -> Option<u64> {
        self.0.get(feed_key).copied()
    }

    /// Set a feed's position, overwriting any previous value.
    pub fn set(&mut self, feed_key: PublicKey, seq: u64) {
        self.0.insert(feed_key, seq);
    }

    /// Raise a feed's position to `seq` if it is higher than the current one.
    ///
    /// Returns true if the timeframe changed.
    pub fn advance(&mut self, feed_key: PublicKey, seq: u64) -> bool {
        match self.0.get_mut(&feed_key) {
            Some(current) if *current >= seq => false,
            Some(current) => {
                *current = seq;
                true
            }
            None => {
                self.0.insert(feed_key, seq);
                true
            }
        }
    }

    /// Pointwise maximum with `other`.
    pub fn merge(&mut self, other: &Timeframe) {
        for (feed_key, seq) in other.frames() {
            self.advance(*feed_key, seq);
        }
    }

    pub fn frames(&self) -> impl Iterator<Item = (&PublicKey, u64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    pub fn feed_keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries of `target` that `current` has not reached yet.
    ///
    /// Empty when `current` covers `target` (every feed at or beyond).
    pub fn dependencies(target: &Timeframe, current: &Timeframe) -> Timeframe {
        target
            .frames()
            .filter(|(feed_key, seq)| current.get(feed_key).map_or(true, |have| have < *seq))
            .map(|(feed_key, seq)| (*feed_key, seq))
            .collect()
    }
}

impl FromIterator<(PublicKey, u64)> for Timeframe {
    fn from_iter<I: IntoIterator<Item = (PublicKey, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(b: u8) -> PublicKey {
        PublicKey::from_bytes([b; 32])
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut tf = Timeframe::new();
        assert!(tf.advance(key(1), 3));
        assert!(!tf.advance(key(1), 2));
        assert!(!tf.advance(key(1), 3));
        assert_eq!(tf.get(&key(1)), Some(3));
        assert!(tf.advance(key(1), 4));
        assert_eq!(tf.get(&key(1)), Some(4));
    }

    #[test]
    fn test_merge_takes_max() {
        let mut a: Timeframe = [(key(1), 5), (key(2), 1)].into_iter().collect();
        let b: Timeframe = [(key(1), 2), (key(3), 7)].into_iter().collect();
        a.merge(&b);
        assert_eq!(a.get(&key(1)), Some(5));
        assert_eq!(a.get(&key(2)), Some(1));
        assert_eq!(a.get(&key(3)), Some(7));
    }

    #[test]
    fn test_dependencies() {
        let target: Timeframe = [(key(1), 5), (key(2), 2)].into_iter().collect();
        let current: Timeframe = [(key(1), 5), (key(2), 1)].into_iter().collect();
        let deps = Timeframe::dependencies(&target, &current);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps.get(&key(2)), Some(2));

        let caught_up: Timeframe = [(key(1), 6), (key(2), 2)].into_iter().collect();
        assert!(Timeframe::dependencies(&target, &caught_up).is_empty());
    }

    #[test]
    fn test_json_uses_hex_keys() {
        let tf: Timeframe = [(key(0xab), 9)].into_iter().collect();
        let json = serde_json::to_value(&tf).unwrap();
        assert_eq!(json[key(0xab).to_hex()], 9);
        let back: Timeframe = serde_json::from_value(json).unwrap();
        assert_eq!(back, tf);
    }

    proptest! {
        #[test]
        fn prop_advance_never_decreases(updates in proptest::collection::vec((0u8..4, 0u64..100), 0..50)) {
            let mut tf = Timeframe::new();
            for (k, seq) in updates {
                let before = tf.get(&key(k));
                tf.advance(key(k), seq);
                let after = tf.get(&key(k)).unwrap();
                prop_assert!(after >= seq);
                if let Some(before) = before {
                    prop_assert!(after >= before);
                }
            }
        }
    }
}
