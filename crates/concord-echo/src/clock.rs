//! The timeframe clock: which feed positions this peer has consumed.
//!
//! The clock is the gate for causal delivery. A message carries the
//! timeframe its author had consumed when writing it; the message is held
//! back while that timeframe reaches past what the local clock has seen.

use concord_core::{PublicKey, Timeframe};
use tokio::sync::watch;

/// True if `candidate` depends on feed positions `local` has not consumed.
///
/// A position `seq` on a feed is a gap while the local value for that feed
/// is below `seq - 1`. A feed with no local entry has consumed nothing.
pub fn has_gaps(local: &Timeframe, candidate: &Timeframe) -> bool {
    candidate.frames().any(|(feed_key, seq)| {
        seq > 0 && local.get(feed_key).map_or(true, |consumed| consumed < seq - 1)
    })
}

/// Per-feed vector clock shared between the pipeline and its observers.
#[derive(Debug)]
pub struct TimeframeClock {
    timeframe: watch::Sender<Timeframe>,
}

impl TimeframeClock {
    pub fn new(start: Timeframe) -> Self {
        let (timeframe, _) = watch::channel(start);
        Self { timeframe }
    }

    /// The current timeframe.
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe.borrow().clone()
    }

    /// Record that `(feed_key, seq)` was consumed. Never moves backwards.
    pub fn update_timeframe(&self, feed_key: PublicKey, seq: u64) {
        self.timeframe
            .send_if_modified(|timeframe| timeframe.advance(feed_key, seq));
    }

    /// Replace the timeframe wholesale, e.g. when resuming from a snapshot.
    pub fn set_timeframe(&self, timeframe: Timeframe) {
        self.timeframe.send_replace(timeframe);
    }

    pub fn has_gaps(&self, candidate: &Timeframe) -> bool {
        has_gaps(&self.timeframe.borrow(), candidate)
    }

    /// Observe every change to the timeframe.
    pub fn subscribe(&self) -> watch::Receiver<Timeframe> {
        self.timeframe.subscribe()
    }

    /// Resolve once every feed in `target` has been consumed up to its
    /// sequence number.
    pub async fn wait_until_reached(&self, target: &Timeframe) {
        let mut updates = self.timeframe.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = updates
            .wait_for(|current| Timeframe::dependencies(target, current).is_empty())
            .await;
    }
}

impl Default for TimeframeClock {
    fn default() -> Self {
        Self::new(Timeframe::new())
    }
}
