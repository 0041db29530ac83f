//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use cmix_rounds::{Result, RoundTracker, TrackerConfig};
use cmix_rounds_core::{KnownRounds, RoundId};
use cmix_rounds_store::MemoryStore;

/// Build a tracker of `capacity` with each of `rounds` force-checked in order.
pub fn known_rounds_with(
    capacity: usize,
    rounds: impl IntoIterator<Item = RoundId>,
) -> KnownRounds {
    let mut kr = KnownRounds::new(capacity);
    for rid in rounds {
        kr.force_check(rid);
    }
    kr
}

/// A 320-round tracker whose window wraps the buffer.
///
/// Window `[75, 200]` starts at bit 267 of alternating empty and full words.
/// Rounds 75..128 sit in the last word and 128..192 in the first, both
/// unchecked; 192..=200 land in the full second word.
pub fn wrapped_window() -> KnownRounds {
    let words = vec![0, u64::MAX, 0, u64::MAX, 0];
    match KnownRounds::from_parts(words, 75, 200, 267) {
        Ok(kr) => kr,
        Err(e) => panic!("wrapped window fixture is invalid: {}", e),
    }
}

/// A tracker fixture backed by a fresh in-memory store.
pub struct TestFixture {
    pub config: TrackerConfig,
}

impl TestFixture {
    /// Create a fixture with the default configuration.
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
        }
    }

    /// Create a fixture whose trackers hold `capacity` rounds.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            config: TrackerConfig {
                capacity,
                ..TrackerConfig::default()
            },
        }
    }

    /// Open a tracker under `key` on its own memory store.
    pub async fn tracker(&self, key: &str) -> Result<RoundTracker<MemoryStore>> {
        RoundTracker::open(MemoryStore::new(), key, self.config.clone()).await
    }

    /// Open a tracker with every round in `rounds` checked.
    pub async fn tracker_with(
        &self,
        key: &str,
        rounds: impl IntoIterator<Item = RoundId>,
    ) -> Result<RoundTracker<MemoryStore>> {
        let tracker = self.tracker(key).await?;
        for rid in rounds {
            tracker.force_check(rid).await?;
        }
        Ok(tracker)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create peers that have each seen a different slice of the same history.
///
/// Peer `i` has checked every round below `step * (i + 1)` that is not a
/// multiple of `i + 2`, so later peers are further ahead and each one leaves
/// different gaps.
pub fn peer_fixtures(count: usize, capacity: usize, step: u64) -> Vec<KnownRounds> {
    (0..count as u64)
        .map(|i| {
            let stride = i + 2;
            known_rounds_with(
                capacity,
                (0..step * (i + 1)).filter(|rid| rid % stride != 0),
            )
        })
        .collect()
}
