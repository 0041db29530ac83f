//! The RoundTracker: a persistent, shareable owner of one [`KnownRounds`].
//!
//! `KnownRounds` itself is a plain value with no internal locking. The tracker
//! wraps it in an async mutex, ties it to a storage key, and writes sparse
//! patches back to the store.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use cmix_rounds_core::{KnownRounds, RoundId, UncheckedRange};
use cmix_rounds_store::{RoundsStore, StoreError, StoreExt, StoredRounds};

use crate::error::Result;

/// Configuration for a [`RoundTracker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Rounds the buffer can hold. Rounded up to whole 64-bit words.
    pub capacity: usize,
    /// How far behind `last_checked` an unchecked round is still retried
    /// before it is reported as unknown.
    pub lookback: u64,
    /// Cap on rounds returned by one `range_unchecked` call. Zero is no cap.
    pub max_pickups: usize,
    /// Cap on round predicate calls in one peer-masked scan.
    pub max_checked: usize,
    /// Write a patch to the store after every mutation.
    pub persist_on_check: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            lookback: 500,
            max_pickups: 100,
            max_checked: 1000,
            persist_on_check: false,
        }
    }
}

impl TrackerConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

struct TrackerState {
    rounds: KnownRounds,
    /// What the store holds, as of the last successful write.
    persisted: StoredRounds,
}

/// A known-rounds tracker bound to one store key.
pub struct RoundTracker<S: RoundsStore> {
    key: String,
    store: Arc<S>,
    config: TrackerConfig,
    state: Mutex<TrackerState>,
}

impl<S: RoundsStore> RoundTracker<S> {
    /// Load the tracker stored under `key`, or create and save a fresh one.
    pub async fn open(store: S, key: impl Into<String>, config: TrackerConfig) -> Result<Self> {
        let key = key.into();
        let store = Arc::new(store);

        let rounds = match store.load_known_rounds(&key).await? {
            Some(rounds) => {
                let configured = KnownRounds::new(config.capacity).capacity();
                if rounds.capacity() != configured {
                    warn!(
                        key = %key,
                        stored = rounds.capacity(),
                        configured,
                        "stored capacity differs from config, keeping stored"
                    );
                }
                debug!(
                    key = %key,
                    first_unchecked = rounds.first_unchecked(),
                    last_checked = rounds.last_checked(),
                    "loaded known rounds"
                );
                rounds
            }
            None => {
                let rounds = KnownRounds::new(config.capacity);
                store.save_known_rounds(&key, &rounds).await?;
                debug!(key = %key, capacity = rounds.capacity(), "created known rounds");
                rounds
            }
        };

        let persisted = StoredRounds::from(&rounds);
        Ok(Self {
            key,
            store,
            config,
            state: Mutex::new(TrackerState { rounds, persisted }),
        })
    }

    /// The storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The tracker's configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The storage backend.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `rid` has been checked.
    pub async fn checked(&self, rid: RoundId) -> bool {
        self.state.lock().await.rounds.checked(rid)
    }

    pub async fn first_unchecked(&self) -> RoundId {
        self.state.lock().await.rounds.first_unchecked()
    }

    pub async fn last_checked(&self) -> RoundId {
        self.state.lock().await.rounds.last_checked()
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> KnownRounds {
        self.state.lock().await.rounds.clone()
    }

    /// Scan for checked rounds with data, using the configured lookback and
    /// pickup limit.
    pub async fn range_unchecked<F>(&self, oldest_unknown: RoundId, round_check: F) -> UncheckedRange
    where
        F: FnMut(RoundId) -> bool,
    {
        let state = self.state.lock().await;
        state.rounds.range_unchecked(
            oldest_unknown,
            self.config.lookback,
            round_check,
            self.config.max_pickups,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Mark `rid` as checked. Fails if it is a buffer length or more from
    /// the newest checked round.
    pub async fn check(&self, rid: RoundId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.rounds.try_check(rid)?;
        self.after_mutation(&mut state).await
    }

    /// Mark `rid` as checked, sliding the window if needed.
    pub async fn force_check(&self, rid: RoundId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.rounds.force_check(rid);
        self.after_mutation(&mut state).await
    }

    /// Declare every round before `rid` checked.
    pub async fn forward(&self, rid: RoundId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.rounds.forward(rid);
        self.after_mutation(&mut state).await
    }

    /// Check rounds a peer has resolved and we have not.
    ///
    /// `peer` is the peer's marshaled known rounds. Returns the number of
    /// rounds newly marked checked.
    pub async fn check_against_peer<F>(&self, peer: &[u8], round_check: F) -> Result<usize>
    where
        F: FnMut(RoundId) -> bool,
    {
        self.check_against_peer_range(peer, round_check, 0, RoundId::MAX)
            .await
    }

    /// [`check_against_peer`](Self::check_against_peer) with the direct scan
    /// below the peer's window limited to `[start, end)`.
    pub async fn check_against_peer_range<F>(
        &self,
        peer: &[u8],
        round_check: F,
        start: RoundId,
        end: RoundId,
    ) -> Result<usize>
    where
        F: FnMut(RoundId) -> bool,
    {
        let mask = KnownRounds::from_bytes(peer)?;
        let mut state = self.state.lock().await;
        let marked = state.rounds.range_unchecked_masked_range(
            &mask,
            round_check,
            start,
            end,
            self.config.max_checked,
        );
        if marked > 0 {
            self.after_mutation(&mut state).await?;
        }
        Ok(marked)
    }

    /// Serialize the current state.
    pub async fn export(&self) -> Vec<u8> {
        self.state.lock().await.rounds.marshal()
    }

    /// Replace the current state with serialized bytes, keeping capacity.
    ///
    /// Leaves the state untouched if the bytes do not decode or do not fit.
    pub async fn import(&self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut incoming = state.rounds.clone();
        incoming.unmarshal(data)?;
        state.rounds = incoming;
        self.after_mutation(&mut state).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Write the words changed since the last write. Returns whether anything
    /// was written.
    pub async fn persist(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.persist_locked(&mut state).await
    }

    /// Remove this tracker's state from the store.
    pub async fn delete(self) -> Result<bool> {
        Ok(self.store.delete(&self.key).await?)
    }

    async fn after_mutation(&self, state: &mut TrackerState) -> Result<()> {
        if self.config.persist_on_check {
            self.persist_locked(state).await?;
        }
        Ok(())
    }

    async fn persist_locked(&self, state: &mut TrackerState) -> Result<bool> {
        let changes = state.rounds.output_buff_changes(&state.persisted.words)?;
        let persisted = &state.persisted;
        if changes.is_empty()
            && changes.first_unchecked == persisted.first_unchecked
            && changes.last_checked == persisted.last_checked
            && changes.fu_pos == persisted.fu_pos
        {
            trace!(key = %self.key, "nothing to persist");
            return Ok(false);
        }

        match self.store.apply_changes(&self.key, &changes).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                warn!(key = %self.key, "stored known rounds missing, writing full snapshot");
                let full = StoredRounds::from(&state.rounds);
                self.store.save(&self.key, &full).await?;
                state.persisted = full;
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        }

        state.persisted.apply(&changes)?;
        debug!(
            key = %self.key,
            changed_words = changes.changes.len(),
            first_unchecked = changes.first_unchecked,
            last_checked = changes.last_checked,
            "persisted known rounds"
        );
        Ok(true)
    }
}
