//! RoundsStore trait: the abstract interface for known-rounds persistence.
//!
//! This trait keeps the tracker storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cmix_rounds_core::{BuffChanges, KnownRounds, RoundId};

use crate::error::{Result, StoreError};

/// A persisted known-rounds snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRounds {
    /// Every buffer word, in index order.
    pub words: Vec<u64>,
    pub first_unchecked: RoundId,
    pub last_checked: RoundId,
    pub fu_pos: usize,
}

impl StoredRounds {
    /// Rebuild the in-memory tracker state.
    pub fn into_known_rounds(self) -> Result<KnownRounds> {
        Ok(KnownRounds::from_parts(
            self.words,
            self.first_unchecked,
            self.last_checked,
            self.fu_pos,
        )?)
    }

    /// Patch this snapshot in place.
    ///
    /// Fails without modifying anything if a changed word index is past the
    /// end of the stored buffer.
    pub fn apply(&mut self, changes: &BuffChanges) -> Result<()> {
        if let Some(&index) = changes.changes.keys().next_back() {
            if index >= self.words.len() {
                return Err(StoreError::InvalidData(format!(
                    "patch touches word {} of a {}-word buffer",
                    index,
                    self.words.len()
                )));
            }
        }
        changes.apply_to(&mut self.words);
        self.first_unchecked = changes.first_unchecked;
        self.last_checked = changes.last_checked;
        self.fu_pos = changes.fu_pos;
        Ok(())
    }
}

impl From<&KnownRounds> for StoredRounds {
    fn from(kr: &KnownRounds) -> Self {
        Self {
            words: kr.words().to_vec(),
            first_unchecked: kr.first_unchecked(),
            last_checked: kr.last_checked(),
            fu_pos: kr.fu_pos(),
        }
    }
}

/// The RoundsStore trait: async interface for known-rounds persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
#[async_trait]
pub trait RoundsStore: Send + Sync {
    /// Load the snapshot stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<StoredRounds>>;

    /// Replace whatever is stored under `key` with a full snapshot.
    async fn save(&self, key: &str, rounds: &StoredRounds) -> Result<()>;

    /// Apply a sparse patch to an existing snapshot.
    ///
    /// Returns `NotFound` if nothing is stored under `key`, and `InvalidData`
    /// if the patch does not fit the stored buffer.
    async fn apply_changes(&self, key: &str, changes: &BuffChanges) -> Result<()>;

    /// Remove the snapshot under `key`. Returns whether one existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All stored keys, sorted.
    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// Extension trait for working with [`KnownRounds`] directly.
pub trait StoreExt: RoundsStore {
    /// Load and rebuild the tracker stored under `key`.
    fn load_known_rounds(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<KnownRounds>>> + Send;

    /// Save a full snapshot of `rounds` under `key`.
    fn save_known_rounds(
        &self,
        key: &str,
        rounds: &KnownRounds,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

impl<S: RoundsStore + ?Sized> StoreExt for S {
    async fn load_known_rounds(&self, key: &str) -> Result<Option<KnownRounds>> {
        match self.load(key).await? {
            Some(stored) => Ok(Some(stored.into_known_rounds()?)),
            None => Ok(None),
        }
    }

    async fn save_known_rounds(&self, key: &str, rounds: &KnownRounds) -> Result<()> {
        let stored = StoredRounds::from(rounds);
        self.save(key, &stored).await
    }
}
