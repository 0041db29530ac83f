//! In-memory implementation of the RoundsStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use cmix_rounds_core::BuffChanges;

use crate::error::{Result, StoreError};
use crate::traits::{RoundsStore, StoredRounds};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<String, StoredRounds>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoundsStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<StoredRounds>> {
        let inner = self.inner.read()?;
        Ok(inner.get(key).cloned())
    }

    async fn save(&self, key: &str, rounds: &StoredRounds) -> Result<()> {
        let mut inner = self.inner.write()?;
        inner.insert(key.to_owned(), rounds.clone());
        Ok(())
    }

    async fn apply_changes(&self, key: &str, changes: &BuffChanges) -> Result<()> {
        let mut inner = self.inner.write()?;
        let stored = inner
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))?;
        stored.apply(changes)?;
        debug!(key, changed = changes.changes.len(), "applied known rounds patch");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write()?;
        Ok(inner.remove(key).is_some())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let inner = self.inner.read()?;
        Ok(inner.keys().cloned().collect())
    }
}
