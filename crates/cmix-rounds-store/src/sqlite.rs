//! SQLite implementation of the RoundsStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use cmix_rounds_core::BuffChanges;

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{RoundsStore, StoredRounds};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock()?;
            f(&mut conn)
        })
        .await?
    }
}

fn load_rounds(conn: &Connection, key: &str) -> Result<Option<StoredRounds>> {
    let header: Option<(i64, i64, i64, i64)> = conn
        .query_row(
            "SELECT first_unchecked, last_checked, fu_pos, num_words
             FROM known_rounds WHERE key = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((first_unchecked, last_checked, fu_pos, num_words)) = header else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT idx, word FROM known_round_words WHERE key = ?1 ORDER BY idx")?;
    let rows = stmt
        .query_map(params![key], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if rows.len() as i64 != num_words {
        return Err(StoreError::InvalidData(format!(
            "{}: expected {} words, found {}",
            key,
            num_words,
            rows.len()
        )));
    }

    let mut words = Vec::with_capacity(rows.len());
    for (expected, (idx, word)) in rows.into_iter().enumerate() {
        if idx != expected as i64 {
            return Err(StoreError::InvalidData(format!(
                "{}: missing word {}",
                key, expected
            )));
        }
        words.push(word as u64);
    }

    Ok(Some(StoredRounds {
        words,
        first_unchecked: first_unchecked as u64,
        last_checked: last_checked as u64,
        fu_pos: fu_pos as usize,
    }))
}

#[async_trait]
impl RoundsStore for SqliteStore {
    async fn load(&self, key: &str) -> Result<Option<StoredRounds>> {
        let key = key.to_owned();
        self.blocking(move |conn| load_rounds(conn, &key)).await
    }

    async fn save(&self, key: &str, rounds: &StoredRounds) -> Result<()> {
        let key = key.to_owned();
        let rounds = rounds.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO known_rounds (
                    key, first_unchecked, last_checked, fu_pos, num_words, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(key) DO UPDATE SET
                    first_unchecked = excluded.first_unchecked,
                    last_checked = excluded.last_checked,
                    fu_pos = excluded.fu_pos,
                    num_words = excluded.num_words,
                    updated_at = excluded.updated_at",
                params![
                    key,
                    rounds.first_unchecked as i64,
                    rounds.last_checked as i64,
                    rounds.fu_pos as i64,
                    rounds.words.len() as i64,
                    now_millis(),
                ],
            )?;

            tx.execute(
                "DELETE FROM known_round_words WHERE key = ?1",
                params![key],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO known_round_words (key, idx, word) VALUES (?1, ?2, ?3)",
                )?;
                for (idx, &word) in rounds.words.iter().enumerate() {
                    stmt.execute(params![key, idx as i64, word as i64])?;
                }
            }

            tx.commit()?;
            debug!(key = %key, words = rounds.words.len(), "saved known rounds");
            Ok(())
        })
        .await
    }

    async fn apply_changes(&self, key: &str, changes: &BuffChanges) -> Result<()> {
        let key = key.to_owned();
        let changes = changes.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let num_words: Option<i64> = tx
                .query_row(
                    "SELECT num_words FROM known_rounds WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(num_words) = num_words else {
                return Err(StoreError::NotFound(key));
            };

            if let Some(&index) = changes.changes.keys().next_back() {
                if index as i64 >= num_words {
                    return Err(StoreError::InvalidData(format!(
                        "patch touches word {} of a {}-word buffer",
                        index, num_words
                    )));
                }
            }

            tx.execute(
                "UPDATE known_rounds
                 SET first_unchecked = ?2, last_checked = ?3, fu_pos = ?4, updated_at = ?5
                 WHERE key = ?1",
                params![
                    key,
                    changes.first_unchecked as i64,
                    changes.last_checked as i64,
                    changes.fu_pos as i64,
                    now_millis(),
                ],
            )?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE known_round_words SET word = ?3 WHERE key = ?1 AND idx = ?2",
                )?;
                for (&idx, &word) in &changes.changes {
                    stmt.execute(params![key, idx as i64, word as i64])?;
                }
            }

            tx.commit()?;
            debug!(key = %key, changed = changes.changes.len(), "applied known rounds patch");
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let key = key.to_owned();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM known_round_words WHERE key = ?1",
                params![key],
            )?;
            let removed = tx.execute("DELETE FROM known_rounds WHERE key = ?1", params![key])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM known_rounds ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(keys)
        })
        .await
    }
}
