//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
/// It also turns on foreign key enforcement, which SQLite keeps per
/// connection, so word rows follow their buffer row on delete.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per tracked known-rounds buffer
        CREATE TABLE known_rounds (
            key TEXT PRIMARY KEY,
            first_unchecked INTEGER NOT NULL,  -- u64 stored as its i64 bit pattern
            last_checked INTEGER NOT NULL,     -- u64 stored as its i64 bit pattern
            fu_pos INTEGER NOT NULL,
            num_words INTEGER NOT NULL,
            updated_at INTEGER NOT NULL        -- local timestamp (Unix ms)
        );

        -- Buffer words, one row each so patches rewrite only what changed
        CREATE TABLE known_round_words (
            key TEXT NOT NULL REFERENCES known_rounds(key) ON DELETE CASCADE,
            idx INTEGER NOT NULL,
            word INTEGER NOT NULL,             -- u64 stored as its i64 bit pattern
            PRIMARY KEY (key, idx)
        );
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"known_rounds".to_string()));
        assert!(tables.contains(&"known_round_words".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_deleting_buffer_drops_its_words() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO known_rounds VALUES ('a', 0, 0, 0, 2, 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO known_round_words VALUES ('a', 0, 1), ('a', 1, 2)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM known_rounds WHERE key = 'a'", [])
            .unwrap();

        let words: i64 = conn
            .query_row("SELECT COUNT(*) FROM known_round_words", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(words, 0);

        // Orphan words are refused outright.
        assert!(conn
            .execute("INSERT INTO known_round_words VALUES ('b', 0, 1)", [])
            .is_err());
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}
