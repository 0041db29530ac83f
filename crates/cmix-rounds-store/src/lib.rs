//! # cMix Rounds Store
//!
//! Storage abstraction for known-rounds state. Provides a trait-based
//! interface for persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! Snapshots live behind the [`RoundsStore`] trait, keyed by a caller-chosen
//! string (typically one key per identity). The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`RoundsStore`] - The async trait for all storage operations
//! - [`StoredRounds`] - Persisted words plus window boundaries
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cmix_rounds_core::KnownRounds;
//! use cmix_rounds_store::{RoundsStore, SqliteStore, StoreExt};
//!
//! async fn example() {
//!     let store = SqliteStore::open("rounds.db").unwrap();
//!
//!     let mut kr = KnownRounds::new(1000);
//!     store.save_known_rounds("identity", &kr).await.unwrap();
//!
//!     // Later, persist only the words that changed.
//!     let snapshot = kr.words().to_vec();
//!     kr.check(42);
//!     let changes = kr.output_buff_changes(&snapshot).unwrap();
//!     store.apply_changes("identity", &changes).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Word rows**: SQLite keeps one row per buffer word, so a patch from
//!   [`KnownRounds::output_buff_changes`](cmix_rounds_core::KnownRounds::output_buff_changes)
//!   rewrites only the changed rows
//! - **Bit-pattern integers**: `u64` values are stored as their `i64` bit
//!   pattern, so every round ID round-trips

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{RoundsStore, StoreExt, StoredRounds};
