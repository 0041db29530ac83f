//! # cMix Rounds
//!
//! Round tracking for cMix clients: which rounds have been checked for
//! messages, persisted across restarts and compared against peers.
//!
//! ## Overview
//!
//! A client polls gateways for the rounds it may have messages in. The
//! [`KnownRounds`] window records which of those rounds are already handled:
//!
//! - **Checked**: every round before `first_unchecked`, plus set bits inside
//!   the window
//! - **Unchecked**: clear bits inside the window, and every round after
//!   `last_checked`
//! - **Peer masks**: a peer's marshaled known rounds narrow down which rounds
//!   are worth looking up
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cmix_rounds::{RoundTracker, TrackerConfig};
//! use cmix_rounds::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("rounds.db").unwrap();
//!     let tracker = RoundTracker::open(store, "identity", TrackerConfig::default())
//!         .await
//!         .unwrap();
//!
//!     tracker.force_check(1_000).await.unwrap();
//!     let pickup = tracker.range_unchecked(900, |_rid| false).await;
//!     println!("retry from round {}", pickup.earliest_round);
//!
//!     tracker.persist().await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `cmix_rounds::core` - Bit buffer, known rounds, wire codec
//! - `cmix_rounds::store` - Storage abstraction and SQLite

pub mod error;
pub mod tracker;

// Re-export component crates
pub use cmix_rounds_core as core;
pub use cmix_rounds_store as store;

// Re-export main types for convenience
pub use error::{Result, TrackerError};
pub use tracker::{RoundTracker, TrackerConfig};

// Re-export commonly used core types
pub use cmix_rounds_core::{
    BitBuffer, BuffChanges, KnownRounds, RawCodec, RoundId, RoundsError, RunLengthCodec,
    UncheckedRange, WordCodec,
};
