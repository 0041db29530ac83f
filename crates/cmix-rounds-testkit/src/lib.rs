//! # cMix Rounds Testkit
//!
//! Testing utilities for cMix round tracking.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Marshalled trackers with their exact expected bytes
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helpers for setting up trackers and peers
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the wire format across implementations:
//!
//! ```rust
//! use cmix_rounds_testkit::vectors::{all_vectors, encode_vector};
//!
//! for vector in all_vectors() {
//!     let bytes = encode_vector(&vector);
//!     println!("{}: {}", vector.name, hex::encode(bytes));
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use cmix_rounds_testkit::generators::RoundHistory;
//!
//! proptest! {
//!     #[test]
//!     fn window_fits_buffer(history: RoundHistory) {
//!         let (kr, _) = history.replay();
//!         prop_assert!(kr.last_checked() + 1 - kr.first_unchecked() <= kr.len() as u64);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use cmix_rounds_testkit::fixtures::known_rounds_with;
//!
//! let kr = known_rounds_with(128, [0, 1, 2, 5]);
//! assert_eq!(kr.first_unchecked(), 3);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{known_rounds_with, peer_fixtures, wrapped_window, TestFixture};
pub use generators::{RoundHistory, RoundOp};
pub use vectors::{all_vectors, encode_vector, verify_all_vectors, GoldenVector};
