//! # cMix Rounds Core
//!
//! Pure primitives for tracking which cMix rounds a client has checked for
//! messages.
//!
//! This crate contains no I/O and no storage. It is pure computation over a
//! bounded window of round IDs.
//!
//! ## Key Types
//!
//! - [`KnownRounds`] - Sliding window of checked rounds over a ring of bits
//! - [`BitBuffer`] - Circular, MSB-first bit buffer backing the window
//! - [`UncheckedRange`] - Result of scanning the window for rounds to pick up
//! - [`BuffChanges`] - Word-level patch for incremental persistence
//!
//! ## Wire Format
//!
//! [`KnownRounds::marshal`] writes a 16-byte header followed by the window
//! words in a compact encoding. See the [`wire`] and [`codec`] modules.

pub mod bitbuffer;
pub mod codec;
pub mod error;
pub mod known_rounds;
pub mod scan;
pub mod types;
pub mod wire;

pub use bitbuffer::{bit_mask_range, BitBuffer, WORD_BITS};
pub use codec::{decode_words, RawCodec, RunLengthCodec, WordCodec};
pub use error::{CodecError, RoundsError};
pub use known_rounds::KnownRounds;
pub use types::{BuffChanges, KrChanges, RoundId, UncheckedRange};
