//! Error types for round tracking.

use thiserror::Error;

use crate::types::RoundId;

/// Errors reported by known-rounds operations.
///
/// These cover data that arrives from outside the process (persisted or
/// wire bytes) and explicit caller checks. Contract violations that would
/// corrupt state panic instead; see [`KnownRounds::check`](crate::KnownRounds::check).
#[derive(Debug, Error)]
pub enum RoundsError {
    #[error("round {round} is out of window: last checked {last_checked}, capacity {capacity}")]
    OutOfWindow {
        round: RoundId,
        last_checked: RoundId,
        capacity: usize,
    },

    #[error("buffer length mismatch: expected {expected} words, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("data too short: {got} bytes, need at least {need}")]
    TooShort { got: usize, need: usize },

    #[error("buffer of {capacity} words is too small for {needed} decoded words")]
    BufferTooSmall { capacity: usize, needed: usize },

    #[error("invalid known rounds parts: {0}")]
    InvalidParts(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors produced while decoding a compact word sequence.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown encoding variant: {0:#04x}")]
    UnknownVariant(u8),

    #[error("body of {len} bytes is not a multiple of {width}")]
    RaggedBody { len: usize, width: usize },

    #[error("run lengths sum to {bits} bits, not a whole number of words")]
    PartialWord { bits: u64 },

    #[error("decoded stream of {bits} bits is too large")]
    TooLarge { bits: u64 },
}
