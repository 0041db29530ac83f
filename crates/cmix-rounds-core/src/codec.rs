//! Compact encoding for word sequences.
//!
//! An encoded span is one variant byte followed by a body:
//!
//! - `0x00` raw: every word as 8 bytes little-endian.
//! - `0x01`, `0x02`, `0x04`, `0x08` run-length: the words are read as one bit
//!   stream, most-significant bit of word 0 first, and the body holds the
//!   lengths of alternating runs (ones first, the first run may be zero) as
//!   little-endian integers of the variant's width in bytes.
//!
//! An empty word sequence encodes to no bytes at all. Decoding accepts every
//! variant regardless of which [`WordCodec`] produced it.

use bytes::{Buf, BufMut};

use crate::bitbuffer::{ones_between, WORD_BITS};
use crate::error::CodecError;

/// Variant byte for raw little-endian words.
pub const VARIANT_RAW: u8 = 0x00;

/// Upper bound on decoded bits, to keep hostile run lengths from allocating
/// without limit. 2^32 bits is 512 MiB of words.
pub const MAX_DECODED_BITS: u64 = 1 << 32;

/// A lossless codec for word sequences.
pub trait WordCodec {
    /// Encode the words.
    fn encode(&self, words: &[u64]) -> Vec<u8>;

    /// Decode bytes produced by any codec in this module.
    fn decode(&self, data: &[u8]) -> Result<Vec<u64>, CodecError> {
        decode_words(data)
    }
}

/// Picks the smaller of the run-length and raw variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunLengthCodec;

/// Always emits the raw variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawCodec;

impl WordCodec for RunLengthCodec {
    fn encode(&self, words: &[u64]) -> Vec<u8> {
        if words.is_empty() {
            return Vec::new();
        }

        let runs = bit_runs(words);
        let longest = runs.iter().copied().max().unwrap_or(0);
        let width = run_width(longest);

        let rle_len = 1 + runs.len() * width;
        let raw_len = 1 + words.len() * 8;
        if rle_len >= raw_len {
            return encode_raw(words);
        }

        let mut buf = Vec::with_capacity(rle_len);
        buf.put_u8(width as u8);
        for run in runs {
            buf.put_uint_le(run, width);
        }
        buf
    }
}

impl WordCodec for RawCodec {
    fn encode(&self, words: &[u64]) -> Vec<u8> {
        if words.is_empty() {
            return Vec::new();
        }
        encode_raw(words)
    }
}

/// Decode a compact span into words.
pub fn decode_words(data: &[u8]) -> Result<Vec<u64>, CodecError> {
    let Some((&variant, body)) = data.split_first() else {
        return Ok(Vec::new());
    };

    match variant {
        VARIANT_RAW => decode_raw(body),
        1 | 2 | 4 | 8 => decode_runs(body, variant as usize),
        other => Err(CodecError::UnknownVariant(other)),
    }
}

fn encode_raw(words: &[u64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + words.len() * 8);
    buf.put_u8(VARIANT_RAW);
    for &word in words {
        buf.put_u64_le(word);
    }
    buf
}

fn decode_raw(mut body: &[u8]) -> Result<Vec<u64>, CodecError> {
    if body.len() % 8 != 0 {
        return Err(CodecError::RaggedBody {
            len: body.len(),
            width: 8,
        });
    }

    let mut words = Vec::with_capacity(body.len() / 8);
    while body.has_remaining() {
        words.push(body.get_u64_le());
    }
    Ok(words)
}

fn decode_runs(body: &[u8], width: usize) -> Result<Vec<u64>, CodecError> {
    if body.len() % width != 0 {
        return Err(CodecError::RaggedBody {
            len: body.len(),
            width,
        });
    }

    let mut runs = Vec::with_capacity(body.len() / width);
    let mut total: u64 = 0;
    let mut reader = body;
    while reader.has_remaining() {
        let run = reader.get_uint_le(width);
        let next = total.saturating_add(run);
        if next > MAX_DECODED_BITS {
            return Err(CodecError::TooLarge { bits: next });
        }
        total = next;
        runs.push(run);
    }

    if total % WORD_BITS as u64 != 0 {
        return Err(CodecError::PartialWord { bits: total });
    }

    let mut words = Vec::with_capacity((total / WORD_BITS as u64) as usize);
    let mut current = 0u64;
    let mut filled = 0u32;
    let mut ones = true;

    for mut run in runs {
        while run > 0 {
            let take = run.min((WORD_BITS as u32 - filled) as u64) as u32;
            if ones {
                current |= ones_between(filled, filled + take);
            }
            filled += take;
            run -= take as u64;
            if filled == WORD_BITS as u32 {
                words.push(current);
                current = 0;
                filled = 0;
            }
        }
        ones = !ones;
    }

    Ok(words)
}

/// Lengths of alternating runs of ones and zeros, starting with ones.
fn bit_runs(words: &[u64]) -> Vec<u64> {
    let mut runs = Vec::new();
    let mut ones = true;
    let mut run = 0u64;

    for &word in words {
        let mut w = word;
        let mut remaining = WORD_BITS as u32;
        while remaining > 0 {
            let n = if ones { w.leading_ones() } else { w.leading_zeros() }.min(remaining);
            run += n as u64;
            remaining -= n;
            if remaining == 0 {
                break;
            }
            w <<= n;
            runs.push(run);
            run = 0;
            ones = !ones;
        }
    }
    runs.push(run);
    runs
}

/// Smallest width in bytes that holds `n`.
fn run_width(n: u64) -> usize {
    if n <= u8::MAX as u64 {
        1
    } else if n <= u16::MAX as u64 {
        2
    } else if n <= u32::MAX as u64 {
        4
    } else {
        8
    }
}
