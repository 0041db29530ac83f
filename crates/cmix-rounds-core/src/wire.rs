//! Wire form of [`KnownRounds`].
//!
//! ```text
//! +------------------+------------------+------------------------+
//! | first_unchecked  | last_checked     | encoded window words   |
//! | u64 LE           | u64 LE           | see crate::codec       |
//! +------------------+------------------+------------------------+
//! ```
//!
//! Only the words spanning the window are sent, starting with the word that
//! holds `first_unchecked`. The receiver lays them out at the front of its own
//! buffer and sets `fu_pos = first_unchecked mod 64`.

use bytes::{Buf, BufMut};
use tracing::trace;

use crate::bitbuffer::{ones_between, BitBuffer, WORD_BITS};
use crate::codec::{RunLengthCodec, WordCodec};
use crate::error::RoundsError;
use crate::known_rounds::KnownRounds;
use crate::types::BuffChanges;

/// Bytes before the encoded words.
pub const HEADER_LEN: usize = 16;

impl KnownRounds {
    /// Serialize with the run-length codec.
    pub fn marshal(&self) -> Vec<u8> {
        self.marshal_with(&RunLengthCodec)
    }

    /// Serialize with an explicit word codec.
    pub fn marshal_with<C: WordCodec + ?Sized>(&self, codec: &C) -> Vec<u8> {
        let words = self.window_words();
        let encoded = codec.encode(&words);

        let mut buf = Vec::with_capacity(HEADER_LEN + encoded.len());
        buf.put_u64_le(self.first_unchecked);
        buf.put_u64_le(self.last_checked);
        buf.extend_from_slice(&encoded);
        buf
    }

    /// Words covering `[first_unchecked, last_checked]`, at least one and at
    /// most the whole buffer.
    fn window_words(&self) -> Vec<u64> {
        let count = self.window_len();
        let offset = self.fu_pos % WORD_BITS;
        let num_words = self.buffer.num_words();
        let blocks = (offset + count).div_ceil(WORD_BITS).clamp(1, num_words);

        if count > 0 && blocks < num_words {
            let end = (self.get_bit_stream_pos(self.last_checked) + 1) % self.len();
            return self.buffer.copy(self.fu_pos, end).into_words();
        }

        // Whole ring, or an empty window: ship raw words starting at fu_pos.
        let (first_block, _) = self.buffer.convert_loc(self.fu_pos);
        (0..blocks)
            .map(|i| self.buffer.words()[self.buffer.get_bin(first_block + i)])
            .collect()
    }

    fn window_len(&self) -> usize {
        window_len(self.first_unchecked, self.last_checked) as usize
    }

    /// Replace this tracker's state with the serialized form in `data`.
    ///
    /// An empty tracker is sized to fit the decoded words. A sized tracker
    /// keeps its capacity and must be at least as large as the payload.
    /// On error the tracker is left unchanged.
    pub fn unmarshal(&mut self, data: &[u8]) -> Result<(), RoundsError> {
        self.unmarshal_with(&RunLengthCodec, data)
    }

    /// [`unmarshal`](Self::unmarshal) with an explicit word codec.
    pub fn unmarshal_with<C: WordCodec + ?Sized>(
        &mut self,
        codec: &C,
        data: &[u8],
    ) -> Result<(), RoundsError> {
        if data.len() < HEADER_LEN {
            return Err(RoundsError::TooShort {
                got: data.len(),
                need: HEADER_LEN,
            });
        }

        let mut header = &data[..HEADER_LEN];
        let first_unchecked = header.get_u64_le();
        let last_checked = header.get_u64_le();
        if first_unchecked > last_checked.saturating_add(1) {
            return Err(RoundsError::InvalidParts(format!(
                "first unchecked {} is past last checked {} + 1",
                first_unchecked, last_checked
            )));
        }

        let words = codec.decode(&data[HEADER_LEN..])?;

        let num_words = if self.buffer.is_empty() {
            words.len().max(1)
        } else if self.buffer.num_words() < words.len() {
            return Err(RoundsError::BufferTooSmall {
                capacity: self.buffer.num_words(),
                needed: words.len(),
            });
        } else {
            self.buffer.num_words()
        };

        let window = window_len(first_unchecked, last_checked);
        let decoded_bits = words.len() * WORD_BITS;
        if !words.is_empty() && window > decoded_bits as u64 {
            return Err(RoundsError::InvalidParts(format!(
                "window of {} rounds exceeds {} decoded bits",
                window, decoded_bits
            )));
        }
        if window > (num_words * WORD_BITS) as u64 {
            return Err(RoundsError::InvalidParts(format!(
                "window of {} rounds exceeds capacity of {}",
                window,
                num_words * WORD_BITS
            )));
        }

        if self.buffer.is_empty() {
            self.buffer = BitBuffer::new(num_words);
        }
        self.buffer.words_mut()[..words.len()].copy_from_slice(&words);

        let offset = (first_unchecked % WORD_BITS as u64) as usize;
        let end = offset + window as usize;
        if !words.is_empty() && end > decoded_bits && num_words > words.len() {
            // The window wrapped the sender's ring. Its newest rounds sit at
            // the front of word 0 and belong just past the decoded words here.
            let mask = ones_between(0, (end - decoded_bits) as u32);
            let buf = self.buffer.words_mut();
            buf[words.len()] = (buf[words.len()] & !mask) | (words[0] & mask);
        }

        self.first_unchecked = first_unchecked;
        self.last_checked = last_checked;
        self.fu_pos = offset;

        trace!(
            first_unchecked,
            last_checked,
            words = words.len(),
            "unmarshaled known rounds"
        );
        Ok(())
    }

    /// Build a tracker sized exactly to a serialized payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self, RoundsError> {
        let mut kr = KnownRounds {
            buffer: BitBuffer::default(),
            first_unchecked: 0,
            last_checked: 0,
            fu_pos: 0,
        };
        kr.unmarshal(data)?;
        Ok(kr)
    }

    /// Words that differ from `old`, plus the current scalars.
    ///
    /// `old` is a snapshot of [`words`](Self::words) taken earlier from this
    /// same tracker.
    pub fn output_buff_changes(&self, old: &[u64]) -> Result<BuffChanges, RoundsError> {
        let current = self.buffer.words();
        if old.len() != current.len() {
            return Err(RoundsError::LengthMismatch {
                expected: current.len(),
                got: old.len(),
            });
        }

        let changes = current
            .iter()
            .zip(old)
            .enumerate()
            .filter(|(_, (new, old))| new != old)
            .map(|(i, (&new, _))| (i, new))
            .collect();

        Ok(BuffChanges {
            changes,
            first_unchecked: self.first_unchecked,
            last_checked: self.last_checked,
            fu_pos: self.fu_pos,
        })
    }
}

/// Rounds in `[first_unchecked, last_checked]`.
fn window_len(first_unchecked: u64, last_checked: u64) -> u64 {
    if first_unchecked > last_checked {
        0
    } else {
        (last_checked - first_unchecked).saturating_add(1)
    }
}
