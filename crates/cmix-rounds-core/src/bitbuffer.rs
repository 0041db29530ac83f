//! Circular bit buffer backed by 64-bit words.
//!
//! The buffer exposes `64 * words` bit positions. Bit 0 of each word is its
//! most-significant bit. Every position is taken modulo [`BitBuffer::len`],
//! so ranges may run off the end and continue at the start.
//!
//! Ranges are half-open `[start, end)` in bit positions. Block arithmetic
//! converts them to whole words: [`BitBuffer::convert_loc`] maps an inclusive
//! start, [`BitBuffer::convert_end`] maps an exclusive end.

use std::fmt;

/// Number of bits in one buffer word.
pub const WORD_BITS: usize = 64;

/// A fixed-length circular sequence of bits.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitBuffer {
    words: Vec<u64>,
}

impl BitBuffer {
    /// Create a zeroed buffer of `num_words` words.
    pub fn new(num_words: usize) -> Self {
        Self {
            words: vec![0; num_words],
        }
    }

    /// Wrap an existing word sequence.
    pub fn from_words(words: Vec<u64>) -> Self {
        Self { words }
    }

    /// The backing words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }

    /// Consume the buffer, returning its words.
    pub fn into_words(self) -> Vec<u64> {
        self.words
    }

    /// Number of backing words.
    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    /// Whether the buffer has no words at all.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of addressable bits.
    pub fn len(&self) -> usize {
        self.words.len() * WORD_BITS
    }

    /// Read the bit at `pos`.
    pub fn get(&self, pos: usize) -> bool {
        let (bin, offset) = self.convert_loc(pos);
        self.words[bin] & bit(offset) != 0
    }

    /// Set the bit at `pos` to one.
    pub fn set(&mut self, pos: usize) {
        let (bin, offset) = self.convert_loc(pos);
        self.words[bin] |= bit(offset);
    }

    /// Set the bit at `pos` to zero.
    pub fn clear(&mut self, pos: usize) {
        let (bin, offset) = self.convert_loc(pos);
        self.words[bin] &= !bit(offset);
    }

    /// Word index and bit offset of `pos`.
    pub fn convert_loc(&self, pos: usize) -> (usize, u32) {
        let bin = (pos / WORD_BITS) % self.num_words();
        let offset = (pos % WORD_BITS) as u32;
        (bin, offset)
    }

    /// Word index and bit offset of `pos` taken as an exclusive end.
    ///
    /// The offset is in `1..=64`. Position 0 maps to offset 64 of the last
    /// word, which lets a range ending at the buffer boundary keep its last
    /// word whole.
    pub fn convert_end(&self, pos: usize) -> (usize, u32) {
        let pos = pos % self.len();
        if pos == 0 {
            return (self.num_words() - 1, WORD_BITS as u32);
        }
        let last = pos - 1;
        (last / WORD_BITS, (last % WORD_BITS) as u32 + 1)
    }

    /// Number of blocks touched by the half-open range `[start, end)`.
    ///
    /// Returns 1 when `start == end`. A range that wraps past the end of the
    /// buffer counts the blocks on both sides, so a range that starts and ends
    /// inside the same word after wrapping counts that word twice.
    pub fn delta(&self, start: usize, end: usize) -> usize {
        let len = self.len();
        let start = start % len;
        let end = end % len;
        if start == end {
            return 1;
        }

        let last = (end + len - 1) % len;
        let first_block = start / WORD_BITS;
        let last_block = last / WORD_BITS;
        if last >= start {
            last_block - first_block + 1
        } else {
            self.num_words() - first_block + last_block + 1
        }
    }

    /// Physical word for a logical block index that may run past the end.
    pub fn get_bin(&self, block: usize) -> usize {
        block % self.num_words()
    }

    /// Zero every bit in the half-open range `[start, end)`.
    ///
    /// Wraps past the end of the buffer when `end` is before `start`.
    /// An empty range (`start == end`) leaves the buffer untouched.
    pub fn clear_range(&mut self, start: usize, end: usize) {
        if start % self.len() == end % self.len() {
            return;
        }

        let num_blocks = self.delta(start, end);
        let (first_block, mut first_bit) = self.convert_loc(start);
        let (_, end_bit) = self.convert_end(end);

        for i in 0..num_blocks {
            let block = self.get_bin(first_block + i);
            let last_bit = if i == num_blocks - 1 {
                end_bit
            } else {
                WORD_BITS as u32
            };
            self.words[block] &= bit_mask_range(first_bit, last_bit);
            first_bit = 0;
        }
    }

    /// Copy the words covering `[start, end)` into a new buffer.
    ///
    /// Bits of the first word that precede `start` are set to one, and bits of
    /// the last word from `end` on are set to zero. When `start == end` the
    /// single block holding `start` is copied.
    pub fn copy(&self, start: usize, end: usize) -> BitBuffer {
        self.copy_blocks(start, end, self.delta(start, end))
    }

    /// Like [`copy`](Self::copy) with the number of blocks given explicitly.
    ///
    /// Needed when the range covers the whole buffer, where `start == end`
    /// does not identify how many blocks are wanted.
    pub(crate) fn copy_blocks(&self, start: usize, end: usize, num_blocks: usize) -> BitBuffer {
        let (first_block, first_bit) = self.convert_loc(start);
        let (_, end_bit) = self.convert_end(end);

        let mut words: Vec<u64> = (0..num_blocks.max(1))
            .map(|i| self.words[self.get_bin(first_block + i)])
            .collect();

        words[0] |= !bit_mask_range(0, first_bit);
        if let Some(last) = words.last_mut() {
            *last &= bit_mask_range(end_bit, WORD_BITS as u32);
        }

        BitBuffer { words }
    }

    /// Word-wise material implication `!mask | self`.
    ///
    /// # Panics
    ///
    /// Panics if the buffers differ in length. Callers size both operands from
    /// the same window, so a mismatch is a logic error.
    pub fn implies(&self, mask: &BitBuffer) -> BitBuffer {
        if self.words.len() != mask.words.len() {
            panic!(
                "cannot imply buffers of different lengths: {} != {}",
                self.words.len(),
                mask.words.len()
            );
        }

        let words = self
            .words
            .iter()
            .zip(&mask.words)
            .map(|(&a, &m)| !m | a)
            .collect();
        BitBuffer { words }
    }

    /// A new buffer of `num_words` words holding this buffer's words at the
    /// front and zeros after.
    pub fn extend(&self, num_words: usize) -> BitBuffer {
        let mut words = vec![0u64; num_words];
        let n = num_words.min(self.words.len());
        words[..n].copy_from_slice(&self.words[..n]);
        BitBuffer { words }
    }
}

impl fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.words.iter().map(|w| hex::encode(w.to_be_bytes())))
            .finish()
    }
}

impl From<Vec<u64>> for BitBuffer {
    fn from(words: Vec<u64>) -> Self {
        Self::from_words(words)
    }
}

/// Single-bit mask for an MSB-first offset.
#[inline]
fn bit(offset: u32) -> u64 {
    1u64 << (63 - offset)
}

/// Word with ones at MSB-first offsets `[lo, hi)`.
pub(crate) fn ones_between(lo: u32, hi: u32) -> u64 {
    if lo >= hi {
        return 0;
    }
    let from_lo = u64::MAX.checked_shr(lo).unwrap_or(0);
    let before_hi = !u64::MAX.checked_shr(hi).unwrap_or(0);
    from_lo & before_hi
}

/// Word with zeros in `[start, end)` and ones elsewhere.
///
/// When `start > end` the roles swap: ones in `[end, start)` and zeros
/// outside it.
pub fn bit_mask_range(start: u32, end: u32) -> u64 {
    if start <= end {
        !ones_between(start, end)
    } else {
        ones_between(end, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = u64::MAX;

    #[test]
    fn test_get_set_clear_msb_first() {
        let mut buf = BitBuffer::new(2);
        buf.set(0);
        assert_eq!(buf.words(), &[1 << 63, 0]);

        buf.set(64 + 63);
        assert_eq!(buf.words(), &[1 << 63, 1]);
        assert!(buf.get(127));
        assert!(!buf.get(126));

        buf.clear(0);
        assert_eq!(buf.words(), &[0, 1]);
    }

    #[test]
    fn test_positions_wrap() {
        let mut buf = BitBuffer::new(2);
        buf.set(128 + 5);
        assert!(buf.get(5));
        assert!(buf.get(5 + 3 * 128));
    }

    #[test]
    fn test_convert_loc() {
        let buf = BitBuffer::new(3);
        assert_eq!(buf.convert_loc(0), (0, 0));
        assert_eq!(buf.convert_loc(63), (0, 63));
        assert_eq!(buf.convert_loc(64), (1, 0));
        assert_eq!(buf.convert_loc(191), (2, 63));
        assert_eq!(buf.convert_loc(192), (0, 0));
    }

    #[test]
    fn test_convert_end() {
        let buf = BitBuffer::new(3);
        assert_eq!(buf.convert_end(0), (2, 64));
        assert_eq!(buf.convert_end(1), (0, 1));
        assert_eq!(buf.convert_end(64), (0, 64));
        assert_eq!(buf.convert_end(65), (1, 1));
        assert_eq!(buf.convert_end(192), (2, 64));
    }

    #[test]
    fn test_delta() {
        let buf = BitBuffer::new(5);
        assert_eq!(buf.delta(0, 0), 1);
        assert_eq!(buf.delta(0, 64), 1);
        assert_eq!(buf.delta(0, 65), 2);
        assert_eq!(buf.delta(60, 70), 2);
        assert_eq!(buf.delta(300, 0), 1);
        assert_eq!(buf.delta(300, 10), 2);
        assert_eq!(buf.delta(10, 5), 6);
    }

    #[test]
    fn test_get_bin() {
        let buf = BitBuffer::new(5);
        assert_eq!(buf.get_bin(3), 3);
        assert_eq!(buf.get_bin(5), 0);
        assert_eq!(buf.get_bin(12), 2);
    }

    #[test]
    fn test_bit_mask_range() {
        assert_eq!(bit_mask_range(0, 64), 0);
        assert_eq!(bit_mask_range(0, 0), MAX);
        assert_eq!(bit_mask_range(64, 64), MAX);
        assert_eq!(bit_mask_range(0, 1), MAX >> 1);
        assert_eq!(bit_mask_range(63, 64), MAX << 1);
        assert_eq!(bit_mask_range(4, 8), !0x0f00_0000_0000_0000);
        // Inverted selection keeps only [8, 60).
        assert_eq!(bit_mask_range(60, 8), 0x00ff_ffff_ffff_fff0);
    }

    #[test]
    fn test_clear_range_within_word() {
        let mut buf = BitBuffer::from_words(vec![MAX, MAX]);
        buf.clear_range(4, 8);
        assert_eq!(buf.words(), &[!0x0f00_0000_0000_0000, MAX]);
    }

    #[test]
    fn test_clear_range_across_words() {
        let mut buf = BitBuffer::from_words(vec![MAX, MAX, MAX]);
        buf.clear_range(60, 130);
        assert_eq!(buf.words(), &[MAX << 4, 0, !(MAX << 62)]);
    }

    #[test]
    fn test_clear_range_wraps() {
        let mut buf = BitBuffer::from_words(vec![MAX, MAX, MAX]);
        buf.clear_range(188, 2);
        assert_eq!(buf.words(), &[MAX >> 2, MAX, MAX << 4]);
    }

    #[test]
    fn test_clear_range_wraps_within_single_word() {
        let mut buf = BitBuffer::from_words(vec![MAX, MAX]);
        buf.clear_range(10, 5);
        assert_eq!(buf.words(), &[(MAX >> 5) & !(MAX >> 10), 0]);
        assert!(buf.get(5));
        assert!(buf.get(9));
        assert!(!buf.get(4));
        assert!(!buf.get(10));
    }

    #[test]
    fn test_clear_range_empty_is_noop() {
        let mut buf = BitBuffer::from_words(vec![MAX, MAX]);
        buf.clear_range(64, 64);
        buf.clear_range(0, 128);
        assert_eq!(buf.words(), &[MAX, MAX]);
    }

    #[test]
    fn test_copy_pads_edges() {
        let buf = BitBuffer::from_words(vec![0, 0, 0]);
        let copied = buf.copy(70, 130);
        // Bits before 70 in word 1 are set, bits from 130 on in word 2 are clear.
        assert_eq!(copied.words(), &[!(MAX >> 6), 0]);
    }

    #[test]
    fn test_copy_keeps_interior() {
        let buf = BitBuffer::from_words(vec![0, MAX, 0xdead_beef, 0]);
        let copied = buf.copy(64, 192);
        assert_eq!(copied.words(), &[MAX, 0xdead_beef]);
    }

    #[test]
    fn test_copy_wraps() {
        let buf = BitBuffer::from_words(vec![MAX, 0, 7]);
        let copied = buf.copy(128, 64);
        assert_eq!(copied.words(), &[7, MAX]);
    }

    #[test]
    fn test_implies() {
        let a = BitBuffer::from_words(vec![0b1100, 0]);
        let mask = BitBuffer::from_words(vec![0b1010, MAX]);
        let result = a.implies(&mask);
        assert_eq!(result.words(), &[!0b0010u64, 0]);
    }

    #[test]
    #[should_panic(expected = "different lengths")]
    fn test_implies_length_mismatch_panics() {
        let a = BitBuffer::new(2);
        let mask = BitBuffer::new(3);
        let _ = a.implies(&mask);
    }

    #[test]
    fn test_extend() {
        let buf = BitBuffer::from_words(vec![1, 2]);
        assert_eq!(buf.extend(4).words(), &[1, 2, 0, 0]);
        assert_eq!(buf.extend(1).words(), &[1]);
    }

    #[test]
    fn test_debug_is_hex() {
        let buf = BitBuffer::from_words(vec![0xff]);
        assert_eq!(format!("{:?}", buf), "[\"00000000000000ff\"]");
    }
}
