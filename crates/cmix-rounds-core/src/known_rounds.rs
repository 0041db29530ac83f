//! KnownRounds: which rounds have been checked for messages.
//!
//! The state is a sliding window `[first_unchecked, last_checked]` mapped onto
//! a fixed [`BitBuffer`] ring. Rounds before the window are checked, rounds
//! after it are unknown, and rounds inside it read their bit at
//! `(fu_pos + (rid - first_unchecked)) mod len`.

use std::borrow::Cow;

use tracing::{debug, trace};

use crate::bitbuffer::{BitBuffer, WORD_BITS};
use crate::error::RoundsError;
use crate::types::RoundId;

/// Round-tracking state over a circular bit buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct KnownRounds {
    pub(crate) buffer: BitBuffer,
    pub(crate) first_unchecked: RoundId,
    pub(crate) last_checked: RoundId,
    pub(crate) fu_pos: usize,
}

impl KnownRounds {
    /// Create an empty tracker able to hold `capacity` rounds.
    ///
    /// Capacity is rounded up to whole 64-bit words, with a minimum of one word.
    pub fn new(capacity: usize) -> Self {
        let num_words = capacity.div_ceil(WORD_BITS).max(1);
        Self {
            buffer: BitBuffer::new(num_words),
            first_unchecked: 0,
            last_checked: 0,
            fu_pos: 0,
        }
    }

    /// Rebuild a tracker from explicit parts, as loaded from storage.
    ///
    /// The parts must describe a reachable state: a non-empty buffer,
    /// `fu_pos` inside it and on the same bit offset within its word as
    /// `first_unchecked`, and `first_unchecked <= last_checked + 1`.
    pub fn from_parts(
        words: Vec<u64>,
        first_unchecked: RoundId,
        last_checked: RoundId,
        fu_pos: usize,
    ) -> Result<Self, RoundsError> {
        let buffer = BitBuffer::from_words(words);
        if buffer.is_empty() {
            return Err(RoundsError::InvalidParts("empty buffer".into()));
        }
        if fu_pos >= buffer.len() {
            return Err(RoundsError::InvalidParts(format!(
                "fu_pos {} outside buffer of {} bits",
                fu_pos,
                buffer.len()
            )));
        }
        if fu_pos % WORD_BITS != (first_unchecked % WORD_BITS as u64) as usize {
            return Err(RoundsError::InvalidParts(format!(
                "fu_pos {} is not aligned with first unchecked round {}",
                fu_pos, first_unchecked
            )));
        }
        if first_unchecked > last_checked.saturating_add(1) {
            return Err(RoundsError::InvalidParts(format!(
                "first unchecked {} is past last checked {} + 1",
                first_unchecked, last_checked
            )));
        }

        Ok(Self {
            buffer,
            first_unchecked,
            last_checked,
            fu_pos,
        })
    }

    /// Oldest round not unconditionally known to be checked.
    pub fn first_unchecked(&self) -> RoundId {
        self.first_unchecked
    }

    /// Newest round with explicit state.
    pub fn last_checked(&self) -> RoundId {
        self.last_checked
    }

    /// Bit position of `first_unchecked` in the buffer.
    pub fn fu_pos(&self) -> usize {
        self.fu_pos
    }

    /// The raw buffer words.
    pub fn words(&self) -> &[u64] {
        self.buffer.words()
    }

    /// The underlying bit buffer.
    pub fn buffer(&self) -> &BitBuffer {
        &self.buffer
    }

    /// Capacity in rounds.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Alias for [`len`](Self::len).
    pub fn capacity(&self) -> usize {
        self.len()
    }

    /// Whether the buffer has no capacity.
    ///
    /// Only a tracker mid-way through [`from_bytes`](Self::from_bytes) can be empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether `rid` has been checked.
    pub fn checked(&self, rid: RoundId) -> bool {
        if rid < self.first_unchecked {
            true
        } else if rid > self.last_checked {
            false
        } else {
            self.buffer.get(self.get_bit_stream_pos(rid))
        }
    }

    /// Buffer position of `rid` relative to the current window.
    ///
    /// Rounds before `first_unchecked` wrap backwards to a valid position.
    pub fn get_bit_stream_pos(&self, rid: RoundId) -> usize {
        let delta = rid as i128 - self.first_unchecked as i128;
        pos_mod(self.fu_pos as i128 + delta, self.len())
    }

    /// Mark `rid` as checked.
    ///
    /// # Panics
    ///
    /// Panics when `rid` is a full buffer length or more away from
    /// `last_checked`. Marking it would overwrite rounds that have not been
    /// retired; call [`forward`](Self::forward) first, or use
    /// [`force_check`](Self::force_check) or [`try_check`](Self::try_check).
    pub fn check(&mut self, rid: RoundId) {
        if let Err(e) = self.try_check(rid) {
            panic!("{}", e);
        }
    }

    /// Mark `rid` as checked, or report that it lies outside the window.
    pub fn try_check(&mut self, rid: RoundId) -> Result<(), RoundsError> {
        let distance = rid.abs_diff(self.last_checked);
        if distance >= self.len() as u64 {
            return Err(RoundsError::OutOfWindow {
                round: rid,
                last_checked: self.last_checked,
                capacity: self.len(),
            });
        }
        self.check_unbounded(rid);
        Ok(())
    }

    /// Mark `rid` as checked, sliding the window forward when it would
    /// otherwise overflow. Rounds before the window are ignored.
    pub fn force_check(&mut self, rid: RoundId) {
        if rid < self.first_unchecked {
            return;
        }
        let len = self.len() as u64;
        if rid > self.last_checked && rid - self.last_checked >= len {
            debug!(
                round = rid,
                last_checked = self.last_checked,
                "force check slides window"
            );
            self.forward(rid - len);
        }
        self.check_unbounded(rid);
    }

    /// Check without the window-distance guard. Callers ensure
    /// `rid - last_checked < len` whenever `rid > last_checked`.
    pub(crate) fn check_unbounded(&mut self, rid: RoundId) {
        if rid < self.first_unchecked {
            return;
        }

        let pos = self.get_bit_stream_pos(rid);
        if rid > self.last_checked {
            // Rounds between the old edge and rid are now in the window but unseen.
            let gap_start = self.get_bit_stream_pos(self.last_checked + 1);
            self.buffer.clear_range(gap_start, pos);
            self.last_checked = rid;
        }
        self.buffer.set(pos);

        let len = self.len() as u64;
        if rid - self.first_unchecked >= len {
            // The window outgrew the ring; everything a lap behind is gone.
            let new_first = rid - (len - 1);
            trace!(round = rid, first_unchecked = new_first, "window lapped buffer");
            self.fu_pos = self.get_bit_stream_pos(new_first);
            self.first_unchecked = new_first;
            self.migrate_first_unchecked(new_first);
        } else if rid == self.first_unchecked {
            if self.first_unchecked == self.last_checked {
                // At RoundId::MAX the window cannot move; the set bit answers for it.
                if let Some(next) = rid.checked_add(1) {
                    self.fu_pos = self.get_bit_stream_pos(next);
                    self.first_unchecked = next;
                    self.last_checked = next;
                    self.buffer.clear(self.fu_pos);
                }
            } else {
                self.migrate_first_unchecked(rid);
            }
        }
    }

    /// Advance `first_unchecked` from `rid` past every contiguous checked round.
    ///
    /// Stops at the first unchecked round, or at `last_checked + 1`. A checked
    /// `RoundId::MAX` stays the first unchecked round, answered by its bit.
    pub(crate) fn migrate_first_unchecked(&mut self, rid: RoundId) {
        let mut next = rid;
        while next <= self.last_checked && self.buffer.get(self.get_bit_stream_pos(next)) {
            match next.checked_add(1) {
                Some(n) => next = n,
                None => break,
            }
        }
        self.fu_pos = self.get_bit_stream_pos(next);
        self.first_unchecked = next;
    }

    /// Declare every round before `rid` checked.
    ///
    /// Past `last_checked` the window collapses onto `rid`; inside the window
    /// `first_unchecked` migrates forward from `rid`.
    pub fn forward(&mut self, rid: RoundId) {
        if rid > self.last_checked {
            self.first_unchecked = rid;
            self.last_checked = rid;
            self.fu_pos = (rid % self.len() as u64) as usize;
            self.buffer.clear(self.fu_pos);
        } else if rid > self.first_unchecked {
            self.migrate_first_unchecked(rid);
        }
    }

    /// A copy with `first_unchecked` advanced to at least `start`.
    ///
    /// Borrows `self` when nothing would change.
    pub fn truncate(&self, start: RoundId) -> Cow<'_, KnownRounds> {
        if start <= self.first_unchecked {
            return Cow::Borrowed(self);
        }
        let mut truncated = self.clone();
        truncated.forward(start);
        Cow::Owned(truncated)
    }
}

impl std::fmt::Debug for KnownRounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnownRounds")
            .field("first_unchecked", &self.first_unchecked)
            .field("last_checked", &self.last_checked)
            .field("fu_pos", &self.fu_pos)
            .field("buffer", &self.buffer)
            .finish()
    }
}

/// Non-negative remainder of `n` by `m`.
pub(crate) fn pos_mod(n: i128, m: usize) -> usize {
    n.rem_euclid(m as i128) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = u64::MAX;

    fn parts(words: Vec<u64>, fu: RoundId, lc: RoundId, fu_pos: usize) -> KnownRounds {
        KnownRounds::from_parts(words, fu, lc, fu_pos).unwrap()
    }

    #[test]
    fn test_new_rounds_up_to_words() {
        assert_eq!(KnownRounds::new(1).len(), 64);
        assert_eq!(KnownRounds::new(64).len(), 64);
        assert_eq!(KnownRounds::new(65).len(), 128);
        assert_eq!(KnownRounds::new(0).len(), 64);

        let kr = KnownRounds::new(320);
        assert_eq!(kr.words(), &[0; 5]);
        assert_eq!(kr.first_unchecked(), 0);
        assert_eq!(kr.last_checked(), 0);
        assert_eq!(kr.fu_pos(), 0);
    }

    #[test]
    fn test_from_parts_rejects_bad_state() {
        assert!(KnownRounds::from_parts(vec![], 0, 0, 0).is_err());
        assert!(KnownRounds::from_parts(vec![0], 0, 0, 64).is_err());
        assert!(KnownRounds::from_parts(vec![0, 0], 75, 100, 12).is_err());
        assert!(KnownRounds::from_parts(vec![0, 0], 75, 10, 11).is_err());
        assert!(KnownRounds::from_parts(vec![0, 0], 75, 74, 11).is_ok());
    }

    #[test]
    fn test_checked() {
        let kr = parts(vec![0, MAX, 0, MAX, 0], 75, 200, 11);

        assert!(kr.checked(74));
        assert!(!kr.checked(76));
        assert!(!kr.checked(320));
        // Round 75 + 53 = 128 sits at position 64, inside the full word.
        assert!(kr.checked(128));
        assert!(kr.checked(191));
        assert!(!kr.checked(192));
        assert!(!kr.checked(200));
    }

    #[test]
    fn test_get_bit_stream_pos() {
        let kr = parts(vec![0; 5], 75, 200, 11);
        assert_eq!(kr.get_bit_stream_pos(75), 11);
        assert_eq!(kr.get_bit_stream_pos(80), 16);
        assert_eq!(kr.get_bit_stream_pos(75 + 320), 11);
        // Negative offsets wrap to the end of the ring.
        assert_eq!(kr.get_bit_stream_pos(70), 6);
        assert_eq!(kr.get_bit_stream_pos(63), 319);
    }

    #[test]
    fn test_check_last_round_of_ring() {
        let mut kr = KnownRounds::new(320);
        kr.check(319);

        assert_eq!(kr.last_checked(), 319);
        assert_eq!(kr.first_unchecked(), 0);
        assert_eq!(kr.words(), &[0, 0, 0, 0, 1]);
        assert!(kr.checked(319));
        assert!(!kr.checked(318));
    }

    #[test]
    fn test_check_first_unchecked_migrates() {
        let mut kr = KnownRounds::new(128);
        kr.check(2);
        kr.check(1);
        assert_eq!(kr.first_unchecked(), 0);

        kr.check(0);
        assert_eq!(kr.first_unchecked(), 3);
        assert_eq!(kr.last_checked(), 2);
        assert_eq!(kr.fu_pos(), 3);
    }

    #[test]
    fn test_check_collapsed_window_starts_new_slot() {
        let mut kr = KnownRounds::new(64);
        kr.check(0);

        assert_eq!(kr.first_unchecked(), 1);
        assert_eq!(kr.last_checked(), 1);
        assert_eq!(kr.fu_pos(), 1);
        assert!(kr.checked(0));
        assert!(!kr.checked(1));

        kr.check(1);
        assert_eq!(kr.first_unchecked(), 2);
        assert_eq!(kr.last_checked(), 2);
    }

    #[test]
    fn test_check_clears_gap() {
        let mut kr = parts(vec![MAX, MAX], 0, 0, 0);
        kr.buffer.clear(0);
        kr.check(10);

        assert_eq!(kr.last_checked(), 10);
        for rid in 1..10 {
            assert!(!kr.checked(rid), "round {} should be unchecked", rid);
        }
        assert!(kr.checked(10));
    }

    #[test]
    fn test_check_idempotent() {
        let mut once = KnownRounds::new(256);
        once.check(5);
        once.check(40);

        let mut twice = once.clone();
        twice.check(40);
        assert_eq!(once, twice);

        twice.check(5);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_check_before_window_is_noop() {
        let mut kr = parts(vec![0, 0], 75, 100, 11);
        let before = kr.clone();
        kr.check(10);
        assert_eq!(kr, before);
    }

    #[test]
    #[should_panic(expected = "out of window")]
    fn test_check_too_far_panics() {
        let mut kr = KnownRounds::new(64);
        kr.check(64);
    }

    #[test]
    fn test_try_check_reports_distance() {
        let mut kr = KnownRounds::new(64);
        let err = kr.try_check(64).unwrap_err();
        assert!(matches!(
            err,
            RoundsError::OutOfWindow {
                round: 64,
                last_checked: 0,
                capacity: 64
            }
        ));
        assert!(kr.try_check(63).is_ok());
    }

    #[test]
    fn test_check_laps_first_unchecked() {
        let mut kr = KnownRounds::new(64);
        kr.check(5);
        kr.check(60);
        assert_eq!(kr.first_unchecked(), 0);

        // 100 is less than a ring away from 60 but more than a ring past 0.
        kr.check(100);
        assert_eq!(kr.last_checked(), 100);
        assert!(kr.first_unchecked() >= 37);
        assert!(kr.last_checked() - kr.first_unchecked() < 64);
        assert!(kr.checked(100));
        assert!(kr.checked(60));
        assert!(!kr.checked(99));
        assert!(kr.checked(36));
    }

    #[test]
    fn test_force_check_far_ahead() {
        let mut kr = KnownRounds::new(64);
        kr.check(3);
        kr.force_check(1000);

        assert_eq!(kr.last_checked(), 1000);
        assert!(kr.checked(1000));
        assert!(kr.checked(1000 - 64));
        assert!(!kr.checked(999));
        assert!(kr.last_checked() - kr.first_unchecked() < 64);
    }

    #[test]
    fn test_force_check_behind_window_is_noop() {
        let mut kr = parts(vec![0, 0], 75, 100, 11);
        let before = kr.clone();
        kr.force_check(3);
        assert_eq!(kr, before);
    }

    #[test]
    fn test_forward_past_last_checked_collapses() {
        let mut kr = parts(vec![MAX, MAX], 75, 100, 11);
        kr.forward(500);

        assert_eq!(kr.first_unchecked(), 500);
        assert_eq!(kr.last_checked(), 500);
        assert_eq!(kr.fu_pos(), 500 % 128);
        assert!(kr.checked(499));
        assert!(!kr.checked(500));
    }

    #[test]
    fn test_forward_inside_window_migrates() {
        let mut kr = KnownRounds::new(128);
        for rid in [1, 2, 3, 5] {
            kr.check(rid);
        }
        kr.check(9);

        kr.forward(2);
        assert_eq!(kr.first_unchecked(), 4);
        assert_eq!(kr.fu_pos(), 4);

        // Forwarding behind first unchecked changes nothing.
        kr.forward(1);
        assert_eq!(kr.first_unchecked(), 4);
    }

    #[test]
    fn test_truncate() {
        let mut kr = KnownRounds::new(128);
        kr.check(1);
        kr.check(2);
        kr.check(6);

        assert!(matches!(kr.truncate(0), Cow::Borrowed(_)));

        let truncated = kr.truncate(2);
        assert_eq!(truncated.first_unchecked(), 3);
        assert_eq!(kr.first_unchecked(), 0);

        let past = kr.truncate(50);
        assert_eq!(past.first_unchecked(), 50);
        assert_eq!(past.last_checked(), 50);
    }

    #[test]
    fn test_top_of_round_space() {
        let mut kr = KnownRounds::new(64);
        kr.force_check(MAX);
        assert_eq!(kr.last_checked(), MAX);
        assert_eq!(kr.first_unchecked(), MAX - 63);
        assert!(kr.checked(MAX));
        assert!(!kr.checked(MAX - 1));

        for rid in MAX - 63..MAX {
            kr.check(rid);
        }
        assert_eq!(kr.first_unchecked(), MAX);
        assert_eq!(kr.fu_pos(), 63);
        assert!(kr.checked(MAX));

        // The window cannot move past the last round id.
        let before = kr.clone();
        kr.check(MAX);
        kr.force_check(MAX);
        assert_eq!(kr, before);
        assert!(kr.checked(MAX - 200));
    }

    #[test]
    fn test_pos_mod() {
        assert_eq!(pos_mod(-1, 64), 63);
        assert_eq!(pos_mod(-64, 64), 0);
        assert_eq!(pos_mod(65, 64), 1);
    }
}
