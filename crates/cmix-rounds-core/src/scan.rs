//! Range scans over known rounds.
//!
//! [`KnownRounds::range_unchecked`] walks the local window looking for rounds
//! with data. The masked variants intersect the local window with a peer's
//! known rounds so that only rounds the peer has resolved, and we have not,
//! are handed to the round predicate.

use tracing::{debug, trace};

use crate::bitbuffer::{BitBuffer, WORD_BITS};
use crate::known_rounds::KnownRounds;
use crate::types::{RoundId, UncheckedRange};

impl KnownRounds {
    /// Scan `[oldest_unknown, last_checked]`.
    ///
    /// Unchecked rounds older than `last_checked - threshold` are reported as
    /// unknown; newer unchecked rounds pull `earliest_round` back so they are
    /// retried later. Checked rounds are passed to `round_check`, and those it
    /// accepts are collected in `has` until `max_pickups` is reached
    /// (zero means no limit).
    pub fn range_unchecked<F>(
        &self,
        oldest_unknown: RoundId,
        threshold: u64,
        mut round_check: F,
        max_pickups: usize,
    ) -> UncheckedRange
    where
        F: FnMut(RoundId) -> bool,
    {
        if oldest_unknown > self.last_checked {
            trace!(
                oldest_unknown,
                last_checked = self.last_checked,
                "nothing to scan past last checked round"
            );
            return UncheckedRange {
                earliest_round: oldest_unknown,
                ..Default::default()
            };
        }

        let oldest_possible = self.last_checked.saturating_sub(threshold);
        let mut result = UncheckedRange {
            earliest_round: self.last_checked.saturating_add(1),
            has: Vec::new(),
            unknown: Vec::new(),
        };

        for rid in oldest_unknown..=self.last_checked {
            if !self.checked(rid) {
                if rid < oldest_possible {
                    result.unknown.push(rid);
                } else if rid < result.earliest_round {
                    result.earliest_round = rid;
                }
                continue;
            }

            if round_check(rid) {
                result.has.push(rid);
                if result.has.len() == max_pickups {
                    result.earliest_round = result.earliest_round.min(rid.saturating_add(1));
                    break;
                }
            }
        }

        result
    }

    /// [`range_unchecked_masked_range`](Self::range_unchecked_masked_range)
    /// over every round.
    pub fn range_unchecked_masked<F>(
        &mut self,
        mask: &KnownRounds,
        round_check: F,
        max_checked: usize,
    ) -> usize
    where
        F: FnMut(RoundId) -> bool,
    {
        self.range_unchecked_masked_range(mask, round_check, 0, RoundId::MAX, max_checked)
    }

    /// Check rounds that `mask` has resolved but this tracker has not.
    ///
    /// Works on a copy of `mask` forwarded to our `first_unchecked`. Inside the
    /// mask's window, every round the mask has checked and we have not is
    /// passed to `round_check`, newest first. Then every unchecked round in
    /// `[max(start, first_unchecked), min(end, mask.first_unchecked))` is
    /// passed in order. Rounds the predicate accepts are checked. At most
    /// `max_checked` predicate calls are made in total.
    ///
    /// Returns the number of rounds marked checked.
    pub fn range_unchecked_masked_range<F>(
        &mut self,
        mask: &KnownRounds,
        mut round_check: F,
        start: RoundId,
        end: RoundId,
        max_checked: usize,
    ) -> usize
    where
        F: FnMut(RoundId) -> bool,
    {
        let mut aligned = mask.clone();
        aligned.forward(self.first_unchecked);

        let mut calls = 0;
        let mut marked = 0;

        if aligned.first_unchecked <= aligned.last_checked {
            let window_start = aligned.first_unchecked;
            let window_end = aligned.last_checked;
            let (own, length) = self.sub_sample(window_start, window_end);
            let (theirs, _) = aligned.sub_sample(window_start, window_end);
            let result = own.implies(&theirs);
            let offset = (window_start % WORD_BITS as u64) as usize;

            for k in (0..length).rev() {
                if calls >= max_checked {
                    break;
                }
                if result.get(offset + k) {
                    continue;
                }
                let rid = window_start + k as u64;
                calls += 1;
                if round_check(rid) {
                    self.force_check(rid);
                    marked += 1;
                }
            }
        }

        let mut rid = start.max(self.first_unchecked);
        let stop = end.min(aligned.first_unchecked);
        while rid < stop && calls < max_checked {
            if !self.checked(rid) {
                calls += 1;
                if round_check(rid) {
                    self.force_check(rid);
                    marked += 1;
                }
            }
            rid += 1;
        }

        debug!(
            calls,
            marked,
            first_unchecked = self.first_unchecked,
            last_checked = self.last_checked,
            "masked scan finished"
        );
        marked
    }

    /// Copy of the bits for rounds `[start, end]`, laid out from bit
    /// `start % 64` of the first word.
    ///
    /// Bits before `start` in the first word are one and rounds past
    /// `last_checked` are zero. If `start` itself is past `last_checked` the
    /// whole sample is zero. `start` must not be before `first_unchecked`.
    /// Returns the buffer and the number of rounds it covers.
    pub fn sub_sample(&self, start: RoundId, end: RoundId) -> (BitBuffer, usize) {
        let length = (end.saturating_sub(start) + 1) as usize;
        let offset = (start % WORD_BITS as u64) as usize;
        let num_blocks = (offset + length).div_ceil(WORD_BITS);

        if start > self.last_checked {
            return (BitBuffer::new(num_blocks), length);
        }

        let copy_end = end.min(self.last_checked);
        let span = (copy_end - start + 1) as usize;
        let from = self.get_bit_stream_pos(start);
        let to = (self.get_bit_stream_pos(copy_end) + 1) % self.len();

        let copied = if span >= self.len() {
            self.buffer
                .copy_blocks(from, to, (offset + span).div_ceil(WORD_BITS))
        } else {
            self.buffer.copy(from, to)
        };

        (copied.extend(num_blocks), length)
    }
}
