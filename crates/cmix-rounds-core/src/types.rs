//! Shared type definitions for round tracking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a mix-network round.
///
/// Round IDs increase monotonically and have no upper bound beyond `u64`.
pub type RoundId = u64;

/// Sparse delta of a known-rounds buffer: word index -> new word value.
pub type KrChanges = BTreeMap<usize, u64>;

/// Output of [`KnownRounds::output_buff_changes`](crate::KnownRounds::output_buff_changes).
///
/// Carries every word that differs from a previously observed snapshot plus
/// the current boundary fields, so a storage layer can patch its copy in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffChanges {
    /// Changed words keyed by index.
    pub changes: KrChanges,

    /// Oldest round not unconditionally known to be checked.
    pub first_unchecked: RoundId,

    /// Newest round with explicit state.
    pub last_checked: RoundId,

    /// Bit position of `first_unchecked` in the buffer.
    pub fu_pos: usize,
}

impl BuffChanges {
    /// Whether no word changed.
    ///
    /// The boundary fields may still have moved.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Apply the changed words to a stored word sequence of the same length.
    pub fn apply_to(&self, words: &mut [u64]) {
        for (&index, &word) in &self.changes {
            if let Some(slot) = words.get_mut(index) {
                *slot = word;
            }
        }
    }
}

/// Result of [`KnownRounds::range_unchecked`](crate::KnownRounds::range_unchecked).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UncheckedRange {
    /// Oldest round that is still worth retrying on the next pass.
    pub earliest_round: RoundId,

    /// Checked rounds for which the round predicate reported data.
    pub has: Vec<RoundId>,

    /// Unchecked rounds that fell outside the lookback threshold.
    pub unknown: Vec<RoundId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_changes_patches_only_listed_words() {
        let mut words = vec![0u64, 1, 2, 3];
        let changes = BuffChanges {
            changes: [(1, 10), (3, 30)].into_iter().collect(),
            first_unchecked: 5,
            last_checked: 9,
            fu_pos: 5,
        };

        changes.apply_to(&mut words);
        assert_eq!(words, vec![0, 10, 2, 30]);
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_apply_changes_ignores_out_of_range_index() {
        let mut words = vec![7u64];
        let changes = BuffChanges {
            changes: [(4, 1)].into_iter().collect(),
            first_unchecked: 0,
            last_checked: 0,
            fu_pos: 0,
        };

        changes.apply_to(&mut words);
        assert_eq!(words, vec![7]);
    }

    #[test]
    fn test_buff_changes_json_roundtrip() {
        let changes = BuffChanges {
            changes: [(0, u64::MAX)].into_iter().collect(),
            first_unchecked: 64,
            last_checked: 100,
            fu_pos: 0,
        };

        let json = serde_json::to_string(&changes).unwrap();
        let back: BuffChanges = serde_json::from_str(&json).unwrap();
        assert_eq!(changes, back);
    }
}
