//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;

use cmix_rounds_core::{KnownRounds, RoundId};

/// Buffer capacities worth exercising: one word, two words, an odd word
/// count, and the tracker default.
pub fn capacity() -> impl Strategy<Value = usize> {
    prop_oneof![Just(64usize), Just(128), Just(320), Just(1000)]
}

/// A single mutation. Rounds are relative to the current window so random
/// sequences keep hitting it instead of jumping around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOp {
    /// `check(last_checked - back)`. Always within reach of the window.
    CheckBehind(u64),
    /// `try_check(last_checked + ahead)`. Refused past one buffer length.
    CheckAhead(u64),
    /// `force_check(last_checked + ahead)`.
    Force(u64),
    /// `forward(first_unchecked + ahead)`.
    Forward(u64),
}

impl RoundOp {
    /// Apply to `kr`. Returns the round explicitly marked checked, if any.
    pub fn apply(&self, kr: &mut KnownRounds) -> Option<RoundId> {
        match *self {
            RoundOp::CheckBehind(back) => {
                let rid = kr.last_checked().saturating_sub(back);
                kr.try_check(rid).ok().map(|_| rid)
            }
            RoundOp::CheckAhead(ahead) => {
                let rid = kr.last_checked() + ahead;
                kr.try_check(rid).ok().map(|_| rid)
            }
            RoundOp::Force(ahead) => {
                let rid = kr.last_checked() + ahead;
                kr.force_check(rid);
                Some(rid)
            }
            RoundOp::Forward(ahead) => {
                kr.forward(kr.first_unchecked() + ahead);
                None
            }
        }
    }
}

/// Generate a RoundOp, weighted towards plain checks near the window.
pub fn round_op() -> impl Strategy<Value = RoundOp> {
    prop_oneof![
        4 => (0u64..64).prop_map(RoundOp::CheckBehind),
        4 => (0u64..200).prop_map(RoundOp::CheckAhead),
        1 => (0u64..3000).prop_map(RoundOp::Force),
        1 => (0u64..100).prop_map(RoundOp::Forward),
    ]
}

/// A capacity and the operations applied to a fresh tracker of that size.
#[derive(Debug, Clone)]
pub struct RoundHistory {
    pub capacity: usize,
    pub ops: Vec<RoundOp>,
}

impl RoundHistory {
    /// Replay the history.
    ///
    /// Returns the final state and every round explicitly marked checked.
    pub fn replay(&self) -> (KnownRounds, BTreeSet<RoundId>) {
        let mut kr = KnownRounds::new(self.capacity);
        let mut checked = BTreeSet::new();
        for op in &self.ops {
            if let Some(rid) = op.apply(&mut kr) {
                checked.insert(rid);
            }
        }
        (kr, checked)
    }
}

impl Arbitrary for RoundHistory {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (capacity(), prop::collection::vec(round_op(), 0..64))
            .prop_map(|(capacity, ops)| RoundHistory { capacity, ops })
            .boxed()
    }
}

/// Generate a KnownRounds reached through a random history.
pub fn known_rounds() -> impl Strategy<Value = KnownRounds> {
    any::<RoundHistory>().prop_map(|history| history.replay().0)
}

/// Generate buffer words biased towards long runs, as real windows are.
pub fn word_span(max_words: usize) -> impl Strategy<Value = Vec<u64>> {
    let word = prop_oneof![
        3 => Just(0u64),
        3 => Just(u64::MAX),
        1 => any::<u64>(),
        1 => (0u32..64).prop_map(|n| u64::MAX.checked_shr(n).unwrap_or(0)),
    ];
    prop::collection::vec(word, 0..=max_words)
}
