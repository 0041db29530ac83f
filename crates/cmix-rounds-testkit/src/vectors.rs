//! Golden test vectors for the known-rounds wire format.
//!
//! These vectors pin the exact bytes `marshal` produces so that every
//! implementation exchanging round bitmaps agrees on the layout.

use serde::Serialize;

use cmix_rounds_core::{KnownRounds, RawCodec, RunLengthCodec, WordCodec};

/// Which word codec a vector is encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VectorCodec {
    RunLength,
    Raw,
}

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// What state the vector captures.
    pub description: &'static str,
    /// Builds the tracker to encode.
    pub build: fn() -> KnownRounds,
    /// Codec used for the window words.
    pub codec: VectorCodec,
    /// Expected marshalled bytes (hex).
    pub expected_hex: &'static str,
}

/// Outcome of checking one vector, for reports.
#[derive(Debug, Clone, Serialize)]
pub struct VectorResult {
    pub name: String,
    pub codec: VectorCodec,
    pub matches: bool,
    pub actual_hex: String,
}

fn fresh_320() -> KnownRounds {
    KnownRounds::new(320)
}

fn alternating_words() -> KnownRounds {
    parts(vec![0, u64::MAX, 0, u64::MAX, 0], 75, 150, 75)
}

fn collapsed_single_word() -> KnownRounds {
    let mut kr = KnownRounds::new(64);
    kr.check(0);
    kr
}

fn full_window_raw() -> KnownRounds {
    parts(vec![0xdead_beef_0000_ffff], 10, 73, 10)
}

fn sparse_checks() -> KnownRounds {
    let mut kr = KnownRounds::new(128);
    kr.check(3);
    kr.check(100);
    kr
}

fn parts(words: Vec<u64>, first_unchecked: u64, last_checked: u64, fu_pos: usize) -> KnownRounds {
    match KnownRounds::from_parts(words, first_unchecked, last_checked, fu_pos) {
        Ok(kr) => kr,
        Err(e) => panic!("golden vector state is invalid: {}", e),
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "fresh 320-round tracker",
            description: "nothing checked; a one-round window in one word",
            build: fresh_320,
            codec: VectorCodec::RunLength,
            expected_hex: "0000000000000000\
                           0000000000000000\
                           010040",
        },
        GoldenVector {
            name: "window over alternating words",
            description: "window [75, 150]; bits before fu_pos ship as ones",
            build: alternating_words,
            codec: VectorCodec::RunLength,
            expected_hex: "4b00000000000000\
                           9600000000000000\
                           014040",
        },
        GoldenVector {
            name: "collapsed single word",
            description: "round 0 checked on a one-word buffer; the window collapses to round 1",
            build: collapsed_single_word,
            codec: VectorCodec::RunLength,
            expected_hex: "0100000000000000\
                           0100000000000000\
                           01013f",
        },
        GoldenVector {
            name: "full window raw",
            description: "64-round window filling its only word, raw codec",
            build: full_window_raw,
            codec: VectorCodec::Raw,
            expected_hex: "0a00000000000000\
                           4900000000000000\
                           00ffff0000efbeadde",
        },
        GoldenVector {
            name: "sparse checks",
            description: "rounds 3 and 100 checked on a two-word buffer",
            build: sparse_checks,
            codec: VectorCodec::RunLength,
            expected_hex: "0000000000000000\
                           6400000000000000\
                           0100030160011b",
        },
    ]
}

/// Marshal the state a vector describes with its codec.
pub fn encode_vector(vector: &GoldenVector) -> Vec<u8> {
    let kr = (vector.build)();
    let codec: &dyn WordCodec = match vector.codec {
        VectorCodec::RunLength => &RunLengthCodec,
        VectorCodec::Raw => &RawCodec,
    };
    kr.marshal_with(codec)
}

/// Check every vector against its expected bytes.
pub fn verify_vectors() -> Vec<VectorResult> {
    all_vectors()
        .iter()
        .map(|v| {
            let actual_hex = hex::encode(encode_vector(v));
            VectorResult {
                name: v.name.to_string(),
                codec: v.codec,
                matches: actual_hex == v.expected_hex,
                actual_hex,
            }
        })
        .collect()
}

/// Verify all golden vectors produce their expected bytes.
///
/// Returns `(name, matches, actual hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    verify_vectors()
        .into_iter()
        .map(|r| (r.name, r.matches, r.actual_hex))
        .collect()
}
