//! Serializable read-only projections over vote state, for display and
//! JSON output.

use serde::Serialize;

use crate::lut::LutHypothesis;

/// One row of the anchor-bit vote matrix, with the bit it resolves to.
#[derive(Debug, Clone, Serialize)]
pub struct BitVoteRow {
    pub bit: usize,
    pub zeros: u64,
    pub ones: u64,
    pub unknown: u64,
    /// '0', '1', or '_' when the votes are tied.
    pub resolved: char,
}

/// A candidate value in a dependent byte's vote histogram.
#[derive(Debug, Clone, Serialize)]
pub struct ByteCandidate {
    pub value: u8,
    pub votes: u64,
}

/// Snapshot of everything one lookup table learned.
#[derive(Debug, Clone, Serialize)]
pub struct LutReport {
    pub lut_index: usize,
    pub positions: [usize; 4],
    /// Resolved key-byte hypotheses, anchor first.
    pub resolved: [u8; 4],
    pub anchor_bits: Vec<BitVoteRow>,
    /// Top candidates per dependent position (descending votes).
    pub dependent_candidates: [Vec<ByteCandidate>; 3],
}

impl LutReport {
    /// How many top candidates to keep per dependent byte.
    const TOP_CANDIDATES: usize = 5;

    pub fn from_hypothesis(lut_index: usize, lut: &LutHypothesis) -> Self {
        let positions = lut.positions();
        let resolved = [lut.resolve(0), lut.resolve(1), lut.resolve(2), lut.resolve(3)];

        let anchor_bits = lut
            .anchor_votes()
            .iter()
            .enumerate()
            .map(|(bit, votes)| BitVoteRow {
                bit,
                zeros: votes.zeros,
                ones: votes.ones,
                unknown: votes.unknown,
                resolved: if votes.zeros > votes.ones {
                    '0'
                } else if votes.ones > votes.zeros {
                    '1'
                } else {
                    '_'
                },
            })
            .collect();

        let dependent_candidates = [1usize, 2, 3].map(|pos_idx| {
            let mut ranked: Vec<ByteCandidate> = lut
                .dependent_votes(pos_idx)
                .iter()
                .map(|(&value, &votes)| ByteCandidate { value, votes })
                .collect();
            ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
            ranked.truncate(Self::TOP_CANDIDATES);
            ranked
        });

        LutReport {
            lut_index,
            positions,
            resolved,
            anchor_bits,
            dependent_candidates,
        }
    }
}

/// Final summary over all four lookup tables.
#[derive(Debug, Clone, Serialize)]
pub struct AttackReport {
    pub luts: Vec<LutReport>,
    /// Recovered key bytes (lower nibbles unresolved, left at 0).
    pub recovered_key: [u8; 16],
    pub recovered_key_hex: String,
}

impl AttackReport {
    pub fn new(luts: Vec<LutReport>) -> Self {
        let mut recovered_key = [0u8; 16];
        for lut in &luts {
            for (idx, &pos) in lut.positions.iter().enumerate() {
                recovered_key[pos] = lut.resolved[idx];
            }
        }
        let recovered_key_hex = hex_string(&recovered_key);
        AttackReport { luts, recovered_key, recovered_key_hex }
    }

    /// Counts the recovered upper nibbles matching a reference key.
    /// The side channel only exposes the cache-line selector (upper
    /// nibble) of each byte, so 16 out of 16 is a full success.
    pub fn correct_upper_nibbles(&self, reference: &[u8; 16]) -> usize {
        self.recovered_key
            .iter()
            .zip(reference.iter())
            .filter(|(a, b)| (**a & 0xf0) == (**b & 0xf0))
            .count()
    }
}

/// Lowercase hex rendering of a byte string.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
