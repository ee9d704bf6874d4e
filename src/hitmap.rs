//! Canonical representation of prefetch observations.
//!
//! A single probe of the victim yields up to four cache lines that the
//! region prefetcher touched. We record them as a [`Quad`]: a sorted
//! 4-tuple of [`Slot`]s, where each slot is either a concrete line
//! (distance or absolute offset, in cache-line units) or the collided
//! placeholder. Repeating the same experiment many times accumulates a
//! [`HitMap`]: quad -> number of repetitions in which that exact pattern
//! was observed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lower bound of plausible prefetch distances (cache lines).
pub const DIST_MIN: i32 = -9;
/// Upper bound of plausible prefetch distances (cache lines).
pub const DIST_MAX: i32 = 12;
/// A 256-byte-aligned T-table spans 16 cache lines, offsets 0..=15.
pub const LUT_LINES: i32 = 16;

/// Legacy text encoding of the collided placeholder.
const COLLIDED_TOKEN: &str = "999";

/// One observed slot within a probe: either a concrete cache line or an
/// ambiguous placeholder for two hits that landed on the same line.
///
/// Ordering: lines compare by value, and every line sorts before
/// `Collided`. This reproduces the legacy sentinel (999) sort position
/// without the magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    /// A cache line, relative (distance) or absolute (offset).
    Line(i32),
    /// Two entries hit the same line; the slot cannot be attributed.
    Collided,
}

impl Slot {
    /// The concrete line value, if any.
    pub fn line(self) -> Option<i32> {
        match self {
            Slot::Line(v) => Some(v),
            Slot::Collided => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Line(v) => write!(f, "{}", v),
            Slot::Collided => write!(f, "{}", COLLIDED_TOKEN),
        }
    }
}

/// True iff `slot` could have been produced by the region prefetcher:
/// either collided, or a distance within [`DIST_MIN`, `DIST_MAX`].
pub fn plausible_distance(slot: Slot) -> bool {
    match slot {
        Slot::Collided => true,
        Slot::Line(d) => (DIST_MIN..=DIST_MAX).contains(&d),
    }
}

/// True iff `line` falls inside the 16-line span of a lookup table.
pub fn plausible_offset(line: i32) -> bool {
    (0..LUT_LINES).contains(&line)
}

/// A sorted 4-tuple of slots: the four lines observed as prefetched in a
/// single probe. Kept in ascending order so that equal multisets of
/// positions compare equal regardless of measurement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quad([Slot; 4]);

impl Quad {
    /// Builds a quad, sorting the slots into canonical order.
    pub fn new(mut slots: [Slot; 4]) -> Self {
        slots.sort_unstable();
        Quad(slots)
    }

    /// Shorthand for building a quad from raw line values, with the
    /// legacy 999 sentinel mapped to `Collided`. Test and driver helper.
    pub fn from_lines(lines: [i32; 4]) -> Self {
        let mut slots = [Slot::Collided; 4];
        for (slot, &line) in slots.iter_mut().zip(lines.iter()) {
            *slot = if line == 999 { Slot::Collided } else { Slot::Line(line) };
        }
        Quad::new(slots)
    }

    pub fn slots(&self) -> &[Slot; 4] {
        &self.0
    }

    /// Canonicalizes a raw (possibly unsorted) slot array that may
    /// contain an expected future collision: sort, replace the later of
    /// two equal adjacent lines by `Collided` (single forward pass), and
    /// re-sort so the placeholder moves to the end.
    pub fn canonical(mut slots: [Slot; 4]) -> Self {
        slots.sort_unstable();
        for i in 1..slots.len() {
            if slots[i - 1] == slots[i] && slots[i] != Slot::Collided {
                slots[i] = Slot::Collided;
            }
        }
        slots.sort_unstable();
        Quad(slots)
    }

    /// True iff every non-collided slot is a plausible distance.
    pub fn plausible_distances(&self) -> bool {
        self.0.iter().all(|&s| plausible_distance(s))
    }
}

impl fmt::Display for Quad {
    /// Pipe-joined encoding used by the trace files, e.g. `-3|0|4|999`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}|{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// Parse error for the pipe-joined quad encoding.
#[derive(Debug)]
pub struct QuadParseError(pub String);

impl FromStr for Quad {
    type Err = QuadParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut slots = [Slot::Collided; 4];
        let mut n = 0usize;
        for token in s.split('|') {
            if n >= 4 {
                return Err(QuadParseError(format!("more than 4 components in {:?}", s)));
            }
            slots[n] = if token == COLLIDED_TOKEN {
                Slot::Collided
            } else {
                let v: i32 = token
                    .parse()
                    .map_err(|_| QuadParseError(format!("bad component {:?} in {:?}", token, s)))?;
                Slot::Line(v)
            };
            n += 1;
        }
        if n != 4 {
            return Err(QuadParseError(format!("expected 4 components in {:?}", s)));
        }
        Ok(Quad::new(slots))
    }
}

/// Histogram of observed quads over repeated identical experiments.
/// Invariant: the total counter mass never exceeds the number of
/// repetitions that produced the map.
pub type HitMap = BTreeMap<Quad, u64>;

/// Removes every quad containing an implausible non-collided distance,
/// in place. Implausible hits are expected measurement noise, not errors.
pub fn filter_map(map: &mut HitMap) {
    map.retain(|quad, _| quad.plausible_distances());
}

/// Which phase of the attack a trace belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    /// The plaintext byte at the anchor position was varied.
    Anchor,
    /// A dependent-position plaintext byte was bit-flipped.
    Dependent,
}

/// One recorded trace: which plaintext byte was moved, the full chosen
/// plaintext, and the hit map accumulated over all repetitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    /// Position of the moved/modified byte, in [0, 15].
    pub moved_pos: usize,
    /// The chosen plaintext used for every repetition of the experiment.
    pub plaintext: [u8; 16],
    /// The accumulated observations.
    pub map: HitMap,
}
