//! Per-lookup-table hypothesis state and the two voting procedures.
//!
//! One [`LutHypothesis`] tracks everything learned about the four key
//! bytes feeding a single AES T-table: the recorded traces, an 8x3 vote
//! matrix for the anchor byte's bits, and a vote histogram per dependent
//! byte. Anchor resolution must complete before dependent evaluation,
//! since converting distances to absolute offsets reads the anchor
//! hypothesis.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::hitmap::{filter_map, plausible_offset, HitMap, Quad, RecordClass, Slot, TraceRecord};
use crate::persist::{self, PersistError};
use crate::predict::expected_maps_anchor;
use crate::score::{similarity_score, MIN_CONFIDENT_SCORE};

/// Vote counters for a single key bit. Monotonic; never reset.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BitVotes {
    pub zeros: u64,
    pub ones: u64,
    pub unknown: u64,
}

/// Recorded traces and key-byte hypotheses for one AES T-table.
pub struct LutHypothesis {
    /// The 4 key/plaintext byte positions influencing this table, in AES
    /// round execution order. `positions[0]` is the anchor byte.
    positions: [usize; 4],
    anchor_records: Vec<TraceRecord>,
    dependent_records: Vec<TraceRecord>,
    /// Per-bit votes for the anchor key byte.
    anchor_votes: [BitVotes; 8],
    /// Per-value vote histograms for the three dependent key bytes.
    dependent_votes: [BTreeMap<u8, u64>; 3],
}

impl LutHypothesis {
    pub fn new(positions: [usize; 4]) -> Self {
        LutHypothesis {
            positions,
            anchor_records: Vec::new(),
            dependent_records: Vec::new(),
            anchor_votes: [BitVotes::default(); 8],
            dependent_votes: Default::default(),
        }
    }

    pub fn positions(&self) -> [usize; 4] {
        self.positions
    }

    /// The plaintext/key byte position loaded first for this table.
    pub fn anchor_pos(&self) -> usize {
        self.positions[0]
    }

    /// Maps a byte position in [0, 15] to its index in [0, 3] within
    /// this table's position set. Panics if the position does not belong
    /// to this table.
    pub fn pos_to_idx(&self, pos: usize) -> usize {
        self.positions
            .iter()
            .position(|&p| p == pos)
            .unwrap_or_else(|| panic!("position {} does not belong to LUT {:?}", pos, self.positions))
    }

    /// Filters a raw trace and appends it to the given collection.
    /// Returns the index of the stored record.
    pub fn add_record(
        &mut self,
        class: RecordClass,
        moved_pos: usize,
        plaintext: [u8; 16],
        mut map: HitMap,
    ) -> usize {
        filter_map(&mut map);
        let records = match class {
            RecordClass::Anchor => &mut self.anchor_records,
            RecordClass::Dependent => &mut self.dependent_records,
        };
        records.push(TraceRecord { moved_pos, plaintext, map });
        records.len() - 1
    }

    pub fn records(&self, class: RecordClass) -> &[TraceRecord] {
        match class {
            RecordClass::Anchor => &self.anchor_records,
            RecordClass::Dependent => &self.dependent_records,
        }
    }

    /// Writes a record collection to a trace file.
    pub fn dump_records(&self, class: RecordClass, path: impl AsRef<Path>) -> Result<(), PersistError> {
        persist::save_records(path, self.records(class))
    }

    /// Replaces a record collection with the contents of a trace file.
    /// On failure the collection is left empty, so downstream voters
    /// simply see no evidence for this table.
    pub fn restore_records(&mut self, class: RecordClass, path: impl AsRef<Path>) -> Result<(), PersistError> {
        match class {
            RecordClass::Anchor => self.anchor_records.clear(),
            RecordClass::Dependent => self.dependent_records.clear(),
        }
        let records = persist::load_records(path)?;
        match class {
            RecordClass::Anchor => self.anchor_records = records,
            RecordClass::Dependent => self.dependent_records = records,
        }
        Ok(())
    }

    /// Read-only view of the anchor-bit vote matrix.
    pub fn anchor_votes(&self) -> &[BitVotes; 8] {
        &self.anchor_votes
    }

    /// Read-only view of a dependent byte's vote histogram,
    /// `pos_idx` in [1, 3].
    pub fn dependent_votes(&self, pos_idx: usize) -> &BTreeMap<u8, u64> {
        &self.dependent_votes[pos_idx - 1]
    }

    /// Anchor-bit voter: walks every unordered pair of anchor records
    /// once (outer preceding inner in storage order). Pairs whose anchor
    /// plaintext bytes differ in more than one bit carry no attributable
    /// single-bit information and are skipped. For a qualifying pair the
    /// predictor supplies both key-bit hypotheses and the inner map is
    /// scored against each; a clear, confident winner casts a bit vote,
    /// anything else counts as unknown.
    pub fn evaluate_anchor(&mut self) {
        let anchor_pos = self.anchor_pos();
        for outer_i in 0..self.anchor_records.len() {
            for inner_i in (outer_i + 1)..self.anchor_records.len() {
                let outer = &self.anchor_records[outer_i];
                let inner = &self.anchor_records[inner_i];
                let outer_byte = outer.plaintext[anchor_pos];
                let inner_byte = inner.plaintext[anchor_pos];

                let diff = outer_byte ^ inner_byte;
                if diff.count_ones() != 1 {
                    continue;
                }
                let diffpos = diff.trailing_zeros() as usize;

                let (map0, map1) = expected_maps_anchor(outer, inner_byte, diff);
                let score0 = similarity_score(&inner.map, &map0);
                let score1 = similarity_score(&inner.map, &map1);

                let votes = &mut self.anchor_votes[diffpos];
                if score0 > score1 && score0 >= MIN_CONFIDENT_SCORE {
                    votes.zeros += 1;
                } else if score1 > score0 && score1 >= MIN_CONFIDENT_SCORE {
                    votes.ones += 1;
                } else {
                    votes.unknown += 1;
                }
            }
        }
    }

    /// Converts a record's anchor-relative distances into absolute
    /// lookup-table offsets.
    ///
    /// Requires the anchor-byte hypothesis to be resolved already; the
    /// anchor-resolution path must never call this. Quads producing any
    /// offset outside the table, and quads containing a collided slot
    /// (which cannot be placed), are dropped, so the result may be
    /// shorter than the record's map, even empty.
    pub fn distances_to_offsets(&self, record: &TraceRecord) -> Vec<Quad> {
        let anchor_hyp = self.resolve(0);
        let pt_byte = record.plaintext[self.anchor_pos()];
        let anchor_offset = ((anchor_hyp ^ pt_byte) >> 4) as i32;

        let mut offsets = Vec::new();
        'quads: for quad in record.map.keys() {
            let mut shifted = [Slot::Collided; 4];
            for (i, &slot) in quad.slots().iter().enumerate() {
                match slot {
                    Slot::Line(d) => {
                        let offset = d + anchor_offset;
                        if !plausible_offset(offset) {
                            continue 'quads;
                        }
                        shifted[i] = Slot::Line(offset);
                    }
                    Slot::Collided => continue 'quads,
                }
            }
            offsets.push(Quad::new(shifted));
        }
        offsets
    }

    /// Dependent-byte voter: compares every dependent record against
    /// every anchor record in absolute-offset space. For each anchor
    /// offset quad, each of the four slots is hypothesized to have moved
    /// by +/- the shift implied by the flipped plaintext bit (the
    /// hardware shift direction is not known a priori, so both signs are
    /// tried). An exact match with an observed dependent offset quad
    /// casts a vote for the key-byte value implied by the moved slot.
    ///
    /// Requires the anchor hypothesis to be resolved already.
    pub fn evaluate_dependent(&mut self) {
        let anchor_pos = self.anchor_pos();
        let mut votes: Vec<(usize, u8)> = Vec::new();

        for dependent in &self.dependent_records {
            let dep_pos = dependent.moved_pos;
            let dep_idx = self.pos_to_idx(dep_pos);
            assert!(dep_idx >= 1, "dependent record stored at the anchor position {}", dep_pos);
            let dependent_offsets = self.distances_to_offsets(dependent);

            for anchor in &self.anchor_records {
                assert_eq!(
                    anchor.moved_pos, anchor_pos,
                    "anchor record was collected at the wrong position"
                );
                let anchor_offsets = self.distances_to_offsets(anchor);

                // Exactly one upper-nibble bit must differ at the
                // dependent position between the two plaintexts.
                let bytediff = (anchor.plaintext[dep_pos] ^ dependent.plaintext[dep_pos]) & 0xf0;
                assert_eq!(
                    bytediff.count_ones(),
                    1,
                    "plaintexts must differ in exactly one upper-nibble bit at position {}",
                    dep_pos
                );
                let flipped_bit = bytediff.trailing_zeros();
                let expected_shift = 1i32 << (flipped_bit - 4);

                for anchor_quad in &anchor_offsets {
                    for moved_idx in 0..4 {
                        let moved_line = match anchor_quad.slots()[moved_idx].line() {
                            Some(line) => line,
                            // Offset quads never carry collided slots; a
                            // collided slot could not be attributed anyway.
                            None => continue,
                        };

                        let mut plus = *anchor_quad.slots();
                        let mut minus = *anchor_quad.slots();
                        plus[moved_idx] = Slot::Line(moved_line + expected_shift);
                        minus[moved_idx] = Slot::Line(moved_line - expected_shift);
                        let plus = Quad::canonical(plus);
                        let minus = Quad::canonical(minus);

                        for observed in &dependent_offsets {
                            if *observed == plus || *observed == minus {
                                let value =
                                    (anchor.plaintext[dep_pos] ^ ((moved_line as u8) << 4)) & 0xf0;
                                votes.push((dep_idx - 1, value));
                            }
                        }
                    }
                }
            }
        }

        for (slot, value) in votes {
            *self.dependent_votes[slot].entry(value).or_insert(0) += 1;
        }
    }

    /// Resolves the current key-byte hypothesis for a position index in
    /// [0, 3]. Index 0 is the anchor byte: each bit is the majority of
    /// its zero/one votes, ties (including no votes at all) default to
    /// 0. Indices 1..=3 are dependent bytes: the value with the highest
    /// vote count wins; ties resolve to the smallest byte value among
    /// the tied maxima (stable descending sort over the ascending-key
    /// histogram); an empty histogram resolves to 0x00.
    ///
    /// This is a pure projection over the current vote state, recomputed
    /// on every call.
    pub fn resolve(&self, pos_idx: usize) -> u8 {
        if pos_idx == 0 {
            let mut byte = 0u8;
            for (bit, votes) in self.anchor_votes.iter().enumerate() {
                if votes.ones > votes.zeros {
                    byte |= 1 << bit;
                }
            }
            byte
        } else {
            let mut ranked: Vec<(u8, u64)> = self.dependent_votes[pos_idx - 1]
                .iter()
                .map(|(&value, &count)| (value, count))
                .collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1));
            ranked.first().map(|&(value, _)| value).unwrap_or(0x00)
        }
    }
}
