//! Expected-distribution predictor for the anchor-byte phase.
//!
//! Given a recorded hit map and a one-bit plaintext perturbation at the
//! anchor position, predicts the two hit maps that should be observed
//! for the two possible values of the affected key bit. The anchor
//! byte's cache-line selector is its upper nibble, so a plaintext bit
//! flip moves every hit by `mask >> 4` lines, up or down depending on
//! the key bit.

use crate::hitmap::{filter_map, HitMap, Quad, Slot, TraceRecord};

/// Predicts the hit maps expected after flipping the plaintext bit
/// selected by `bit_mask` (exactly one bit set) at the anchor position.
///
/// `outer` is the recorded trace; `inner_pt_byte` is the anchor
/// plaintext byte of the trace to compare against, which must differ
/// from `outer`'s anchor byte exactly at `bit_mask`.
///
/// Returns `(map for key bit = 0, map for key bit = 1)`. Both maps are
/// filtered for implausible distances before being returned.
///
/// Panics if `bit_mask` does not have exactly one bit set, or if the two
/// plaintext bytes do not differ at `bit_mask` — either means the caller
/// paired incompatible traces, and voting on them would poison the
/// hypothesis state.
pub fn expected_maps_anchor(outer: &TraceRecord, inner_pt_byte: u8, bit_mask: u8) -> (HitMap, HitMap) {
    assert_eq!(
        bit_mask.count_ones(),
        1,
        "bit mask {:#04x} must select exactly one bit",
        bit_mask
    );
    let outer_pt_byte = outer.plaintext[outer.moved_pos];
    let shift = (bit_mask >> 4) as i32;

    let mut map_bit0 = HitMap::new();
    let mut map_bit1 = HitMap::new();

    for (&quad, &count) in &outer.map {
        // Shift every movable component up (plus) and down (minus).
        // Distance 0 is the anchor's own hit and stays put under every
        // hypothesis; a collided slot cannot be usefully shifted.
        let mut plus = [Slot::Collided; 4];
        let mut minus = [Slot::Collided; 4];
        for (i, &slot) in quad.slots().iter().enumerate() {
            match slot {
                Slot::Line(0) => {
                    plus[i] = Slot::Line(0);
                    minus[i] = Slot::Line(0);
                }
                Slot::Line(d) => {
                    plus[i] = Slot::Line(d + shift);
                    minus[i] = Slot::Line(d - shift);
                }
                Slot::Collided => {
                    plus[i] = Slot::Collided;
                    minus[i] = Slot::Collided;
                }
            }
        }
        let plus = Quad::canonical(plus);
        let minus = Quad::canonical(minus);

        let outer_bit = outer_pt_byte & bit_mask;
        let inner_bit = inner_pt_byte & bit_mask;
        if outer_bit == 0 && inner_bit != 0 {
            // Plaintext bit flip 0 -> 1: key bit 0 means the hit moves
            // down by `shift` lines, key bit 1 means it moves up.
            map_bit0.insert(minus, count);
            map_bit1.insert(plus, count);
        } else if outer_bit != 0 && inner_bit == 0 {
            // Plaintext bit flip 1 -> 0: directions swap.
            map_bit0.insert(plus, count);
            map_bit1.insert(minus, count);
        } else {
            panic!(
                "plaintext bytes {:#04x}/{:#04x} do not differ at mask {:#04x}",
                outer_pt_byte, inner_pt_byte, bit_mask
            );
        }
    }

    filter_map(&mut map_bit0);
    filter_map(&mut map_bit1);
    (map_bit0, map_bit1)
}
