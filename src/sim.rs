//! Simulated trace source.
//!
//! The hardware collector (process orchestration, interrupt-timed
//! Flush+Reload probing, kernel-module cache introspection) is an
//! external collaborator; the engine only consumes its hit maps. The
//! [`TraceSource`] trait captures that contract, and
//! [`SimulatedVictim`] implements it by modelling the region prefetcher
//! leaking the four T-table line offsets of a victim encryption,
//! deterministically from a seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::hitmap::{HitMap, Quad, Slot, LUT_LINES};

/// Opaque oracle producing one hit map per chosen plaintext, built from
/// repeated probes of the victim.
pub trait TraceSource {
    /// Collects a hit map for the table influenced by the given byte
    /// positions (anchor first), under the given chosen plaintext.
    fn collect_trace(&mut self, positions: &[usize; 4], plaintext: &[u8; 16]) -> HitMap;
}

/// Deterministic stand-in for the hardware collector.
///
/// For each repetition the victim touches the cache lines
/// `(key[p] ^ plaintext[p]) >> 4` for the table's four byte positions.
/// The probe reports them as distances relative to the anchor line.
/// Lines hit by more than one lookup cannot be told apart, so a
/// repetition with three distinct lines yields a collided fourth slot,
/// and one with fewer is discarded entirely.
pub struct SimulatedVictim {
    key: [u8; 16],
    repetitions: u64,
    /// Per-repetition probability of one line being observed one line
    /// off (prefetcher jitter).
    noise: f64,
    rng: StdRng,
}

impl SimulatedVictim {
    pub fn new(key: [u8; 16], repetitions: u64, noise: f64, seed: u64) -> Self {
        SimulatedVictim {
            key,
            repetitions,
            noise,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn key(&self) -> [u8; 16] {
        self.key
    }
}

impl TraceSource for SimulatedVictim {
    fn collect_trace(&mut self, positions: &[usize; 4], plaintext: &[u8; 16]) -> HitMap {
        let lines: Vec<i32> = positions
            .iter()
            .map(|&p| ((self.key[p] ^ plaintext[p]) >> 4) as i32)
            .collect();
        let anchor_line = lines[0];

        let mut map = HitMap::new();
        for _ in 0..self.repetitions {
            let mut observed = lines.clone();
            if self.noise > 0.0 && self.rng.gen_bool(self.noise) {
                // Jitter one non-anchor line by one cache line; the
                // anchor's own hit is the probe itself and never moves.
                let idx = self.rng.gen_range(1..4);
                let delta = if self.rng.gen_bool(0.5) { 1 } else { -1 };
                observed[idx] = (observed[idx] + delta).clamp(0, LUT_LINES - 1);
            }

            // The probe sees cache lines, not lookups: collapse
            // duplicates, then pad with the collided placeholder.
            observed.sort_unstable();
            observed.dedup();
            if observed.len() < 3 {
                continue;
            }
            let mut slots = [Slot::Collided; 4];
            for (slot, &line) in slots.iter_mut().zip(observed.iter()) {
                *slot = Slot::Line(line - anchor_line);
            }
            *map.entry(Quad::new(slots)).or_insert(0) += 1;
        }
        map
    }
}
