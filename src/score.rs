//! Similarity scoring between a recorded hit map and a predicted one.

use crate::hitmap::HitMap;

/// Hit-map similarity score; higher is a better match.
pub type Score = i64;

/// A voter only trusts a comparison whose winning score reaches this
/// threshold (one full quad match).
pub const MIN_CONFIDENT_SCORE: Score = 10;

/// Scores how well an `actual` (recorded) hit map matches an `expected`
/// (predicted) one.
///
/// - +1 if both maps contain the same number of distinct quads.
/// - For each actual quad found in `expected`: +20, plus +10 if its
///   relative frequency (count over the map's maximum count) agrees with
///   the expected relative frequency within 0.1.
/// - -1 for each actual quad absent from `expected`.
///
/// Quads present only in `expected` are not penalized: under-prediction
/// is tolerated, a spurious observation is not.
pub fn similarity_score(actual: &HitMap, expected: &HitMap) -> Score {
    let mut score: Score = 0;
    if actual.len() == expected.len() {
        score += 1;
    }

    let max_actual = actual.values().copied().max().unwrap_or(0);
    let max_expected = expected.values().copied().max().unwrap_or(0);

    for (quad, &count) in actual {
        match expected.get(quad) {
            Some(&expected_count) => {
                score += 20;
                if max_actual > 0 && max_expected > 0 {
                    let ratio_actual = count as f64 / max_actual as f64;
                    let ratio_expected = expected_count as f64 / max_expected as f64;
                    if (ratio_actual - ratio_expected).abs() < 0.1 {
                        score += 10;
                    }
                }
            }
            None => score -= 1,
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hitmap::Quad;

    #[test]
    fn test_self_match_is_maximal() {
        let mut map = HitMap::new();
        map.insert(Quad::from_lines([0, 1, 2, 3]), 40);
        map.insert(Quad::from_lines([0, 2, 4, 999]), 10);
        map.insert(Quad::from_lines([0, 5, 6, 7]), 25);
        // Perfect self-match: cardinality +1, and +30 per entry.
        assert_eq!(similarity_score(&map, &map), 1 + 3 * 30);
    }

    #[test]
    fn test_unexpected_observation_penalized() {
        let mut actual = HitMap::new();
        actual.insert(Quad::from_lines([0, 1, 2, 3]), 40);
        actual.insert(Quad::from_lines([0, 9, 10, 11]), 40);
        let mut expected = HitMap::new();
        expected.insert(Quad::from_lines([0, 1, 2, 3]), 40);
        expected.insert(Quad::from_lines([0, 4, 5, 6]), 40);
        // +1 size, +30 for the shared quad, -1 for the spurious one. The
        // unmatched expected quad carries no penalty of its own.
        assert_eq!(similarity_score(&actual, &expected), 1 + 30 - 1);
    }

    #[test]
    fn test_asymmetry_of_under_prediction() {
        let mut actual = HitMap::new();
        actual.insert(Quad::from_lines([0, 1, 2, 3]), 40);
        let mut expected = actual.clone();
        expected.insert(Quad::from_lines([0, 4, 5, 6]), 40);
        // No cardinality bonus, but no penalty for the extra expectation.
        assert_eq!(similarity_score(&actual, &expected), 30);
        // The mirror comparison pays for the spurious observation.
        assert_eq!(similarity_score(&expected, &actual), 30 - 1);
    }

    #[test]
    fn test_ratio_agreement_bonus() {
        let mut actual = HitMap::new();
        actual.insert(Quad::from_lines([0, 1, 2, 3]), 100);
        actual.insert(Quad::from_lines([0, 4, 5, 6]), 50);
        let mut expected = HitMap::new();
        expected.insert(Quad::from_lines([0, 1, 2, 3]), 10);
        expected.insert(Quad::from_lines([0, 4, 5, 6]), 1);
        // Ratios: actual 1.0/0.5, expected 1.0/0.1. The first entry gets
        // the frequency bonus, the second does not.
        assert_eq!(similarity_score(&actual, &expected), 1 + 30 + 20);
    }

    #[test]
    fn test_empty_maps_do_not_panic() {
        let empty = HitMap::new();
        let mut one = HitMap::new();
        one.insert(Quad::from_lines([0, 1, 2, 3]), 5);
        assert_eq!(similarity_score(&empty, &empty), 1);
        assert_eq!(similarity_score(&empty, &one), 0);
        assert_eq!(similarity_score(&one, &empty), -1);
    }
}
