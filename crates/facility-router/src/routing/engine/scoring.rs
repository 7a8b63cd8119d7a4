use sha2::{Digest, Sha256};

use super::FeatureVector;

/// Scores within this distance of each other are considered tied.
pub const TIE_EPSILON: f64 = 1e-9;

/// Fixed composite weights.
///
/// Capability outweighs the sum of the other three (each at most 1.0), so a capable
/// candidate always outranks an incapable one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub capability: f64,
    pub inverse_distance: f64,
    pub history: f64,
    pub capacity: f64,
}

pub const WEIGHTS: ScoringWeights = ScoringWeights {
    capability: 4.0,
    inverse_distance: 1.0,
    history: 1.0,
    capacity: 1.0,
};

impl ScoringWeights {
    pub fn composite(&self, capability: f64, inverse_distance: f64, history: f64, capacity: f64) -> f64 {
        self.capability * capability
            + self.inverse_distance * inverse_distance
            + self.history * history
            + self.capacity * capacity
    }
}

/// Stable per-candidate fingerprint: the leading 32 bits of
/// `sha256("{patient}|{request_type}|{facility}")`, i.e. its first 8 hex digits.
pub fn fingerprint(patient_id: &str, request_type: &str, facility_id: &str) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(format!("{patient_id}|{request_type}|{facility_id}").as_bytes());
    let digest = hasher.finalize();
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Index of the winning row.
///
/// Rows tied on composite are narrowed by history, then capacity, then the smallest
/// fingerprint. A fingerprint collision keeps the earliest row. `rows` must be non-empty.
pub(crate) fn select_winner<F>(rows: &[FeatureVector], fingerprint_of: F) -> usize
where
    F: Fn(usize) -> u32,
{
    let all: Vec<usize> = (0..rows.len()).collect();

    let tied = narrow(all, |i| rows[i].composite);
    let tied = narrow(tied, |i| rows[i].history);
    let tied = narrow(tied, |i| rows[i].capacity);

    if tied.len() == 1 {
        return tied[0];
    }

    tied.into_iter()
        .min_by_key(|&i| fingerprint_of(i))
        .unwrap_or(0)
}

/// Keeps the indices whose value lies within [`TIE_EPSILON`] of the group maximum.
fn narrow<F>(indices: Vec<usize>, value_of: F) -> Vec<usize>
where
    F: Fn(usize) -> f64,
{
    if indices.len() <= 1 {
        return indices;
    }

    let best = indices
        .iter()
        .map(|&i| value_of(i))
        .fold(f64::NEG_INFINITY, f64::max);

    indices
        .into_iter()
        .filter(|&i| (value_of(i) - best).abs() < TIE_EPSILON)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(capability: f64, history: f64, capacity: f64, composite: f64) -> FeatureVector {
        FeatureVector {
            capability,
            inverse_distance: 0.0,
            history,
            capacity,
            composite,
        }
    }

    #[test]
    fn capability_alone_beats_every_other_term_combined() {
        let capable_worst = WEIGHTS.composite(1.0, 0.0, 0.0, 0.0);
        let incapable_best = WEIGHTS.composite(0.0, 1.0, 1.0, 1.0);
        assert!(capable_worst > incapable_best);
    }

    #[test]
    fn fingerprint_matches_leading_hex_digits() {
        let mut hasher = Sha256::new();
        hasher.update(b"p1|imaging|facility-001");
        let hex = format!("{:x}", hasher.finalize());
        let expected = u32::from_str_radix(&hex[..8], 16).expect("hex prefix");
        assert_eq!(fingerprint("p1", "imaging", "facility-001"), expected);
    }

    #[test]
    fn fingerprint_is_stable_and_input_sensitive() {
        assert_eq!(fingerprint("p1", "lab", "f-1"), fingerprint("p1", "lab", "f-1"));
        assert_ne!(fingerprint("p1", "lab", "f-1"), fingerprint("p1", "lab", "f-2"));
    }

    #[test]
    fn highest_composite_wins_outright() {
        let rows = vec![row(0.0, 0.0, 0.0, 1.0), row(1.0, 0.0, 0.0, 4.5)];
        assert_eq!(select_winner(&rows, |_| 0), 1);
    }

    #[test]
    fn history_breaks_composite_ties() {
        let rows = vec![row(1.0, 0.0, 1.0, 5.0), row(1.0, 1.0, 0.0, 5.0)];
        assert_eq!(select_winner(&rows, |_| 0), 1);
    }

    #[test]
    fn capacity_breaks_history_ties() {
        let rows = vec![row(1.0, 0.5, 0.0, 4.5), row(1.0, 0.5, 0.0, 4.5), row(1.0, 0.5, 0.2, 4.5)];
        assert_eq!(select_winner(&rows, |_| 0), 2);
    }

    #[test]
    fn smallest_fingerprint_breaks_remaining_ties() {
        let rows = vec![row(1.0, 0.0, 0.0, 4.0); 3];
        let prints = [30_u32, 10, 20];
        assert_eq!(select_winner(&rows, |i| prints[i]), 1);
    }

    #[test]
    fn fingerprint_collision_keeps_first_row() {
        let rows = vec![row(1.0, 0.0, 0.0, 4.0); 2];
        assert_eq!(select_winner(&rows, |_| 7), 0);
    }

    #[test]
    fn near_equal_scores_count_as_tied() {
        let rows = vec![row(1.0, 0.0, 0.0, 4.0), row(1.0, 1.0, 0.0, 4.0 - 1e-12)];
        assert_eq!(select_winner(&rows, |_| 0), 1);
    }
}
