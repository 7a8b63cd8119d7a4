/// How many leading scores take part in the softmax.
pub const CONFIDENCE_CLUSTER: usize = 3;

/// Softmax of the top score against the top three: `exp(s0) / Σ exp(si)`.
///
/// Evaluated as `1 / Σ exp(si - s0)`, which is the same value without overflow. Returns 0.0
/// for an empty pool.
pub fn softmax_top3(scores: &[f64]) -> f64 {
    let mut leading: Vec<f64> = scores.to_vec();
    leading.sort_by(|a, b| b.total_cmp(a));
    leading.truncate(CONFIDENCE_CLUSTER);

    let Some(&top) = leading.first() else {
        return 0.0;
    };

    let total: f64 = leading.iter().map(|score| (score - top).exp()).sum();
    if total > 0.0 {
        (1.0 / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
