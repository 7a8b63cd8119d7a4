/// Min-max normalization into `[0, 1]`.
///
/// A flat column (`max == min`, including a single value) normalizes to all zeros so a
/// degenerate feature contributes nothing to the composite.
pub fn min_max(values: &[f64]) -> Vec<f64> {
    let Some(first) = values.first() else {
        return Vec::new();
    };

    let (min, max) = values
        .iter()
        .fold((*first, *first), |(min, max), value| (min.min(*value), max.max(*value)));
    let range = max - min;

    if range == 0.0 {
        return vec![0.0; values.len()];
    }

    values.iter().map(|value| (value - min) / range).collect()
}

/// Inverse normalized distance per candidate, so closer facilities score higher.
///
/// Unknown distances are treated as the farthest known one; when nothing is known every
/// candidate gets 0.0.
pub fn inverse_distance(distances: &[Option<f64>]) -> Vec<f64> {
    let farthest = distances
        .iter()
        .flatten()
        .copied()
        .filter(|distance| distance.is_finite())
        .reduce(f64::max);

    let Some(farthest) = farthest else {
        return vec![0.0; distances.len()];
    };

    let filled: Vec<f64> = distances
        .iter()
        .map(|distance| match distance {
            Some(km) if km.is_finite() => *km,
            _ => farthest,
        })
        .collect();

    min_max(&filled).into_iter().map(|n| 1.0 - n).collect()
}
