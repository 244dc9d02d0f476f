//! Random draws used by the bend engine.
//!
//! Every helper takes the caller's generator so that one seeded stream
//! drives a whole bend in a fixed order.

use glam::DVec3;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

/// Logistic function `1 / (1 + exp(-x))`.
///
/// Saturates to exactly `0.0` or `1.0` for large `|x|` instead of
/// producing NaN.
#[inline]
pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// One draw from `U[0, 1)`.
#[inline]
pub fn uniform_unit(rng: &mut impl Rng) -> f64 {
    rng.random::<f64>()
}

/// Draws `count` Euler triples, each component uniform in
/// `[-limit, limit]`.
///
/// Components are drawn x, y, z for the first triple, then the next
/// triple, and so on.
pub fn random_euler_angles(rng: &mut impl Rng, count: usize, limit: f64) -> Vec<DVec3> {
    (0..count)
        .map(|_| {
            let x = rng.random_range(-limit..=limit);
            let y = rng.random_range(-limit..=limit);
            let z = rng.random_range(-limit..=limit);
            DVec3::new(x, y, z)
        })
        .collect()
}

/// Normalizes non-negative `scores` into a probability vector.
///
/// If the scores sum to zero (or are not finite) every entry gets the
/// same probability.
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    let total: f64 = scores.iter().sum();
    if total > 0.0 && total.is_finite() {
        scores.iter().map(|s| s / total).collect()
    } else {
        let n = scores.len() as f64;
        vec![1.0 / n; scores.len()]
    }
}

/// Draws an index with probability proportional to `scores`.
///
/// Returns `None` only when `scores` is empty.
pub fn weighted_choice(rng: &mut impl Rng, scores: &[f64]) -> Option<usize> {
    if scores.is_empty() {
        return None;
    }
    let probs = normalize_scores(scores);
    match WeightedIndex::new(&probs) {
        Ok(dist) => Some(dist.sample(rng)),
        // Only reachable through subnormal underflow after normalizing.
        Err(_) => Some(rng.random_range(0..scores.len())),
    }
}
