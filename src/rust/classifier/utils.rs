use std::cmp::Ordering;

/// Orders two class indices by score descending, lowest index first on ties.
/// NaN scores rank below every real score.
fn rank(scores: &[f32], a: usize, b: usize) -> Ordering {
    let key = |i: usize| {
        let s = scores[i];
        if s.is_nan() { f32::NEG_INFINITY } else { s }
    };
    key(b).total_cmp(&key(a)).then(a.cmp(&b))
}

/// Index of the highest score. Ties go to the lowest index.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    (0..scores.len()).min_by(|&a, &b| rank(scores, a, b))
}

/// Indices of the `k` highest scores, best first. Ties go to the lowest index.
pub fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| rank(scores, a, b));
    indices.truncate(k);
    indices
}

pub(crate) fn round_percentage(confidence: f32) -> f64 {
    (f64::from(confidence) * 10_000.0).round() / 100.0
}
