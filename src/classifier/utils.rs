use ndarray::{Array1, ArrayView1};

use super::vectorizer::FeatureVector;

/// Scales `values` in place to unit L2 norm; an all-zero slice is left untouched.
pub(crate) fn normalize_l2(values: &mut [f64]) {
    let norm: f64 = values.iter().map(|&x| x * x).sum::<f64>().sqrt();
    if norm > 1e-12 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
}

/// Numerically stable log(sum(exp(x))).
pub(crate) fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|&v| (v - max).exp()).sum::<f64>().ln()
}

/// Softmax of `logits`, written into a new vector.
pub(crate) fn softmax(logits: &[f64]) -> Vec<f64> {
    let lse = log_sum_exp(logits);
    logits.iter().map(|&v| (v - lse).exp()).collect()
}

/// Index of the largest value; the first one wins on ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

pub(crate) fn max_abs(vec: &Array1<f64>) -> f64 {
    vec.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()))
}

/// Dot product of a sparse feature vector with a dense weight row.
pub(crate) fn sparse_dot(x: &FeatureVector, row: ArrayView1<f64>) -> f64 {
    x.iter().map(|(j, v)| row[j] * v).sum()
}
