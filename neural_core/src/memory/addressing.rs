//! Content addressing helpers.

use serde::{Deserialize, Serialize};

use crate::kernels::Kernels;

/// Upper bound on read heads; top-k selection lives on the stack.
pub const MAX_READ_HEADS: usize = 8;

/// How a query is compared with slot contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Angle only, in [-1, 1].
    #[default]
    Cosine,
    /// Raw dot product; stronger writes score higher.
    Dot,
}

impl SimilarityMetric {
    pub fn score(self, kernels: &dyn Kernels, query: &[f32], slot: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => kernels.cosine_similarity(query, slot),
            SimilarityMetric::Dot => kernels.dot(query, slot),
        }
    }
}

/// The `k` best `(slot, score)` pairs seen so far, best first.
///
/// Ties keep the earlier slot ahead, so selection is deterministic.
#[derive(Debug, Clone, Copy)]
pub struct TopK {
    entries: [(usize, f32); MAX_READ_HEADS],
    len: usize,
    k: usize,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            entries: [(0, f32::NEG_INFINITY); MAX_READ_HEADS],
            len: 0,
            k: k.min(MAX_READ_HEADS),
        }
    }

    pub fn offer(&mut self, slot: usize, score: f32) {
        if self.k == 0 || score.is_nan() {
            return;
        }
        if self.len == self.k && score <= self.entries[self.len - 1].1 {
            return;
        }
        let mut pos = self.len.min(self.k - 1);
        if self.len < self.k {
            self.len += 1;
        }
        while pos > 0 && self.entries[pos - 1].1 < score {
            self.entries[pos] = self.entries[pos - 1];
            pos -= 1;
        }
        self.entries[pos] = (slot, score);
    }

    pub fn as_slice(&self) -> &[(usize, f32)] {
        &self.entries[..self.len]
    }

    pub fn best(&self) -> Option<(usize, f32)> {
        self.as_slice().first().copied()
    }
}

/// Normalized softmax weights for `scores` scaled by `sharpness`, written to `out`.
pub fn blend_weights(scores: &[(usize, f32)], sharpness: f32, out: &mut [f32; MAX_READ_HEADS]) {
    let n = scores.len();
    if n == 0 {
        return;
    }
    let max = scores
        .iter()
        .map(|(_, s)| s * sharpness)
        .fold(f32::NEG_INFINITY, f32::max);
    let mut total = 0.0;
    for (w, (_, s)) in out.iter_mut().zip(scores) {
        *w = (s * sharpness - max).exp();
        total += *w;
    }
    for w in &mut out[..n] {
        *w /= total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_orders_and_bounds() {
        let mut top = TopK::new(3);
        for (slot, score) in [(0, 0.1), (1, 0.9), (2, 0.5), (3, 0.7), (4, 0.2)] {
            top.offer(slot, score);
        }
        assert_eq!(top.as_slice(), &[(1, 0.9), (3, 0.7), (2, 0.5)]);
        assert_eq!(top.best(), Some((1, 0.9)));
    }

    #[test]
    fn test_top_k_ties_keep_first() {
        let mut top = TopK::new(2);
        top.offer(4, 0.5);
        top.offer(7, 0.5);
        top.offer(9, 0.5);
        assert_eq!(top.as_slice(), &[(4, 0.5), (7, 0.5)]);
    }

    #[test]
    fn test_top_k_zero_heads() {
        let mut top = TopK::new(0);
        top.offer(0, 1.0);
        assert!(top.best().is_none());
    }

    #[test]
    fn test_blend_weights_are_distribution() {
        let mut weights = [0.0; MAX_READ_HEADS];
        blend_weights(&[(0, 0.9), (1, 0.5), (2, -0.2)], 8.0, &mut weights);
        let total: f32 = weights[..3].iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(weights[0] > weights[1] && weights[1] > weights[2]);
        assert!(weights[..3].iter().all(|w| *w >= 0.0));
    }
}
