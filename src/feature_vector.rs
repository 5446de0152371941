//! Sparse term→weight vectors for feedback models.
//!
//! A [`FeatureVector`] maps terms to float weights while remembering
//! insertion order, so pruning resolves equal-weight ties the same way on
//! every run. All feedback estimators build, normalize, and interpolate
//! these vectors before rewriting them into a weighted query.

use std::collections::HashMap;

/// Insertion-ordered sparse mapping from term to weight.
///
/// Weights are additive: [`add_weight`](FeatureVector::add_weight) accumulates
/// rather than replaces. Pruning and normalization are deterministic given
/// identical weights and insertion order, which keeps reranking reproducible
/// across index rebuilds.
#[derive(Debug, Clone, Default)]
pub struct FeatureVector {
    /// (term, weight) in insertion order.
    entries: Vec<(String, f32)>,
    /// term → slot in `entries`.
    slots: HashMap<String, usize>,
}

impl FeatureVector {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a vector from a token stream, adding 1.0 per occurrence.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fv = Self::new();
        for t in terms {
            fv.add_weight(t.as_ref(), 1.0);
        }
        fv
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the vector holds no terms.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when `term` has an entry.
    pub fn contains(&self, term: &str) -> bool {
        self.slots.contains_key(term)
    }

    /// Weight of `term`, or 0.0 when absent.
    pub fn weight(&self, term: &str) -> f32 {
        self.slots.get(term).map_or(0.0, |&i| self.entries[i].1)
    }

    /// Adds `delta` to the weight of `term`, inserting it when absent.
    pub fn add_weight(&mut self, term: &str, delta: f32) {
        if let Some(&i) = self.slots.get(term) {
            self.entries[i].1 += delta;
        } else {
            self.slots.insert(term.to_string(), self.entries.len());
            self.entries.push((term.to_string(), delta));
        }
    }

    /// Iterates over (term, weight) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.entries.iter().map(|(t, w)| (t.as_str(), *w))
    }

    /// Iterates over terms in insertion order.
    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    /// Sum of absolute weights.
    pub fn l1_norm(&self) -> f32 {
        self.entries.iter().map(|(_, w)| w.abs()).sum()
    }

    /// Euclidean norm.
    pub fn l2_norm(&self) -> f32 {
        self.entries
            .iter()
            .map(|(_, w)| w * w)
            .sum::<f32>()
            .sqrt()
    }

    /// Multiplies every weight by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for (_, w) in &mut self.entries {
            *w *= factor;
        }
    }

    /// Scales weights so the L1 norm becomes 1. No-op on a zero vector.
    pub fn scale_to_unit_l1_norm(&mut self) {
        let norm = self.l1_norm();
        if norm > 0.0 {
            for (_, w) in &mut self.entries {
                *w /= norm;
            }
        }
    }

    /// Scales weights so the L2 norm becomes 1. No-op on a zero vector.
    pub fn scale_to_unit_l2_norm(&mut self) {
        let norm = self.l2_norm();
        if norm > 0.0 {
            for (_, w) in &mut self.entries {
                *w /= norm;
            }
        }
    }

    /// Keeps at most the `k` highest-weight entries.
    ///
    /// Exactly-k semantics: the result never holds more than `k` terms.
    /// Ordering is by descending weight with equal weights resolved by
    /// insertion order (stable sort), so pruning is deterministic.
    pub fn prune_to_size(&mut self, k: usize) {
        if self.entries.len() <= k {
            return;
        }
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| {
            self.entries[b]
                .1
                .partial_cmp(&self.entries[a].1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(k);
        // Rebuild in original insertion order so later pruning stays stable.
        order.sort_unstable();

        let mut entries = Vec::with_capacity(k);
        let mut slots = HashMap::with_capacity(k);
        for i in order {
            let (term, w) = self.entries[i].clone();
            slots.insert(term.clone(), entries.len());
            entries.push((term, w));
        }
        self.entries = entries;
        self.slots = slots;
    }

    /// Pointwise interpolation `w·x + (1−w)·y` over the vocabulary union.
    ///
    /// Terms keep x's insertion order first, then y's terms absent from x.
    pub fn interpolate(x: &FeatureVector, y: &FeatureVector, x_weight: f32) -> FeatureVector {
        let mut z = FeatureVector::new();
        for (term, wx) in x.iter() {
            z.add_weight(term, x_weight * wx + (1.0 - x_weight) * y.weight(term));
        }
        for (term, wy) in y.iter() {
            if !x.contains(term) {
                z.add_weight(term, (1.0 - x_weight) * wy);
            }
        }
        z
    }
}
