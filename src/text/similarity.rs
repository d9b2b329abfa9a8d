use std::collections::HashMap;
use std::hash::Hash;

use crate::models::TagId;

use super::tfidf::SparseVector;


pub type TagVector = HashMap<TagId, f64>;


/// Cosine similarity over keyed vectors. Only the intersection of keys
/// contributes to the dot product; empty or zero-norm input yields 0.0.
pub fn cosine<K>(a: &HashMap<K, f64>, b: &HashMap<K, f64>) -> f64
where
    K: Eq + Hash,
{
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    for (key, value) in a {
        norm_a += value * value;
        if let Some(other) = b.get(key) {
            dot += value * other;
        }
    }
    let norm_b: f64 = b.values().map(|value| value * value).sum();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}


/// Term-index keyed vectors produced by the TF-IDF model.
#[inline]
pub fn cosine_sparse(a: &SparseVector, b: &SparseVector) -> f64 {
    cosine(a, b)
}


/// Tag-id keyed interest/annotation vectors.
#[inline]
pub fn cosine_dense(a: &TagVector, b: &TagVector) -> f64 {
    cosine(a, b)
}


/// Scales a weight map so its largest entry becomes 1.0. A non-positive
/// maximum leaves the weights as they are.
pub fn normalize_by_max<K>(weights: impl IntoIterator<Item = (K, f64)>) -> HashMap<K, f64>
where
    K: Eq + Hash,
{
    let weights: Vec<(K, f64)> = weights.into_iter().collect();
    let max = weights
        .iter()
        .map(|(_, weight)| *weight)
        .fold(f64::NEG_INFINITY, f64::max);
    let divisor = if max > 0.0 { max } else { 1.0 };

    weights
        .into_iter()
        .map(|(key, weight)| (key, weight / divisor))
        .collect()
}
