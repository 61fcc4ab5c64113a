//! Binary-relevance ranking metrics.
//!
//! Both metrics return `0.0` when the query has no relevant documents; the
//! evaluator excludes such queries from averages before they get here.

use std::collections::HashSet;
use std::hash::Hash;

/// `Σ_{i=1..k} rel_i / log2(i + 1)` over the ranked list.
pub fn dcg_at_k<T: Eq + Hash>(retrieved: &[T], relevant: &HashSet<T>, k: usize) -> f64 {
    retrieved
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, doc)| relevant.contains(*doc))
        .map(|(i, _)| 1.0 / ((i + 2) as f64).log2())
        .sum()
}

/// DCG of a ranking with every relevant document first.
pub fn ideal_dcg_at_k(relevant_count: usize, k: usize) -> f64 {
    (0..relevant_count.min(k))
        .map(|i| 1.0 / ((i + 2) as f64).log2())
        .sum()
}

pub fn ndcg_at_k<T: Eq + Hash>(retrieved: &[T], relevant: &HashSet<T>, k: usize) -> f64 {
    let ideal = ideal_dcg_at_k(relevant.len(), k);
    if ideal == 0.0 {
        return 0.0;
    }
    dcg_at_k(retrieved, relevant, k) / ideal
}

/// `|relevant ∩ top-k| / |relevant|`.
pub fn recall_at_k<T: Eq + Hash>(retrieved: &[T], relevant: &HashSet<T>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let hits = retrieved
        .iter()
        .take(k)
        .filter(|doc| relevant.contains(*doc))
        .count();
    hits as f64 / relevant.len() as f64
}

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
