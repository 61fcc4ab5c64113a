//! Bounded top-k selection shared by every backend.
//!
//! Ordering is score descending, then row ascending, so equal scores always
//! resolve toward the document that was indexed first.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

/// A row index into the document table with its inner-product score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub row: usize,
    pub score: f32,
}

impl ScoredRow {
    pub fn new(row: usize, score: f32) -> Self {
        Self { row, score }
    }
}

// NaN sorts below every real score.
#[inline]
fn sort_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Result order: `Less` when `a` ranks ahead of `b`.
pub fn rank_order(a: &ScoredRow, b: &ScoredRow) -> Ordering {
    sort_key(b.score)
        .total_cmp(&sort_key(a.score))
        .then_with(|| a.row.cmp(&b.row))
}

/// Heap wrapper where "greater" means "ranks ahead".
#[derive(Debug, Clone, Copy)]
struct Ranked(ScoredRow);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_order(&other.0, &self.0)
    }
}

/// Keeps the best `k` rows seen so far in a min-heap of size `k`.
#[derive(Debug)]
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.min(4096) + 1),
        }
    }

    pub fn push(&mut self, row: usize, score: f32) {
        if self.k == 0 {
            return;
        }
        let candidate = Ranked(ScoredRow::new(row, score));
        if self.heap.len() < self.k {
            self.heap.push(Reverse(candidate));
            return;
        }
        let Some(Reverse(worst)) = self.heap.peek() else {
            return;
        };
        if candidate > *worst {
            self.heap.pop();
            self.heap.push(Reverse(candidate));
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into result order.
    pub fn into_sorted_vec(self) -> Vec<ScoredRow> {
        let mut rows: Vec<ScoredRow> = self.heap.into_iter().map(|Reverse(r)| r.0).collect();
        rows.sort_unstable_by(rank_order);
        rows
    }
}

/// Top `k` of a dense score vector where `scores[i]` belongs to row `i`.
pub fn select_top_k(scores: &[f32], k: usize) -> Vec<ScoredRow> {
    let mut top = TopK::new(k.min(scores.len()));
    for (row, &score) in scores.iter().enumerate() {
        top.push(row, score);
    }
    top.into_sorted_vec()
}
