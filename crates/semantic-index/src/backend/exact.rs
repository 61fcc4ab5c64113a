use std::sync::Arc;

use core_types::BackendKind;
use core_types::vector::dot;

use super::SimilarityBackend;
use crate::error::IndexError;
use crate::table::DocumentTable;
use crate::topk::{ScoredRow, TopK};

/// Dense scan of the shared matrix. No state of its own.
#[derive(Debug, Clone)]
pub struct ExactBackend {
    table: Arc<DocumentTable>,
}

impl ExactBackend {
    pub fn new(table: Arc<DocumentTable>) -> Self {
        Self { table }
    }
}

impl SimilarityBackend for ExactBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Exact
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredRow>, IndexError> {
        let mut top = TopK::new(top_k.min(self.table.len()));
        for (row, vector) in self.table.rows().enumerate() {
            top.push(row, dot(query, vector));
        }
        Ok(top.into_sorted_vec())
    }
}
