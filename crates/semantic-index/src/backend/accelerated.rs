use std::path::Path;
use std::sync::Arc;

use core_types::BackendKind;

use super::SimilarityBackend;
use crate::engine::{FlatEngine, FlatIndex, Placement};
use crate::error::IndexError;
use crate::topk::ScoredRow;

/// Adapter from an engine-owned [`FlatIndex`] to the backend interface.
pub struct AcceleratedBackend {
    engine: Arc<dyn FlatEngine>,
    index: Box<dyn FlatIndex>,
}

impl AcceleratedBackend {
    pub fn new(engine: Arc<dyn FlatEngine>, index: Box<dyn FlatIndex>) -> Self {
        Self { engine, index }
    }
}

impl SimilarityBackend for AcceleratedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Accelerated
    }

    fn placement(&self) -> Placement {
        self.index.placement()
    }

    fn engine_name(&self) -> Option<&'static str> {
        Some(self.engine.name())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredRow>, IndexError> {
        Ok(self.index.search(query, top_k.min(self.index.len()))?)
    }

    fn write_native(&self, path: &Path) -> Result<bool, IndexError> {
        self.index.write_native(path)?;
        Ok(true)
    }
}
