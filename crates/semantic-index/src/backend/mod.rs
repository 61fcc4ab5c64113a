//! Similarity backends answering top-k inner-product queries over a
//! [`DocumentTable`](crate::DocumentTable).

use std::path::Path;

use core_types::BackendKind;

use crate::engine::Placement;
use crate::error::IndexError;
use crate::topk::ScoredRow;

mod accelerated;
mod exact;

pub use accelerated::AcceleratedBackend;
pub use exact::ExactBackend;

pub trait SimilarityBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn placement(&self) -> Placement {
        Placement::Cpu
    }

    /// Engine behind the backend, when it is not the built-in scan.
    fn engine_name(&self) -> Option<&'static str> {
        None
    }

    /// `query` has already been checked against the table dimension.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredRow>, IndexError>;

    /// Persist backend-specific state. Returns `false` when there is none.
    fn write_native(&self, _path: &Path) -> Result<bool, IndexError> {
        Ok(false)
    }
}
