//! Pluggable flat inner-product engines backing the accelerated backend.
//!
//! An engine turns the embedding matrix into its own resident index (CPU or
//! GPU) and can persist/restore that index in its native format. The store
//! only talks to engines through these traits, so tests can inject engines
//! with arbitrary device behaviour.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topk::ScoredRow;

#[cfg(feature = "accelerated")]
pub mod candle;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no accelerator device available")]
    NoDevice,
    #[error("device error: {0}")]
    Device(String),
    #[error("shape error: {0}")]
    Shape(String),
    #[error("engine failure: {0}")]
    Backend(String),
}

/// Where an engine keeps its resident copy of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "device", rename_all = "lowercase")]
pub enum Placement {
    #[default]
    Cpu,
    Gpu {
        ordinal: usize,
    },
}

impl Placement {
    pub fn is_gpu(self) -> bool {
        matches!(self, Placement::Gpu { .. })
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Cpu => f.write_str("cpu"),
            Placement::Gpu { ordinal } => write!(f, "gpu:{ordinal}"),
        }
    }
}

pub trait FlatEngine: Send + Sync + fmt::Debug {
    /// Stable name, recorded in the index descriptor next to the native artifact.
    fn name(&self) -> &'static str;

    /// Usable accelerator devices. Zero means CPU only.
    fn device_count(&self) -> usize;

    /// Build a resident index over a row-major `rows × dimension` matrix.
    fn build(
        &self,
        vectors: &[f32],
        dimension: usize,
        placement: Placement,
    ) -> Result<Box<dyn FlatIndex>, EngineError>;

    /// Restore an index previously written by [`FlatIndex::write_native`].
    fn read_native(&self, path: &Path, placement: Placement)
    -> Result<Box<dyn FlatIndex>, EngineError>;
}

pub trait FlatIndex: Send + Sync {
    fn placement(&self) -> Placement;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;

    /// Inner-product top-k, score descending with ties on the lower row.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredRow>, EngineError>;

    fn write_native(&self, path: &Path) -> Result<(), EngineError>;
}

/// The engine compiled into this build, if any.
pub fn default_engine() -> Option<Arc<dyn FlatEngine>> {
    #[cfg(feature = "accelerated")]
    {
        Some(Arc::new(candle::CandleEngine::new()))
    }
    #[cfg(not(feature = "accelerated"))]
    {
        None
    }
}
