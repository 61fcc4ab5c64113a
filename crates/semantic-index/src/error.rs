use std::path::PathBuf;

use core_serialization::SerializationError;
use core_types::DocId;
use thiserror::Error;

use crate::engine::EngineError;

/// Failures that abort a build, load, save, or search.
///
/// Conditions that only degrade the backend (missing accelerator, missing GPU,
/// missing native artifact) are recorded as [`crate::BackendNotice`]s instead.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("embedding dimension mismatch at row {row}: expected {expected}, got {actual}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("query has dimension {actual}, index has dimension {expected}")]
    QueryDimension { expected: usize, actual: usize },
    #[error("cannot build an index over zero documents")]
    EmptyCorpus,
    #[error("duplicate document id `{0}`")]
    DuplicateDocId(DocId),
    #[error("no index found at {path}")]
    IndexNotFound { path: PathBuf },
    #[error("accelerated backend artifact missing at {path}")]
    BackendArtifactMissing { path: PathBuf },
    #[error("gpu unavailable: {0}")]
    GpuUnavailable(String),
    #[error("index at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| IndexError::Io { path, source }
    }
}
