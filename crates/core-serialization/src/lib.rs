//! Common serialization helpers shared across the workspace.
//!
//! The embedding artifact is the authoritative copy of an index: the
//! row-major embedding matrix and the per-row document metadata, in the
//! same order. Everything else on disk is derived from it.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use core_types::{BackendKind, DocumentMeta};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EMBEDDINGS_FILE: &str = "embeddings.bin";
pub const DESCRIPTOR_FILE: &str = "index.json";
pub const NATIVE_INDEX_FILE: &str = "flat_index.safetensors";

/// Bumped whenever the descriptor or artifact layout changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

const ARTIFACT_MAGIC: &[u8; 5] = b"PSEMB";
const ARTIFACT_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not an embedding artifact (bad magic)")]
    BadMagic,
    #[error("unsupported artifact version {0}")]
    UnsupportedVersion(u8),
    #[error("decompression failed: {0}")]
    Decompress(String),
    #[error("artifact is inconsistent: {0}")]
    Inconsistent(String),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SerializationError + '_ {
    move |source| SerializationError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Embedding matrix plus parallel metadata, row `i` ↔ `documents[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingArtifact {
    pub dimension: usize,
    /// Row-major `documents.len() × dimension`.
    pub vectors: Vec<f32>,
    pub documents: Vec<DocumentMeta>,
}

impl EmbeddingArtifact {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn check(&self) -> Result<(), SerializationError> {
        if self.dimension == 0 {
            return Err(SerializationError::Inconsistent("zero dimension".into()));
        }
        let expected = self.documents.len() * self.dimension;
        if self.vectors.len() != expected {
            return Err(SerializationError::Inconsistent(format!(
                "{} floats for {} rows of dimension {}",
                self.vectors.len(),
                self.documents.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    /// `magic | version | lz4(bincode(self))`.
    pub fn encode(&self) -> Result<Vec<u8>, SerializationError> {
        self.check()?;
        let payload = bincode::serialize(self)?;
        let compressed = lz4_flex::compress_prepend_size(&payload);
        let mut out = Vec::with_capacity(ARTIFACT_MAGIC.len() + 1 + compressed.len());
        out.extend_from_slice(ARTIFACT_MAGIC);
        out.push(ARTIFACT_VERSION);
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
        let header = ARTIFACT_MAGIC.len() + 1;
        if bytes.len() < header || &bytes[..ARTIFACT_MAGIC.len()] != ARTIFACT_MAGIC {
            return Err(SerializationError::BadMagic);
        }
        let version = bytes[ARTIFACT_MAGIC.len()];
        if version != ARTIFACT_VERSION {
            return Err(SerializationError::UnsupportedVersion(version));
        }
        let payload = lz4_flex::decompress_size_prepended(&bytes[header..])
            .map_err(|e| SerializationError::Decompress(e.to_string()))?;
        let artifact: Self = bincode::deserialize(&payload)?;
        artifact.check()?;
        Ok(artifact)
    }
}

/// Small JSON record describing what was saved and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub schema_version: u32,
    pub backend: BackendKind,
    pub dimension: usize,
    pub document_count: usize,
    pub gpu_enabled: bool,
    /// Engine that produced the native artifact, when one was written.
    pub engine: Option<String>,
    /// Embedding model the vectors came from, for operator sanity checks.
    pub model: Option<String>,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

/// `<dir>/<name>.tmp` sibling used for temp-then-rename writes.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` to a temp sibling, fsync, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SerializationError> {
    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp).map_err(io_err(&tmp))?;
        file.write_all(bytes).map_err(io_err(&tmp))?;
        file.sync_all().map_err(io_err(&tmp))?;
    }
    fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

pub fn write_artifact(path: &Path, artifact: &EmbeddingArtifact) -> Result<(), SerializationError> {
    let bytes = artifact.encode()?;
    write_atomic(path, &bytes)?;
    tracing::debug!(
        path = %path.display(),
        rows = artifact.len(),
        bytes = bytes.len(),
        "wrote embedding artifact"
    );
    Ok(())
}

pub fn read_artifact(path: &Path) -> Result<EmbeddingArtifact, SerializationError> {
    let bytes = fs::read(path).map_err(io_err(path))?;
    EmbeddingArtifact::decode(&bytes)
}

pub fn write_descriptor(
    path: &Path,
    descriptor: &IndexDescriptor,
) -> Result<(), SerializationError> {
    let json = serde_json::to_vec_pretty(descriptor)?;
    write_atomic(path, &json)
}

pub fn read_descriptor(path: &Path) -> Result<IndexDescriptor, SerializationError> {
    let bytes = fs::read(path).map_err(io_err(path))?;
    Ok(serde_json::from_slice(&bytes)?)
}
