//! Row-aligned embedding matrix and document metadata.
//!
//! Both halves are built by the same constructor and never mutated after,
//! so row `i` of the matrix always describes `documents[i]`.

use std::collections::HashMap;

use core_serialization::EmbeddingArtifact;
use core_types::vector::is_unit;
use core_types::{DocId, DocumentMeta, DocumentRecord};

use crate::error::IndexError;

#[derive(Debug, Clone)]
pub struct DocumentTable {
    dimension: usize,
    vectors: Vec<f32>,
    documents: Vec<DocumentMeta>,
    positions: HashMap<DocId, usize>,
    non_unit_rows: usize,
}

impl DocumentTable {
    /// Validate and pack records. Dimension is taken from the first row.
    pub fn from_records(records: Vec<DocumentRecord>) -> Result<Self, IndexError> {
        let Some(first) = records.first() else {
            return Err(IndexError::EmptyCorpus);
        };
        let dimension = first.embedding.len();
        if dimension == 0 {
            return Err(IndexError::DimensionMismatch {
                row: 0,
                expected: 1,
                actual: 0,
            });
        }

        let mut vectors = Vec::with_capacity(records.len() * dimension);
        let mut documents = Vec::with_capacity(records.len());
        for (row, record) in records.into_iter().enumerate() {
            if record.embedding.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    row,
                    expected: dimension,
                    actual: record.embedding.len(),
                });
            }
            vectors.extend_from_slice(&record.embedding);
            documents.push(record.meta);
        }
        Self::assemble(dimension, vectors, documents)
    }

    pub fn from_artifact(artifact: EmbeddingArtifact) -> Result<Self, IndexError> {
        if artifact.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }
        Self::assemble(artifact.dimension, artifact.vectors, artifact.documents)
    }

    fn assemble(
        dimension: usize,
        vectors: Vec<f32>,
        documents: Vec<DocumentMeta>,
    ) -> Result<Self, IndexError> {
        let mut positions = HashMap::with_capacity(documents.len());
        for (row, doc) in documents.iter().enumerate() {
            if positions.insert(doc.doc_id.clone(), row).is_some() {
                return Err(IndexError::DuplicateDocId(doc.doc_id.clone()));
            }
        }
        let non_unit_rows = vectors
            .chunks_exact(dimension)
            .filter(|row| !is_unit(row))
            .count();
        Ok(Self {
            dimension,
            vectors,
            documents,
            positions,
            non_unit_rows,
        })
    }

    pub fn to_artifact(&self) -> EmbeddingArtifact {
        EmbeddingArtifact {
            dimension: self.dimension,
            vectors: self.vectors.clone(),
            documents: self.documents.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Row-major `len × dimension` view.
    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.vectors.chunks_exact(self.dimension)
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    pub fn document(&self, row: usize) -> Option<&DocumentMeta> {
        self.documents.get(row)
    }

    pub fn documents(&self) -> &[DocumentMeta] {
        &self.documents
    }

    pub fn position(&self, doc_id: &DocId) -> Option<usize> {
        self.positions.get(doc_id).copied()
    }

    /// Rows whose norm is outside the unit tolerance.
    pub fn non_unit_rows(&self) -> usize {
        self.non_unit_rows
    }
}
