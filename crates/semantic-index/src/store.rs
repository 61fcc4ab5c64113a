//! The vector store: document table plus the active similarity backend.
//!
//! On disk an index directory holds the embedding artifact (authoritative),
//! an optional engine-native artifact (accelerated only), and a JSON
//! descriptor written last. Loading rebuilds whatever derived state is
//! missing, stale, or unusable from the embedding artifact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use core_serialization::{
    DESCRIPTOR_FILE, EMBEDDINGS_FILE, IndexDescriptor, NATIVE_INDEX_FILE, SCHEMA_VERSION,
    read_artifact, read_descriptor, temp_path, write_artifact, write_descriptor,
};
use core_types::{BackendKind, DocId, DocumentMeta, DocumentRecord, Language};
use serde::Serialize;

use crate::backend::{AcceleratedBackend, ExactBackend, SimilarityBackend};
use crate::engine::{FlatEngine, FlatIndex, Placement, default_engine};
use crate::error::IndexError;
use crate::notice::{BackendNotice, Notices};
use crate::placement::{IndexOptions, plan, with_cpu_fallback};
use crate::table::DocumentTable;
use crate::topk::ScoredRow;

pub struct VectorStore {
    table: Arc<DocumentTable>,
    backend: Box<dyn SimilarityBackend>,
    requested: IndexOptions,
    notices: Vec<BackendNotice>,
    model: Option<String>,
}

/// Snapshot of a store for status endpoints and `info` output.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub backend: BackendKind,
    pub requested_backend: BackendKind,
    pub engine: Option<String>,
    pub placement: Placement,
    pub gpu_requested: bool,
    pub document_count: usize,
    pub dimension: usize,
    pub model: Option<String>,
    pub languages: BTreeMap<Language, usize>,
    pub notices: Vec<BackendNotice>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("documents", &self.table.len())
            .field("dimension", &self.table.dimension())
            .field("backend", &self.backend.kind())
            .field("placement", &self.backend.placement())
            .field("notices", &self.notices)
            .finish()
    }
}

impl VectorStore {
    /// Build with the engine compiled into this binary.
    pub fn build(
        records: Vec<DocumentRecord>,
        backend: BackendKind,
        use_gpu: bool,
    ) -> Result<Self, IndexError> {
        Self::build_with(records, &IndexOptions::new(backend, use_gpu), default_engine())
    }

    pub fn build_with(
        records: Vec<DocumentRecord>,
        options: &IndexOptions,
        engine: Option<Arc<dyn FlatEngine>>,
    ) -> Result<Self, IndexError> {
        let table = Arc::new(DocumentTable::from_records(records)?);
        let mut notices = Notices::default();
        if table.non_unit_rows() > 0 {
            notices.record(BackendNotice::NonUnitEmbeddings {
                rows: table.non_unit_rows(),
            });
        }
        let backend = match accelerator(options, engine, &mut notices) {
            Some(engine) => fresh_accelerated(&table, engine, options, &mut notices)?,
            None => exact(&table),
        };
        let store = Self::assemble(table, backend, *options, notices);
        tracing::info!(
            documents = store.len(),
            dimension = store.dimension(),
            backend = %store.backend(),
            placement = %store.placement(),
            "built vector store"
        );
        Ok(store)
    }

    fn assemble(
        table: Arc<DocumentTable>,
        backend: Box<dyn SimilarityBackend>,
        requested: IndexOptions,
        notices: Notices,
    ) -> Self {
        Self {
            table,
            backend,
            requested,
            notices: notices.into_vec(),
            model: None,
        }
    }

    /// Tag the store with the embedding model its vectors came from.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Whether `dir` looks like a saved index.
    pub fn exists(dir: &Path) -> bool {
        dir.join(EMBEDDINGS_FILE).is_file()
    }

    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(dir).map_err(IndexError::io(dir))?;
        write_artifact(&dir.join(EMBEDDINGS_FILE), &self.table.to_artifact())?;

        let native = dir.join(NATIVE_INDEX_FILE);
        let staged = temp_path(&native);
        let wrote_native = self
            .backend
            .write_native(&staged)
            .and_then(|wrote| {
                if wrote {
                    fs::rename(&staged, &native).map_err(IndexError::io(&native))?;
                }
                Ok(wrote)
            })
            .inspect_err(|_| {
                // Never leave a partial artifact next to the real one.
                let _ = fs::remove_file(&staged);
            })?;
        if !wrote_native && native.exists() {
            // A previous accelerated save would otherwise shadow this one.
            fs::remove_file(&native).map_err(IndexError::io(&native))?;
        }

        let descriptor = IndexDescriptor {
            schema_version: SCHEMA_VERSION,
            backend: self.backend(),
            dimension: self.dimension(),
            document_count: self.len(),
            gpu_enabled: self.gpu_enabled(),
            engine: wrote_native
                .then(|| self.backend.engine_name().map(str::to_string))
                .flatten(),
            model: self.model.clone(),
            created_at: unix_now(),
        };
        write_descriptor(&dir.join(DESCRIPTOR_FILE), &descriptor)?;
        tracing::info!(
            dir = %dir.display(),
            documents = self.len(),
            backend = %self.backend(),
            native = wrote_native,
            "saved vector store"
        );
        Ok(())
    }

    pub fn load(dir: &Path, backend: BackendKind, use_gpu: bool) -> Result<Self, IndexError> {
        Self::load_with(dir, &IndexOptions::new(backend, use_gpu), default_engine())
    }

    pub fn load_with(
        dir: &Path,
        options: &IndexOptions,
        engine: Option<Arc<dyn FlatEngine>>,
    ) -> Result<Self, IndexError> {
        if !dir.is_dir() {
            return Err(IndexError::IndexNotFound {
                path: dir.to_path_buf(),
            });
        }
        let embeddings = dir.join(EMBEDDINGS_FILE);
        if !embeddings.is_file() {
            return Err(IndexError::IndexNotFound { path: embeddings });
        }
        let artifact = read_artifact(&embeddings).map_err(|e| corrupt(&embeddings, e))?;

        let mut notices = Notices::default();
        let native = dir.join(NATIVE_INDEX_FILE);
        let descriptor_path = dir.join(DESCRIPTOR_FILE);
        let descriptor = if descriptor_path.is_file() {
            let descriptor =
                read_descriptor(&descriptor_path).map_err(|e| corrupt(&descriptor_path, e))?;
            check_descriptor(&descriptor, artifact.len(), artifact.dimension)
                .map_err(|reason| corrupt(&descriptor_path, reason))?;
            Some(descriptor)
        } else {
            notices.record(BackendNotice::DescriptorMissing);
            None
        };
        let table =
            Arc::new(DocumentTable::from_artifact(artifact).map_err(|e| corrupt(&embeddings, e))?);

        let stored = match &descriptor {
            Some(d) => d.backend,
            None if native.is_file() => BackendKind::Accelerated,
            None => BackendKind::Exact,
        };
        if stored != options.backend {
            notices.record(BackendNotice::BackendSwitched {
                stored,
                requested: options.backend,
            });
        }

        let backend = match accelerator(options, engine, &mut notices) {
            None => exact(&table),
            Some(engine) => {
                let mut placement = plan(engine.as_ref(), options, &mut notices);
                let restored = if stored == BackendKind::Accelerated {
                    let written_by = descriptor.as_ref().and_then(|d| d.engine.as_deref());
                    restore_native(
                        engine.as_ref(),
                        &native,
                        written_by,
                        &table,
                        &mut placement,
                        &mut notices,
                    )
                } else {
                    None
                };
                let index = match restored {
                    Some(index) => index,
                    None => with_cpu_fallback(&mut placement, &mut notices, |p| {
                        engine.build(table.vectors(), table.dimension(), p)
                    })?,
                };
                Box::new(AcceleratedBackend::new(engine, index)) as Box<dyn SimilarityBackend>
            }
        };

        let mut store = Self::assemble(table, backend, *options, notices);
        store.model = descriptor.and_then(|d| d.model);
        tracing::info!(
            dir = %dir.display(),
            documents = store.len(),
            backend = %store.backend(),
            placement = %store.placement(),
            notices = store.notices.len(),
            "loaded vector store"
        );
        Ok(store)
    }

    /// Top-k rows by inner product, score descending, ties on the lower row.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredRow>, IndexError> {
        if top_k == 0 {
            return Err(IndexError::Configuration("top_k must be greater than zero".into()));
        }
        if query.len() != self.dimension() {
            return Err(IndexError::QueryDimension {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        self.backend.search(query, top_k)
    }

    /// Effective backend after any fallback.
    pub fn backend(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn requested_backend(&self) -> BackendKind {
        self.requested.backend
    }

    pub fn placement(&self) -> Placement {
        self.backend.placement()
    }

    /// True only when the resident index actually lives on a GPU.
    pub fn gpu_enabled(&self) -> bool {
        self.placement().is_gpu()
    }

    pub fn gpu_requested(&self) -> bool {
        self.requested.use_gpu
    }

    pub fn engine_name(&self) -> Option<&'static str> {
        self.backend.engine_name()
    }

    pub fn notices(&self) -> &[BackendNotice] {
        &self.notices
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.table.dimension()
    }

    pub fn document(&self, row: usize) -> Option<&DocumentMeta> {
        self.table.document(row)
    }

    pub fn documents(&self) -> &[DocumentMeta] {
        self.table.documents()
    }

    pub fn embedding(&self, row: usize) -> Option<&[f32]> {
        self.table.row(row)
    }

    pub fn position(&self, doc_id: &DocId) -> Option<usize> {
        self.table.position(doc_id)
    }

    pub fn contains(&self, doc_id: &DocId) -> bool {
        self.position(doc_id).is_some()
    }

    pub fn status(&self) -> StoreStatus {
        let mut languages = BTreeMap::new();
        for doc in self.table.documents() {
            *languages.entry(doc.language).or_insert(0) += 1;
        }
        StoreStatus {
            backend: self.backend(),
            requested_backend: self.requested_backend(),
            engine: self.engine_name().map(str::to_string),
            placement: self.placement(),
            gpu_requested: self.gpu_requested(),
            document_count: self.len(),
            dimension: self.dimension(),
            model: self.model.clone(),
            languages,
            notices: self.notices.clone(),
        }
    }
}

/// The engine to use, or `None` for the exact backend.
fn accelerator(
    options: &IndexOptions,
    engine: Option<Arc<dyn FlatEngine>>,
    notices: &mut Notices,
) -> Option<Arc<dyn FlatEngine>> {
    match (options.backend, engine) {
        (BackendKind::Exact, _) => {
            if options.use_gpu {
                tracing::debug!("gpu placement ignored by the exact backend");
            }
            None
        }
        (BackendKind::Accelerated, None) => {
            notices.record(BackendNotice::AcceleratorUnavailable);
            None
        }
        (BackendKind::Accelerated, Some(engine)) => Some(engine),
    }
}

fn exact(table: &Arc<DocumentTable>) -> Box<dyn SimilarityBackend> {
    Box::new(ExactBackend::new(Arc::clone(table)))
}

fn fresh_accelerated(
    table: &Arc<DocumentTable>,
    engine: Arc<dyn FlatEngine>,
    options: &IndexOptions,
    notices: &mut Notices,
) -> Result<Box<dyn SimilarityBackend>, IndexError> {
    let mut placement = plan(engine.as_ref(), options, notices);
    let index = with_cpu_fallback(&mut placement, notices, |p| {
        engine.build(table.vectors(), table.dimension(), p)
    })?;
    Ok(Box::new(AcceleratedBackend::new(engine, index)))
}

/// Native artifact if it exists and matches the embeddings; `None` means rebuild.
fn restore_native(
    engine: &dyn FlatEngine,
    path: &Path,
    written_by: Option<&str>,
    table: &DocumentTable,
    placement: &mut Placement,
    notices: &mut Notices,
) -> Option<Box<dyn FlatIndex>> {
    if let Err(err) = locate_native(path) {
        tracing::debug!(error = %err, "native artifact lookup");
        notices.record(BackendNotice::NativeArtifactMissing {
            path: path.display().to_string(),
        });
        return None;
    }
    if let Some(name) = written_by.filter(|name| *name != engine.name()) {
        notices.record(BackendNotice::NativeArtifactRejected {
            reason: format!("written by engine `{name}`, loading with `{}`", engine.name()),
        });
        return None;
    }
    match with_cpu_fallback(placement, notices, |p| engine.read_native(path, p)) {
        Ok(index) if index.len() == table.len() && index.dimension() == table.dimension() => {
            Some(index)
        }
        Ok(index) => {
            notices.record(BackendNotice::NativeArtifactRejected {
                reason: format!(
                    "native index is {}x{}, embeddings are {}x{}",
                    index.len(),
                    index.dimension(),
                    table.len(),
                    table.dimension()
                ),
            });
            None
        }
        Err(err) => {
            notices.record(BackendNotice::NativeArtifactRejected {
                reason: err.to_string(),
            });
            None
        }
    }
}

fn locate_native(path: &Path) -> Result<&Path, IndexError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(IndexError::BackendArtifactMissing {
            path: path.to_path_buf(),
        })
    }
}

fn check_descriptor(
    descriptor: &IndexDescriptor,
    rows: usize,
    dimension: usize,
) -> Result<(), String> {
    if descriptor.schema_version != SCHEMA_VERSION {
        return Err(format!(
            "schema version {} (expected {SCHEMA_VERSION})",
            descriptor.schema_version
        ));
    }
    if descriptor.document_count != rows || descriptor.dimension != dimension {
        return Err(format!(
            "descriptor says {}x{}, embeddings are {rows}x{dimension}",
            descriptor.document_count, descriptor.dimension
        ));
    }
    Ok(())
}

fn corrupt(path: &Path, reason: impl ToString) -> IndexError {
    IndexError::Corrupt {
        path: PathBuf::from(path),
        reason: reason.to_string(),
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
