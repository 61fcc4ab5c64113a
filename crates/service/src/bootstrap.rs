//! Wiring from configuration to a ready [`Retriever`].
//!
//! Index construction is not safe to run concurrently against the same
//! directory; callers run one build at a time.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use core_types::config::AppConfig;
use core_types::{DocumentRecord, Language, RawDocument};
use dataset::{DatasetSource, JsonlDataset, load_corpus};
use embedder::{EmbedError, EmbeddingProvider};
use retrieval::Retriever;
use semantic_index::{IndexOptions, VectorStore, default_engine};

/// Documents handed to the provider per call during a build.
pub const ENCODE_CHUNK: usize = 256;

/// Inputs of a corpus build, resolved from config plus any CLI overrides.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub languages: Vec<Language>,
    pub sample_size: Option<usize>,
    pub seed: u64,
    pub index: IndexOptions,
    pub force: bool,
}

impl BuildOptions {
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Ok(Self {
            languages: AppConfig::parse_languages(&cfg.index.languages)?,
            sample_size: cfg.index.corpus_sample_size,
            seed: cfg.index.sample_seed,
            index: index_options(cfg)?,
            force: false,
        })
    }
}

#[derive(Debug)]
pub enum BuildOutcome {
    Built(VectorStore),
    /// An index was already present and `force` was off.
    AlreadyPresent,
}

pub fn index_options(cfg: &AppConfig) -> Result<IndexOptions> {
    let backend = cfg.index.backend_kind()?;
    Ok(IndexOptions::new(backend, cfg.index.use_gpu).with_gpu_device(cfg.index.gpu_device))
}

pub fn dataset_source(cfg: &AppConfig) -> JsonlDataset {
    JsonlDataset::new(cfg.dataset_dir())
}

/// Load, encode, index and persist a corpus.
pub fn build_index(
    embedder: &dyn EmbeddingProvider,
    source: &dyn DatasetSource,
    index_dir: &Path,
    options: &BuildOptions,
    progress: &dyn Fn(usize),
) -> Result<BuildOutcome> {
    if VectorStore::exists(index_dir) && !options.force {
        tracing::info!(dir = %index_dir.display(), "index already present; skipping build");
        return Ok(BuildOutcome::AlreadyPresent);
    }

    let docs = load_corpus(source, &options.languages, options.sample_size, options.seed)
        .context("load corpus")?;
    let records = encode_corpus(embedder, docs, progress)?;
    let store = VectorStore::build_with(records, &options.index, default_engine())
        .context("build vector store")?
        .with_model(embedder.model_id());
    store
        .save(index_dir)
        .with_context(|| format!("save index to {}", index_dir.display()))?;
    Ok(BuildOutcome::Built(store))
}

/// Encode documents in chunks; blank documents are dropped with a warning.
pub fn encode_corpus(
    embedder: &dyn EmbeddingProvider,
    docs: Vec<RawDocument>,
    progress: &dyn Fn(usize),
) -> Result<Vec<DocumentRecord>> {
    let total = docs.len();
    let docs: Vec<RawDocument> = docs.into_iter().filter(|d| !d.text.trim().is_empty()).collect();
    if docs.len() < total {
        tracing::warn!(dropped = total - docs.len(), "skipping documents with empty text");
    }

    let started = Instant::now();
    let mut records = Vec::with_capacity(docs.len());
    for chunk in docs.chunks(ENCODE_CHUNK) {
        let (kept, vectors) = encode_chunk(embedder, chunk.iter().collect())?;
        records.extend(kept.into_iter().zip(vectors).map(|(doc, vector)| {
            DocumentRecord::new(doc.doc_id.clone(), doc.language, doc.text.clone(), vector)
        }));
        progress(chunk.len());
    }
    tracing::info!(
        documents = records.len(),
        model = embedder.model_id(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "encoded corpus"
    );
    Ok(records)
}

/// Encode one chunk, dropping documents the provider finds nothing to embed in.
fn encode_chunk<'a>(
    embedder: &dyn EmbeddingProvider,
    mut chunk: Vec<&'a RawDocument>,
) -> Result<(Vec<&'a RawDocument>, Vec<Vec<f32>>)> {
    loop {
        if chunk.is_empty() {
            return Ok((chunk, Vec::new()));
        }
        let texts: Vec<&str> = chunk.iter().map(|d| d.text.as_str()).collect();
        match embedder.encode_batch(&texts) {
            Ok(vectors) => return Ok((chunk, vectors)),
            Err(EmbedError::NoFeatures { index } | EmbedError::EmptyInput { index })
                if index < chunk.len() =>
            {
                let dropped = chunk.remove(index);
                tracing::warn!(
                    doc_id = %dropped.doc_id,
                    "skipping document with no embeddable text"
                );
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("encode documents with `{}`", embedder.model_id()));
            }
        }
    }
}

pub fn open_store(cfg: &AppConfig, options: &IndexOptions) -> Result<VectorStore> {
    let dir = cfg.index_dir();
    VectorStore::load_with(&dir, options, default_engine()).with_context(|| {
        format!(
            "load index from {}; run `polyseek build` first",
            dir.display()
        )
    })
}

/// Provider plus loaded store, checked against each other.
///
/// The HTTP provider owns a blocking client; call this outside any async
/// runtime.
pub fn open_retriever(cfg: &AppConfig, options: &IndexOptions) -> Result<Arc<Retriever>> {
    let embedder = embedder::from_config(&cfg.embedder).context("construct embedding provider")?;
    let store = open_store(cfg, options)?;
    for notice in store.notices() {
        tracing::debug!(%notice, "store notice");
    }
    let retriever = Retriever::new(embedder, Arc::new(store)).context("attach retriever")?;
    Ok(Arc::new(retriever))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::BackendKind;
    use dataset::InMemoryDataset;
    use embedder::HashingEmbedder;
    use std::cell::Cell;

    fn source() -> InMemoryDataset {
        InMemoryDataset::new()
            .with_document(Language::Hindi, "1#0", "delhi capital india")
            .with_document(Language::Hindi, "2#0", "   ")
            .with_document(Language::Hindi, "3#0", "?!...")
            .with_document(Language::Bengali, "1#0", "kolkata city")
    }

    fn options() -> BuildOptions {
        BuildOptions {
            languages: vec![Language::Hindi, Language::Bengali],
            sample_size: None,
            seed: 7,
            index: IndexOptions::new(BackendKind::Exact, false),
            force: false,
        }
    }

    #[test]
    fn build_skips_blank_documents_and_persists() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let embedder = HashingEmbedder::new(64)?;
        let seen = Cell::new(0);
        let outcome = build_index(&embedder, &source(), dir.path(), &options(), &|n| {
            seen.set(seen.get() + n);
        })?;

        let BuildOutcome::Built(store) = outcome else {
            panic!("expected a fresh build");
        };
        assert_eq!(store.len(), 2);
        assert!(!store.contains(&"hi:3#0".into()));
        assert_eq!(seen.get(), 3);
        assert_eq!(store.model(), Some("hashing-64"));
        assert!(VectorStore::exists(dir.path()));
        Ok(())
    }

    #[test]
    fn existing_index_needs_force() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let embedder = HashingEmbedder::new(64)?;
        build_index(&embedder, &source(), dir.path(), &options(), &|_| {})?;

        let again = build_index(&embedder, &source(), dir.path(), &options(), &|_| {})?;
        assert!(matches!(again, BuildOutcome::AlreadyPresent));

        let forced = BuildOptions {
            force: true,
            ..options()
        };
        let rebuilt = build_index(&embedder, &source(), dir.path(), &forced, &|_| {})?;
        assert!(matches!(rebuilt, BuildOutcome::Built(_)));
        Ok(())
    }

    #[test]
    fn missing_index_names_the_build_command() {
        let mut cfg = AppConfig::default();
        cfg.paths.index_dir = "/nonexistent/polyseek-index".into();
        let err = open_store(&cfg, &IndexOptions::default()).expect_err("no index");
        assert!(format!("{err:#}").contains("polyseek build"));
    }

    #[test]
    fn options_follow_config() -> Result<()> {
        let mut cfg = AppConfig::default();
        cfg.index.backend = "accelerated".into();
        cfg.index.gpu_device = 1;
        let opts = BuildOptions::from_config(&cfg)?;
        assert_eq!(opts.index.backend, BackendKind::Accelerated);
        assert_eq!(opts.index.gpu_device, 1);
        assert_eq!(opts.languages.len(), 3);
        Ok(())
    }
}
