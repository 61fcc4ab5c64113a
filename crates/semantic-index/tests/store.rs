mod common;

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use common::{ScanEngine, random_records, three_docs};
use core_serialization::{DESCRIPTOR_FILE, EMBEDDINGS_FILE, NATIVE_INDEX_FILE, read_descriptor};
use core_types::{BackendKind, DocId};
use semantic_index::{
    BackendNotice, FlatEngine, IndexError, IndexOptions, Placement, VectorStore,
};
use tempfile::tempdir;

fn accelerated(use_gpu: bool) -> IndexOptions {
    IndexOptions::new(BackendKind::Accelerated, use_gpu)
}

fn exact() -> IndexOptions {
    IndexOptions::new(BackendKind::Exact, false)
}

fn scan(engine: ScanEngine) -> Option<Arc<dyn FlatEngine>> {
    Some(Arc::new(engine))
}

fn ids(store: &VectorStore, query: &[f32], k: usize) -> Result<Vec<String>> {
    Ok(store
        .search(query, k)?
        .into_iter()
        .filter_map(|hit| store.document(hit.row))
        .map(|doc| doc.doc_id.to_string())
        .collect())
}

#[test]
fn top_k_larger_than_corpus_returns_every_document() -> Result<()> {
    let store = VectorStore::build_with(three_docs(), &exact(), None)?;
    let hits = store.search(&[0.6, 0.8], 5)?;
    assert_eq!(hits.len(), 3);
    assert_eq!(ids(&store, &[0.6, 0.8], 5)?, vec!["te:1", "bn:1", "hi:1"]);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    Ok(())
}

#[test]
fn invalid_queries_are_rejected() -> Result<()> {
    let store = VectorStore::build_with(three_docs(), &exact(), None)?;
    assert!(matches!(
        store.search(&[1.0, 0.0, 0.0], 3),
        Err(IndexError::QueryDimension {
            expected: 2,
            actual: 3
        })
    ));
    assert!(matches!(
        store.search(&[1.0, 0.0], 0),
        Err(IndexError::Configuration(_))
    ));
    Ok(())
}

#[test]
fn build_rejects_bad_input() {
    let mut ragged = three_docs();
    ragged[2].embedding.push(0.0);
    assert!(matches!(
        VectorStore::build_with(ragged, &exact(), None),
        Err(IndexError::DimensionMismatch { row: 2, .. })
    ));
    assert!(matches!(
        VectorStore::build_with(Vec::new(), &exact(), None),
        Err(IndexError::EmptyCorpus)
    ));
}

#[test]
fn metadata_lookups_follow_rows() -> Result<()> {
    let store = VectorStore::build_with(three_docs(), &exact(), None)?;
    let row = store.position(&DocId::new("bn:1")).expect("indexed");
    assert_eq!(store.document(row).map(|d| d.text.as_str()), Some("প্রথম"));
    assert_eq!(store.embedding(row), Some(&[0.0, 1.0][..]));
    assert!(!store.contains(&DocId::new("bn:2")));
    assert_eq!(store.status().languages.len(), 3);
    Ok(())
}

#[test]
fn exact_round_trips_through_disk() -> Result<()> {
    let dir = tempdir()?;
    let built = VectorStore::build_with(random_records(7, 64, 16), &exact(), None)?
        .with_model("test-model");
    built.save(dir.path())?;
    assert!(VectorStore::exists(dir.path()));
    assert!(!dir.path().join(NATIVE_INDEX_FILE).exists());

    let loaded = VectorStore::load_with(dir.path(), &exact(), None)?;
    assert_eq!(loaded.len(), 64);
    assert_eq!(loaded.model(), Some("test-model"));
    assert!(loaded.notices().is_empty());
    let query = built.embedding(5).expect("row").to_vec();
    assert_eq!(built.search(&query, 10)?, loaded.search(&query, 10)?);
    Ok(())
}

#[test]
fn accelerated_restores_native_artifact() -> Result<()> {
    let dir = tempdir()?;
    let built = VectorStore::build_with(
        random_records(11, 40, 8),
        &accelerated(false),
        scan(ScanEngine::cpu_only()),
    )?;
    built.save(dir.path())?;
    assert!(dir.path().join(NATIVE_INDEX_FILE).is_file());
    let descriptor = read_descriptor(&dir.path().join(DESCRIPTOR_FILE))?;
    assert_eq!(descriptor.backend, BackendKind::Accelerated);
    assert_eq!(descriptor.engine.as_deref(), Some("scan"));

    let loaded =
        VectorStore::load_with(dir.path(), &accelerated(false), scan(ScanEngine::cpu_only()))?;
    assert_eq!(loaded.backend(), BackendKind::Accelerated);
    assert!(loaded.notices().is_empty());
    let query = built.embedding(3).expect("row").to_vec();
    assert_eq!(built.search(&query, 5)?, loaded.search(&query, 5)?);
    Ok(())
}

#[test]
fn missing_native_artifact_is_rebuilt_from_embeddings() -> Result<()> {
    let dir = tempdir()?;
    let built = VectorStore::build_with(
        random_records(12, 30, 8),
        &accelerated(false),
        scan(ScanEngine::cpu_only()),
    )?;
    built.save(dir.path())?;
    fs::remove_file(dir.path().join(NATIVE_INDEX_FILE))?;

    let loaded =
        VectorStore::load_with(dir.path(), &accelerated(false), scan(ScanEngine::cpu_only()))?;
    assert_eq!(loaded.backend(), BackendKind::Accelerated);
    assert!(matches!(
        loaded.notices(),
        [BackendNotice::NativeArtifactMissing { .. }]
    ));
    let query = built.embedding(0).expect("row").to_vec();
    assert_eq!(built.search(&query, 5)?, loaded.search(&query, 5)?);
    Ok(())
}

#[test]
fn garbage_native_artifact_is_rejected_and_rebuilt() -> Result<()> {
    let dir = tempdir()?;
    VectorStore::build_with(
        random_records(13, 10, 4),
        &accelerated(false),
        scan(ScanEngine::cpu_only()),
    )?
    .save(dir.path())?;
    fs::write(dir.path().join(NATIVE_INDEX_FILE), b"junk")?;

    let loaded =
        VectorStore::load_with(dir.path(), &accelerated(false), scan(ScanEngine::cpu_only()))?;
    assert!(matches!(
        loaded.notices(),
        [BackendNotice::NativeArtifactRejected { .. }]
    ));
    assert_eq!(loaded.search(&[1.0, 0.0, 0.0, 0.0], 3)?.len(), 3);
    Ok(())
}

#[test]
fn accelerated_without_engine_falls_back_to_exact() -> Result<()> {
    let store = VectorStore::build_with(three_docs(), &accelerated(true), None)?;
    assert_eq!(store.backend(), BackendKind::Exact);
    assert_eq!(store.requested_backend(), BackendKind::Accelerated);
    assert!(!store.gpu_enabled());
    assert_eq!(store.notices(), &[BackendNotice::AcceleratorUnavailable]);
    assert_eq!(store.search(&[1.0, 0.0], 1)?[0].row, 0);
    Ok(())
}

#[test]
fn loading_accelerated_without_engine_falls_back_to_exact() -> Result<()> {
    let dir = tempdir()?;
    VectorStore::build_with(three_docs(), &accelerated(false), scan(ScanEngine::cpu_only()))?
        .save(dir.path())?;
    let loaded = VectorStore::load_with(dir.path(), &accelerated(false), None)?;
    assert_eq!(loaded.backend(), BackendKind::Exact);
    assert!(loaded.notices().contains(&BackendNotice::AcceleratorUnavailable));
    Ok(())
}

#[test]
fn gpu_request_without_devices_uses_cpu() -> Result<()> {
    let store =
        VectorStore::build_with(three_docs(), &accelerated(true), scan(ScanEngine::cpu_only()))?;
    assert_eq!(store.backend(), BackendKind::Accelerated);
    assert_eq!(store.placement(), Placement::Cpu);
    assert!(store.gpu_requested());
    assert!(!store.gpu_enabled());
    assert!(matches!(
        store.notices(),
        [BackendNotice::GpuUnavailable { .. }]
    ));
    Ok(())
}

#[test]
fn gpu_construction_failure_falls_back_to_cpu() -> Result<()> {
    let store = VectorStore::build_with(
        three_docs(),
        &accelerated(true),
        scan(ScanEngine::broken_gpu()),
    )?;
    assert_eq!(store.placement(), Placement::Cpu);
    assert!(matches!(
        store.notices(),
        [BackendNotice::GpuConstructionFailed { .. }]
    ));
    assert_eq!(store.search(&[0.0, 1.0], 1)?[0].row, 1);
    Ok(())
}

#[test]
fn gpu_placement_is_used_when_it_works() -> Result<()> {
    let store = VectorStore::build_with(
        three_docs(),
        &accelerated(true),
        scan(ScanEngine::working_gpu()),
    )?;
    assert_eq!(store.placement(), Placement::Gpu { ordinal: 0 });
    assert!(store.gpu_enabled());
    assert!(store.notices().is_empty());

    let dir = tempdir()?;
    store.save(dir.path())?;
    assert!(read_descriptor(&dir.path().join(DESCRIPTOR_FILE))?.gpu_enabled);
    Ok(())
}

#[test]
fn out_of_range_gpu_ordinal_uses_cpu() -> Result<()> {
    let options = accelerated(true).with_gpu_device(3);
    let store = VectorStore::build_with(three_docs(), &options, scan(ScanEngine::working_gpu()))?;
    assert_eq!(store.placement(), Placement::Cpu);
    assert!(matches!(
        store.notices(),
        [BackendNotice::GpuUnavailable { .. }]
    ));
    Ok(())
}

#[test]
fn switching_backend_on_load_is_recorded() -> Result<()> {
    let dir = tempdir()?;
    VectorStore::build_with(three_docs(), &exact(), None)?.save(dir.path())?;
    let loaded =
        VectorStore::load_with(dir.path(), &accelerated(false), scan(ScanEngine::cpu_only()))?;
    assert_eq!(loaded.backend(), BackendKind::Accelerated);
    assert_eq!(
        loaded.notices(),
        &[BackendNotice::BackendSwitched {
            stored: BackendKind::Exact,
            requested: BackendKind::Accelerated,
        }]
    );
    Ok(())
}

#[test]
fn exact_save_removes_stale_native_artifact() -> Result<()> {
    let dir = tempdir()?;
    VectorStore::build_with(three_docs(), &accelerated(false), scan(ScanEngine::cpu_only()))?
        .save(dir.path())?;
    assert!(dir.path().join(NATIVE_INDEX_FILE).exists());
    VectorStore::build_with(three_docs(), &exact(), None)?.save(dir.path())?;
    assert!(!dir.path().join(NATIVE_INDEX_FILE).exists());
    Ok(())
}

#[test]
fn failed_native_write_leaves_no_staged_file() -> Result<()> {
    let dir = tempdir()?;
    let store = VectorStore::build_with(
        three_docs(),
        &accelerated(false),
        scan(ScanEngine::failing_writes()),
    )?;
    assert!(store.save(dir.path()).is_err());

    let leftovers: Vec<String> = fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
    assert!(!dir.path().join(NATIVE_INDEX_FILE).exists());
    Ok(())
}

#[test]
fn missing_index_is_reported() -> Result<()> {
    let dir = tempdir()?;
    let missing = dir.path().join("nope");
    assert!(matches!(
        VectorStore::load_with(&missing, &exact(), None),
        Err(IndexError::IndexNotFound { .. })
    ));
    assert!(!VectorStore::exists(dir.path()));
    assert!(matches!(
        VectorStore::load_with(dir.path(), &exact(), None),
        Err(IndexError::IndexNotFound { .. })
    ));
    Ok(())
}

#[test]
fn missing_descriptor_is_tolerated() -> Result<()> {
    let dir = tempdir()?;
    VectorStore::build_with(three_docs(), &exact(), None)?.save(dir.path())?;
    fs::remove_file(dir.path().join(DESCRIPTOR_FILE))?;
    let loaded = VectorStore::load_with(dir.path(), &exact(), None)?;
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.notices(), &[BackendNotice::DescriptorMissing]);
    Ok(())
}

#[test]
fn disagreeing_descriptor_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    VectorStore::build_with(three_docs(), &exact(), None)?.save(dir.path())?;
    let path = dir.path().join(DESCRIPTOR_FILE);
    let raw = fs::read_to_string(&path)?.replace("\"document_count\": 3", "\"document_count\": 4");
    fs::write(&path, raw)?;
    assert!(matches!(
        VectorStore::load_with(dir.path(), &exact(), None),
        Err(IndexError::Corrupt { .. })
    ));

    fs::write(dir.path().join(EMBEDDINGS_FILE), b"garbage")?;
    assert!(matches!(
        VectorStore::load_with(dir.path(), &exact(), None),
        Err(IndexError::Corrupt { .. })
    ));
    Ok(())
}

#[test]
fn non_unit_embeddings_are_accepted_with_a_notice() -> Result<()> {
    let mut docs = three_docs();
    docs[0].embedding = vec![3.0, 4.0];
    let store = VectorStore::build_with(docs, &exact(), None)?;
    assert_eq!(
        store.notices(),
        &[BackendNotice::NonUnitEmbeddings { rows: 1 }]
    );
    Ok(())
}
