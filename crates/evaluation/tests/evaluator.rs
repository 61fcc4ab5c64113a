use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use core_types::{BackendKind, DocumentRecord, Language};
use dataset::{DatasetSource, InMemoryDataset, load_corpus};
use embedder::{EmbedError, EmbeddingProvider, HashingEmbedder};
use evaluation::{EvalConfig, Evaluator};
use retrieval::Retriever;
use semantic_index::{IndexOptions, VectorStore};

fn dataset() -> InMemoryDataset {
    let hi = Language::Hindi;
    InMemoryDataset::new()
        .with_document(hi, "1#0", "delhi capital india")
        .with_document(hi, "2#0", "mumbai finance city")
        .with_document(hi, "3#0", "taj mahal agra")
        .with_query(hi, "dev", "q1", "delhi capital")
        .with_judgment(hi, "dev", "q1", "1#0", 1)
        .with_query(hi, "dev", "q2", "taj mahal")
        .with_judgment(hi, "dev", "q2", "3#0", 1)
        .with_judgment(hi, "dev", "q2", "99#0", 1)
        .with_query(hi, "dev", "q3", "unjudged question")
        .with_query(hi, "dev", "q4", "   ")
        .with_judgment(hi, "dev", "q4", "2#0", 1)
}

/// Hashing embedder that rejects any batch containing the word "boom",
/// like a remote service refusing one input.
struct RejectingEmbedder(HashingEmbedder);

impl EmbeddingProvider for RejectingEmbedder {
    fn model_id(&self) -> &str {
        self.0.model_id()
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.iter().any(|t| t.contains("boom")) {
            return Err(EmbedError::InvalidResponse("service rejected an input".into()));
        }
        self.0.encode_batch(texts)
    }
}

fn retriever(source: &dyn DatasetSource) -> Result<Arc<Retriever>> {
    retriever_with(source, Arc::new(HashingEmbedder::new(256)?))
}

fn retriever_with(
    source: &dyn DatasetSource,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<Retriever>> {
    let docs = load_corpus(source, &[Language::Hindi], None, 0)?;
    let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
    let vectors = embedder.encode_batch(&texts)?;
    let records = docs
        .into_iter()
        .zip(vectors)
        .map(|(d, v)| DocumentRecord::new(d.doc_id, d.language, d.text, v))
        .collect();
    let store = VectorStore::build_with(
        records,
        &IndexOptions::new(BackendKind::Exact, false),
        None,
    )?;
    Ok(Arc::new(Retriever::new(embedder, Arc::new(store))?))
}

#[test]
fn counts_excluded_failed_and_missing() -> Result<()> {
    let source = dataset();
    let evaluator = Evaluator::new(retriever(&source)?, EvalConfig::default())?;
    let seen = AtomicUsize::new(0);
    let report = evaluator.evaluate(
        &source,
        &[Language::Hindi, Language::Telugu],
        "dev",
        &|n| {
            seen.fetch_add(n, Ordering::Relaxed);
        },
    );

    let hindi = &report.subsets["Hindi"];
    assert_eq!(hindi.total_queries, 4);
    assert_eq!(hindi.summary.evaluated, 2);
    assert_eq!(hindi.summary.excluded, 1);
    assert_eq!(hindi.summary.failed, 1);
    assert_eq!(hindi.summary.missing_judgments, 1);
    assert_eq!(seen.load(Ordering::Relaxed), 4);

    let q1 = hindi.queries.iter().find(|q| q.query_id == "q1").expect("q1");
    assert!((q1.ndcg - 1.0).abs() < 1e-12);
    let q2 = hindi.queries.iter().find(|q| q.query_id == "q2").expect("q2");
    assert!((q2.recall - 0.5).abs() < 1e-12);
    assert!(q2.ndcg < 1.0);

    assert!(report.skipped.contains_key("Telugu"));
    assert_eq!(report.overall.evaluated, 2);
    assert!((report.overall.recall - 0.75).abs() < 1e-12);
    Ok(())
}

#[test]
fn max_queries_caps_each_subset() -> Result<()> {
    let source = dataset();
    let config = EvalConfig {
        max_queries: Some(1),
        ..EvalConfig::default()
    };
    let evaluator = Evaluator::new(retriever(&source)?, config)?;
    let set = source.eval_set(Language::Hindi, "dev")?;
    let subset = evaluator.evaluate_set(&set, &|_| {})?;
    assert_eq!(subset.total_queries, 1);
    assert_eq!(subset.summary.evaluated, 1);
    assert_eq!(subset.summary.excluded, 0);
    Ok(())
}

#[test]
fn zero_cutoffs_are_rejected() -> Result<()> {
    let source = dataset();
    let config = EvalConfig {
        ndcg_k: 0,
        ..EvalConfig::default()
    };
    assert!(Evaluator::new(retriever(&source)?, config).is_err());
    Ok(())
}

#[test]
fn report_serializes_for_json_output() -> Result<()> {
    let source = dataset();
    let evaluator = Evaluator::new(retriever(&source)?, EvalConfig::default())?;
    let report = evaluator.evaluate(&source, &[Language::Hindi], "dev", &|_| {});
    let json = serde_json::to_value(&report)?;
    assert_eq!(json["ndcg_k"], 10);
    assert_eq!(json["subsets"]["Hindi"]["summary"]["evaluated"], 2);
    assert!(json["overall"]["ndcg"].as_f64().is_some());
    Ok(())
}

#[test]
fn one_rejected_query_fails_alone() -> Result<()> {
    let hi = Language::Hindi;
    let source = dataset()
        .with_query(hi, "dev", "q5", "boom query")
        .with_judgment(hi, "dev", "q5", "2#0", 1);
    let embedder = Arc::new(RejectingEmbedder(HashingEmbedder::new(256)?));
    let evaluator = Evaluator::new(retriever_with(&source, embedder)?, EvalConfig::default())?;
    let report = evaluator.evaluate(&source, &[hi], "dev", &|_| {});

    assert!(report.skipped.is_empty());
    let hindi = &report.subsets["Hindi"];
    assert_eq!(hindi.summary.evaluated, 2);
    assert_eq!(hindi.summary.failed, 2);
    assert!(hindi.queries.iter().any(|q| q.query_id == "q1"));
    assert!(hindi.queries.iter().all(|q| q.query_id != "q5"));
    assert_eq!(report.overall.failed, 2);
    Ok(())
}
