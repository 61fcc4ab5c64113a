//! Dataset sources: corpus documents, evaluation queries, and relevance
//! judgments per language.
//!
//! Document ids are prefixed with the language code on the way in, in both
//! the corpus and the judgments, so ids from different language corpora
//! never collide inside one index.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use core_types::{DocId, Language, RawDocument};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod jsonl;
mod memory;

pub use jsonl::JsonlDataset;
pub use memory::InMemoryDataset;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("no corpus for {0}")]
    MissingCorpus(Language),
    #[error("no `{split}` split for {language}")]
    MissingSplit { language: Language, split: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub query_id: String,
    pub text: String,
    pub language: Language,
}

/// Binary relevance judgments: query id → relevant document ids.
///
/// Judgments with relevance ≤ 0 are dropped on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Qrels {
    judgments: HashMap<String, HashSet<DocId>>,
}

impl Qrels {
    pub fn insert(&mut self, query_id: impl Into<String>, doc_id: DocId, relevance: i32) {
        if relevance > 0 {
            self.judgments
                .entry(query_id.into())
                .or_default()
                .insert(doc_id);
        }
    }

    pub fn relevant(&self, query_id: &str) -> Option<&HashSet<DocId>> {
        self.judgments.get(query_id)
    }

    /// Queries with at least one relevant document.
    pub fn judged_queries(&self) -> usize {
        self.judgments.len()
    }

    pub fn total_judgments(&self) -> usize {
        self.judgments.values().map(HashSet::len).sum()
    }
}

/// Queries plus judgments for one language and split.
#[derive(Debug, Clone)]
pub struct EvalSet {
    pub language: Language,
    pub split: String,
    pub queries: Vec<Query>,
    pub qrels: Qrels,
}

/// Supplier of documents and evaluation data.
pub trait DatasetSource: Send + Sync {
    fn corpus(&self, language: Language) -> Result<Vec<RawDocument>, DatasetError>;

    fn eval_set(&self, language: Language, split: &str) -> Result<EvalSet, DatasetError>;
}

/// Concatenate the corpora of `languages`, then optionally sample.
pub fn load_corpus(
    source: &dyn DatasetSource,
    languages: &[Language],
    sample_size: Option<usize>,
    seed: u64,
) -> Result<Vec<RawDocument>, DatasetError> {
    let mut all = Vec::new();
    for &language in languages {
        let docs = source.corpus(language)?;
        tracing::info!(language = %language, documents = docs.len(), "loaded corpus");
        all.extend(docs);
    }
    Ok(match sample_size {
        Some(n) => sample_documents(all, n, seed),
        None => all,
    })
}

/// Seeded sample of `n` documents, shuffled so languages are mixed.
/// Returns the input unchanged when `n` covers it.
pub fn sample_documents(docs: Vec<RawDocument>, n: usize, seed: u64) -> Vec<RawDocument> {
    if n >= docs.len() {
        return docs;
    }
    tracing::info!(sample = n, total = docs.len(), seed, "sampling corpus");
    let mut rng = StdRng::seed_from_u64(seed);
    let indices = rand::seq::index::sample(&mut rng, docs.len(), n);
    let mut slots: Vec<Option<RawDocument>> = docs.into_iter().map(Some).collect();
    let mut picked: Vec<RawDocument> = indices
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect();
    picked.shuffle(&mut rng);
    picked
}
