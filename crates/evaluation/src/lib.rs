//! Retrieval-quality evaluation.
//!
//! Each requested language is one subset. Queries without any relevant
//! judgment are excluded and counted; judgments pointing at documents that
//! are not in the (possibly sampled) index are counted as misses; queries
//! that fail to encode or search are counted as failed. None of these abort
//! the run.

use std::sync::Arc;

use core_types::{Language, SearchResult};
use dataset::{DatasetError, DatasetSource, EvalSet};
use rayon::prelude::*;
use retrieval::{RetrievalError, Retriever, SearchOptions};
use thiserror::Error;

pub mod metrics;
mod report;

pub use report::{Aggregate, EvaluationReport, QueryOutcome, SubsetReport, render_table};

/// Queries encoded per provider call.
const QUERY_CHUNK: usize = 64;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    pub ndcg_k: usize,
    pub recall_k: usize,
    /// Cap on queries per subset, taken in file order.
    pub max_queries: Option<usize>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            ndcg_k: 10,
            recall_k: 100,
            max_queries: None,
        }
    }
}

pub struct Evaluator {
    retriever: Arc<Retriever>,
    config: EvalConfig,
}

impl Evaluator {
    pub fn new(retriever: Arc<Retriever>, config: EvalConfig) -> Result<Self, EvalError> {
        if config.ndcg_k == 0 || config.recall_k == 0 {
            return Err(EvalError::Configuration(
                "ndcg_k and recall_k must be greater than zero".into(),
            ));
        }
        Ok(Self { retriever, config })
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate every language in turn. A language whose data cannot be
    /// loaded or searched is skipped and listed in the report.
    pub fn evaluate(
        &self,
        source: &dyn DatasetSource,
        languages: &[Language],
        split: &str,
        progress: &(dyn Fn(usize) + Sync),
    ) -> EvaluationReport {
        let mut report = EvaluationReport::new(split, self.config.ndcg_k, self.config.recall_k);
        for &language in languages {
            let outcome = source
                .eval_set(language, split)
                .map_err(EvalError::from)
                .and_then(|set| self.evaluate_set(&set, progress));
            match outcome {
                Ok(subset) => report.push_subset(subset),
                Err(err) => {
                    tracing::warn!(language = %language, error = %err, "subset skipped");
                    report.push_skipped(language.display_name(), err.to_string());
                }
            }
        }
        report.finish();
        report
    }

    pub fn evaluate_set(
        &self,
        set: &EvalSet,
        progress: &(dyn Fn(usize) + Sync),
    ) -> Result<SubsetReport, EvalError> {
        let limit = self.config.max_queries.unwrap_or(usize::MAX);
        let queries = &set.queries[..set.queries.len().min(limit)];
        let depth = self.config.ndcg_k.max(self.config.recall_k);
        let store = self.retriever.store();
        let mut subset = SubsetReport::new(set.language, queries.len());

        let judged: Vec<_> = queries
            .iter()
            .filter_map(|q| match set.qrels.relevant(&q.query_id) {
                Some(relevant) if !relevant.is_empty() => Some((q, relevant)),
                _ => {
                    subset.summary.excluded += 1;
                    None
                }
            })
            .collect();
        progress(queries.len() - judged.len());

        for chunk in judged.chunks(QUERY_CHUNK) {
            let texts: Vec<&str> = chunk.iter().map(|(q, _)| q.text.as_str()).collect();
            let results = self.search_chunk(&texts, depth);

            let outcomes: Vec<Option<QueryOutcome>> = chunk
                .par_iter()
                .zip(results)
                .map(|(&(query, relevant), result)| match result {
                    Ok(hits) => {
                        let ranked: Vec<_> = hits.into_iter().map(|h| h.doc_id).collect();
                        let missing = relevant.iter().filter(|d| !store.contains(d)).count();
                        Some(QueryOutcome {
                            query_id: query.query_id.clone(),
                            ndcg: metrics::ndcg_at_k(&ranked, relevant, self.config.ndcg_k),
                            recall: metrics::recall_at_k(&ranked, relevant, self.config.recall_k),
                            relevant: relevant.len(),
                            missing_judgments: missing,
                        })
                    }
                    Err(err) => {
                        tracing::warn!(query_id = %query.query_id, error = %err, "query failed");
                        None
                    }
                })
                .collect();

            for outcome in outcomes {
                match outcome {
                    Some(outcome) => subset.push(outcome),
                    None => subset.summary.failed += 1,
                }
            }
            progress(chunk.len());
        }

        subset.finish();
        tracing::info!(
            language = %set.language,
            ndcg = subset.summary.ndcg,
            recall = subset.summary.recall,
            evaluated = subset.summary.evaluated,
            excluded = subset.summary.excluded,
            failed = subset.summary.failed,
            missing_judgments = subset.summary.missing_judgments,
            "subset evaluated"
        );
        Ok(subset)
    }

    /// Batch retrieval, falling back to one query at a time when the batch
    /// as a whole is rejected so a single bad query only fails itself.
    fn search_chunk(
        &self,
        texts: &[&str],
        depth: usize,
    ) -> Vec<Result<Vec<SearchResult>, RetrievalError>> {
        let options = SearchOptions::ids_only();
        match self.retriever.search_batch(texts, depth, &options) {
            Ok(results) => results,
            Err(err) => {
                tracing::warn!(
                    queries = texts.len(),
                    error = %err,
                    "batch search failed; retrying queries individually"
                );
                texts
                    .par_iter()
                    .map(|text| self.retriever.search_with(text, depth, &options))
                    .collect()
            }
        }
    }
}
