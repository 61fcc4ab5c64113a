//! Text query → ranked [`SearchResult`]s.
//!
//! The retriever holds no state of its own beyond shared handles to the
//! embedding provider and a loaded, immutable [`VectorStore`]; it is `Sync`
//! and can serve concurrent searches.

use std::sync::Arc;
use std::time::Instant;

use core_types::SearchResult;
use embedder::{EmbedError, EmbeddingProvider};
use rayon::prelude::*;
use semantic_index::{IndexError, ScoredRow, VectorStore, rank_order};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("query could not be encoded: {0}")]
    Encoding(#[source] EmbedError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Presentation options; ranking is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub include_text: bool,
    /// Truncate returned text to this many characters.
    pub max_text_chars: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            include_text: true,
            max_text_chars: None,
        }
    }
}

impl SearchOptions {
    /// Ids and scores only, as used by evaluation.
    pub fn ids_only() -> Self {
        Self {
            include_text: false,
            max_text_chars: None,
        }
    }
}

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<VectorStore>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("model", &self.embedder.model_id())
            .field("store", &self.store)
            .finish()
    }
}

impl Retriever {
    /// Fails when the provider and the store disagree on dimension.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<VectorStore>,
    ) -> Result<Self, RetrievalError> {
        if embedder.dimension() != store.dimension() {
            return Err(RetrievalError::Configuration(format!(
                "embedder `{}` produces dimension {}, index has dimension {}",
                embedder.model_id(),
                embedder.dimension(),
                store.dimension()
            )));
        }
        if let Some(model) = store.model().filter(|m| *m != embedder.model_id()) {
            tracing::warn!(
                index_model = model,
                embedder_model = embedder.model_id(),
                "index was built with a different embedding model"
            );
        }
        Ok(Self { embedder, store })
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, RetrievalError> {
        self.search_with(query, top_k, &SearchOptions::default())
    }

    pub fn search_with(
        &self,
        query: &str,
        top_k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        check_top_k(top_k)?;
        if query.trim().is_empty() {
            return Err(RetrievalError::Encoding(EmbedError::EmptyInput { index: 0 }));
        }
        let started = Instant::now();
        let vector = self.embedder.encode(query).map_err(RetrievalError::Encoding)?;
        let results = self.search_vector(&vector, top_k, options)?;
        tracing::debug!(
            query_chars = query.chars().count(),
            top_k,
            hits = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search"
        );
        Ok(results)
    }

    /// Rank an already-encoded query.
    pub fn search_vector(
        &self,
        vector: &[f32],
        top_k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        check_top_k(top_k)?;
        let mut hits = self.store.search(vector, top_k)?;
        hits.sort_by(rank_order);
        Ok(self.materialize(&hits, options))
    }

    /// One result list per query, in input order. Non-empty queries are
    /// encoded in a single provider call; an empty query fails only its own
    /// slot.
    pub fn search_batch(
        &self,
        queries: &[&str],
        top_k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<Result<Vec<SearchResult>, RetrievalError>>, RetrievalError> {
        check_top_k(top_k)?;
        let (positions, texts): (Vec<usize>, Vec<&str>) = queries
            .iter()
            .enumerate()
            .filter(|(_, q)| !q.trim().is_empty())
            .map(|(i, q)| (i, *q))
            .unzip();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder
                .encode_batch(&texts)
                .map_err(RetrievalError::Encoding)?
        };

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; queries.len()];
        for (position, vector) in positions.into_iter().zip(vectors) {
            slots[position] = Some(vector);
        }
        Ok(slots
            .into_par_iter()
            .map(|slot| match slot {
                Some(vector) => self.search_vector(&vector, top_k, options),
                None => Err(RetrievalError::Encoding(EmbedError::EmptyInput { index: 0 })),
            })
            .collect())
    }

    fn materialize(&self, hits: &[ScoredRow], options: &SearchOptions) -> Vec<SearchResult> {
        hits.iter()
            .enumerate()
            .filter_map(|(i, hit)| {
                let doc = self.store.document(hit.row)?;
                let text = match (options.include_text, options.max_text_chars) {
                    (false, _) => String::new(),
                    (true, Some(limit)) => truncate_chars(&doc.text, limit),
                    (true, None) => doc.text.clone(),
                };
                Some(SearchResult {
                    rank: i + 1,
                    doc_id: doc.doc_id.clone(),
                    language: doc.language,
                    score: hit.score,
                    text,
                })
            })
            .collect()
    }
}

fn check_top_k(top_k: usize) -> Result<(), RetrievalError> {
    if top_k == 0 {
        return Err(RetrievalError::Configuration(
            "top_k must be greater than zero".into(),
        ));
    }
    Ok(())
}

/// First `limit` characters, never splitting a code point.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_code_points() {
        assert_eq!(truncate_chars("తెలుగు", 2), "తె");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
