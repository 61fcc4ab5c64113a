use std::sync::Arc;
use std::time::Instant;

use embedder::EmbedError;
use protocol::{SearchHit, SearchRequest, SearchResponse, StatusResponse};
use retrieval::{RetrievalError, Retriever, SearchOptions};
use thiserror::Error;
use uuid::Uuid;

use crate::status::make_status_response;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The caller sent something unsearchable; maps to HTTP 400.
    #[error("{0}")]
    BadRequest(String),
    #[error("search failed: {0}")]
    Internal(String),
}

/// Executes search and status requests arriving over HTTP.
///
/// Implementations are called from blocking worker threads.
pub trait SearchHandler: Send + Sync {
    fn search(&self, req: SearchRequest) -> Result<SearchResponse, SearchError>;

    fn status(&self) -> StatusResponse;
}

/// Serves requests from a loaded retriever.
#[derive(Debug)]
pub struct RetrieverSearchHandler {
    retriever: Arc<Retriever>,
    default_top_k: usize,
    options: SearchOptions,
}

impl RetrieverSearchHandler {
    pub fn new(retriever: Arc<Retriever>, default_top_k: usize) -> Self {
        Self {
            retriever,
            default_top_k,
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }
}

/// Splits retrieval failures into caller mistakes and server faults.
fn classify(err: RetrievalError) -> SearchError {
    match err {
        RetrievalError::Configuration(_)
        | RetrievalError::Encoding(EmbedError::EmptyInput { .. })
        | RetrievalError::Encoding(EmbedError::NoFeatures { .. }) => {
            SearchError::BadRequest(err.to_string())
        }
        RetrievalError::Encoding(_) | RetrievalError::Index(_) => {
            SearchError::Internal(err.to_string())
        }
    }
}

impl SearchHandler for RetrieverSearchHandler {
    fn search(&self, req: SearchRequest) -> Result<SearchResponse, SearchError> {
        let id = req.id.unwrap_or_else(Uuid::new_v4);
        if req.query.trim().is_empty() {
            return Err(SearchError::BadRequest(
                "query parameter cannot be empty".into(),
            ));
        }
        let top_k = req.top_k.unwrap_or(self.default_top_k);

        let started = Instant::now();
        let results = self
            .retriever
            .search_with(&req.query, top_k, &self.options)
            .map_err(classify)?;
        let took_ms = started.elapsed().as_millis() as u64;
        tracing::info!(%id, top_k, hits = results.len(), took_ms, "api search");

        let store = self.retriever.store();
        let hits: Vec<SearchHit> = results.into_iter().map(SearchHit::from).collect();
        Ok(SearchResponse {
            id,
            query: req.query,
            total: hits.len(),
            hits,
            took_ms,
            backend: store.backend().to_string(),
            served_by: store.engine_name().map(str::to_string),
        })
    }

    fn status(&self) -> StatusResponse {
        make_status_response(Uuid::new_v4(), &self.retriever.store().status())
    }
}
