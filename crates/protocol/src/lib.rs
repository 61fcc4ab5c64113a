//! Wire models for the Polyseek HTTP API.
//!
//! Everything here is plain serde data encoded as JSON by the server. The
//! types mirror the retrieval core without depending on the index crates, so
//! clients can link this crate alone.

use std::collections::BTreeMap;

use core_types::{DocId, Language, SearchResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query-string form of `GET /api/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Echoed back in the response; generated by the server when absent.
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub query: String,
    /// Falls back to the configured `retrieval.top_k`.
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: Option<usize>) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            query: query.into(),
            top_k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based.
    pub rank: usize,
    pub doc_id: DocId,
    pub language: Language,
    pub language_name: String,
    pub score: f32,
    pub text: String,
}

impl From<SearchResult> for SearchHit {
    fn from(result: SearchResult) -> Self {
        Self {
            rank: result.rank,
            doc_id: result.doc_id,
            language: result.language,
            language_name: result.language.display_name().to_string(),
            score: result.score,
            text: result.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub id: Uuid,
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub total: usize,
    pub took_ms: u64,
    /// Backend that actually answered, after any fallback.
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_by: Option<String>,
}

/// Body of `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub id: Uuid,
    pub document_count: usize,
    pub dimension: usize,
    pub backend: String,
    pub requested_backend: String,
    pub engine: Option<String>,
    pub gpu_enabled: bool,
    pub gpu_requested: bool,
    pub model: Option<String>,
    /// Document count per language display name.
    pub languages: BTreeMap<String, usize>,
    /// Human-readable backend degradations recorded at build/load.
    pub notices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
