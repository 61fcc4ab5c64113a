//! Text → unit-vector embedding providers.
//!
//! The store and retriever only see [`EmbeddingProvider`]; the concrete model
//! is picked once by the bootstrap and shared behind an `Arc`.

use std::sync::Arc;

use core_types::config::{EmbedderKind, EmbedderSection};
use thiserror::Error;

mod hashing;
mod http;

pub use hashing::HashingEmbedder;
pub use http::HttpEmbedder;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("input {index} is empty or whitespace-only")]
    EmptyInput { index: usize },
    #[error("input {index} has no embeddable content")]
    NoFeatures { index: usize },
    #[error("embedding service request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("embedding service response invalid: {0}")]
    InvalidResponse(String),
    #[error("expected dimension {expected}, provider returned {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("embedder misconfigured: {0}")]
    Config(String),
}

pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the model, recorded next to saved indexes.
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// One L2-normalized vector per input, in input order. Any empty input,
    /// or one that yields no features, fails the whole batch.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.encode_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbedError::InvalidResponse("no vector for single input".into()))
    }
}

/// Reject empty/whitespace inputs before any work is done.
pub fn check_inputs(texts: &[&str]) -> Result<(), EmbedError> {
    match texts.iter().position(|t| t.trim().is_empty()) {
        Some(index) => Err(EmbedError::EmptyInput { index }),
        None => Ok(()),
    }
}

/// Construct the provider named by the `[embedder]` config section.
pub fn from_config(cfg: &EmbedderSection) -> Result<Arc<dyn EmbeddingProvider>, EmbedError> {
    match cfg.kind {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(cfg.dimension)?)),
        EmbedderKind::Http => {
            let endpoint = cfg
                .endpoint
                .as_deref()
                .ok_or_else(|| EmbedError::Config("`embedder.endpoint` is required".into()))?;
            Ok(Arc::new(HttpEmbedder::new(
                endpoint,
                &cfg.model,
                cfg.dimension,
                cfg.batch_size,
                std::time::Duration::from_secs(cfg.timeout_secs),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_inputs_are_rejected_by_position() {
        assert!(check_inputs(&["ok", "fine"]).is_ok());
        assert!(matches!(
            check_inputs(&["ok", " \t\n"]),
            Err(EmbedError::EmptyInput { index: 1 })
        ));
    }

    #[test]
    fn config_selects_hashing_by_default() {
        let provider = from_config(&EmbedderSection::default()).unwrap();
        assert_eq!(provider.dimension(), 768);
        assert!(provider.model_id().starts_with("hashing"));
    }

    #[test]
    fn http_without_endpoint_is_a_config_error() {
        let cfg = EmbedderSection {
            kind: EmbedderKind::Http,
            ..EmbedderSection::default()
        };
        assert!(matches!(from_config(&cfg), Err(EmbedError::Config(_))));
    }
}
