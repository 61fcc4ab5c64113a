//! Client for an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use core_types::vector::normalize_in_place;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::{EmbedError, EmbeddingProvider, check_inputs};

#[derive(Debug)]
pub struct HttpEmbedder {
    client: Client,
    url: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: &str,
        model: &str,
        dimension: usize,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        if dimension == 0 || batch_size == 0 {
            return Err(EmbedError::Config(
                "dimension and batch_size must be greater than zero".into(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: embeddings_url(endpoint),
            model: model.to_string(),
            dimension,
            batch_size,
        })
    }

    fn request(&self, chunk: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: chunk,
            })
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: EmbeddingResponse = response.json()?;
        order_vectors(parsed.data, chunk.len(), self.dimension)
    }
}

fn embeddings_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    if trimmed.ends_with("/embeddings") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/embeddings")
    }
}

/// Put vectors back in request order, check their shape, and normalize.
fn order_vectors(
    data: Vec<EmbeddingDatum>,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if data.len() != expected {
        return Err(EmbedError::InvalidResponse(format!(
            "{} vectors for {expected} inputs",
            data.len()
        )));
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, datum) in data.into_iter().enumerate() {
        let index = datum.index.unwrap_or(position);
        if datum.embedding.len() != dimension {
            return Err(EmbedError::Dimension {
                expected: dimension,
                actual: datum.embedding.len(),
            });
        }
        let slot = slots
            .get_mut(index)
            .ok_or_else(|| EmbedError::InvalidResponse(format!("index {index} out of range")))?;
        let mut vector = datum.embedding;
        normalize_in_place(&mut vector);
        *slot = Some(vector);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| EmbedError::InvalidResponse(format!("no vector for input {i}")))
        })
        .collect()
}

impl EmbeddingProvider for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        check_inputs(texts)?;
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            tracing::debug!(url = %self.url, inputs = chunk.len(), "embedding request");
            out.extend(self.request(chunk)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datum(index: Option<usize>, embedding: Vec<f32>) -> EmbeddingDatum {
        EmbeddingDatum { index, embedding }
    }

    #[test]
    fn url_gets_embeddings_suffix_once() {
        assert_eq!(embeddings_url("http://h:1/v1/"), "http://h:1/v1/embeddings");
        assert_eq!(embeddings_url("http://h:1/v1/embeddings"), "http://h:1/v1/embeddings");
    }

    #[test]
    fn vectors_are_reordered_and_normalized() {
        let out = order_vectors(
            vec![datum(Some(1), vec![0.0, 2.0]), datum(Some(0), vec![3.0, 4.0])],
            2,
            2,
        )
        .unwrap();
        assert_eq!(out[1], vec![0.0, 1.0]);
        assert!((out[0][0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        assert!(matches!(
            order_vectors(vec![datum(None, vec![1.0])], 1, 2),
            Err(EmbedError::Dimension { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            order_vectors(vec![datum(None, vec![1.0])], 2, 1),
            Err(EmbedError::InvalidResponse(_))
        ));
        assert!(matches!(
            order_vectors(vec![datum(Some(0), vec![1.0]), datum(Some(0), vec![1.0])], 2, 1),
            Err(EmbedError::InvalidResponse(_))
        ));
    }

    #[test]
    fn empty_inputs_never_hit_the_network() {
        let embedder =
            HttpEmbedder::new("http://127.0.0.1:9", "m", 4, 8, Duration::from_millis(10)).unwrap();
        assert!(matches!(
            embedder.encode(""),
            Err(EmbedError::EmptyInput { index: 0 })
        ));
    }
}
