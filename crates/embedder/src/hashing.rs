//! Deterministic feature-hashing embedder.
//!
//! Lowercased word tokens and their character trigrams are hashed into
//! signed buckets and the result is L2-normalized. Texts sharing surface
//! forms land close together; no cross-lingual semantics, but fully offline
//! and stable for a given build, which is what indexing tests and smoke runs
//! need.

use std::hash::BuildHasher;

use ahash::RandomState;
use core_types::vector::{l2_norm, normalize_in_place};
use rayon::prelude::*;

use crate::{EmbedError, EmbeddingProvider, check_inputs};

const SEEDS: [u64; 4] = [
    0x9e37_79b9_7f4a_7c15,
    0xbf58_476d_1ce4_e5b9,
    0x94d0_49bb_1331_11eb,
    0x2545_f491_4f6c_dd1d,
];
const TOKEN_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
    state: RandomState,
}

impl std::fmt::Debug for HashingEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashingEmbedder")
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbedError> {
        if dimension == 0 {
            return Err(EmbedError::Config("dimension must be greater than zero".into()));
        }
        Ok(Self {
            dimension,
            model_id: format!("hashing-{dimension}"),
            state: RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]),
        })
    }

    fn add_feature(&self, out: &mut [f32], kind: u8, feature: &str, weight: f32) {
        let hash = self.state.hash_one((kind, feature));
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        out[bucket] += sign * weight;
    }

    /// `None` when the text has no tokens to hash.
    fn embed_one(&self, text: &str) -> Option<Vec<f32>> {
        let mut out = vec![0.0; self.dimension];
        let lowered = text.to_lowercase();
        for token in tokens(&lowered) {
            self.add_feature(&mut out, 0, token, TOKEN_WEIGHT);
            let padded: Vec<char> = std::iter::once(' ')
                .chain(token.chars())
                .chain(std::iter::once(' '))
                .collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                self.add_feature(&mut out, 1, &gram, TRIGRAM_WEIGHT);
            }
        }
        if l2_norm(&out) == 0.0 {
            return None;
        }
        normalize_in_place(&mut out);
        Some(out)
    }
}

/// Split on whitespace and punctuation, keeping combining marks inside words.
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| {
        c.is_whitespace()
            || c.is_ascii_punctuation()
            || matches!(c, '।' | '॥' | '“' | '”' | '‘' | '’')
    })
    .filter(|t| !t.is_empty())
}

impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        check_inputs(texts)?;
        texts
            .par_iter()
            .enumerate()
            .map(|(index, text)| self.embed_one(text).ok_or(EmbedError::NoFeatures { index }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::vector::{dot, is_unit};

    #[test]
    fn vectors_are_unit_and_deterministic() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.encode("भारत की राजधानी").unwrap();
        let b = embedder.encode("भारत की राजधानी").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(is_unit(&a));
    }

    #[test]
    fn shared_words_score_higher_than_disjoint_text() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let v = embedder
            .encode_batch(&["capital of india", "India capital city", "ocean tides"])
            .unwrap();
        assert!(dot(&v[0], &v[1]) > dot(&v[0], &v[2]));
    }

    #[test]
    fn batch_order_matches_input_order() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let batch = embedder.encode_batch(&["one", "two", "three"]).unwrap();
        assert_eq!(batch[2], embedder.encode("three").unwrap());
    }

    #[test]
    fn empty_input_fails_whole_batch() {
        let embedder = HashingEmbedder::new(32).unwrap();
        assert!(matches!(
            embedder.encode_batch(&["fine", "   "]),
            Err(EmbedError::EmptyInput { index: 1 })
        ));
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn punctuation_only_text_is_rejected() {
        let embedder = HashingEmbedder::new(16).unwrap();
        assert!(matches!(
            embedder.encode("?!..."),
            Err(EmbedError::NoFeatures { index: 0 })
        ));
        assert!(matches!(
            embedder.encode_batch(&["words", "।।", "more"]),
            Err(EmbedError::NoFeatures { index: 1 })
        ));
    }

    #[test]
    fn devanagari_words_stay_whole() {
        let words: Vec<&str> = tokens("नमस्ते, दुनिया।").collect();
        assert_eq!(words, vec!["नमस्ते", "दुनिया"]);
    }
}
