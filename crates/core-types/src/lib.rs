//! Core identifiers and shared lightweight types for polyseek.
//!
//! These types intentionally avoid heavy dependencies and aim to be
//! serialization-friendly for bincode artifacts and JSON payloads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod config;
pub mod vector;

/// Separator between the language code and the source-local id in a [`DocId`].
pub const DOC_ID_SEPARATOR: char = ':';

/// Globally unique, language-prefixed document identifier (e.g. `hi:1234#0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build `<code>:<local>` so ids from different language corpora never collide.
    pub fn prefixed(language: Language, local: &str) -> Self {
        Self(format!("{}{DOC_ID_SEPARATOR}{local}", language.code()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Language encoded in the id prefix, if any.
    pub fn language_prefix(&self) -> Option<Language> {
        let (code, _) = self.0.split_once(DOC_ID_SEPARATOR)?;
        code.parse().ok()
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown language `{0}`")]
    Language(String),
    #[error("unknown backend `{0}` (expected `exact` or `accelerated`)")]
    Backend(String),
}

/// Corpus languages (the MIRACL set plus English for queries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Arabic,
    Bengali,
    Chinese,
    English,
    Finnish,
    French,
    German,
    Hindi,
    Indonesian,
    Japanese,
    Korean,
    Persian,
    Russian,
    Spanish,
    Swahili,
    Telugu,
    Thai,
    Yoruba,
}

impl Language {
    pub const ALL: [Language; 18] = [
        Language::Arabic,
        Language::Bengali,
        Language::Chinese,
        Language::English,
        Language::Finnish,
        Language::French,
        Language::German,
        Language::Hindi,
        Language::Indonesian,
        Language::Japanese,
        Language::Korean,
        Language::Persian,
        Language::Russian,
        Language::Spanish,
        Language::Swahili,
        Language::Telugu,
        Language::Thai,
        Language::Yoruba,
    ];

    /// ISO 639-1 code.
    pub const fn code(self) -> &'static str {
        match self {
            Language::Arabic => "ar",
            Language::Bengali => "bn",
            Language::Chinese => "zh",
            Language::English => "en",
            Language::Finnish => "fi",
            Language::French => "fr",
            Language::German => "de",
            Language::Hindi => "hi",
            Language::Indonesian => "id",
            Language::Japanese => "ja",
            Language::Korean => "ko",
            Language::Persian => "fa",
            Language::Russian => "ru",
            Language::Spanish => "es",
            Language::Swahili => "sw",
            Language::Telugu => "te",
            Language::Thai => "th",
            Language::Yoruba => "yo",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Language::Arabic => "Arabic",
            Language::Bengali => "Bengali",
            Language::Chinese => "Chinese",
            Language::English => "English",
            Language::Finnish => "Finnish",
            Language::French => "French",
            Language::German => "German",
            Language::Hindi => "Hindi",
            Language::Indonesian => "Indonesian",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
            Language::Persian => "Persian",
            Language::Russian => "Russian",
            Language::Spanish => "Spanish",
            Language::Swahili => "Swahili",
            Language::Telugu => "Telugu",
            Language::Thai => "Thai",
            Language::Yoruba => "Yoruba",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Language {
    type Err = ParseError;

    /// Accepts either the ISO code (`hi`) or the English name (`hindi`), case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Language::ALL
            .into_iter()
            .find(|lang| {
                lang.code().eq_ignore_ascii_case(needle)
                    || lang.display_name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| ParseError::Language(s.to_string()))
    }
}

/// Which similarity backend answers searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Dense linear scan over the embedding matrix.
    #[default]
    Exact,
    /// Tensor-engine flat index, optionally GPU-resident.
    Accelerated,
}

impl BackendKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            BackendKind::Exact => "exact",
            BackendKind::Accelerated => "accelerated",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "numpy" => Ok(BackendKind::Exact),
            "accelerated" | "faiss" => Ok(BackendKind::Accelerated),
            _ => Err(ParseError::Backend(s.to_string())),
        }
    }
}

/// Per-document metadata stored alongside its embedding row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub doc_id: DocId,
    pub language: Language,
    pub text: String,
}

/// A document plus its embedding, as handed to the index builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub meta: DocumentMeta,
    pub embedding: Vec<f32>,
}

impl DocumentRecord {
    pub fn new(
        doc_id: impl Into<DocId>,
        language: Language,
        text: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            meta: DocumentMeta {
                doc_id: doc_id.into(),
                language,
                text: text.into(),
            },
            embedding,
        }
    }
}

/// Raw corpus document before embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub doc_id: DocId,
    pub language: Language,
    pub text: String,
}

/// One ranked retrieval hit. `rank` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub rank: usize,
    pub doc_id: DocId,
    pub language: Language,
    pub score: f32,
    pub text: String,
}
