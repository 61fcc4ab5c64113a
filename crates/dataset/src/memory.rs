use std::collections::HashMap;

use core_types::{DocId, Language, RawDocument};

use crate::{DatasetError, DatasetSource, EvalSet, Qrels, Query};

/// Source held entirely in memory; handy for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    corpora: HashMap<Language, Vec<RawDocument>>,
    eval_sets: HashMap<(Language, String), EvalSet>,
}

impl InMemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document; `local_id` is prefixed with the language code.
    pub fn with_document(mut self, language: Language, local_id: &str, text: &str) -> Self {
        self.corpora.entry(language).or_default().push(RawDocument {
            doc_id: DocId::prefixed(language, local_id),
            language,
            text: text.to_string(),
        });
        self
    }

    pub fn with_query(
        mut self,
        language: Language,
        split: &str,
        query_id: &str,
        text: &str,
    ) -> Self {
        self.entry(language, split).queries.push(Query {
            query_id: query_id.to_string(),
            text: text.to_string(),
            language,
        });
        self
    }

    /// Judge `local_doc_id` (same prefixing as documents) for a query.
    pub fn with_judgment(
        mut self,
        language: Language,
        split: &str,
        query_id: &str,
        local_doc_id: &str,
        relevance: i32,
    ) -> Self {
        self.entry(language, split).qrels.insert(
            query_id,
            DocId::prefixed(language, local_doc_id),
            relevance,
        );
        self
    }

    fn entry(&mut self, language: Language, split: &str) -> &mut EvalSet {
        self.eval_sets
            .entry((language, split.to_string()))
            .or_insert_with(|| EvalSet {
                language,
                split: split.to_string(),
                queries: Vec::new(),
                qrels: Qrels::default(),
            })
    }
}

impl DatasetSource for InMemoryDataset {
    fn corpus(&self, language: Language) -> Result<Vec<RawDocument>, DatasetError> {
        self.corpora
            .get(&language)
            .cloned()
            .ok_or(DatasetError::MissingCorpus(language))
    }

    fn eval_set(&self, language: Language, split: &str) -> Result<EvalSet, DatasetError> {
        self.eval_sets
            .get(&(language, split.to_string()))
            .cloned()
            .ok_or_else(|| DatasetError::MissingSplit {
                language,
                split: split.to_string(),
            })
    }
}
