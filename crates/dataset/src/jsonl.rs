//! File-backed source in the MIRACL/BEIR export layout:
//!
//! ```text
//! <root>/<lang>/corpus.jsonl            {"docid", "title"?, "text"}
//! <root>/<lang>/<split>/queries.jsonl   {"query_id", "query"}
//! <root>/<lang>/<split>/qrels.tsv       qid [Q0] docid relevance
//! ```
//!
//! `<lang>` is the ISO code (`hi`, `bn`, `te`, ...).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use core_types::{DocId, Language, RawDocument};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{DatasetError, DatasetSource, EvalSet, Qrels, Query};

pub const CORPUS_FILE: &str = "corpus.jsonl";
pub const QUERIES_FILE: &str = "queries.jsonl";
pub const QRELS_FILE: &str = "qrels.tsv";

#[derive(Debug, Clone)]
pub struct JsonlDataset {
    root: PathBuf,
}

#[derive(Deserialize)]
struct CorpusLine {
    #[serde(alias = "doc_id", alias = "_id")]
    docid: String,
    text: String,
}

#[derive(Deserialize)]
struct QueryLine {
    #[serde(alias = "qid", alias = "_id")]
    query_id: String,
    #[serde(alias = "text")]
    query: String,
}

impl JsonlDataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn language_dir(&self, language: Language) -> PathBuf {
        self.root.join(language.code())
    }
}

fn open(path: &Path) -> Result<BufReader<File>, DatasetError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Parse one JSON value per non-blank line.
fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DatasetError> {
    let mut out = Vec::new();
    for (index, line) in open(path)?.lines().enumerate() {
        let line = line.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|e| DatasetError::Parse {
            path: path.to_path_buf(),
            line: index + 1,
            message: e.to_string(),
        })?;
        out.push(value);
    }
    Ok(out)
}

/// TREC (`qid Q0 docid rel`) or BEIR (`qid docid rel`) rows; a non-numeric
/// relevance on the first line is treated as a header.
fn read_qrels(path: &Path, language: Language) -> Result<Qrels, DatasetError> {
    let mut qrels = Qrels::default();
    for (index, line) in open(path)?.lines().enumerate() {
        let line = line.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (qid, docid, rel) = match fields.as_slice() {
            [] => continue,
            [qid, _, docid, rel] | [qid, docid, rel] => (*qid, *docid, *rel),
            _ => {
                return Err(DatasetError::Parse {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: format!("expected 3 or 4 fields, found {}", fields.len()),
                });
            }
        };
        let relevance = match rel.parse::<i32>() {
            Ok(value) => value,
            Err(_) if index == 0 => continue,
            Err(e) => {
                return Err(DatasetError::Parse {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: format!("relevance `{rel}`: {e}"),
                });
            }
        };
        qrels.insert(qid, DocId::prefixed(language, docid), relevance);
    }
    Ok(qrels)
}

impl DatasetSource for JsonlDataset {
    fn corpus(&self, language: Language) -> Result<Vec<RawDocument>, DatasetError> {
        let path = self.language_dir(language).join(CORPUS_FILE);
        if !path.is_file() {
            return Err(DatasetError::MissingCorpus(language));
        }
        let lines: Vec<CorpusLine> = read_jsonl(&path)?;
        Ok(lines
            .into_iter()
            .map(|line| RawDocument {
                doc_id: DocId::prefixed(language, &line.docid),
                language,
                text: line.text,
            })
            .collect())
    }

    fn eval_set(&self, language: Language, split: &str) -> Result<EvalSet, DatasetError> {
        let dir = self.language_dir(language).join(split);
        if !dir.is_dir() {
            return Err(DatasetError::MissingSplit {
                language,
                split: split.to_string(),
            });
        }
        let queries: Vec<QueryLine> = read_jsonl(&dir.join(QUERIES_FILE))?;
        let qrels = read_qrels(&dir.join(QRELS_FILE), language)?;
        tracing::info!(
            language = %language,
            split,
            queries = queries.len(),
            judged = qrels.judged_queries(),
            "loaded evaluation set"
        );
        Ok(EvalSet {
            language,
            split: split.to_string(),
            queries: queries
                .into_iter()
                .map(|q| Query {
                    query_id: q.query_id,
                    text: q.query,
                    language,
                })
                .collect(),
            qrels,
        })
    }
}
