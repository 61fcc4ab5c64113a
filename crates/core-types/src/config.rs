//! TOML-backed application configuration.
//!
//! Resolution order: explicit path, then `POLYSEEK_CONFIG`, then
//! `./polyseek.toml`. A missing file is created with defaults so operators
//! have something to edit. A handful of env vars override single fields.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BackendKind, Language};

pub const DEFAULT_CONFIG_FILE: &str = "polyseek.toml";
pub const CONFIG_ENV: &str = "POLYSEEK_CONFIG";
pub const INDEX_DIR_ENV: &str = "POLYSEEK_INDEX_DIR";
pub const BACKEND_ENV: &str = "POLYSEEK_BACKEND";
pub const LOG_ENV: &str = "POLYSEEK_LOG";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid backend `{0}`")]
    Backend(String),
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },
    #[error("embedder kind `http` requires `embedder.endpoint`")]
    MissingEndpoint,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub paths: PathsSection,
    pub logging: LoggingConfig,
    pub index: IndexSection,
    pub embedder: EmbedderSection,
    pub retrieval: RetrievalSection,
    pub evaluation: EvaluationSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub data_dir: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub index_dir: String,
    pub dataset_dir: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            index_dir: "index".into(),
            dataset_dir: "data/miracl".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Optional log file; rotated daily when set.
    pub file: Option<String>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSection {
    /// `exact` or `accelerated`.
    pub backend: String,
    pub use_gpu: bool,
    pub gpu_device: usize,
    /// `None` indexes the full corpus.
    pub corpus_sample_size: Option<usize>,
    pub sample_seed: u64,
    pub languages: Vec<String>,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            backend: BackendKind::Exact.as_str().into(),
            use_gpu: true,
            gpu_device: 0,
            corpus_sample_size: Some(10_000),
            sample_seed: 42,
            languages: vec!["hindi".into(), "bengali".into(), "telugu".into()],
        }
    }
}

impl IndexSection {
    pub fn backend_kind(&self) -> Result<BackendKind, ConfigError> {
        self.backend
            .parse()
            .map_err(|_| ConfigError::Backend(self.backend.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    Hashing,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderSection {
    pub kind: EmbedderKind,
    pub model: String,
    pub dimension: usize,
    pub endpoint: Option<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbedderSection {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::Hashing,
            model: "sentence-transformers/paraphrase-multilingual-mpnet-base-v2".into(),
            dimension: 768,
            endpoint: None,
            batch_size: 32,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub top_k: usize,
    /// Truncation applied when rendering document text.
    pub max_text_chars: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: 10,
            max_text_chars: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSection {
    pub languages: Vec<String>,
    pub split: String,
    pub ndcg_k: usize,
    pub recall_k: usize,
    pub max_queries: Option<usize>,
}

impl Default for EvaluationSection {
    fn default() -> Self {
        Self {
            languages: vec!["hindi".into(), "bengali".into(), "telugu".into()],
            split: "dev".into(),
            ndcg_k: 10,
            recall_k: 100,
            max_queries: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    /// Browser origins allowed to call the API; empty disables CORS.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".into(),
            cors_origins: vec![
                "http://localhost:8000".into(),
                "http://localhost:5173".into(),
                "http://127.0.0.1:5173".into(),
            ],
        }
    }
}

impl AppConfig {
    /// Reject values that would only fail later, deep inside a build or search.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.index.backend_kind()?;
        let positive = [
            ("retrieval.top_k", self.retrieval.top_k),
            ("evaluation.ndcg_k", self.evaluation.ndcg_k),
            ("evaluation.recall_k", self.evaluation.recall_k),
            ("embedder.dimension", self.embedder.dimension),
            ("embedder.batch_size", self.embedder.batch_size),
        ];
        if let Some((field, _)) = positive.into_iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::NonPositive { field });
        }
        if self.embedder.kind == EmbedderKind::Http && self.embedder.endpoint.is_none() {
            return Err(ConfigError::MissingEndpoint);
        }
        Ok(())
    }

    pub fn index_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.index_dir)
    }

    pub fn dataset_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.dataset_dir)
    }

    /// Parse a list of language names/codes, failing on the first unknown one.
    pub fn parse_languages(names: &[String]) -> Result<Vec<Language>> {
        names
            .iter()
            .map(|name| {
                name.parse::<Language>()
                    .with_context(|| format!("parse language `{name}`"))
            })
            .collect()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var(INDEX_DIR_ENV) {
            self.paths.index_dir = dir;
        }
        if let Ok(backend) = env::var(BACKEND_ENV) {
            self.index.backend = backend;
        }
        if let Ok(level) = env::var(LOG_ENV) {
            self.logging.level = level;
        }
    }
}

fn resolve_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load the config file, writing a default one first if none exists.
pub fn load_or_create_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = resolve_path(path);
    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str::<AppConfig>(&raw)
            .with_context(|| format!("parse config {}", path.display()))?
    } else {
        let cfg = AppConfig::default();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let rendered = toml::to_string_pretty(&cfg).context("render default config")?;
        fs::write(&path, rendered)
            .with_context(|| format!("write default config {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote default configuration");
        cfg
    };
    cfg.apply_env_overrides();
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_validate() {
        assert_eq!(AppConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.retrieval.top_k = 0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NonPositive {
                field: "retrieval.top_k"
            })
        );
    }

    #[test]
    fn bad_backend_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.index.backend = "hnsw".into();
        assert_eq!(cfg.validate(), Err(ConfigError::Backend("hnsw".into())));
    }

    #[test]
    fn http_embedder_needs_endpoint() {
        let mut cfg = AppConfig::default();
        cfg.embedder.kind = EmbedderKind::Http;
        assert_eq!(cfg.validate(), Err(ConfigError::MissingEndpoint));
    }

    #[test]
    fn missing_file_is_created_then_reloaded() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("conf").join("polyseek.toml");
        let first = load_or_create_config(Some(&path))?;
        assert!(path.exists());

        let second = load_or_create_config(Some(&path))?;
        assert_eq!(first.retrieval.top_k, second.retrieval.top_k);
        assert_eq!(first.evaluation.recall_k, 100);
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("polyseek.toml");
        fs::write(&path, "[retrieval]\ntop_k = 25\n")?;
        let cfg = load_or_create_config(Some(&path))?;
        assert_eq!(cfg.retrieval.top_k, 25);
        assert_eq!(cfg.retrieval.max_text_chars, 300);
        assert_eq!(cfg.evaluation.split, "dev");
        Ok(())
    }

    #[test]
    fn languages_parse_or_fail() {
        let ok = AppConfig::parse_languages(&["hi".into(), "bengali".into()]).unwrap();
        assert_eq!(ok, vec![Language::Hindi, Language::Bengali]);
        assert!(AppConfig::parse_languages(&["xx".into()]).is_err());
    }
}
