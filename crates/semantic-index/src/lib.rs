//! Dense vector store with interchangeable similarity backends.
//!
//! - [`ExactBackend`] scans the embedding matrix directly.
//! - [`AcceleratedBackend`] delegates to a [`FlatEngine`] (candle tensors by
//!   default) that may keep its copy of the matrix on a GPU.
//!
//! Both return the same ranking for the same data. Degradations (no engine,
//! no GPU, stale native artifact) never fail a build or load; they are logged
//! and exposed through [`VectorStore::notices`].

pub mod backend;
pub mod engine;
mod error;
mod notice;
mod placement;
mod store;
mod table;
pub mod topk;

pub use backend::{AcceleratedBackend, ExactBackend, SimilarityBackend};
pub use engine::{EngineError, FlatEngine, FlatIndex, Placement, default_engine};
pub use error::IndexError;
pub use notice::BackendNotice;
pub use placement::IndexOptions;
pub use store::{StoreStatus, VectorStore};
pub use table::DocumentTable;
pub use topk::{ScoredRow, TopK, rank_order, select_top_k};
