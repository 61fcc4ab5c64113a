use std::fmt;

use core_types::BackendKind;
use serde::{Deserialize, Serialize};

/// A degradation the store absorbed instead of failing.
///
/// Every notice is also emitted as a `warn` at the point it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendNotice {
    /// `accelerated` was requested but no engine is compiled in; exact is used.
    AcceleratorUnavailable,
    /// GPU placement requested but no usable device was found; CPU is used.
    GpuUnavailable { reason: String },
    /// Building or loading on the GPU failed; the CPU copy is used.
    GpuConstructionFailed { reason: String },
    /// Saved as accelerated but the native artifact is gone; rebuilt from embeddings.
    NativeArtifactMissing { path: String },
    /// The native artifact could not be used; rebuilt from embeddings.
    NativeArtifactRejected { reason: String },
    /// The saved backend differs from the requested one.
    BackendSwitched {
        stored: BackendKind,
        requested: BackendKind,
    },
    /// No descriptor next to the embeddings; shape was taken from the artifact.
    DescriptorMissing,
    /// Some embeddings are not unit length, so scores are not cosine similarities.
    NonUnitEmbeddings { rows: usize },
}

impl fmt::Display for BackendNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendNotice::AcceleratorUnavailable => {
                f.write_str("accelerated backend not available, using exact search")
            }
            BackendNotice::GpuUnavailable { reason } => {
                write!(f, "gpu unavailable ({reason}), using cpu")
            }
            BackendNotice::GpuConstructionFailed { reason } => {
                write!(f, "gpu index construction failed ({reason}), using cpu")
            }
            BackendNotice::NativeArtifactMissing { path } => {
                write!(f, "native index {path} missing, rebuilt from embeddings")
            }
            BackendNotice::NativeArtifactRejected { reason } => {
                write!(f, "native index unusable ({reason}), rebuilt from embeddings")
            }
            BackendNotice::BackendSwitched { stored, requested } => {
                write!(f, "index saved as {stored}, loaded as {requested}")
            }
            BackendNotice::DescriptorMissing => {
                f.write_str("index descriptor missing, shape derived from embeddings")
            }
            BackendNotice::NonUnitEmbeddings { rows } => {
                write!(f, "{rows} embeddings are not unit length")
            }
        }
    }
}

/// Collects notices and logs each one as it arrives.
#[derive(Debug, Default, Clone)]
pub(crate) struct Notices(Vec<BackendNotice>);

impl Notices {
    pub(crate) fn record(&mut self, notice: BackendNotice) {
        tracing::warn!(notice = %notice, "backend degraded");
        self.0.push(notice);
    }

    pub(crate) fn into_vec(self) -> Vec<BackendNotice> {
        self.0
    }
}
