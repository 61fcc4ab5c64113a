//! Tensor-backed flat index on top of `candle-core`.
//!
//! The matrix lives as one `(rows, dimension)` f32 tensor on the chosen
//! device; a search is a single matmul with the query column followed by the
//! same top-k selection the exact backend uses. Native persistence is a
//! safetensors file holding that tensor.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use candle_core::{DType, Device, Tensor};

use super::{EngineError, FlatEngine, FlatIndex, Placement};
use crate::topk::{ScoredRow, select_top_k};

const TENSOR_NAME: &str = "embeddings";
const MAX_PROBED_DEVICES: usize = 16;

impl From<candle_core::Error> for EngineError {
    fn from(err: candle_core::Error) -> Self {
        EngineError::Backend(err.to_string())
    }
}

#[derive(Debug, Default)]
pub struct CandleEngine {
    devices: OnceLock<usize>,
}

impl CandleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn device(placement: Placement) -> Result<Device, EngineError> {
        match placement {
            Placement::Cpu => Ok(Device::Cpu),
            Placement::Gpu { ordinal } => gpu_device(ordinal),
        }
    }
}

/// CUDA first, then Metal. Both constructors fail cleanly on builds without
/// the matching candle feature.
fn gpu_device(ordinal: usize) -> Result<Device, EngineError> {
    match Device::new_cuda(ordinal) {
        Ok(device) => Ok(device),
        Err(cuda_err) => match Device::new_metal(ordinal) {
            Ok(device) => Ok(device),
            Err(metal_err) => Err(EngineError::Device(format!(
                "cuda: {cuda_err}; metal: {metal_err}"
            ))),
        },
    }
}

fn probe_devices() -> usize {
    let cuda = (0..MAX_PROBED_DEVICES)
        .take_while(|&i| Device::new_cuda(i).is_ok())
        .count();
    if cuda > 0 {
        tracing::debug!(devices = cuda, "cuda devices detected");
        return cuda;
    }
    let metal = (0..MAX_PROBED_DEVICES)
        .take_while(|&i| Device::new_metal(i).is_ok())
        .count();
    tracing::debug!(devices = metal, "metal devices detected");
    metal
}

impl FlatEngine for CandleEngine {
    fn name(&self) -> &'static str {
        "candle"
    }

    fn device_count(&self) -> usize {
        *self.devices.get_or_init(probe_devices)
    }

    fn build(
        &self,
        vectors: &[f32],
        dimension: usize,
        placement: Placement,
    ) -> Result<Box<dyn FlatIndex>, EngineError> {
        if dimension == 0 || vectors.len() % dimension != 0 {
            return Err(EngineError::Shape(format!(
                "{} floats do not form rows of dimension {dimension}",
                vectors.len()
            )));
        }
        let device = Self::device(placement)?;
        let rows = vectors.len() / dimension;
        let matrix = Tensor::from_slice(vectors, (rows, dimension), &device)?;
        Ok(Box::new(CandleFlatIndex {
            matrix,
            device,
            rows,
            dimension,
            placement,
        }))
    }

    fn read_native(
        &self,
        path: &Path,
        placement: Placement,
    ) -> Result<Box<dyn FlatIndex>, EngineError> {
        let device = Self::device(placement)?;
        let mut tensors = candle_core::safetensors::load(path, &device)?;
        let matrix = tensors
            .remove(TENSOR_NAME)
            .ok_or_else(|| EngineError::Shape(format!("tensor `{TENSOR_NAME}` not found")))?;
        let (rows, dimension) = matrix.dims2()?;
        let matrix = if matrix.dtype() == DType::F32 {
            matrix
        } else {
            matrix.to_dtype(DType::F32)?
        };
        Ok(Box::new(CandleFlatIndex {
            matrix,
            device,
            rows,
            dimension,
            placement,
        }))
    }
}

struct CandleFlatIndex {
    matrix: Tensor,
    device: Device,
    rows: usize,
    dimension: usize,
    placement: Placement,
}

impl FlatIndex for CandleFlatIndex {
    fn placement(&self) -> Placement {
        self.placement
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredRow>, EngineError> {
        if query.len() != self.dimension {
            return Err(EngineError::Shape(format!(
                "query dimension {} != index dimension {}",
                query.len(),
                self.dimension
            )));
        }
        let column = Tensor::from_slice(query, (self.dimension, 1), &self.device)?;
        let scores = self
            .matrix
            .matmul(&column)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        Ok(select_top_k(&scores, top_k))
    }

    fn write_native(&self, path: &Path) -> Result<(), EngineError> {
        let cpu = self.matrix.to_device(&Device::Cpu)?;
        let tensors = HashMap::from([(TENSOR_NAME.to_string(), cpu)]);
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }
}
