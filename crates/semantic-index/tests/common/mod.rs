#![allow(dead_code)]

use std::fs;
use std::path::Path;

use core_types::vector::{dot, normalize_in_place};
use core_types::{DocId, DocumentRecord, Language};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use semantic_index::{EngineError, FlatEngine, FlatIndex, Placement, ScoredRow, select_top_k};

pub fn unit_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    let mut v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    normalize_in_place(&mut v);
    v
}

pub fn random_records(seed: u64, n: usize, dim: usize) -> Vec<DocumentRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let langs = [Language::Hindi, Language::Bengali, Language::Telugu];
    (0..n)
        .map(|i| {
            let lang = langs[i % langs.len()];
            DocumentRecord::new(
                DocId::prefixed(lang, &format!("{i}#0")),
                lang,
                format!("document {i}"),
                unit_vector(&mut rng, dim),
            )
        })
        .collect()
}

pub fn three_docs() -> Vec<DocumentRecord> {
    vec![
        DocumentRecord::new("hi:1", Language::Hindi, "पहला", vec![1.0, 0.0]),
        DocumentRecord::new("bn:1", Language::Bengali, "প্রথম", vec![0.0, 1.0]),
        DocumentRecord::new("te:1", Language::Telugu, "మొదటి", vec![0.6, 0.8]),
    ]
}

/// Scripted engine: a plain scan with configurable device behaviour.
#[derive(Debug, Default)]
pub struct ScanEngine {
    pub devices: usize,
    pub fail_gpu: bool,
    /// Native writes leave a truncated file behind and then fail.
    pub fail_write: bool,
}

impl ScanEngine {
    pub fn cpu_only() -> Self {
        Self::default()
    }

    pub fn broken_gpu() -> Self {
        Self {
            devices: 1,
            fail_gpu: true,
            ..Self::default()
        }
    }

    pub fn working_gpu() -> Self {
        Self {
            devices: 1,
            ..Self::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_write: true,
            ..Self::default()
        }
    }

    fn check(&self, placement: Placement) -> Result<(), EngineError> {
        if placement.is_gpu() && self.fail_gpu {
            return Err(EngineError::Device("simulated device failure".into()));
        }
        Ok(())
    }
}

impl FlatEngine for ScanEngine {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn device_count(&self) -> usize {
        self.devices
    }

    fn build(
        &self,
        vectors: &[f32],
        dimension: usize,
        placement: Placement,
    ) -> Result<Box<dyn FlatIndex>, EngineError> {
        self.check(placement)?;
        Ok(Box::new(ScanIndex {
            vectors: vectors.to_vec(),
            dimension,
            placement,
            fail_write: self.fail_write,
        }))
    }

    fn read_native(
        &self,
        path: &Path,
        placement: Placement,
    ) -> Result<Box<dyn FlatIndex>, EngineError> {
        self.check(placement)?;
        let bytes = fs::read(path).map_err(|e| EngineError::Backend(e.to_string()))?;
        if bytes.len() < 8 || (bytes.len() - 8) % 4 != 0 {
            return Err(EngineError::Shape("truncated".into()));
        }
        let (head, body) = bytes.split_at(8);
        let mut dim = [0u8; 8];
        dim.copy_from_slice(head);
        let vectors = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Box::new(ScanIndex {
            vectors,
            dimension: u64::from_le_bytes(dim) as usize,
            placement,
            fail_write: self.fail_write,
        }))
    }
}

struct ScanIndex {
    vectors: Vec<f32>,
    dimension: usize,
    placement: Placement,
    fail_write: bool,
}

impl FlatIndex for ScanIndex {
    fn placement(&self) -> Placement {
        self.placement
    }

    fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredRow>, EngineError> {
        let scores: Vec<f32> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| dot(query, row))
            .collect();
        Ok(select_top_k(&scores, top_k))
    }

    fn write_native(&self, path: &Path) -> Result<(), EngineError> {
        let mut bytes = (self.dimension as u64).to_le_bytes().to_vec();
        for v in &self.vectors {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        if self.fail_write {
            fs::write(path, &bytes[..bytes.len() / 2])
                .map_err(|e| EngineError::Backend(e.to_string()))?;
            return Err(EngineError::Backend("disk full".into()));
        }
        fs::write(path, bytes).map_err(|e| EngineError::Backend(e.to_string()))
    }
}
