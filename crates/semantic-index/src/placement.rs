//! Device placement policy for the accelerated backend.
//!
//! The device count is asked for once, up front. A GPU is only attempted when
//! requested and present; any GPU failure after that degrades to CPU and is
//! recorded rather than propagated.

use core_types::BackendKind;

use crate::engine::{EngineError, FlatEngine, Placement};
use crate::error::IndexError;
use crate::notice::{BackendNotice, Notices};

/// What the caller asked for. The store may end up with less.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    pub backend: BackendKind,
    pub use_gpu: bool,
    pub gpu_device: usize,
}

impl IndexOptions {
    pub fn new(backend: BackendKind, use_gpu: bool) -> Self {
        Self {
            backend,
            use_gpu,
            gpu_device: 0,
        }
    }

    pub fn with_gpu_device(mut self, ordinal: usize) -> Self {
        self.gpu_device = ordinal;
        self
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::new(BackendKind::Exact, false)
    }
}

pub(crate) fn plan(
    engine: &dyn FlatEngine,
    options: &IndexOptions,
    notices: &mut Notices,
) -> Placement {
    if !options.use_gpu {
        return Placement::Cpu;
    }
    match gpu_for(engine, options.gpu_device) {
        Ok(placement) => placement,
        Err(IndexError::GpuUnavailable(reason)) => {
            notices.record(BackendNotice::GpuUnavailable { reason });
            Placement::Cpu
        }
        Err(other) => {
            notices.record(BackendNotice::GpuUnavailable {
                reason: other.to_string(),
            });
            Placement::Cpu
        }
    }
}

fn gpu_for(engine: &dyn FlatEngine, ordinal: usize) -> Result<Placement, IndexError> {
    let devices = engine.device_count();
    if devices == 0 {
        return Err(IndexError::GpuUnavailable(format!(
            "engine `{}` reports no devices",
            engine.name()
        )));
    }
    if ordinal >= devices {
        return Err(IndexError::GpuUnavailable(format!(
            "device {ordinal} requested, {devices} available"
        )));
    }
    Ok(Placement::Gpu { ordinal })
}

/// Run `op` on `placement`; if that is a GPU and it fails, record the failure,
/// downgrade `placement` to CPU, and retry there.
pub(crate) fn with_cpu_fallback<T>(
    placement: &mut Placement,
    notices: &mut Notices,
    mut op: impl FnMut(Placement) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    if placement.is_gpu() {
        match op(*placement) {
            Ok(value) => return Ok(value),
            Err(err) => {
                notices.record(BackendNotice::GpuConstructionFailed {
                    reason: err.to_string(),
                });
                *placement = Placement::Cpu;
            }
        }
    }
    op(Placement::Cpu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_failure_downgrades_and_retries_on_cpu() {
        let mut placement = Placement::Gpu { ordinal: 0 };
        let mut notices = Notices::default();
        let mut attempts = Vec::new();
        let out = with_cpu_fallback(&mut placement, &mut notices, |p| {
            attempts.push(p);
            if p.is_gpu() {
                Err(EngineError::Device("out of memory".into()))
            } else {
                Ok(7)
            }
        })
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(placement, Placement::Cpu);
        assert_eq!(attempts, vec![Placement::Gpu { ordinal: 0 }, Placement::Cpu]);
        assert!(matches!(
            notices.into_vec().as_slice(),
            [BackendNotice::GpuConstructionFailed { .. }]
        ));
    }

    #[test]
    fn cpu_failure_is_not_retried() {
        let mut placement = Placement::Cpu;
        let mut notices = Notices::default();
        let mut calls = 0;
        let out: Result<(), _> = with_cpu_fallback(&mut placement, &mut notices, |_| {
            calls += 1;
            Err(EngineError::Backend("boom".into()))
        });
        assert!(out.is_err());
        assert_eq!(calls, 1);
        assert!(notices.into_vec().is_empty());
    }
}
