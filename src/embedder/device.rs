//! Maps a `DevicePreference` onto `fastembed`/`ort` execution providers,
//! with automatic GPU -> CPU fallback on init failure (spec.md §4.5).

use fastembed::{EmbeddingModel, ExecutionProviderDispatch, InitOptions, TextEmbedding};
use ort::execution_providers::CPUExecutionProvider;

use crate::config::DevicePreference;
use crate::error::{Error, Result};

#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
#[cfg(feature = "directml")]
use ort::execution_providers::DirectMLExecutionProvider;

/// What a model actually ended up running on, recorded at init time
/// (spec.md §4.5: "Record `deviceInfo` and a boolean indicating whether a
/// fall-back occurred").
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub requested: DevicePreference,
    pub provider: &'static str,
    pub fell_back: bool,
}

fn gpu_providers() -> Vec<ExecutionProviderDispatch> {
    let mut providers = Vec::new();
    #[cfg(feature = "cuda")]
    providers.push(CUDAExecutionProvider::default().build());
    #[cfg(feature = "directml")]
    providers.push(DirectMLExecutionProvider::default().build());
    providers
}

fn cpu_providers() -> Vec<ExecutionProviderDispatch> {
    vec![CPUExecutionProvider::default().build()]
}

/// Whether `device` names a GPU backend this binary was actually built
/// with. `Auto` never hard-requires a GPU feature — it degrades silently
/// to CPU in [`init_with_fallback`] — but an explicit `gpu-webgpu`/
/// `gpu-dml` choice against a binary built without that feature can't be
/// honored at all, so callers treat it the same as any other GPU init
/// failure: fall back to CPU, recording it.
pub fn require_gpu_feature_enabled(device: DevicePreference) -> Result<()> {
    match device {
        #[cfg(not(feature = "cuda"))]
        DevicePreference::GpuWebgpu => Err(Error::ModelInit("built without the `cuda` feature".to_string())),
        #[cfg(not(feature = "directml"))]
        DevicePreference::GpuDml => Err(Error::ModelInit("built without the `directml` feature".to_string())),
        _ => Ok(()),
    }
}

/// Batch size for a given device preference, per spec.md §5 (64 on GPU, 32
/// on CPU — `Auto` optimistically assumes GPU since a successful init
/// tries GPU providers first).
pub fn batch_size_for(device: DevicePreference, gpu_batch: usize, cpu_batch: usize) -> usize {
    match device {
        DevicePreference::Cpu => cpu_batch,
        DevicePreference::Auto | DevicePreference::GpuWebgpu | DevicePreference::GpuDml => gpu_batch,
    }
}

/// Initialize `model`, honoring `device`. An explicit `cpu` preference
/// never touches a GPU provider. Every other preference tries GPU first —
/// unless this binary lacks the feature for it, per
/// [`require_gpu_feature_enabled`] — and transparently falls back to CPU
/// on any init failure (spec.md §4.5; §7 "first GPU failure triggers CPU
/// fallback, recoverable, logged"). CPU failure is fatal and propagates.
pub fn init_with_fallback(model: EmbeddingModel, device: DevicePreference) -> Result<(TextEmbedding, DeviceInfo)> {
    if device == DevicePreference::Cpu {
        let mut opts = InitOptions::new(model);
        opts.execution_providers = cpu_providers();
        let embedding = TextEmbedding::try_new(opts).map_err(|e| Error::ModelInit(e.to_string()))?;
        return Ok((embedding, DeviceInfo { requested: device, provider: "cpu", fell_back: false }));
    }

    if require_gpu_feature_enabled(device).is_ok() {
        let mut gpu_opts = InitOptions::new(model.clone());
        gpu_opts.execution_providers = gpu_providers();
        if let Ok(embedding) = TextEmbedding::try_new(gpu_opts) {
            return Ok((embedding, DeviceInfo { requested: device, provider: "gpu", fell_back: false }));
        }
    }

    let mut cpu_opts = InitOptions::new(model);
    cpu_opts.execution_providers = cpu_providers();
    let embedding = TextEmbedding::try_new(cpu_opts).map_err(|e| Error::ModelInit(e.to_string()))?;
    Ok((embedding, DeviceInfo { requested: device, provider: "cpu", fell_back: true }))
}
