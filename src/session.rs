use std::path::{Path, PathBuf};

use ort::{ExecutionProviderDispatch, GraphOptimizationLevel, Session};
use tracing::instrument;

use crate::ExecutionProvider;

/// Input shape profile for TensorRT engine builds, as `name:NxCxHxW` strings.
#[cfg_attr(not(feature = "tensorrt"), allow(dead_code))]
pub(crate) struct ShapeProfile {
    pub min: String,
    pub opt: String,
    pub max: String,
}

#[cfg_attr(not(feature = "tensorrt"), allow(dead_code))]
pub(crate) struct SessionOptions<'a> {
    pub threads: usize,
    pub providers: &'a [ExecutionProvider],
    pub cache_path: Option<PathBuf>,
    pub profile: ShapeProfile,
}

#[cfg(feature = "tensorrt")]
fn setup_tensorrt(cache_path: PathBuf, profile: &ShapeProfile) -> ExecutionProviderDispatch {
    use ort::TensorRTExecutionProvider;

    TensorRTExecutionProvider::default()
        .with_profile_min_shapes(&profile.min)
        .with_profile_max_shapes(&profile.max)
        .with_profile_opt_shapes(&profile.opt)
        .with_engine_cache(true)
        .with_engine_cache_path(cache_path.to_string_lossy())
        .with_timing_cache(true)
        .with_builder_optimization_level(5)
        .build()
}

#[cfg_attr(not(feature = "tensorrt"), allow(unused_variables))]
fn dispatch(
    provider: ExecutionProvider,
    model_path: &Path,
    options: &SessionOptions,
) -> Option<ExecutionProviderDispatch> {
    match provider {
        ExecutionProvider::Default => None,
        #[cfg(feature = "tensorrt")]
        ExecutionProvider::TensorRT => {
            let cache_path = options.cache_path.clone().unwrap_or_else(|| {
                model_path
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(".cache")
            });
            Some(setup_tensorrt(cache_path, &options.profile))
        }
        #[cfg(feature = "coreml")]
        ExecutionProvider::CoreML => Some(ort::CoreMLExecutionProvider::default().build()),
        #[cfg(feature = "cuda")]
        ExecutionProvider::Cuda => Some(ort::CUDAExecutionProvider::default().build()),
        #[cfg(feature = "directml")]
        ExecutionProvider::DirectML => Some(ort::DirectMLExecutionProvider::default().build()),
    }
}

/// Loads one ONNX model with the configured providers, falling back to CPU.
#[instrument(level = "debug", skip(options))]
pub(crate) fn load(model_path: &Path, options: &SessionOptions) -> ort::Result<Session> {
    // DirectML can't run sessions in parallel.
    #[cfg(feature = "directml")]
    let parallel = !options.providers.contains(&ExecutionProvider::DirectML);
    #[cfg(not(feature = "directml"))]
    let parallel = true;

    let providers = options
        .providers
        .iter()
        .filter_map(|provider| dispatch(*provider, model_path, options))
        .collect::<Vec<_>>();

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_memory_pattern(parallel)?
        .with_parallel_execution(parallel)?
        .with_inter_threads(options.threads)?
        .with_intra_threads(options.threads)?
        .with_execution_providers(providers)?
        .commit_from_file(model_path)?;

    log::debug!("{} inputs: {:?}", model_path.display(), session.inputs);
    log::debug!("{} outputs: {:?}", model_path.display(), session.outputs);
    Ok(session)
}
