use super::{BackendChoice, ComputeAdapter, ComputeProbe, InferenceEngine, InferenceSession, ModelSource};
use crate::config::{EngineConfig, GraphOptimization};
use crate::error::{Error, Result};
use crate::segmentation::{ModelOutputs, NormalizedTensor, TensorData};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Tensor;
use std::fmt::Display;

fn load_error(e: impl Display) -> Error {
    Error::ModelLoad(e.to_string())
}

fn unavailable_error(e: impl Display) -> Error {
    Error::BackendUnavailable(e.to_string())
}

fn inference_error(e: impl Display) -> Error {
    Error::Inference(e.to_string())
}

fn optimization_level(level: GraphOptimization) -> GraphOptimizationLevel {
    match level {
        GraphOptimization::Disable => GraphOptimizationLevel::Disable,
        GraphOptimization::Basic => GraphOptimizationLevel::Level1,
        GraphOptimization::Extended => GraphOptimizationLevel::Level2,
        GraphOptimization::All => GraphOptimizationLevel::Level3,
    }
}

/// ONNX Runtime engine
///
/// Accelerated sessions run on the CUDA execution provider, portable ones on
/// the CPU provider. Providers are registered with `error_on_failure` so a
/// provider that cannot start fails the build instead of quietly running on CPU.
#[derive(Debug, Clone, Default)]
pub struct OrtEngine {
    config: EngineConfig,
}

impl OrtEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn execution_provider(&self, backend: BackendChoice) -> ExecutionProviderDispatch {
        match backend {
            BackendChoice::Accelerated => CUDAExecutionProvider::default()
                .with_device_id(self.config.device_id)
                .build()
                .error_on_failure(),
            BackendChoice::Portable => CPUExecutionProvider::default()
                .with_arena_allocator(self.config.cpu_arena)
                .build()
                .error_on_failure(),
        }
    }

    fn builder(&self, backend: BackendChoice) -> Result<SessionBuilder> {
        let mut builder = Session::builder()
            .map_err(load_error)?
            .with_optimization_level(optimization_level(self.config.optimization))
            .map_err(load_error)?
            .with_execution_providers([self.execution_provider(backend)])
            .map_err(load_error)?;

        if self.config.intra_threads > 0 {
            builder = builder
                .with_intra_threads(self.config.intra_threads)
                .map_err(load_error)?;
        }

        Ok(builder)
    }
}

impl InferenceEngine for OrtEngine {
    fn create_session(
        &self,
        model: &ModelSource,
        backend: BackendChoice,
    ) -> Result<Box<dyn InferenceSession>> {
        tracing::debug!("Building {} session for {}", backend, model);

        let builder = self.builder(backend)?;
        let session = match model {
            ModelSource::File(path) => builder.commit_from_file(path).map_err(|e| {
                Error::ModelLoad(format!("failed to load model from {}: {}", path.display(), e))
            })?,
            ModelSource::Memory(bytes) => builder.commit_from_memory(bytes).map_err(load_error)?,
        };

        let session = OrtSession::new(session);
        tracing::debug!("Model outputs: {:?}", session.output_names);

        Ok(Box::new(session))
    }
}

/// Session wrapper that copies outputs out of the runtime
pub struct OrtSession {
    session: Session,
    output_names: Vec<String>,
}

impl OrtSession {
    pub fn new(session: Session) -> Self {
        let output_names = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        Self {
            session,
            output_names,
        }
    }
}

impl InferenceSession for OrtSession {
    fn run(&mut self, input_name: &str, input: &NormalizedTensor) -> Result<ModelOutputs> {
        let _span = tracing::debug_span!("inference").entered();

        let tensor = Tensor::from_array((input.shape(), input.to_vec())).map_err(inference_error)?;

        let outputs = self
            .session
            .run(ort::inputs![input_name => tensor])
            .map_err(inference_error)?;

        let extracted = self.output_names.iter().filter_map(|name| {
            let value = outputs.get(name.as_str())?;
            let tensor = value
                .try_extract_tensor::<f32>()
                .map(|(shape, data)| TensorData {
                    shape: shape.iter().map(|&dim| dim.max(0) as usize).collect(),
                    data: data.to_vec(),
                })
                .map_err(inference_error);
            Some((name.clone(), tensor))
        });

        Ok(collect_outputs(extracted))
    }
}

/// Keep the outputs that extracted as f32 tensors
///
/// Auxiliary outputs of other element types are skipped so they cannot fail
/// a run whose mask output is fine.
fn collect_outputs<I>(outputs: I) -> ModelOutputs
where
    I: IntoIterator<Item = (String, Result<TensorData>)>,
{
    let mut collected = ModelOutputs::new();
    for (name, tensor) in outputs {
        match tensor {
            Ok(tensor) => {
                collected.insert(name, tensor);
            }
            Err(e) => tracing::debug!("Skipping output {}: {}", name, e),
        }
    }
    collected
}

/// Probe reporting a CUDA adapter when ONNX Runtime was built with CUDA support
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaProbe {
    device_id: i32,
}

impl CudaProbe {
    pub fn new(device_id: i32) -> Self {
        Self { device_id }
    }
}

impl ComputeProbe for CudaProbe {
    fn query_adapter(&self) -> Option<Box<dyn ComputeAdapter>> {
        match CUDAExecutionProvider::default().is_available() {
            Ok(true) => Some(Box::new(CudaAdapter {
                device_id: self.device_id,
            })),
            Ok(false) => {
                tracing::debug!("CUDA execution provider is not available");
                None
            }
            Err(e) => {
                tracing::debug!("CUDA availability check failed: {}", e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CudaAdapter {
    device_id: i32,
}

impl ComputeAdapter for CudaAdapter {
    fn describe(&self) -> String {
        format!("CUDA device {}", self.device_id)
    }

    /// Register the provider on a throwaway builder so a missing driver or
    /// bad ordinal shows up here rather than during model load
    fn request_device(&self) -> Result<()> {
        Session::builder()
            .map_err(unavailable_error)?
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(self.device_id)
                .build()
                .error_on_failure()])
            .map_err(unavailable_error)?;

        Ok(())
    }
}

/// Probe that never finds an adapter, pinning selection to the portable backend
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAccelerator;

impl ComputeProbe for NoAccelerator {
    fn query_adapter(&self) -> Option<Box<dyn ComputeAdapter>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask() -> TensorData {
        TensorData {
            shape: vec![1, 1, 2, 2],
            data: vec![0.0, 0.25, 0.5, 1.0],
        }
    }

    #[test]
    fn non_float_outputs_are_skipped() {
        let outputs = collect_outputs([
            (
                "labels".to_string(),
                Err(inference_error("expected f32, found i64")),
            ),
            ("output".to_string(), Ok(mask())),
        ]);

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs["output"].data, mask().data);
    }

    #[test]
    fn no_extractable_outputs_gives_empty_map() {
        let outputs = collect_outputs([(
            "output".to_string(),
            Err(inference_error("expected f32, found u8")),
        )]);
        assert!(outputs.is_empty());
    }
}
