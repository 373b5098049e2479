pub mod postprocess;
mod preprocess;
mod remover;
pub mod types;

pub use postprocess::{composite, mask_luma, postprocess_mask};
pub use preprocess::Preprocessor;
pub use remover::BackgroundRemover;
pub use types::{
    MaskTensor, ModelOutputs, NormalizedTensor, PlacementGeometry, SegmentationModel, TensorData,
};

use crate::backend::{CudaProbe, ModelSource, NoAccelerator, OrtEngine};
use crate::config::{EngineConfig, RemoverConfig};
use crate::error::Result;
use std::path::Path;

/// Create a background remover backed by ONNX Runtime
///
/// Probes for a CUDA device unless acceleration is disabled in `config`.
pub fn create_default_remover<P: AsRef<Path>>(
    model_path: P,
    engine_config: EngineConfig,
    config: &RemoverConfig,
) -> Result<BackgroundRemover> {
    let model = ModelSource::File(model_path.as_ref().to_path_buf());
    let device_id = engine_config.device_id;
    let engine = OrtEngine::new(engine_config);

    if config.enable_acceleration {
        BackgroundRemover::initialize(&engine, &CudaProbe::new(device_id), &model, config)
    } else {
        BackgroundRemover::initialize(&engine, &NoAccelerator, &model, config)
    }
}
