use super::postprocess;
use super::preprocess::Preprocessor;
use super::types::{MaskTensor, NormalizedTensor, SegmentationModel};
use crate::backend::{
    BackendChoice, BackendSelector, ComputeProbe, InferenceEngine, InferenceSession, ModelSource,
    SelectedBackend,
};
use crate::config::RemoverConfig;
use crate::error::{Error, Result};
use image::RgbaImage;
use std::sync::Mutex;
use std::time::Instant;

/// Background remover around a single-input, single-output segmentation model
///
/// The session sits behind a mutex so one remover can be shared between
/// threads; only the model run is serialized. Placement geometry stays local
/// to each call.
pub struct BackgroundRemover {
    session: Mutex<Box<dyn InferenceSession>>,
    backend: BackendChoice,
    preprocessor: Preprocessor,
    input_name: String,
    output_name: String,
}

impl BackgroundRemover {
    /// Select a backend and load the model
    ///
    /// # Arguments
    /// * `engine` - Builds sessions for the model
    /// * `probe` - Reports whether an accelerated device exists
    /// * `model` - Model file or bytes
    /// * `config` - Pipeline options, including the fallback policy
    pub fn initialize(
        engine: &dyn InferenceEngine,
        probe: &dyn ComputeProbe,
        model: &ModelSource,
        config: &RemoverConfig,
    ) -> Result<Self> {
        tracing::info!("Loading segmentation model from {}", model);

        let mut selector = BackendSelector::new(engine, probe, config.policy);
        let SelectedBackend { session, choice } = selector.select_and_initialize(model)?;

        tracing::info!("Segmentation model loaded on {} backend", choice);

        Ok(Self::from_session(session, choice, config))
    }

    /// Wrap an already built session
    pub fn from_session(
        session: Box<dyn InferenceSession>,
        backend: BackendChoice,
        config: &RemoverConfig,
    ) -> Self {
        let preprocessor = Preprocessor::new(config.frame_size).with_filter(config.filter.into());

        Self {
            session: Mutex::new(session),
            backend,
            preprocessor,
            input_name: config.input_name.clone(),
            output_name: config.output_name.clone(),
        }
    }

    pub fn backend(&self) -> BackendChoice {
        self.backend
    }

    fn infer(&self, tensor: &NormalizedTensor) -> Result<MaskTensor> {
        let mut outputs = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| Error::Inference("session lock poisoned".to_string()))?;
            session.run(&self.input_name, tensor)?
        };

        let Some(raw) = outputs.remove(&self.output_name) else {
            let available: Vec<&str> = outputs.keys().map(String::as_str).collect();
            return Err(Error::InvalidMask(format!(
                "model output `{}` not found. Available outputs: {}",
                self.output_name,
                available.join(", ")
            )));
        };

        MaskTensor::from_tensor_data(raw, self.preprocessor.frame_size())
    }
}

impl SegmentationModel for BackgroundRemover {
    fn segment(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let _span = tracing::debug_span!("segment").entered();
        let (width, height) = image.dimensions();

        let start = Instant::now();
        let (tensor, geometry) = self.preprocessor.preprocess(image)?;
        let preprocess_time = start.elapsed();

        let start = Instant::now();
        let mask = self.infer(&tensor)?;
        let inference_time = start.elapsed();

        let start = Instant::now();
        let alpha = postprocess::postprocess_mask(&mask, width, height, &geometry)?;
        let postprocess_time = start.elapsed();

        tracing::debug!(
            "Segmented {}x{}: preprocess={:.1}ms, inference={:.1}ms, postprocess={:.1}ms",
            width,
            height,
            preprocess_time.as_secs_f64() * 1000.0,
            inference_time.as_secs_f64() * 1000.0,
            postprocess_time.as_secs_f64() * 1000.0
        );

        Ok(alpha)
    }

    fn input_size(&self) -> (u32, u32) {
        let frame = self.preprocessor.frame_size();
        (frame, frame)
    }
}
