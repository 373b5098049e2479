//! Background removal with a letterboxed segmentation model.
//!
//! [`BackgroundRemover`] picks an inference backend (accelerated first, then
//! portable), fits the image into the model's square frame, runs the model and
//! turns the mask back into an alpha channel at the original resolution.

pub mod backend;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod segmentation;

pub use backend::{BackendChoice, ModelSource};
pub use config::{EngineConfig, FallbackPolicy, RemoverConfig, MODEL_INPUT_SIZE};
pub use error::{Error, Result};
pub use segmentation::{create_default_remover, BackgroundRemover, SegmentationModel};
