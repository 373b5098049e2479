mod ort_engine;
mod selector;

pub use ort_engine::{CudaAdapter, CudaProbe, NoAccelerator, OrtEngine, OrtSession};
pub use selector::{BackendSelector, BackendState, SelectedBackend};

use crate::error::Result;
use crate::segmentation::{ModelOutputs, NormalizedTensor};
use std::fmt;
use std::path::PathBuf;

/// Compute backend an inference session runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendChoice {
    /// GPU execution
    Accelerated,
    /// CPU execution, available everywhere
    Portable,
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accelerated => write!(f, "accelerated"),
            Self::Portable => write!(f, "portable"),
        }
    }
}

/// Where the model bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    File(PathBuf),
    Memory(Vec<u8>),
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory(bytes) => write!(f, "<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Trait for inference engines
/// Builds sessions for a model on a requested backend
pub trait InferenceEngine {
    /// Build a session on `backend`; any failure is reported as an error,
    /// never as a silent switch to another backend
    fn create_session(
        &self,
        model: &ModelSource,
        backend: BackendChoice,
    ) -> Result<Box<dyn InferenceSession>>;
}

/// A loaded model ready to run
pub trait InferenceSession: Send {
    /// Run the model on a single named input
    ///
    /// Returns every declared output keyed by name
    fn run(&mut self, input_name: &str, input: &NormalizedTensor) -> Result<ModelOutputs>;
}

/// Trait for accelerated compute discovery
pub trait ComputeProbe {
    /// Look for an accelerated adapter; `None` means unavailable
    fn query_adapter(&self) -> Option<Box<dyn ComputeAdapter>>;
}

/// Handle to an accelerated adapter found by a probe
pub trait ComputeAdapter {
    /// Human readable adapter description for logs
    fn describe(&self) -> String;

    /// Open a device on this adapter
    fn request_device(&self) -> Result<()>;
}
