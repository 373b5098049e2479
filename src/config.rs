use clap::ValueEnum;
use image::imageops::FilterType;

/// Edge length of the square frame the model expects.
pub const MODEL_INPUT_SIZE: u32 = 1024;

/// Order in which the backend selector tries the two backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FallbackPolicy {
    /// Try the accelerated backend when a device is present, fall back to portable.
    #[default]
    AcceleratedFirst,
    /// Start on the portable backend, then upgrade to accelerated if possible.
    PortableFirst,
}

/// Graph optimization level handed to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GraphOptimization {
    Disable,
    Basic,
    Extended,
    #[default]
    All,
}

/// Resampling filter used when scaling the source into the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Session construction options for the inference engine
///
/// Passed explicitly to the engine instead of living in global runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub optimization: GraphOptimization,
    /// Intra-op thread count, 0 lets the runtime decide
    pub intra_threads: usize,
    /// GPU ordinal used by the accelerated backend
    pub device_id: i32,
    /// Arena allocator for the portable backend
    pub cpu_arena: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            optimization: GraphOptimization::All,
            intra_threads: 0,
            device_id: 0,
            cpu_arena: true,
        }
    }
}

/// Options for the background remover pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoverConfig {
    pub frame_size: u32,
    /// Name of the model input receiving the normalized tensor
    pub input_name: String,
    /// Name of the model output holding the mask scores
    pub output_name: String,
    pub policy: FallbackPolicy,
    pub filter: ResizeFilter,
    /// When false the accelerated backend is never probed
    pub enable_acceleration: bool,
}

impl Default for RemoverConfig {
    fn default() -> Self {
        Self {
            frame_size: MODEL_INPUT_SIZE,
            input_name: "input".to_string(),
            output_name: "output".to_string(),
            policy: FallbackPolicy::default(),
            filter: ResizeFilter::default(),
            enable_acceleration: true,
        }
    }
}
