/// Cutout API error enum.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The accelerated device could not be found or opened.
    /// Only seen by the backend selector, which recovers from it.
    #[error("Backend Unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Model Load Error: {0}")]
    ModelLoad(String),

    #[error("Invalid Image: {0}")]
    InvalidImage(String),

    #[error("Invalid Mask: {0}")]
    InvalidMask(String),

    #[error("Inference Error: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, Error>;
