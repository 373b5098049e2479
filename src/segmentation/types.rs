use crate::error::{Error, Result};
use crate::segmentation::postprocess;
use image::RgbaImage;
use ndarray::Array4;
use std::collections::BTreeMap;

/// Model input: planar NCHW tensor with shape [1, 3, frame, frame]
///
/// Each value is `byte / 255 - 0.5`. The letterbox border is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Array4<f32>,
}

impl NormalizedTensor {
    pub(crate) fn new(data: Array4<f32>) -> Self {
        Self { data }
    }

    pub fn shape(&self) -> [usize; 4] {
        let dims = self.data.dim();
        [dims.0, dims.1, dims.2, dims.3]
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    /// Flatten in channel-major order, each plane row-major
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

/// Raw tensor as handed back by an inference engine
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Outputs of a single model run keyed by declared output name
pub type ModelOutputs = BTreeMap<String, TensorData>;

/// Segmentation scores with shape [1, 1, frame, frame]
///
/// Values are unbounded; postprocessing rescales them.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskTensor {
    scores: Array4<f32>,
}

impl MaskTensor {
    /// Validate raw engine output against the expected frame size
    pub fn from_tensor_data(tensor: TensorData, frame_size: u32) -> Result<Self> {
        let TensorData { shape, data } = tensor;

        if data.is_empty() {
            return Err(Error::InvalidMask("mask tensor is empty".to_string()));
        }
        if shape.len() != 4 {
            return Err(Error::InvalidMask(format!(
                "expected a 4D mask tensor, got shape {:?}",
                shape
            )));
        }
        if shape[0] != 1 || shape[1] != 1 {
            return Err(Error::InvalidMask(format!(
                "expected batch and channel of 1, got shape {:?}",
                shape
            )));
        }
        let frame = frame_size as usize;
        if shape[2] != frame || shape[3] != frame {
            return Err(Error::InvalidMask(format!(
                "expected mask of {}x{}, got {}x{}",
                frame, frame, shape[3], shape[2]
            )));
        }

        let scores = Array4::from_shape_vec((shape[0], shape[1], shape[2], shape[3]), data)
            .map_err(|e| Error::InvalidMask(format!("mask data does not match shape: {}", e)))?;

        Ok(Self { scores })
    }

    pub fn width(&self) -> usize {
        self.scores.dim().3
    }

    pub fn height(&self) -> usize {
        self.scores.dim().2
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.scores
    }
}

/// Where the scaled source sits inside the square model frame
///
/// Produced by preprocessing one image and consumed by postprocessing the
/// mask of that same image. It is a plain value so concurrent requests never
/// see each other's placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementGeometry {
    pub target_width: u32,
    pub target_height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub aspect_ratio: f64,
}

impl PlacementGeometry {
    /// Scale the longer side to `frame_size`, keep the aspect ratio and center
    pub fn fit(width: u32, height: u32, frame_size: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidImage(format!(
                "image has zero dimension ({}x{})",
                width, height
            )));
        }
        if frame_size == 0 {
            return Err(Error::InvalidImage("frame size must be positive".to_string()));
        }

        let frame = frame_size as f64;
        let aspect_ratio = width as f64 / height as f64;

        let (target_width, target_height) = if width > height {
            let scaled = (frame * height as f64 / width as f64).round() as u32;
            (frame_size, scaled.max(1))
        } else {
            let scaled = (frame * width as f64 / height as f64).round() as u32;
            (scaled.max(1), frame_size)
        };

        // Odd remainders round the offset up, as f64::round does for .5
        let x_offset = ((frame_size - target_width) as f64 / 2.0).round() as u32;
        let y_offset = ((frame_size - target_height) as f64 / 2.0).round() as u32;

        Ok(Self {
            target_width,
            target_height,
            x_offset,
            y_offset,
            aspect_ratio,
        })
    }
}

/// Trait for segmentation models
pub trait SegmentationModel {
    /// Compute the alpha mask of an image
    ///
    /// # Returns
    /// * Mask at the image's resolution, R = G = B = alpha value, A = 255
    fn segment(&self, image: &RgbaImage) -> Result<RgbaImage>;

    /// Cut the foreground out of an image
    ///
    /// The input is left untouched; the result is a copy whose alpha channel
    /// is the computed mask.
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let mask = self.segment(image)?;
        postprocess::composite(image, &mask)
    }

    /// Get the model's input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}
