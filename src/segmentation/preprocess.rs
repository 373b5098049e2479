use super::types::{NormalizedTensor, PlacementGeometry};
use crate::config::MODEL_INPUT_SIZE;
use crate::error::Result;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, RgbaImage};
use ndarray::Array4;

/// Preprocessor for converting RGBA images to model input tensors
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    frame_size: u32,
    filter: FilterType,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(MODEL_INPUT_SIZE)
    }
}

impl Preprocessor {
    pub fn new(frame_size: u32) -> Self {
        Self {
            frame_size,
            filter: FilterType::Lanczos3,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    /// Preprocess an image into a letterboxed, normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Fit the image into the square frame, keeping its aspect ratio
    /// 2. Drop alpha and resample to the placement size
    /// 3. Normalize each channel to `byte / 255 - 0.5`
    /// 4. Write planes (R, G, B) at the placement offsets, zero elsewhere
    ///
    /// Returns: the [1, 3, frame, frame] tensor and the placement that the
    /// matching postprocessing call needs
    pub fn preprocess(&self, image: &RgbaImage) -> Result<(NormalizedTensor, PlacementGeometry)> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = image.dimensions();
        let geometry = PlacementGeometry::fit(width, height, self.frame_size)?;

        tracing::debug!(
            "Placing {}x{} image as {}x{} at ({}, {})",
            width,
            height,
            geometry.target_width,
            geometry.target_height,
            geometry.x_offset,
            geometry.y_offset
        );

        // Composite over opaque black, so transparent pixels read as black
        let rgb = RgbImage::from_fn(width, height, |x, y| {
            let [r, g, b, a] = image.get_pixel(x, y).0;
            let over_black = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
            Rgb([over_black(r), over_black(g), over_black(b)])
        });

        let target = (geometry.target_width, geometry.target_height);
        let resized = if rgb.dimensions() != target {
            imageops::resize(&rgb, target.0, target.1, self.filter)
        } else {
            rgb
        };

        let frame = self.frame_size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, frame, frame));
        let x_offset = geometry.x_offset as usize;
        let y_offset = geometry.y_offset as usize;

        for (x, y, pixel) in resized.enumerate_pixels() {
            let tx = x_offset + x as usize;
            let ty = y_offset + y as usize;
            for channel in 0..3 {
                tensor[[0, channel, ty, tx]] = pixel[channel] as f32 / 255.0 - 0.5;
            }
        }

        Ok((NormalizedTensor::new(tensor), geometry))
    }
}
