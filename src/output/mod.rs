mod png;

pub use png::PngFile;

use anyhow::Result;
use image::{GrayImage, RgbaImage};

/// Trait for output destinations
pub trait OutputSink {
    /// Write an RGBA image, alpha included
    fn write_image(&mut self, image: &RgbaImage) -> Result<()>;

    /// Write a single-channel alpha mask
    fn write_mask(&mut self, mask: &GrayImage) -> Result<()>;

    /// Short description for logs
    fn describe(&self) -> String;
}
