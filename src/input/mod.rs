mod file;

pub use file::FileImage;

use anyhow::Result;
use image::RgbaImage;

/// Trait for image sources
pub trait ImageSource {
    /// Load the image as 8-bit RGBA
    fn load(&mut self) -> Result<RgbaImage>;

    /// Short description for logs
    fn describe(&self) -> String;
}
