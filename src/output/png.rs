use super::OutputSink;
use anyhow::{Context, Result};
use image::{GrayImage, ImageFormat, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

/// PNG file on disk; PNG keeps the alpha channel of the cutout
pub struct PngFile {
    path: PathBuf,
}

impl PngFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        Ok(())
    }
}

impl OutputSink for PngFile {
    fn write_image(&mut self, image: &RgbaImage) -> Result<()> {
        self.ensure_parent()?;

        image
            .save_with_format(&self.path, ImageFormat::Png)
            .with_context(|| format!("Failed to write PNG to {}", self.path.display()))?;

        tracing::info!(
            "Wrote {}x{} image to {}",
            image.width(),
            image.height(),
            self.path.display()
        );

        Ok(())
    }

    fn write_mask(&mut self, mask: &GrayImage) -> Result<()> {
        self.ensure_parent()?;

        mask.save_with_format(&self.path, ImageFormat::Png)
            .with_context(|| format!("Failed to write mask to {}", self.path.display()))?;

        tracing::info!("Wrote mask to {}", self.path.display());

        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn alpha_survives_the_round_trip() {
        let dir = std::env::temp_dir().join(format!("cutout-output-{}", std::process::id()));
        let path = dir.join("nested").join("cutout.png");
        let image = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 40]));

        PngFile::new(&path).write_image(&image).unwrap();
        let written = image::open(&path).unwrap().to_rgba8();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(written, image);
    }

    #[test]
    fn mask_is_written_as_grayscale() {
        let path = std::env::temp_dir().join(format!("cutout-mask-{}.png", std::process::id()));
        let mask = GrayImage::from_pixel(3, 1, image::Luma([128]));

        PngFile::new(&path).write_mask(&mask).unwrap();
        let written = image::open(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(written.color(), image::ColorType::L8);
        assert_eq!(written.to_luma8(), mask);
    }
}
