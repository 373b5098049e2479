use super::ImageSource;
use anyhow::{bail, Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};

/// Image decoded from a file on disk
pub struct FileImage {
    path: PathBuf,
}

impl FileImage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ImageSource for FileImage {
    fn load(&mut self) -> Result<RgbaImage> {
        tracing::info!("Decoding image {}", self.path.display());

        let image = image::open(&self.path)
            .with_context(|| format!("Failed to decode image at {}", self.path.display()))?
            .to_rgba8();

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            bail!("Image at {} has no pixels", self.path.display());
        }

        tracing::debug!("Decoded {}x{} image", width, height);

        Ok(image)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
