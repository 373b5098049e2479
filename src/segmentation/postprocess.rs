use super::types::{MaskTensor, PlacementGeometry};
use crate::error::{Error, Result};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use ndarray::s;

/// Turn mask scores back into an alpha mask at the original resolution
///
/// # Arguments
/// * `mask` - Scores over the whole model frame
/// * `original_width` - Width of the image that was preprocessed
/// * `original_height` - Height of the image that was preprocessed
/// * `geometry` - Placement returned when that image was preprocessed
///
/// Scores are stretched to 0..=255 using the min and max of the placement
/// rectangle only, then sampled nearest-neighbour.
///
/// Returns: RGBA image with R = G = B = mask value and A = 255
pub fn postprocess_mask(
    mask: &MaskTensor,
    original_width: u32,
    original_height: u32,
    geometry: &PlacementGeometry,
) -> Result<RgbaImage> {
    let _span = tracing::debug_span!("postprocess").entered();

    if original_width == 0 || original_height == 0 {
        return Err(Error::InvalidImage(format!(
            "image has zero dimension ({}x{})",
            original_width, original_height
        )));
    }

    let x0 = geometry.x_offset as usize;
    let y0 = geometry.y_offset as usize;
    let x1 = x0 + geometry.target_width as usize;
    let y1 = y0 + geometry.target_height as usize;
    if geometry.target_width == 0
        || geometry.target_height == 0
        || x1 > mask.width()
        || y1 > mask.height()
    {
        return Err(Error::InvalidMask(format!(
            "placement {}x{} at ({}, {}) does not fit a {}x{} mask",
            geometry.target_width,
            geometry.target_height,
            geometry.x_offset,
            geometry.y_offset,
            mask.width(),
            mask.height()
        )));
    }

    let scores = mask.as_array().slice(s![0, 0, .., ..]);
    let region = scores.slice(s![y0..y1, x0..x1]);
    let (min, max) = region
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    tracing::debug!(
        "Mask range over {}x{} placement: min={}, max={}",
        geometry.target_width,
        geometry.target_height,
        min,
        max
    );

    // Uniform mask: every value maps to zero
    let scale = if max != min { 255.0 / (max - min) } else { 0.0 };

    let scale_x = geometry.target_width as f64 / original_width as f64;
    let scale_y = geometry.target_height as f64 / original_height as f64;
    let max_dx = geometry.target_width as usize - 1;
    let max_dy = geometry.target_height as usize - 1;

    let output = RgbaImage::from_fn(original_width, original_height, |x, y| {
        let dx = ((x as f64 * scale_x).floor() as usize).min(max_dx);
        let dy = ((y as f64 * scale_y).floor() as usize).min(max_dy);
        let score = scores[[y0 + dy, x0 + dx]];
        let value = ((score - min) * scale).round().clamp(0.0, 255.0) as u8;
        Rgba([value, value, value, 255])
    });

    Ok(output)
}

/// Copy `original` with its alpha channel replaced by the mask's R channel
pub fn composite(original: &RgbaImage, mask: &RgbaImage) -> Result<RgbaImage> {
    if original.dimensions() != mask.dimensions() {
        return Err(Error::InvalidMask(format!(
            "mask is {}x{} but image is {}x{}",
            mask.width(),
            mask.height(),
            original.width(),
            original.height()
        )));
    }

    let mut output = original.clone();
    for (pixel, mask_pixel) in output.pixels_mut().zip(mask.pixels()) {
        pixel[3] = mask_pixel[0];
    }

    Ok(output)
}

/// Single-channel view of an alpha mask
pub fn mask_luma(mask: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([mask.get_pixel(x, y)[0]])
    })
}
