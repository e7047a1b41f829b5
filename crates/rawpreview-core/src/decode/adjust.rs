//! Post-decode adjustments: exposure, noise reduction and orientation.

use image::imageops;

use super::baked::orient;
use super::types::{DecodeError, DecodedImage, LinearImage};
use crate::metadata::Orientation;

// Rec. 709 luma weights, matching the sRGB primaries of linear images
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

#[inline]
fn luma(px: &[f32]) -> f32 {
    LUMA[0] * px[0] + LUMA[1] * px[1] + LUMA[2] * px[2]
}

/// Scale linear values by `2^ev`.
pub fn apply_exposure(image: &mut LinearImage, ev: f32) {
    if ev == 0.0 || !ev.is_finite() {
        return;
    }
    let gain = 2f32.powf(ev);
    for v in image.pixels.iter_mut() {
        *v *= gain;
    }
}

/// Blend luminance and chroma toward a Gaussian-blurred copy.
///
/// `luminance` and `color` are amounts in `0.0..=1.0`; zero leaves that
/// component untouched.
pub fn reduce_noise(
    image: &LinearImage,
    luminance: f32,
    color: f32,
) -> Result<LinearImage, DecodeError> {
    let luminance = luminance.clamp(0.0, 1.0);
    let color = color.clamp(0.0, 1.0);
    if luminance == 0.0 && color == 0.0 {
        return Ok(image.clone());
    }

    let buffer = image
        .to_rgb32f_image()
        .ok_or_else(|| DecodeError::Materialization("linear buffer size mismatch".to_string()))?;
    let sigma = 0.5 + 1.5 * luminance.max(color);
    let blurred = imageops::blur(&buffer, sigma);

    let pixels = image
        .pixels
        .chunks_exact(3)
        .zip(blurred.as_raw().chunks_exact(3))
        .flat_map(|(orig, soft)| {
            let y_orig = luma(orig);
            let y_soft = luma(soft);
            let y = y_orig + luminance * (y_soft - y_orig);
            let mut out = [0.0f32; 3];
            for c in 0..3 {
                let chroma_orig = orig[c] - y_orig;
                let chroma_soft = soft[c] - y_soft;
                out[c] = y + chroma_orig + color * (chroma_soft - chroma_orig);
            }
            out
        })
        .collect();

    Ok(LinearImage::new(image.width, image.height, pixels))
}

/// Apply an EXIF orientation to a linear image.
pub fn orient_linear(image: LinearImage, orientation: Orientation) -> Result<LinearImage, DecodeError> {
    if orientation == Orientation::Normal {
        return Ok(image);
    }
    let buffer = image
        .to_rgb32f_image()
        .ok_or_else(|| DecodeError::Materialization("linear buffer size mismatch".to_string()))?;
    let oriented = orient(image::DynamicImage::ImageRgb32F(buffer), orientation);
    Ok(LinearImage::from_rgb32f_image(oriented.into_rgb32f()))
}

/// Apply an EXIF orientation to an 8-bit image.
pub fn orient_image(image: DecodedImage, orientation: Orientation) -> Result<DecodedImage, DecodeError> {
    if orientation == Orientation::Normal {
        return Ok(image);
    }
    let buffer = image
        .to_rgb_image()
        .ok_or_else(|| DecodeError::Materialization("pixel buffer size mismatch".to_string()))?;
    let oriented = orient(image::DynamicImage::ImageRgb8(buffer), orientation);
    Ok(DecodedImage::from_rgb_image(oriented.into_rgb8()))
}
