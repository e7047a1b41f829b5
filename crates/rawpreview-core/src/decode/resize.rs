//! Downscaling of decoded images.
//!
//! Resampling itself is the `image` crate's; this module only decides the
//! target dimensions. All functions return new images without modifying
//! the input.

use super::{DecodeError, DecodedImage, FilterType, LinearImage};

/// Resize an image to exact dimensions.
///
/// # Errors
///
/// Returns `DecodeError::Materialization` for zero target dimensions or a
/// pixel buffer that does not match the image dimensions.
pub fn resize(
    image: &DecodedImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::Materialization(format!(
            "invalid target size {}x{}",
            width, height
        )));
    }

    // Fast path: if dimensions match, just clone
    if image.width == width && image.height == height {
        return Ok(image.clone());
    }

    let rgb_image = image
        .to_rgb_image()
        .ok_or_else(|| DecodeError::Materialization("Failed to create RgbImage".to_string()))?;

    let resized = image::imageops::resize(&rgb_image, width, height, filter.to_image_filter());

    Ok(DecodedImage::from_rgb_image(resized))
}

/// Resize an image so its longest edge is at most `max_edge`, preserving
/// aspect ratio. Images already within the limit are returned unchanged.
pub fn resize_to_fit(
    image: &DecodedImage,
    max_edge: u32,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    if max_edge == 0 {
        return Err(DecodeError::Materialization("max edge must be non-zero".to_string()));
    }

    if image.width <= max_edge && image.height <= max_edge {
        return Ok(image.clone());
    }

    let (new_width, new_height) = calculate_fit_dimensions(image.width, image.height, max_edge);

    resize(image, new_width, new_height, filter)
}

/// Scale a linear image by `factor` (only downscaling is performed).
pub fn scale_linear(
    image: &LinearImage,
    factor: f64,
    filter: FilterType,
) -> Result<LinearImage, DecodeError> {
    if factor.is_nan() || factor <= 0.0 {
        return Err(DecodeError::Materialization(format!(
            "invalid scale factor {}",
            factor
        )));
    }
    if factor >= 1.0 {
        return Ok(image.clone());
    }

    let width = ((image.width as f64 * factor).round() as u32).max(1);
    let height = ((image.height as f64 * factor).round() as u32).max(1);
    if width == image.width && height == image.height {
        return Ok(image.clone());
    }

    let buffer = image
        .to_rgb32f_image()
        .ok_or_else(|| DecodeError::Materialization("Failed to create Rgb32FImage".to_string()))?;

    let resized = image::imageops::resize(&buffer, width, height, filter.to_image_filter());

    Ok(LinearImage::from_rgb32f_image(resized))
}

/// Calculate dimensions to fit within max_edge while preserving aspect ratio.
pub(crate) fn calculate_fit_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }

    let ratio = width as f64 / height as f64;

    if width >= height {
        // Landscape or square: constrain by width
        let new_height = (max_edge as f64 / ratio).round() as u32;
        (max_edge, new_height.max(1))
    } else {
        // Portrait: constrain by height
        let new_width = (max_edge as f64 * ratio).round() as u32;
        (new_width.max(1), max_edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_image(width: u32, height: u32) -> DecodedImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x * 255) / width.max(1)) as u8); // R
                pixels.push(((y * 255) / height.max(1)) as u8); // G
                pixels.push(128); // B
            }
        }
        DecodedImage::new(width, height, pixels)
    }

    #[test]
    fn test_resize_basic() {
        let img = create_test_image(100, 50);
        let resized = resize(&img, 50, 25, FilterType::Bilinear).unwrap();

        assert_eq!(resized.width, 50);
        assert_eq!(resized.height, 25);
        assert_eq!(resized.pixels.len(), 50 * 25 * 3);
    }

    #[test]
    fn test_resize_zero_dimensions_error() {
        let img = create_test_image(100, 50);

        assert!(resize(&img, 0, 50, FilterType::Bilinear).is_err());
        assert!(resize(&img, 50, 0, FilterType::Bilinear).is_err());
    }

    #[test]
    fn test_resize_to_fit_landscape() {
        let img = create_test_image(600, 400);
        let resized = resize_to_fit(&img, 256, FilterType::Lanczos3).unwrap();

        assert_eq!(resized.width, 256);
        assert_eq!(resized.height, 171); // 400 * (256/600) ≈ 170.67
    }

    #[test]
    fn test_resize_to_fit_portrait() {
        let img = create_test_image(400, 600);
        let resized = resize_to_fit(&img, 256, FilterType::Bilinear).unwrap();

        assert_eq!(resized.height, 256);
        assert_eq!(resized.width, 171);
    }

    #[test]
    fn test_resize_to_fit_already_smaller() {
        let img = create_test_image(100, 50);
        let resized = resize_to_fit(&img, 256, FilterType::Bilinear).unwrap();

        assert_eq!((resized.width, resized.height), (100, 50));
    }

    #[test]
    fn test_resize_to_fit_zero_max_edge_error() {
        let img = create_test_image(100, 50);
        assert!(resize_to_fit(&img, 0, FilterType::Bilinear).is_err());
    }

    #[test]
    fn test_scale_linear_halves() {
        let img = LinearImage::new(40, 20, vec![0.25; 40 * 20 * 3]);
        let scaled = scale_linear(&img, 0.5, FilterType::Bilinear).unwrap();

        assert_eq!((scaled.width, scaled.height), (20, 10));
        assert!((scaled.pixels[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_scale_linear_never_upscales() {
        let img = LinearImage::new(4, 4, vec![0.0; 48]);
        let scaled = scale_linear(&img, 2.0, FilterType::Bilinear).unwrap();
        assert_eq!((scaled.width, scaled.height), (4, 4));
    }

    #[test]
    fn test_scale_linear_rejects_invalid_factor() {
        let img = LinearImage::new(4, 4, vec![0.0; 48]);
        assert!(scale_linear(&img, 0.0, FilterType::Bilinear).is_err());
        assert!(scale_linear(&img, f64::NAN, FilterType::Bilinear).is_err());
    }

    #[test]
    fn test_calculate_fit_dimensions() {
        assert_eq!(calculate_fit_dimensions(6000, 4000, 2560), (2560, 1707));
        assert_eq!(calculate_fit_dimensions(4000, 6000, 2560), (1707, 2560));
        assert_eq!(calculate_fit_dimensions(4000, 4000, 256), (256, 256));
        assert_eq!(calculate_fit_dimensions(0, 0, 256), (0, 0));
    }
}
