//! Core types for image decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Size;

/// Failures raised by decode primitives and backends.
///
/// Variants are grouped the way the loader classifies them: missing input,
/// unreadable container, bad data, then post-decode stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("No image source available: {0}")]
    NoSource(String),

    #[error("I/O error: {0}")]
    IoError(String),

    /// Neither the extension nor the magic bytes identify a supported container.
    #[error("Unrecognized image container")]
    InvalidFormat,

    /// `rawloader` has no profile for this body.
    #[error("Unsupported camera: {0}")]
    UnsupportedCamera(String),

    #[error("Corrupted or truncated image data: {0}")]
    CorruptedFile(String),

    #[error("EXIF error: {0}")]
    ExifError(String),

    /// The container carries no preview or EXIF thumbnail.
    #[error("No embedded thumbnail found")]
    NoThumbnail,

    #[error("Failed to materialize decoded image: {0}")]
    Materialization(String),

    #[error("Color space conversion failed: {0}")]
    ColorConversion(String),
}

/// Resampling filter for thumbnails and scaled decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    Nearest,
    /// Triangle filter; the thumbnail default.
    #[default]
    Bilinear,
    Lanczos3,
}

impl FilterType {
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        use image::imageops::FilterType as Resample;
        match self {
            FilterType::Nearest => Resample::Nearest,
            FilterType::Bilinear => Resample::Triangle,
            FilterType::Lanczos3 => Resample::Lanczos3,
        }
    }
}

/// A decoded, display-ready image with 8-bit RGB pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// RGB pixel data in row-major order (3 bytes per pixel).
    /// Length should be width * height * 3.
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Create a new DecodedImage with the given dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * 3,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A uniformly filled image; handy for placeholders and tests.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(width, height, pixels)
    }

    /// Create a DecodedImage from an image::RgbImage.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let pixels = img.into_raw();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Convert to an image::RgbImage for further processing.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn size(&self) -> Size {
        Size::from_pixels(self.width, self.height)
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}

/// A scene-linear, floating-point RGB image as produced by a full decode.
///
/// Values are linear-light with sRGB primaries; 1.0 is diffuse white but
/// highlights may exceed it.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearImage {
    pub width: u32,
    pub height: u32,
    /// RGB samples in row-major order (3 floats per pixel).
    pub pixels: Vec<f32>,
}

impl LinearImage {
    pub fn new(width: u32, height: u32, pixels: Vec<f32>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * 3,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn from_rgb32f_image(img: image::Rgb32FImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    pub fn to_rgb32f_image(&self) -> Option<image::Rgb32FImage> {
        image::Rgb32FImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn size(&self) -> Size {
        Size::from_pixels(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}
