//! Letterbox removal for embedded thumbnails.
//!
//! Cameras often store a 4:3 or 16:9 preview for a 3:2 sensor, padding the
//! difference with black bars. When the thumbnail's aspect ratio disagrees
//! with the one derived from metadata, the excess rows (landscape) or
//! columns (portrait) are cropped symmetrically.
//!
//! # Coordinate System
//!
//! Crop rectangles are in whole pixels of the thumbnail, origin top-left.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::decode::DecodedImage;
use crate::geometry::aspect_ratio;
use crate::metadata::{ImageMetadata, Shape};

/// Aspect ratio difference below which no cropping happens.
pub const DEFAULT_ASPECT_RATIO_TOLERANCE: f64 = 0.01;

/// A pixel rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the rectangle lies entirely inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let right = self.x as u64 + self.width as u64;
        let bottom = self.y as u64 + self.height as u64;
        right <= width as u64 && bottom <= height as u64
    }
}

/// Compute the rectangle that strips letterboxing from a thumbnail.
///
/// Returns `None` when the aspect ratios already agree within `tolerance`,
/// when the image is square, or when the thumbnail is *smaller* than the
/// native proportions call for along the cropped axis.
pub fn letterbox_crop(
    metadata: &ImageMetadata,
    thumbnail_width: u32,
    thumbnail_height: u32,
    tolerance: f64,
) -> Option<CropRect> {
    if thumbnail_width == 0 || thumbnail_height == 0 || !metadata.has_dimensions() {
        return None;
    }

    let native_ratio = metadata.aspect_ratio();
    let thumbnail_ratio = aspect_ratio(thumbnail_width as f64, thumbnail_height as f64);
    if (native_ratio - thumbnail_ratio).abs() < tolerance {
        return None;
    }

    // Excess along the cropped axis, split evenly between both sides
    let trim = |actual: u32, expected: f64| -> Option<(u32, u32)> {
        let excess = (actual as f64 - expected).round();
        if excess < 1.0 {
            return None;
        }
        let half = (excess / 2.0).ceil() as u32;
        let kept = actual.checked_sub(half.checked_mul(2)?)?;
        (kept > 0).then_some((half, kept))
    };

    match metadata.shape() {
        Shape::Landscape => {
            let expected_height = thumbnail_width as f64 / native_ratio;
            let (top, height) = trim(thumbnail_height, expected_height)?;
            Some(CropRect {
                x: 0,
                y: top,
                width: thumbnail_width,
                height,
            })
        }
        Shape::Portrait => {
            let expected_width = thumbnail_height as f64 * native_ratio;
            let (left, width) = trim(thumbnail_width, expected_width)?;
            Some(CropRect {
                x: left,
                y: 0,
                width,
                height: thumbnail_height,
            })
        }
        Shape::Square => None,
    }
}

/// Copy the pixels inside `rect` into a new image.
///
/// Returns `None` for an empty rectangle or one that leaves the image.
pub fn crop_pixels(image: &DecodedImage, rect: CropRect) -> Option<DecodedImage> {
    if rect.is_empty() || !rect.fits_within(image.width, image.height) {
        return None;
    }

    let src_stride = image.width as usize * 3;
    let row_len = rect.width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * rect.height as usize);

    // Copy pixel data row by row
    for y in rect.y..rect.y + rect.height {
        let start = y as usize * src_stride + rect.x as usize * 3;
        pixels.extend_from_slice(image.pixels.get(start..start + row_len)?);
    }

    Some(DecodedImage::new(rect.width, rect.height, pixels))
}

/// Strip letterboxing from a thumbnail, or hand it back untouched.
pub fn remove_letterboxing(
    image: DecodedImage,
    metadata: &ImageMetadata,
    tolerance: f64,
) -> DecodedImage {
    let Some(rect) = letterbox_crop(metadata, image.width, image.height, tolerance) else {
        return image;
    };

    match crop_pixels(&image, rect) {
        Some(cropped) => {
            debug!(
                "Removed letterboxing: {}x{} -> {}x{}",
                image.width, image.height, cropped.width, cropped.height
            );
            cropped
        }
        None => {
            warn!(
                "Letterbox crop {:?} does not fit {}x{} thumbnail, keeping it as is",
                rect, image.width, image.height
            );
            image
        }
    }
}
