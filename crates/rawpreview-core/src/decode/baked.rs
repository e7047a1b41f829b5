//! Decoding of baked formats (JPEG, PNG, TIFF, WebP) with EXIF orientation
//! handling.
//!
//! Embedded RAW previews are plain JPEGs, so they go through here as well.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{DecodeError, DecodedImage, LinearImage};
use crate::color::srgb_to_linear;
use crate::metadata::Orientation;

fn map_image_error(err: image::ImageError) -> DecodeError {
    match err {
        image::ImageError::Unsupported(e) => {
            log::debug!("Unsupported image data: {}", e);
            DecodeError::InvalidFormat
        }
        image::ImageError::IoError(e) => DecodeError::IoError(e.to_string()),
        other => DecodeError::CorruptedFile(other.to_string()),
    }
}

fn decode_dynamic(bytes: &[u8], apply_orientation: bool) -> Result<DynamicImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::CorruptedFile("empty image data".to_string()));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::IoError(e.to_string()))?;

    let img = reader.decode().map_err(map_image_error)?;

    if apply_orientation {
        Ok(orient(img, read_orientation(bytes)))
    } else {
        Ok(img)
    }
}

/// Decode an image from bytes into 8-bit RGB.
///
/// When `apply_orientation` is set, the EXIF orientation is applied so the
/// result is displayed upright.
///
/// # Errors
///
/// - `DecodeError::InvalidFormat` if the format is not recognized
/// - `DecodeError::CorruptedFile` if the data is truncated or damaged
pub fn decode_image(bytes: &[u8], apply_orientation: bool) -> Result<DecodedImage, DecodeError> {
    let img = decode_dynamic(bytes, apply_orientation)?;
    Ok(DecodedImage::from_rgb_image(img.into_rgb8()))
}

/// Decode an image from bytes into scene-linear floating point.
///
/// Baked formats are assumed to be sRGB encoded; the transfer curve is
/// undone so the result can go through the same rendering path as a RAW
/// development.
pub fn decode_image_linear(
    bytes: &[u8],
    apply_orientation: bool,
) -> Result<LinearImage, DecodeError> {
    let img = decode_dynamic(bytes, apply_orientation)?;
    let mut rgb = img.into_rgb32f();
    for v in rgb.iter_mut() {
        *v = srgb_to_linear(*v);
    }
    Ok(LinearImage::from_rgb32f_image(rgb))
}

/// Read pixel dimensions from the image header without decoding pixels.
pub fn header_dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::IoError(e.to_string()))?
        .into_dimensions()
        .map_err(map_image_error)
}

/// Extract the EXIF orientation.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined.
pub fn read_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    Reader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|exif| {
            exif.get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .map(Orientation::from)
        .unwrap_or_default()
}

/// Apply EXIF orientation transformation to an image.
pub(super) fn orient(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
