//! Decoding primitives used by the native backend.
//!
//! This module provides functionality for:
//! - Decoding baked images (JPEG, PNG, TIFF, WebP) with EXIF orientation
//! - Extracting embedded JPEG previews from RAW containers (fast path)
//! - Developing RAW sensor data into a linear image (quality path)
//! - Resizing and post-decode tunables
//!
//! All operations are synchronous and allocate their outputs; none of them
//! know about thumbnail policy.

mod adjust;
mod baked;
mod preview;
mod raw;
mod resize;
mod types;

pub use adjust::{apply_exposure, orient_image, orient_linear, reduce_noise};
pub use baked::{decode_image, decode_image_linear, header_dimensions, read_orientation};
pub use preview::{extract_embedded_preview, extract_exif_thumbnail, raw_dimensions};
pub use raw::{develop_raw, sensor_dimensions};
pub use resize::{resize, resize_to_fit, scale_linear};
pub use types::{DecodeError, DecodedImage, FilterType, LinearImage};
