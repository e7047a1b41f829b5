//! Decode backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the operations every backend must
//! support: read_metadata, decode_thumbnail, decode_full_image and
//! convert_color_space. The loader only talks to this trait, so the policy
//! layer is backend-agnostic.
//!
//! The production implementation is
//! [`NativeBackend`](crate::native::NativeBackend), built on `rawloader`,
//! `image` and `kamadak-exif`.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::color::RenderContext;
use crate::decode::{DecodeError, DecodedImage, LinearImage};
use crate::format::ImageFormatKind;
use crate::metadata::ImageMetadata;
pub use crate::policy::ThumbnailSource;

/// Where the bytes of an image come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    File(PathBuf),
    Memory { name: String, bytes: Arc<[u8]> },
}

impl ImageSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ImageSource::File(path.into())
    }

    pub fn memory(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        ImageSource::Memory {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Human-readable identity used in logs and errors.
    pub fn identity(&self) -> String {
        match self {
            ImageSource::File(path) => path.display().to_string(),
            ImageSource::Memory { name, .. } => name.clone(),
        }
    }

    /// Read the whole source.
    ///
    /// # Errors
    ///
    /// - `DecodeError::NoSource` if the file does not exist or the source is empty
    /// - `DecodeError::IoError` for any other read failure
    pub fn read_bytes(&self) -> Result<Cow<'_, [u8]>, DecodeError> {
        let bytes = match self {
            ImageSource::File(path) => Cow::Owned(std::fs::read(path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DecodeError::NoSource(path.display().to_string()),
                _ => DecodeError::IoError(e.to_string()),
            })?),
            ImageSource::Memory { bytes, .. } => Cow::Borrowed(bytes.as_ref()),
        };

        if bytes.is_empty() {
            return Err(DecodeError::NoSource(format!("{} is empty", self.identity())));
        }
        Ok(bytes)
    }

    /// Classify the source, by name first and then by content.
    pub fn format_kind(&self, bytes: &[u8]) -> ImageFormatKind {
        match self {
            ImageSource::File(path) => ImageFormatKind::from_path(path)
                .unwrap_or_else(|| ImageFormatKind::detect("", bytes)),
            ImageSource::Memory { name, .. } => ImageFormatKind::detect(name, bytes),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ImageSource::File(path) => Some(path),
            ImageSource::Memory { .. } => None,
        }
    }
}

/// Parameters for a thumbnail decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailOptions {
    /// Which representation to draw from.
    pub source: ThumbnailSource,
    /// Longest edge of the result; `None` keeps the decoded size.
    pub max_pixel_size: Option<u32>,
    /// Rotate/flip according to EXIF orientation.
    pub apply_orientation: bool,
}

/// Tunables for the full-image decode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDecodeOptions {
    /// Fast, lower-resolution decode.
    pub draft_mode: bool,
    /// Output scale relative to the decoded size, in `(0, 1]`.
    pub scale_factor: f64,
    /// Exposure adjustment in stops.
    pub exposure_bias: f32,
    /// Luminance noise reduction amount, `0.0..=1.0`.
    pub luminance_noise_reduction: f32,
    /// Color noise reduction amount, `0.0..=1.0`.
    pub color_noise_reduction: f32,
    pub lens_correction: bool,
}

impl Default for RawDecodeOptions {
    fn default() -> Self {
        Self {
            draft_mode: false,
            scale_factor: 1.0,
            exposure_bias: 0.0,
            luminance_noise_reduction: 0.0,
            color_noise_reduction: 0.0,
            lens_correction: false,
        }
    }
}

/// Trait for decode backends.
///
/// Backends are shared between loaders, hence `Send + Sync`.
pub trait ImageBackend: Send + Sync {
    /// Read dimensions, orientation and capture details.
    fn read_metadata(&self, source: &ImageSource) -> Result<ImageMetadata, DecodeError>;

    /// Produce a thumbnail. `Ok(None)` means the requested source has no
    /// thumbnail (only possible with [`ThumbnailSource::EmbeddedOnly`]).
    fn decode_thumbnail(
        &self,
        source: &ImageSource,
        options: &ThumbnailOptions,
    ) -> Result<Option<DecodedImage>, DecodeError>;

    /// Decode the full image into scene-linear floating point.
    fn decode_full_image(
        &self,
        source: &ImageSource,
        options: &RawDecodeOptions,
    ) -> Result<LinearImage, DecodeError>;

    /// Render a linear image through `context`.
    fn convert_color_space(
        &self,
        image: &LinearImage,
        context: &RenderContext,
    ) -> Result<DecodedImage, DecodeError> {
        context.render(image)
    }
}
