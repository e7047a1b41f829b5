//! Loader configuration.
//!
//! All options deserialize with defaults for missing fields, so a partial
//! document such as `{"scheme": "AlwaysDecodeFullImage"}` is valid.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::RawDecodeOptions;
use crate::color::ColorSpace;
use crate::crop::DEFAULT_ASPECT_RATIO_TOLERANCE;
use crate::policy::ThumbnailScheme;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("minimum ratio must be a positive finite number, got {0}")]
    InvalidMinimumRatio(f64),

    #[error("aspect ratio tolerance must be a non-negative finite number, got {0}")]
    InvalidTolerance(f64),

    #[error("scale factor must be in (0, 1], got {0}")]
    InvalidScaleFactor(f64),
}

/// Per-loader policy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Thumbnail selection policy.
    pub scheme: ThumbnailScheme,
    /// How much of the requested size a thumbnail must reach to be accepted
    /// (`1.0` means all of it).
    pub minimum_ratio: f64,
    /// Aspect ratio difference tolerated before letterbox cropping kicks in.
    pub aspect_ratio_tolerance: f64,
    /// Apply EXIF orientation to decoded thumbnails.
    pub apply_orientation: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            scheme: ThumbnailScheme::default(),
            minimum_ratio: 1.0,
            aspect_ratio_tolerance: DEFAULT_ASPECT_RATIO_TOLERANCE,
            apply_orientation: true,
        }
    }
}

impl LoaderOptions {
    pub fn with_scheme(scheme: ThumbnailScheme) -> Self {
        Self {
            scheme,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.minimum_ratio.is_finite() || self.minimum_ratio <= 0.0 {
            return Err(ConfigError::InvalidMinimumRatio(self.minimum_ratio));
        }
        if !self.aspect_ratio_tolerance.is_finite() || self.aspect_ratio_tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.aspect_ratio_tolerance));
        }
        Ok(())
    }
}

/// Options for a full-image load: how to decode and where to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FullImageOptions {
    pub decode: RawDecodeOptions,
    pub color_space: ColorSpace,
}

impl FullImageOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scale = self.decode.scale_factor;
        if !scale.is_finite() || scale <= 0.0 || scale > 1.0 {
            return Err(ConfigError::InvalidScaleFactor(scale));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LoaderOptions::default();
        assert_eq!(options.scheme, ThumbnailScheme::FullImageIfThumbnailTooSmall);
        assert_eq!(options.minimum_ratio, 1.0);
        assert_eq!(options.aspect_ratio_tolerance, 0.01);
        assert!(options.apply_orientation);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let options: LoaderOptions =
            serde_json::from_str(r#"{"scheme": "AlwaysDecodeFullImage", "minimum_ratio": 0.8}"#)
                .unwrap();

        assert_eq!(options.scheme, ThumbnailScheme::AlwaysDecodeFullImage);
        assert_eq!(options.minimum_ratio, 0.8);
        assert_eq!(options.aspect_ratio_tolerance, 0.01);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut options = LoaderOptions::with_scheme(ThumbnailScheme::Never);
        options.aspect_ratio_tolerance = 0.05;

        let json = serde_json::to_string(&options).unwrap();
        let back: LoaderOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut options = LoaderOptions::default();
        options.minimum_ratio = 0.0;
        assert_eq!(options.validate(), Err(ConfigError::InvalidMinimumRatio(0.0)));

        let mut options = LoaderOptions::default();
        options.aspect_ratio_tolerance = -0.1;
        assert_eq!(options.validate(), Err(ConfigError::InvalidTolerance(-0.1)));

        let mut options = LoaderOptions::default();
        options.minimum_ratio = f64::NAN;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_full_image_options() {
        let options: FullImageOptions =
            serde_json::from_str(r#"{"color_space": "DisplayP3"}"#).unwrap();
        assert_eq!(options.color_space, ColorSpace::DisplayP3);
        assert_eq!(options.decode, RawDecodeOptions::default());
        assert!(options.validate().is_ok());

        let mut options = FullImageOptions::default();
        options.decode.scale_factor = 1.5;
        assert_eq!(options.validate(), Err(ConfigError::InvalidScaleFactor(1.5)));
    }
}
