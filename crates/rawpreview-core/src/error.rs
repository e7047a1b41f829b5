//! Loader-level errors.
//!
//! Every variant carries the identity of the image it concerns, so errors
//! can be logged or surfaced without extra context.

use std::fmt;

use thiserror::Error;

use crate::decode::DecodeError;
use crate::policy::PolicyError;

/// The loader operation an error or cancellation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Metadata,
    Thumbnail,
    FullImage,
    EditableImage,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Metadata => "metadata",
            Operation::Thumbnail => "thumbnail",
            Operation::FullImage => "full image",
            Operation::EditableImage => "editable image",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("{id}: failed to extract metadata: {message}")]
    MetadataExtraction { id: String, message: String },

    #[error("{id}: failed to load thumbnail: {message}")]
    ThumbnailLoad { id: String, message: String },

    #[error("{id}: failed to load full image: {message}")]
    FullImageLoad { id: String, message: String },

    #[error("{id}: no image source: {message}")]
    NoSource { id: String, message: String },

    #[error("{id}: could not create decoder: {message}")]
    DecoderInit { id: String, message: String },

    #[error("{id}: decode failed: {message}")]
    Decode { id: String, message: String },

    #[error("{id}: could not materialize image: {message}")]
    ImageMaterialization { id: String, message: String },

    #[error("{id}: {operation} loading is not allowed by the thumbnail scheme")]
    SchemeForbids { id: String, operation: Operation },

    #[error("{id}: metadata has no pixel dimensions")]
    MetadataAbsent { id: String },

    #[error("{id}: color space conversion failed: {message}")]
    ColorSpaceConversion { id: String, message: String },

    #[error("{id}: {operation} loading was cancelled")]
    Cancelled { id: String, operation: Operation },
}

impl LoadError {
    /// Wrap a backend error raised while performing `operation`.
    pub fn from_decode(operation: Operation, id: &str, err: DecodeError) -> Self {
        let id = id.to_string();
        let message = err.to_string();
        match err {
            DecodeError::NoSource(_) => LoadError::NoSource { id, message },
            DecodeError::InvalidFormat | DecodeError::UnsupportedCamera(_) => {
                LoadError::DecoderInit { id, message }
            }
            DecodeError::CorruptedFile(_) => LoadError::Decode { id, message },
            DecodeError::Materialization(_) => LoadError::ImageMaterialization { id, message },
            DecodeError::ColorConversion(_) => LoadError::ColorSpaceConversion { id, message },
            _ => match operation {
                Operation::Metadata => LoadError::MetadataExtraction { id, message },
                Operation::Thumbnail => LoadError::ThumbnailLoad { id, message },
                Operation::FullImage | Operation::EditableImage => {
                    LoadError::FullImageLoad { id, message }
                }
            },
        }
    }

    pub fn from_policy(operation: Operation, id: &str, err: PolicyError) -> Self {
        match err {
            PolicyError::Forbidden(_) => LoadError::SchemeForbids {
                id: id.to_string(),
                operation,
            },
        }
    }

    pub fn cancelled(operation: Operation, id: &str) -> Self {
        LoadError::Cancelled {
            id: id.to_string(),
            operation,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled { .. })
    }

    /// Identity of the image this error concerns.
    pub fn id(&self) -> &str {
        match self {
            LoadError::MetadataExtraction { id, .. }
            | LoadError::ThumbnailLoad { id, .. }
            | LoadError::FullImageLoad { id, .. }
            | LoadError::NoSource { id, .. }
            | LoadError::DecoderInit { id, .. }
            | LoadError::Decode { id, .. }
            | LoadError::ImageMaterialization { id, .. }
            | LoadError::SchemeForbids { id, .. }
            | LoadError::MetadataAbsent { id }
            | LoadError::ColorSpaceConversion { id, .. }
            | LoadError::Cancelled { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ThumbnailScheme;

    #[test]
    fn test_decode_error_mapping() {
        let id = "DSC01234.ARW";

        assert!(matches!(
            LoadError::from_decode(Operation::Thumbnail, id, DecodeError::NoSource("gone".into())),
            LoadError::NoSource { .. }
        ));
        assert!(matches!(
            LoadError::from_decode(Operation::FullImage, id, DecodeError::InvalidFormat),
            LoadError::DecoderInit { .. }
        ));
        assert!(matches!(
            LoadError::from_decode(
                Operation::FullImage,
                id,
                DecodeError::UnsupportedCamera("Foo".into())
            ),
            LoadError::DecoderInit { .. }
        ));
        assert!(matches!(
            LoadError::from_decode(
                Operation::Thumbnail,
                id,
                DecodeError::Materialization("zero size".into())
            ),
            LoadError::ImageMaterialization { .. }
        ));
        assert!(matches!(
            LoadError::from_decode(
                Operation::FullImage,
                id,
                DecodeError::ColorConversion("bad".into())
            ),
            LoadError::ColorSpaceConversion { .. }
        ));
    }

    #[test]
    fn test_corrupted_data_is_decode_error() {
        assert!(matches!(
            LoadError::from_decode(Operation::FullImage, "a", DecodeError::CorruptedFile("eof".into())),
            LoadError::Decode { .. }
        ));
    }

    #[test]
    fn test_generic_errors_follow_operation() {
        let err = || DecodeError::IoError("permission denied".into());

        assert!(matches!(
            LoadError::from_decode(Operation::Metadata, "a", err()),
            LoadError::MetadataExtraction { .. }
        ));
        assert!(matches!(
            LoadError::from_decode(Operation::Thumbnail, "a", err()),
            LoadError::ThumbnailLoad { .. }
        ));
        assert!(matches!(
            LoadError::from_decode(Operation::EditableImage, "a", err()),
            LoadError::FullImageLoad { .. }
        ));
    }

    #[test]
    fn test_error_carries_identity() {
        let err = LoadError::from_decode(Operation::Thumbnail, "IMG_0001.CR2", DecodeError::NoThumbnail);
        assert_eq!(err.id(), "IMG_0001.CR2");
        assert_eq!(
            err.to_string(),
            "IMG_0001.CR2: failed to load thumbnail: No embedded thumbnail found"
        );
    }

    #[test]
    fn test_policy_error_names_operation() {
        let err = LoadError::from_policy(
            Operation::Thumbnail,
            "a.nef",
            PolicyError::Forbidden(ThumbnailScheme::Never),
        );
        assert_eq!(
            err.to_string(),
            "a.nef: thumbnail loading is not allowed by the thumbnail scheme"
        );
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled() {
        let err = LoadError::cancelled(Operation::FullImage, "a.dng");
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "a.dng: full image loading was cancelled");
    }
}
