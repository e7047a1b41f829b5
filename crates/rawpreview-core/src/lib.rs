//! RawPreview Core - thumbnail and preview loading for photo libraries
//!
//! This crate decides how a preview of a RAW or baked image is produced:
//! trust the embedded thumbnail, or pay for a decode of the full image.
//! The decision is made by a [`ThumbnailScheme`], executed by a loader
//! ([`RawImageLoader`]) against a decode backend ([`ImageBackend`]).
//!
//! - [`geometry`] and [`metadata`]: sizes, orientation, aspect ratios
//! - [`policy`]: the thumbnail scheme and its decisions
//! - [`crop`]: letterbox removal for mis-proportioned thumbnails
//! - [`loader`]: the loader façade with caching and cancellation
//! - [`backend`] and [`native`]: the backend trait and its production
//!   implementation
//! - [`decode`] and [`color`]: decoding and rendering primitives

pub mod backend;
pub mod color;
pub mod config;
pub mod crop;
pub mod decode;
pub mod error;
pub mod format;
pub mod geometry;
pub mod loader;
pub mod metadata;
pub mod native;
pub mod policy;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use backend::{ImageBackend, ImageSource, RawDecodeOptions, ThumbnailOptions};
pub use color::{ColorSpace, RenderContext, RenderContextCache};
pub use config::{ConfigError, FullImageOptions, LoaderOptions};
pub use crop::{letterbox_crop, remove_letterboxing, CropRect, DEFAULT_ASPECT_RATIO_TOLERANCE};
pub use decode::{DecodeError, DecodedImage, LinearImage};
pub use error::{LoadError, Operation};
pub use geometry::Size;
pub use loader::{
    CancelCheck, ImageLoader, LoadedEditableImage, LoadedImage, LoaderState, RawImageLoader,
    ThumbnailRequest,
};
pub use metadata::{ImageMetadata, Orientation, Shape};
pub use native::NativeBackend;
pub use policy::{ThumbnailDecision, ThumbnailScheme, ThumbnailSource};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{encode_jpeg, jpeg_with_exif};
    use std::sync::Arc;

    fn native_loader(name: &str, bytes: Vec<u8>, scheme: ThumbnailScheme) -> RawImageLoader<NativeBackend> {
        let contexts = Arc::new(RenderContextCache::new());
        let backend = NativeBackend::new(Arc::clone(&contexts));
        RawImageLoader::new(
            ImageSource::memory(name, bytes),
            Arc::new(backend),
            contexts,
            LoaderOptions::with_scheme(scheme),
        )
        .unwrap()
    }

    #[test]
    fn test_small_exif_thumbnail_is_accepted_for_small_request() {
        let thumb = encode_jpeg(16, 12);
        let mut loader = native_loader(
            "IMG_0100.jpg",
            jpeg_with_exif(64, 48, 1, Some(&thumb)),
            ThumbnailScheme::FullImageIfThumbnailTooSmall,
        );

        let loaded = loader
            .load_thumbnail(&ThumbnailRequest::with_max_size(Size::square(16.0)), &|| false)
            .unwrap();
        assert_eq!((loaded.image.width, loaded.image.height), (16, 12));
        assert_eq!(loaded.metadata.camera_make.as_deref(), Some("Sony"));
    }

    #[test]
    fn test_small_exif_thumbnail_is_replaced_for_large_request() {
        let thumb = encode_jpeg(16, 12);
        let mut loader = native_loader(
            "IMG_0101.jpg",
            jpeg_with_exif(64, 48, 1, Some(&thumb)),
            ThumbnailScheme::FullImageIfThumbnailTooSmall,
        );

        let loaded = loader
            .load_thumbnail(&ThumbnailRequest::with_max_size(Size::square(64.0)), &|| false)
            .unwrap();
        assert_eq!((loaded.image.width, loaded.image.height), (64, 48));
    }

    #[test]
    fn test_if_missing_keeps_small_exif_thumbnail() {
        let thumb = encode_jpeg(16, 12);
        let mut loader = native_loader(
            "IMG_0102.jpg",
            jpeg_with_exif(64, 48, 1, Some(&thumb)),
            ThumbnailScheme::FullImageIfThumbnailMissing,
        );

        let loaded = loader
            .load_thumbnail(&ThumbnailRequest::with_max_size(Size::square(64.0)), &|| false)
            .unwrap();
        assert_eq!((loaded.image.width, loaded.image.height), (16, 12));
    }

    #[test]
    fn test_full_image_of_rotated_jpeg() {
        let mut loader = native_loader(
            "IMG_0103.jpg",
            jpeg_with_exif(64, 48, 6, None),
            ThumbnailScheme::Never,
        );

        let loaded = loader
            .load_full_image(&FullImageOptions::default(), &|| false)
            .unwrap();
        assert_eq!((loaded.image.width, loaded.image.height), (48, 64));
        assert_eq!(loaded.metadata.oriented_dimensions(), (48, 64));
    }
}
