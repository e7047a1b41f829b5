//! Loader façade.
//!
//! An [`ImageLoader`] owns one logical image. It fetches metadata once,
//! asks the [`ThumbnailScheme`] what to decode, runs the backend, falls back
//! to the full image when the policy says so, strips letterboxing and keeps
//! the most recent results for reuse.
//!
//! # Cancellation
//!
//! Every load takes a `cancel` predicate. It is polled before metadata I/O,
//! before each thumbnail decode (including the fallback), before the full
//! decode, before color conversion and before cropping. When it returns
//! `true` the load fails with [`LoadError::Cancelled`] and no further
//! backend call is made.

use std::sync::Arc;

use log::{debug, warn};

use crate::backend::{ImageBackend, ImageSource, RawDecodeOptions, ThumbnailOptions, ThumbnailSource};
use crate::color::RenderContextCache;
use crate::config::{ConfigError, FullImageOptions, LoaderOptions};
use crate::crop::remove_letterboxing;
use crate::decode::{DecodeError, DecodedImage, LinearImage};
use crate::error::{LoadError, Operation};
use crate::geometry::Size;
use crate::metadata::{ImageMetadata, Orientation};
use crate::policy::ThumbnailDecision;

/// Cooperative cancellation predicate; `true` means stop.
pub type CancelCheck<'a> = &'a dyn Fn() -> bool;

/// Lifecycle of a loader's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// Nothing fetched yet.
    Initialized,
    /// Metadata I/O in progress.
    Loading,
    /// Metadata is cached.
    Completed,
    /// Metadata extraction failed; the failure is cached.
    Failed,
}

/// What thumbnail to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailRequest {
    /// Bounding size; `None` means no limit.
    pub max_size: Option<Size>,
    /// Strip letterboxing when the thumbnail's proportions disagree with
    /// the image's.
    pub allow_cropping: bool,
}

impl Default for ThumbnailRequest {
    fn default() -> Self {
        Self {
            max_size: None,
            allow_cropping: true,
        }
    }
}

impl ThumbnailRequest {
    pub fn with_max_size(max_size: Size) -> Self {
        Self {
            max_size: Some(max_size),
            ..Default::default()
        }
    }
}

/// A display-ready image and the metadata of the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub image: Arc<DecodedImage>,
    pub metadata: ImageMetadata,
}

/// A scene-linear image, before color conversion, and its metadata.
#[derive(Debug, Clone)]
pub struct LoadedEditableImage {
    pub image: Arc<LinearImage>,
    pub metadata: ImageMetadata,
}

/// Capability interface for loading one image.
pub trait ImageLoader {
    /// Fetch metadata. After the first attempt the outcome is cached, failure
    /// included, until `force_reload` is set.
    fn load_metadata(&mut self, force_reload: bool) -> Result<ImageMetadata, LoadError>;

    fn load_thumbnail(
        &mut self,
        request: &ThumbnailRequest,
        cancel: CancelCheck<'_>,
    ) -> Result<LoadedImage, LoadError>;

    /// Decode and color-convert the full image.
    fn load_full_image(
        &mut self,
        options: &FullImageOptions,
        cancel: CancelCheck<'_>,
    ) -> Result<LoadedImage, LoadError>;

    /// Decode the full image, stopping before color conversion.
    fn load_editable_image(
        &mut self,
        options: &FullImageOptions,
        cancel: CancelCheck<'_>,
    ) -> Result<LoadedEditableImage, LoadError>;
}

/// [`ImageLoader`] over any [`ImageBackend`].
pub struct RawImageLoader<B: ImageBackend> {
    source: ImageSource,
    id: String,
    backend: Arc<B>,
    contexts: Arc<RenderContextCache>,
    options: LoaderOptions,
    state: LoaderState,
    metadata: Option<Result<ImageMetadata, LoadError>>,
    thumbnail: Option<(ThumbnailRequest, Arc<DecodedImage>)>,
    full_image: Option<(FullImageOptions, Arc<DecodedImage>)>,
    editable_image: Option<(RawDecodeOptions, Arc<LinearImage>)>,
}

impl<B: ImageBackend> RawImageLoader<B> {
    pub fn new(
        source: ImageSource,
        backend: Arc<B>,
        contexts: Arc<RenderContextCache>,
        options: LoaderOptions,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        let id = source.identity();

        Ok(Self {
            source,
            id,
            backend,
            contexts,
            options,
            state: LoaderState::Initialized,
            metadata: None,
            thumbnail: None,
            full_image: None,
            editable_image: None,
        })
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Identity of the image, as used in errors.
    pub fn identity(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    fn check_cancelled(&self, cancel: CancelCheck<'_>, operation: Operation) -> Result<(), LoadError> {
        if cancel() {
            debug!("Cancelled {} load of {}", operation, self.id);
            return Err(LoadError::cancelled(operation, &self.id));
        }
        Ok(())
    }

    fn decode_err(&self, operation: Operation) -> impl Fn(DecodeError) -> LoadError + '_ {
        move |e| LoadError::from_decode(operation, &self.id, e)
    }

    fn reset(&mut self) {
        self.state = LoaderState::Initialized;
        self.metadata = None;
        self.thumbnail = None;
        self.full_image = None;
        self.editable_image = None;
    }

    fn metadata_for(
        &mut self,
        force_reload: bool,
        cancel: CancelCheck<'_>,
        operation: Operation,
    ) -> Result<ImageMetadata, LoadError> {
        if force_reload {
            self.reset();
        }
        if let Some(result) = &self.metadata {
            return result.clone();
        }

        self.check_cancelled(cancel, operation)?;
        self.state = LoaderState::Loading;

        let result = self
            .backend
            .read_metadata(&self.source)
            .map_err(self.decode_err(Operation::Metadata))
            .and_then(|metadata| {
                if metadata.has_dimensions() {
                    Ok(metadata)
                } else {
                    Err(LoadError::MetadataAbsent {
                        id: self.id.clone(),
                    })
                }
            });

        match &result {
            Ok(metadata) => {
                debug!(
                    "Metadata for {}: {}x{} {:?}",
                    self.id, metadata.width, metadata.height, metadata.orientation
                );
                self.state = LoaderState::Completed;
            }
            Err(e) => {
                warn!("{}", e);
                self.state = LoaderState::Failed;
            }
        }

        self.metadata = Some(result.clone());
        result
    }

    /// Run the scheme against the backend and return the uncropped thumbnail.
    fn decode_thumbnail(
        &self,
        request: &ThumbnailRequest,
        metadata: &ImageMetadata,
        cancel: CancelCheck<'_>,
    ) -> Result<DecodedImage, LoadError> {
        let operation = Operation::Thumbnail;
        let scheme = self.options.scheme;
        let source = scheme
            .initial_source()
            .map_err(|e| LoadError::from_policy(operation, &self.id, e))?;

        let target = request.max_size.unwrap_or(Size::UNCONSTRAINED);
        let options = ThumbnailOptions {
            source,
            max_pixel_size: target.max_pixel_dimension(metadata.size()),
            apply_orientation: self.options.apply_orientation,
        };

        self.check_cancelled(cancel, operation)?;
        let candidate = match self.backend.decode_thumbnail(&self.source, &options) {
            Ok(candidate) => candidate,
            Err(e) if scheme.retries_on_failure() => {
                debug!("Embedded thumbnail of {} failed: {}", self.id, e);
                None
            }
            Err(e) => return Err(self.decode_err(operation)(e)),
        };

        let accepted = if source == ThumbnailSource::FullImage {
            candidate
        } else {
            let decision = scheme
                .evaluate(
                    candidate.as_ref().map(DecodedImage::size),
                    request.max_size,
                    self.options.minimum_ratio,
                )
                .map_err(|e| LoadError::from_policy(operation, &self.id, e))?;

            match decision {
                ThumbnailDecision::Accept => candidate,
                ThumbnailDecision::DecodeFullImage => {
                    debug!(
                        "Thumbnail of {} missing or too small, rendering from the full image",
                        self.id
                    );
                    self.check_cancelled(cancel, operation)?;
                    let retry = ThumbnailOptions {
                        source: ThumbnailSource::FullImage,
                        ..options
                    };
                    self.backend
                        .decode_thumbnail(&self.source, &retry)
                        .map_err(self.decode_err(operation))?
                }
            }
        };

        accepted.ok_or_else(|| LoadError::ThumbnailLoad {
            id: self.id.clone(),
            message: "backend produced no thumbnail".to_string(),
        })
    }

    /// Full decode, served from the cache when the options match.
    fn editable(
        &mut self,
        decode: &RawDecodeOptions,
        cancel: CancelCheck<'_>,
        operation: Operation,
    ) -> Result<Arc<LinearImage>, LoadError> {
        if let Some((cached, image)) = &self.editable_image {
            if cached == decode {
                return Ok(Arc::clone(image));
            }
        }

        self.check_cancelled(cancel, operation)?;
        let image = self
            .backend
            .decode_full_image(&self.source, decode)
            .map_err(self.decode_err(operation))?;
        if image.is_empty() {
            return Err(LoadError::ImageMaterialization {
                id: self.id.clone(),
                message: "full decode produced an empty image".to_string(),
            });
        }

        let image = Arc::new(image);
        self.editable_image = Some((*decode, Arc::clone(&image)));
        Ok(image)
    }

    fn validate(&self, options: &FullImageOptions, operation: Operation) -> Result<(), LoadError> {
        options.validate().map_err(|e| LoadError::FullImageLoad {
            id: self.id.clone(),
            message: format!("invalid {} options: {}", operation, e),
        })
    }
}

impl<B: ImageBackend> ImageLoader for RawImageLoader<B> {
    fn load_metadata(&mut self, force_reload: bool) -> Result<ImageMetadata, LoadError> {
        self.metadata_for(force_reload, &|| false, Operation::Metadata)
    }

    fn load_thumbnail(
        &mut self,
        request: &ThumbnailRequest,
        cancel: CancelCheck<'_>,
    ) -> Result<LoadedImage, LoadError> {
        // Checked up front so a forbidden load touches nothing
        self.options
            .scheme
            .initial_source()
            .map_err(|e| LoadError::from_policy(Operation::Thumbnail, &self.id, e))?;

        let metadata = self.metadata_for(false, cancel, Operation::Thumbnail)?;

        if let Some((cached, image)) = &self.thumbnail {
            if cached == request {
                return Ok(LoadedImage {
                    image: Arc::clone(image),
                    metadata,
                });
            }
        }

        let image = self.decode_thumbnail(request, &metadata, cancel)?;

        let image = if request.allow_cropping {
            self.check_cancelled(cancel, Operation::Thumbnail)?;
            // An unoriented thumbnail is compared against unoriented proportions
            let reference = if self.options.apply_orientation {
                metadata.clone()
            } else {
                ImageMetadata {
                    orientation: Orientation::Normal,
                    ..metadata.clone()
                }
            };
            remove_letterboxing(image, &reference, self.options.aspect_ratio_tolerance)
        } else {
            image
        };

        let image = Arc::new(image);
        self.thumbnail = Some((request.clone(), Arc::clone(&image)));
        Ok(LoadedImage { image, metadata })
    }

    fn load_full_image(
        &mut self,
        options: &FullImageOptions,
        cancel: CancelCheck<'_>,
    ) -> Result<LoadedImage, LoadError> {
        let operation = Operation::FullImage;
        self.validate(options, operation)?;
        let metadata = self.metadata_for(false, cancel, operation)?;

        if let Some((cached, image)) = &self.full_image {
            if cached == options {
                return Ok(LoadedImage {
                    image: Arc::clone(image),
                    metadata,
                });
            }
        }

        let linear = self.editable(&options.decode, cancel, operation)?;

        self.check_cancelled(cancel, operation)?;
        let backend = &self.backend;
        let image = self
            .contexts
            .with_context(options.color_space, |ctx| backend.convert_color_space(&linear, ctx))
            .map_err(self.decode_err(operation))?;

        let image = Arc::new(image);
        self.full_image = Some((*options, Arc::clone(&image)));
        Ok(LoadedImage { image, metadata })
    }

    fn load_editable_image(
        &mut self,
        options: &FullImageOptions,
        cancel: CancelCheck<'_>,
    ) -> Result<LoadedEditableImage, LoadError> {
        let operation = Operation::EditableImage;
        self.validate(options, operation)?;
        let metadata = self.metadata_for(false, cancel, operation)?;
        let image = self.editable(&options.decode, cancel, operation)?;

        Ok(LoadedEditableImage { image, metadata })
    }
}
