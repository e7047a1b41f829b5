//! Production [`ImageBackend`] built on `rawloader`, `image` and
//! `kamadak-exif`.
//!
//! - Metadata comes from EXIF, with pixel dimensions from the image header
//!   (baked formats) or the TIFF IFDs (RAW) when EXIF lacks them. The RAW
//!   sensor data is only decoded when neither has them.
//! - Thumbnails are the embedded JPEG preview (RAW) or EXIF thumbnail
//!   (baked), falling back to a render of the full image when allowed.
//! - Full decodes develop RAW sensor data at half size, or linearize baked
//!   images, then apply the decode tunables.

use std::io::Cursor;
use std::sync::Arc;

use exif::{Exif, In, Reader, Tag, Value};
use log::{debug, warn};

use crate::backend::{ImageBackend, ImageSource, RawDecodeOptions, ThumbnailOptions, ThumbnailSource};
use crate::color::{ColorSpace, RenderContextCache};
use crate::decode::{
    apply_exposure, decode_image, decode_image_linear, develop_raw, extract_embedded_preview,
    extract_exif_thumbnail, header_dimensions, orient_image, orient_linear, raw_dimensions,
    read_orientation, reduce_noise, resize_to_fit, scale_linear, sensor_dimensions, DecodeError,
    DecodedImage, FilterType, LinearImage,
};
use crate::format::ImageFormatKind;
use crate::metadata::{normalize_exif_datetime, ImageMetadata, Orientation};

/// Decode backend using the crates linked into this library.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    filter: FilterType,
    contexts: Arc<RenderContextCache>,
}

impl NativeBackend {
    /// `contexts` renders thumbnails developed from RAW data. Pass the cache
    /// the loaders use so each color space is set up once.
    pub fn new(contexts: Arc<RenderContextCache>) -> Self {
        Self {
            filter: FilterType::default(),
            contexts,
        }
    }

    /// Resampling filter used for thumbnails and scaled decodes.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn render_contexts(&self) -> &Arc<RenderContextCache> {
        &self.contexts
    }

    fn fit(&self, image: DecodedImage, max_pixel_size: Option<u32>) -> Result<DecodedImage, DecodeError> {
        match max_pixel_size {
            Some(max_edge) => resize_to_fit(&image, max_edge, self.filter),
            None => Ok(image),
        }
    }

    /// The container's embedded JPEG, if it has one.
    ///
    /// A corrupted container is an error whatever the thumbnail source, so a
    /// broken file is not rendered from the full image.
    fn embedded_jpeg(&self, bytes: &[u8], kind: ImageFormatKind) -> Result<Option<Vec<u8>>, DecodeError> {
        let extracted = match kind {
            ImageFormatKind::Raw => extract_embedded_preview(bytes),
            ImageFormatKind::Baked => extract_exif_thumbnail(bytes),
        };

        match extracted {
            Ok(jpeg) => Ok(Some(jpeg)),
            Err(DecodeError::NoThumbnail | DecodeError::InvalidFormat | DecodeError::ExifError(_)) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Decode an embedded JPEG, oriented by its container's EXIF data.
    fn decode_embedded(
        &self,
        container: &[u8],
        jpeg: &[u8],
        options: &ThumbnailOptions,
    ) -> Result<DecodedImage, DecodeError> {
        let image = decode_image(jpeg, false)?;
        let image = if options.apply_orientation {
            orient_image(image, read_orientation(container))?
        } else {
            image
        };
        self.fit(image, options.max_pixel_size)
    }

    /// Thumbnail rendered from the full image.
    fn render_thumbnail(
        &self,
        bytes: &[u8],
        kind: ImageFormatKind,
        options: &ThumbnailOptions,
    ) -> Result<DecodedImage, DecodeError> {
        match kind {
            ImageFormatKind::Baked => {
                let image = decode_image(bytes, options.apply_orientation)?;
                self.fit(image, options.max_pixel_size)
            }
            ImageFormatKind::Raw => {
                let mut linear = develop_raw(bytes)?;
                if let Some(max_edge) = options.max_pixel_size {
                    let longest = linear.width.max(linear.height) as f64;
                    linear = scale_linear(&linear, max_edge as f64 / longest, self.filter)?;
                }
                if options.apply_orientation {
                    linear = orient_linear(linear, read_orientation(bytes))?;
                }
                let image = self
                    .contexts
                    .with_context(ColorSpace::Srgb, |ctx| ctx.render(&linear))?;
                // Rounding in the linear scale can leave one pixel too many
                self.fit(image, options.max_pixel_size)
            }
        }
    }
}

/// RAW pixel dimensions from the TIFF IFDs, decoding the sensor data only
/// when the container is not TIFF-based or its IFDs carry no size.
fn raw_pixel_dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
    match raw_dimensions(bytes) {
        Ok(Some(dimensions)) => return Ok(dimensions),
        Ok(None) => {}
        Err(e) => debug!("No readable TIFF headers: {}", e),
    }
    sensor_dimensions(bytes)
}

/// First ASCII value of a primary-IFD field, trimmed.
fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|b| String::from_utf8_lossy(b).trim_end_matches('\0').trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn uint_field(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

fn rational_field(exif: &Exif, tag: Tag) -> Option<exif::Rational> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(values) => values.first().copied().filter(|r| r.denom != 0),
        _ => None,
    }
}

/// "1/250" for fractions of a second, "2.5" for longer exposures.
fn format_exposure_time(r: exif::Rational) -> Option<String> {
    if r.num == 0 || r.denom == 0 {
        return None;
    }
    if r.denom > r.num {
        Some(format!("1/{}", (r.denom as f64 / r.num as f64).round()))
    } else {
        Some(format!("{}", r.to_f64()))
    }
}

/// Capture details from EXIF. Missing or unreadable EXIF gives defaults.
fn read_exif_metadata(bytes: &[u8]) -> ImageMetadata {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No readable EXIF data: {}", e);
            return ImageMetadata::default();
        }
    };

    let captured_at = ascii_field(&exif, Tag::DateTimeOriginal)
        .or_else(|| ascii_field(&exif, Tag::DateTime))
        .and_then(|raw| normalize_exif_datetime(&raw));

    ImageMetadata {
        width: uint_field(&exif, Tag::PixelXDimension).unwrap_or(0),
        height: uint_field(&exif, Tag::PixelYDimension).unwrap_or(0),
        orientation: uint_field(&exif, Tag::Orientation)
            .map(Orientation::from)
            .unwrap_or_default(),
        captured_at,
        camera_make: ascii_field(&exif, Tag::Make),
        camera_model: ascii_field(&exif, Tag::Model),
        iso: uint_field(&exif, Tag::PhotographicSensitivity),
        exposure_time: rational_field(&exif, Tag::ExposureTime).and_then(format_exposure_time),
        aperture: rational_field(&exif, Tag::FNumber).map(|r| r.to_f64() as f32),
        focal_length: rational_field(&exif, Tag::FocalLength).map(|r| r.to_f64() as f32),
    }
}

impl ImageBackend for NativeBackend {
    fn read_metadata(&self, source: &ImageSource) -> Result<ImageMetadata, DecodeError> {
        let bytes = source.read_bytes()?;
        let mut metadata = read_exif_metadata(&bytes);

        match source.format_kind(&bytes) {
            ImageFormatKind::Baked => {
                // The header is authoritative; EXIF sizes go stale after edits
                let (width, height) = header_dimensions(&bytes)?;
                metadata.width = width;
                metadata.height = height;
            }
            ImageFormatKind::Raw if !metadata.has_dimensions() => {
                match raw_pixel_dimensions(&bytes) {
                    Ok((width, height)) => {
                        metadata.width = width;
                        metadata.height = height;
                    }
                    Err(e) => debug!("No pixel dimensions for {}: {}", source.identity(), e),
                }
            }
            ImageFormatKind::Raw => {}
        }

        Ok(metadata)
    }

    fn decode_thumbnail(
        &self,
        source: &ImageSource,
        options: &ThumbnailOptions,
    ) -> Result<Option<DecodedImage>, DecodeError> {
        let bytes = source.read_bytes()?;
        let kind = source.format_kind(&bytes);

        if options.source != ThumbnailSource::FullImage {
            if let Some(jpeg) = self.embedded_jpeg(&bytes, kind)? {
                debug!("Using embedded thumbnail of {}", source.identity());
                return self.decode_embedded(&bytes, &jpeg, options).map(Some);
            }
            if options.source == ThumbnailSource::EmbeddedOnly {
                return Ok(None);
            }
        }

        debug!("Rendering thumbnail of {} from the full image", source.identity());
        self.render_thumbnail(&bytes, kind, options).map(Some)
    }

    fn decode_full_image(
        &self,
        source: &ImageSource,
        options: &RawDecodeOptions,
    ) -> Result<LinearImage, DecodeError> {
        let bytes = source.read_bytes()?;

        if options.lens_correction {
            warn!("Lens correction is not available, ignoring it for {}", source.identity());
        }

        let mut image = match source.format_kind(&bytes) {
            ImageFormatKind::Raw => orient_linear(develop_raw(&bytes)?, read_orientation(&bytes))?,
            ImageFormatKind::Baked => decode_image_linear(&bytes, true)?,
        };

        if options.draft_mode {
            image = scale_linear(&image, 0.5, FilterType::Bilinear)?;
        }
        if options.scale_factor != 1.0 {
            image = scale_linear(&image, options.scale_factor, self.filter)?;
        }

        image = reduce_noise(
            &image,
            options.luminance_noise_reduction,
            options.color_noise_reduction,
        )?;
        apply_exposure(&mut image, options.exposure_bias);

        Ok(image)
    }
}
