//! Thumbnail selection policy.
//!
//! A [`ThumbnailScheme`] decides which representation the backend is first
//! asked for and whether the thumbnail it produced is good enough, or a
//! full-image decode is needed instead.
//!
//! | scheme                          | first request          | on result                                  |
//! |---------------------------------|------------------------|--------------------------------------------|
//! | `Never`                         | forbidden              | forbidden                                  |
//! | `AlwaysDecodeFullImage`         | full image             | full image                                 |
//! | `FullImageIfThumbnailMissing`   | embedded, else full    | accept if present                          |
//! | `FullImageIfThumbnailTooSmall`  | embedded only          | accept if present and large enough         |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Size;

/// Policy for producing thumbnails, fixed when a loader is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThumbnailScheme {
    /// Thumbnail loading is disabled.
    Never,
    /// Ignore embedded thumbnails and always render from the full image.
    AlwaysDecodeFullImage,
    /// Use the embedded thumbnail unless it is smaller than requested.
    #[default]
    FullImageIfThumbnailTooSmall,
    /// Use the embedded thumbnail whenever one exists.
    FullImageIfThumbnailMissing,
}

/// Which representation a thumbnail decode should draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbnailSource {
    /// Only an embedded thumbnail; no thumbnail is not an error.
    EmbeddedOnly,
    /// The embedded thumbnail, or the full image when there is none.
    FullImageIfAbsent,
    /// Always render from the full image.
    FullImage,
}

/// Outcome of evaluating a candidate thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailDecision {
    Accept,
    DecodeFullImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("thumbnail loading is disabled by the {0:?} scheme")]
    Forbidden(ThumbnailScheme),
}

impl ThumbnailScheme {
    /// Source for the first backend request.
    pub fn initial_source(self) -> Result<ThumbnailSource, PolicyError> {
        match self {
            ThumbnailScheme::Never => Err(PolicyError::Forbidden(self)),
            ThumbnailScheme::AlwaysDecodeFullImage => Ok(ThumbnailSource::FullImage),
            ThumbnailScheme::FullImageIfThumbnailMissing => Ok(ThumbnailSource::FullImageIfAbsent),
            ThumbnailScheme::FullImageIfThumbnailTooSmall => Ok(ThumbnailSource::EmbeddedOnly),
        }
    }

    /// Decide whether `candidate` (the size of the thumbnail the backend
    /// returned, if any) satisfies `target`.
    ///
    /// A `None` target means no size limit, which an embedded thumbnail can
    /// never be sufficient for under `FullImageIfThumbnailTooSmall`.
    pub fn evaluate(
        self,
        candidate: Option<Size>,
        target: Option<Size>,
        minimum_ratio: f64,
    ) -> Result<ThumbnailDecision, PolicyError> {
        let decision = match self {
            ThumbnailScheme::Never => return Err(PolicyError::Forbidden(self)),
            ThumbnailScheme::AlwaysDecodeFullImage => ThumbnailDecision::DecodeFullImage,
            ThumbnailScheme::FullImageIfThumbnailMissing => match candidate {
                Some(_) => ThumbnailDecision::Accept,
                None => ThumbnailDecision::DecodeFullImage,
            },
            ThumbnailScheme::FullImageIfThumbnailTooSmall => {
                let target = target.unwrap_or(Size::UNCONSTRAINED);
                match candidate {
                    Some(size) if size.is_sufficient_to_fulfill(target, minimum_ratio) => {
                        ThumbnailDecision::Accept
                    }
                    _ => ThumbnailDecision::DecodeFullImage,
                }
            }
        };
        Ok(decision)
    }

    /// True when a failed first decode should be retried from the full image.
    pub fn retries_on_failure(self) -> bool {
        self == ThumbnailScheme::FullImageIfThumbnailTooSmall
    }
}
