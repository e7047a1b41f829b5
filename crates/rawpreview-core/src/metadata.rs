//! Image metadata model.
//!
//! [`ImageMetadata`] is produced once per image by the backend's metadata
//! step and never mutated afterwards. Everything the policy layer needs
//! (oriented size, aspect ratio, [`Shape`]) is derived from it.

use serde::{Deserialize, Serialize};

use crate::geometry::{aspect_ratio, Size};

/// How stored pixels map to the upright image, as the EXIF Orientation tag
/// (0x0112) encodes it. Unknown tag values read as [`Orientation::Normal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    #[default]
    Normal = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    /// Mirror across the top-left to bottom-right diagonal.
    Transpose = 5,
    Rotate90CW = 6,
    /// Mirror across the top-right to bottom-left diagonal.
    Transverse = 7,
    Rotate270CW = 8,
}

impl Orientation {
    /// Quarter-turn orientations, whose upright image has width and height
    /// exchanged.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90CW
                | Orientation::Transverse
                | Orientation::Rotate270CW
        )
    }
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Classification of an image's native aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Landscape,
    Portrait,
    Square,
}

impl Shape {
    pub fn classify(width: u32, height: u32) -> Self {
        use std::cmp::Ordering;

        match width.cmp(&height) {
            Ordering::Greater => Shape::Landscape,
            Ordering::Less => Shape::Portrait,
            Ordering::Equal => Shape::Square,
        }
    }
}

/// Dimensions, orientation and capture details of one image file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Stored width; zero when unknown.
    pub width: u32,
    /// Stored height; zero when unknown.
    pub height: u32,
    pub orientation: Orientation,
    /// Capture time, `YYYY-MM-DDTHH:MM:SS` as recorded by the camera.
    pub captured_at: Option<String>,
    /// Camera make (e.g., "Sony").
    pub camera_make: Option<String>,
    /// Camera model (e.g., "ILCE-6600").
    pub camera_model: Option<String>,
    /// ISO sensitivity.
    pub iso: Option<u32>,
    /// Exposure time as a string (e.g., "1/250").
    pub exposure_time: Option<String>,
    /// Aperture as f-number (e.g., 2.8).
    pub aperture: Option<f32>,
    /// Focal length in mm.
    pub focal_length: Option<f32>,
}

impl ImageMetadata {
    /// Metadata carrying only pixel dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Width and height of the upright image.
    pub fn oriented_dimensions(&self) -> (u32, u32) {
        if self.orientation.swaps_dimensions() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Oriented size as a [`Size`].
    pub fn size(&self) -> Size {
        self.oriented_dimensions().into()
    }

    /// Aspect ratio of the oriented image.
    pub fn aspect_ratio(&self) -> f64 {
        let (w, h) = self.oriented_dimensions();
        aspect_ratio(w as f64, h as f64)
    }

    /// Shape of the oriented image.
    pub fn shape(&self) -> Shape {
        let (w, h) = self.oriented_dimensions();
        Shape::classify(w, h)
    }

    /// True when the backend reported usable pixel dimensions.
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Normalize an EXIF `DateTime` value ("2024:05:17 14:03:22") to
/// `2024-05-17T14:03:22`.
///
/// Returns `None` unless the value has exactly the EXIF layout with
/// in-range fields. The all-zero placeholder some cameras write is
/// rejected too.
pub fn normalize_exif_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_matches('"').trim();
    // from_ascii ignores anything past the 19th byte
    if raw.len() != 19 {
        return None;
    }

    let dt = exif::DateTime::from_ascii(raw.as_bytes()).ok()?;
    let in_range = dt.year > 0
        && (1..=12).contains(&dt.month)
        && (1..=31).contains(&dt.day)
        && dt.hour < 24
        && dt.minute < 60
        && dt.second < 60;
    if !in_range {
        return None;
    }

    Some(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
    ))
}
