//! Output color spaces and rendering contexts.
//!
//! A full decode produces a scene-linear [`LinearImage`]. Turning it into a
//! display-ready [`DecodedImage`] goes through a [`RenderContext`] for the
//! requested [`ColorSpace`]. Contexts carry a primaries matrix and a
//! transfer-curve lookup table, so they are built once and reused through a
//! [`RenderContextCache`].
//!
//! The cache is an explicit object shared by reference (`Arc`) between
//! loaders. A single mutex guards both lookup and rendering, since a context
//! is not meant for unsynchronized concurrent use.

use std::collections::HashMap;
use std::sync::Mutex;

use cgmath::{Matrix3, SquareMatrix, Vector3};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::decode::{DecodeError, DecodedImage, LinearImage};

/// Entries in the transfer lookup table (plus one for 1.0).
const LUT_SIZE: usize = 4096;

/// Linear sRGB primaries to linear Display P3 primaries (D65).
const SRGB_TO_DISPLAY_P3: [[f32; 3]; 3] = [
    [0.8225, 0.1774, 0.0000],
    [0.0332, 0.9669, 0.0000],
    [0.0171, 0.0724, 0.9108],
];

/// Build a matrix from row-major coefficients; cgmath stores columns.
pub(crate) fn matrix_from_rows(rows: [[f32; 3]; 3]) -> Matrix3<f32> {
    Matrix3::new(
        rows[0][0], rows[1][0], rows[2][0],
        rows[0][1], rows[1][1], rows[2][1],
        rows[0][2], rows[1][2], rows[2][2],
    )
}

/// Color space of a rendered output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    /// sRGB primaries and transfer curve.
    #[default]
    Srgb,
    /// Display P3 primaries with the sRGB transfer curve.
    DisplayP3,
    /// sRGB primaries, linear 8-bit encoding.
    LinearSrgb,
}

impl ColorSpace {
    fn primaries_from_linear_srgb(self) -> Matrix3<f32> {
        match self {
            ColorSpace::Srgb | ColorSpace::LinearSrgb => Matrix3::identity(),
            ColorSpace::DisplayP3 => matrix_from_rows(SRGB_TO_DISPLAY_P3),
        }
    }

    fn encode(self, linear: f32) -> f32 {
        match self {
            ColorSpace::Srgb | ColorSpace::DisplayP3 => linear_to_srgb(linear),
            ColorSpace::LinearSrgb => linear,
        }
    }
}

/// sRGB transfer curve, encoded value to linear light.
pub fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB transfer curve, linear light to encoded value.
pub fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

/// Everything needed to render linear pixels into one output color space.
#[derive(Debug, Clone)]
pub struct RenderContext {
    color_space: ColorSpace,
    matrix: Matrix3<f32>,
    encode_lut: Vec<u8>,
}

impl RenderContext {
    pub fn new(color_space: ColorSpace) -> Self {
        let encode_lut = (0..=LUT_SIZE)
            .map(|i| {
                let linear = i as f32 / LUT_SIZE as f32;
                (color_space.encode(linear) * 255.0).round().clamp(0.0, 255.0) as u8
            })
            .collect();

        Self {
            color_space,
            matrix: color_space.primaries_from_linear_srgb(),
            encode_lut,
        }
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    #[inline]
    fn encode(&self, v: f32) -> u8 {
        let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        self.encode_lut[(v * LUT_SIZE as f32).round() as usize]
    }

    /// Render a linear image into this context's color space.
    pub fn render(&self, image: &LinearImage) -> Result<DecodedImage, DecodeError> {
        let expected = image.width as usize * image.height as usize * 3;
        if image.pixels.len() != expected {
            return Err(DecodeError::ColorConversion(format!(
                "expected {} samples for {}x{}, got {}",
                expected,
                image.width,
                image.height,
                image.pixels.len()
            )));
        }

        let identity = self.matrix == Matrix3::identity();
        let mut pixels = Vec::with_capacity(expected);

        for px in image.pixels.chunks_exact(3) {
            let linear = Vector3::new(px[0], px[1], px[2]);
            let v = if identity { linear } else { self.matrix * linear };
            pixels.push(self.encode(v.x));
            pixels.push(self.encode(v.y));
            pixels.push(self.encode(v.z));
        }

        Ok(DecodedImage::new(image.width, image.height, pixels))
    }
}

/// Process-scoped cache of rendering contexts keyed by color space.
#[derive(Debug, Default)]
pub struct RenderContextCache {
    contexts: Mutex<HashMap<ColorSpace, RenderContext>>,
}

impl RenderContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with the context for `color_space`, building it on first use.
    ///
    /// The cache lock is held while `f` runs.
    pub fn with_context<T>(&self, color_space: ColorSpace, f: impl FnOnce(&RenderContext) -> T) -> T {
        let mut contexts = self
            .contexts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let context = contexts.entry(color_space).or_insert_with(|| {
            debug!("Building render context for {:?}", color_space);
            RenderContext::new(color_space)
        });

        f(context)
    }

    pub fn contains(&self, color_space: ColorSpace) -> bool {
        self.contexts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&color_space)
    }

    pub fn len(&self) -> usize {
        self.contexts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached contexts.
    pub fn clear(&self) {
        self.contexts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
