//! RAW sensor development via `rawloader`.
//!
//! Produces a half-size scene-linear image: every 2x2 CFA block becomes one
//! output pixel, so no interpolation is needed. The pipeline is
//! black/white level normalization, white balance, then the camera to sRGB
//! primaries matrix derived from the camera's `xyz_to_cam` data.

use std::io::Cursor;

use cgmath::{Matrix, Matrix3, SquareMatrix, Vector3};
use log::debug;

use super::types::{DecodeError, LinearImage};
use crate::color::matrix_from_rows;

/// sRGB (linear) to CIE XYZ, D65.
const SRGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.412_456_4, 0.357_576_1, 0.180_437_5],
    [0.212_672_9, 0.715_152_2, 0.072_175_0],
    [0.019_333_9, 0.119_192_0, 0.950_304_1],
];

/// Single-channel sensor samples normalized to 0..1, with one CFA color
/// index (0 = red, 1 = green, 2 = blue) per site. Already cropped to the
/// active area.
#[derive(Debug, Clone)]
pub(crate) struct Mosaic {
    pub width: usize,
    pub height: usize,
    pub samples: Vec<f32>,
    pub colors: Vec<u8>,
}

impl Mosaic {
    fn from_raw(raw: &rawloader::RawImage) -> Result<Self, DecodeError> {
        let [top, right, bottom, left] = raw.crops;
        let width = raw.width.saturating_sub(left + right);
        let height = raw.height.saturating_sub(top + bottom);
        if width < 2 || height < 2 {
            return Err(DecodeError::CorruptedFile(format!(
                "active sensor area {}x{} is too small",
                width, height
            )));
        }

        let mut samples = Vec::with_capacity(width * height);
        let mut colors = Vec::with_capacity(width * height);

        for row in top..top + height {
            for col in left..left + width {
                let color = raw.cfa.color_at(row, col).min(3);
                let index = row * raw.width + col;
                let value = match &raw.data {
                    rawloader::RawImageData::Integer(data) => {
                        let v = *data.get(index).ok_or_else(truncated)? as f32;
                        let black = raw.blacklevels[color] as f32;
                        let white = raw.whitelevels[color] as f32;
                        if white > black {
                            (v - black) / (white - black)
                        } else {
                            0.0
                        }
                    }
                    rawloader::RawImageData::Float(data) => *data.get(index).ok_or_else(truncated)?,
                };
                samples.push(value.clamp(0.0, 1.0));
                // Second green (E) folds into green
                colors.push(if color == 3 { 1 } else { color as u8 });
            }
        }

        Ok(Self {
            width,
            height,
            samples,
            colors,
        })
    }

    /// Collapse each 2x2 block into one RGB pixel.
    ///
    /// A channel missing from a block (non-Bayer layouts) borrows the
    /// block's green average.
    pub fn superpixel(&self) -> LinearImage {
        let out_w = self.width / 2;
        let out_h = self.height / 2;
        let mut pixels = Vec::with_capacity(out_w * out_h * 3);

        for by in 0..out_h {
            for bx in 0..out_w {
                let mut sums = [0.0f32; 3];
                let mut counts = [0u32; 3];
                for dy in 0..2 {
                    for dx in 0..2 {
                        let i = (by * 2 + dy) * self.width + bx * 2 + dx;
                        let c = self.colors[i] as usize;
                        sums[c] += self.samples[i];
                        counts[c] += 1;
                    }
                }

                let green = if counts[1] > 0 {
                    sums[1] / counts[1] as f32
                } else {
                    sums.iter().sum::<f32>() / 4.0
                };
                for c in 0..3 {
                    pixels.push(if counts[c] > 0 {
                        sums[c] / counts[c] as f32
                    } else {
                        green
                    });
                }
            }
        }

        LinearImage::new(out_w as u32, out_h as u32, pixels)
    }
}

fn truncated() -> DecodeError {
    DecodeError::CorruptedFile("sensor data shorter than its dimensions".to_string())
}

/// White balance multipliers normalized to green; neutral when the camera
/// did not record usable coefficients.
pub(crate) fn white_balance(wb_coeffs: [f32; 4]) -> [f32; 3] {
    let [r, g, b, _] = wb_coeffs;
    let usable = |v: f32| v.is_finite() && v > 0.0;
    if !(usable(r) && usable(g) && usable(b)) {
        return [1.0, 1.0, 1.0];
    }
    [r / g, 1.0, b / g]
}

/// Camera RGB to linear sRGB.
///
/// Builds camera-from-sRGB, normalizes each row so white-balanced neutrals
/// stay neutral, then inverts. Falls back to identity when the camera has
/// no usable matrix.
pub(crate) fn camera_to_srgb(xyz_to_cam: &[[f32; 3]; 4]) -> Matrix3<f32> {
    let xyz_to_cam = matrix_from_rows([xyz_to_cam[0], xyz_to_cam[1], xyz_to_cam[2]]);
    let mut cam_from_srgb = xyz_to_cam * matrix_from_rows(SRGB_TO_XYZ);

    for r in 0..3 {
        let row = cam_from_srgb.row(r);
        let sum = row.x + row.y + row.z;
        if !sum.is_finite() || sum.abs() < 1e-6 {
            debug!("Camera matrix has a degenerate row, using identity");
            return Matrix3::identity();
        }
        // cgmath indexes columns first
        for c in 0..3 {
            cam_from_srgb[c][r] /= sum;
        }
    }

    cam_from_srgb.invert().unwrap_or_else(|| {
        debug!("Camera matrix is singular, using identity");
        Matrix3::identity()
    })
}

/// Apply white balance and the color matrix in place.
pub(crate) fn apply_color(image: &mut LinearImage, wb: [f32; 3], matrix: &Matrix3<f32>) {
    let identity = *matrix == Matrix3::identity();
    for px in image.pixels.chunks_exact_mut(3) {
        let balanced = Vector3::new(px[0] * wb[0], px[1] * wb[1], px[2] * wb[2]);
        let out = if identity {
            balanced
        } else {
            let v = *matrix * balanced;
            Vector3::new(v.x.max(0.0), v.y.max(0.0), v.z.max(0.0))
        };
        px.copy_from_slice(&[out.x, out.y, out.z]);
    }
}

fn decode_sensor(bytes: &[u8]) -> Result<rawloader::RawImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::CorruptedFile("empty file".to_string()));
    }

    rawloader::decode(&mut Cursor::new(bytes)).map_err(|e| {
        let message = e.to_string();
        if message.to_ascii_lowercase().contains("camera") {
            DecodeError::UnsupportedCamera(message)
        } else {
            DecodeError::CorruptedFile(message)
        }
    })
}

/// Pixel dimensions of the active sensor area.
pub fn sensor_dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
    let raw = decode_sensor(bytes)?;
    let [top, right, bottom, left] = raw.crops;
    Ok((
        raw.width.saturating_sub(left + right) as u32,
        raw.height.saturating_sub(top + bottom) as u32,
    ))
}

/// Develop RAW sensor data into a half-size, scene-linear sRGB image.
pub fn develop_raw(bytes: &[u8]) -> Result<LinearImage, DecodeError> {
    let raw = decode_sensor(bytes)?;
    debug!(
        "Developing {} {} sensor data {}x{} (cpp {})",
        raw.clean_make, raw.clean_model, raw.width, raw.height, raw.cpp
    );

    let mut image = match raw.cpp {
        1 => Mosaic::from_raw(&raw)?.superpixel(),
        3 => linear_rgb(&raw)?,
        cpp => {
            return Err(DecodeError::UnsupportedCamera(format!(
                "{} {} ({} components per pixel)",
                raw.clean_make, raw.clean_model, cpp
            )))
        }
    };

    apply_color(
        &mut image,
        white_balance(raw.wb_coeffs),
        &camera_to_srgb(&raw.xyz_to_cam),
    );
    Ok(image)
}

/// Already-demosaiced sensor data (linear DNG and similar).
fn linear_rgb(raw: &rawloader::RawImage) -> Result<LinearImage, DecodeError> {
    let expected = raw.width * raw.height * 3;
    let pixels: Vec<f32> = match &raw.data {
        rawloader::RawImageData::Integer(data) => data
            .get(..expected)
            .ok_or_else(truncated)?
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let c = i % 3;
                let black = raw.blacklevels[c] as f32;
                let white = raw.whitelevels[c] as f32;
                if white > black {
                    ((v as f32 - black) / (white - black)).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            })
            .collect(),
        rawloader::RawImageData::Float(data) => data.get(..expected).ok_or_else(truncated)?.to_vec(),
    };

    Ok(LinearImage::new(raw.width as u32, raw.height as u32, pixels))
}
