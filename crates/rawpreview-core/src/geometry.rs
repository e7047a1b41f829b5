//! Size arithmetic for thumbnail requests.
//!
//! A [`Size`] is used both for concrete image dimensions and for size
//! constraints. In a constraint either axis may be unconstrained, which is
//! represented by `f64::INFINITY`. A constraint with both axes unconstrained
//! ([`Size::UNCONSTRAINED`]) means "no limit".
//!
//! All functions here are pure and testable without any I/O or images.

use serde::{Deserialize, Serialize};

/// Width / height with defined edge cases.
///
/// - zero width yields `0.0` (this includes `0 x 0`)
/// - zero height with a non-zero width yields `+inf`
pub fn aspect_ratio(width: f64, height: f64) -> f64 {
    if width == 0.0 {
        0.0
    } else if height == 0.0 {
        f64::INFINITY
    } else {
        width / height
    }
}

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Both axes unconstrained.
    pub const UNCONSTRAINED: Size = Size {
        width: f64::INFINITY,
        height: f64::INFINITY,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Size from integer pixel dimensions.
    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }

    /// A constraint limiting only the width.
    pub fn max_width(width: f64) -> Self {
        Self::new(width, f64::INFINITY)
    }

    /// A constraint limiting only the height.
    pub fn max_height(height: f64) -> Self {
        Self::new(f64::INFINITY, height)
    }

    /// A square constraint, the common "longest edge" request.
    pub fn square(edge: f64) -> Self {
        Self::new(edge, edge)
    }

    /// True when neither axis carries a limit.
    pub fn is_unconstrained(&self) -> bool {
        self.width.is_infinite() && self.height.is_infinite()
    }

    pub fn aspect_ratio(&self) -> f64 {
        aspect_ratio(self.width, self.height)
    }

    /// Longest edge of the size.
    pub fn longest_edge(&self) -> f64 {
        self.width.max(self.height)
    }

    /// Scale this size proportionally so it fits inside `bounds`.
    ///
    /// Never upscales: a size already inside the bounds is returned as is.
    /// Unconstrained axes of `bounds` do not limit the result.
    pub fn scaled_to_fit(&self, bounds: Size) -> Size {
        if bounds.is_unconstrained() || self.width <= 0.0 || self.height <= 0.0 {
            return *self;
        }

        let scale = (bounds.width / self.width).min(bounds.height / self.height);
        if scale >= 1.0 {
            return *self;
        }

        Size::new(self.width * scale, self.height * scale)
    }

    /// Longest edge to request from a decoder so that an image of `native`
    /// size, once proportionally scaled, fits within this constraint.
    ///
    /// Returns `None` when the constraint carries no limit at all. The result
    /// never exceeds the native longest edge and is at least 1.
    pub fn max_pixel_dimension(&self, native: Size) -> Option<u32> {
        if self.is_unconstrained() {
            return None;
        }

        let fitted = native.scaled_to_fit(*self).longest_edge();
        // Absorb floating-point noise before rounding up to whole pixels.
        let edge = if (fitted - fitted.round()).abs() < 1e-6 {
            fitted.round()
        } else {
            fitted.ceil()
        };
        if !edge.is_finite() {
            return None;
        }

        Some((edge.min(u32::MAX as f64) as u32).max(1))
    }

    /// Whether a candidate of this size is good enough for `target`.
    ///
    /// The candidate is accepted when, scaled by `1 / minimum_ratio`, it
    /// meets or exceeds the target in at least one constrained axis. A ratio
    /// of `1.0` allows no shrink; `0.8` accepts a candidate up to 20% smaller.
    ///
    /// A fully unconstrained target is never fulfilled, so callers fall back
    /// to decoding the full image.
    pub fn is_sufficient_to_fulfill(&self, target: Size, minimum_ratio: f64) -> bool {
        if target.is_unconstrained() {
            return false;
        }

        let meets = |have: f64, want: f64| want.is_finite() && have >= want * minimum_ratio;

        meets(self.width, target.width) || meets(self.height, target.height)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::from_pixels(width, height)
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
