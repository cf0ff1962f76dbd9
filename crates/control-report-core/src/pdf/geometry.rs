//! Page geometry: page size, margins and column splitting.
//!
//! All values are PDF points (1/72 in) with the origin at the bottom-left
//! corner of the page.

use crate::error::{Error, Result};

/// Points per inch.
pub const INCH: f32 = 72.0;

/// Tolerance on the sum of column fractions. The paper form's fractions are
/// rounded to three decimals, so `[0.462, 0.308, 0.231]` sums to 1.001.
const FRACTION_TOLERANCE: f32 = 0.01;

/// Page size and margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
}

impl PageGeometry {
    /// US legal (8.5 x 14 in) with half-inch margins. The top margin is
    /// 0.4 in plus 0.2 in of clearance for the identifier stamp.
    pub const LEGAL: Self = Self {
        width: 8.5 * INCH,
        height: 14.0 * INCH,
        margin_left: 0.5 * INCH,
        margin_right: 0.5 * INCH,
        margin_top: 0.6 * INCH,
        margin_bottom: 0.5 * INCH,
    };

    /// Check that the frame inside the margins has a positive area.
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.width,
            self.height,
            self.margin_left,
            self.margin_right,
            self.margin_top,
            self.margin_bottom,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidGeometry("non-finite dimension".to_string()));
        }
        if values.iter().any(|v| *v < 0.0) {
            return Err(Error::InvalidGeometry("negative dimension".to_string()));
        }
        if self.frame_width() <= 0.0 || self.frame_height() <= 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "frame of {:.1}x{:.1}pt inside a {:.1}x{:.1}pt page",
                self.frame_width(),
                self.frame_height(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// Usable width between the side margins.
    pub fn frame_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    /// Usable height between the top and bottom margins.
    pub fn frame_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }

    /// Y coordinate of the top edge of the frame.
    pub fn frame_top(&self) -> f32 {
        self.height - self.margin_top
    }

    /// Y coordinate of the bottom edge of the frame.
    pub const fn frame_bottom(&self) -> f32 {
        self.margin_bottom
    }

    /// Split the frame width into columns.
    ///
    /// Fractions must be positive and sum to at most 1.0 (within a small
    /// rounding tolerance).
    pub fn columns(&self, fractions: &[f32]) -> Result<Vec<f32>> {
        split_width(self.frame_width(), fractions)
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::LEGAL
    }
}

/// Split `width` into columns proportional to `fractions`.
pub fn split_width(width: f32, fractions: &[f32]) -> Result<Vec<f32>> {
    if fractions.is_empty() {
        return Err(Error::InvalidGeometry("no columns".to_string()));
    }
    if let Some(bad) = fractions.iter().find(|f| !f.is_finite() || **f <= 0.0) {
        return Err(Error::InvalidGeometry(format!(
            "column fraction {bad} is not positive"
        )));
    }

    let sum: f32 = fractions.iter().sum();
    if sum > 1.0 + FRACTION_TOLERANCE {
        return Err(Error::InvalidGeometry(format!(
            "column fractions {fractions:?} sum to {sum:.3}"
        )));
    }

    Ok(fractions.iter().map(|f| f * width).collect())
}
