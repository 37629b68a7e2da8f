// SPDX-License-Identifier: GPL-3.0-or-later
use imageproc::geometric_transformations as geometric;
use serde::Deserialize;

use crate::settings::gradient;

/// How contrast is enhanced after the percentile stretch.
///
/// The same policy is used for every frame.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Contrast {
    /// Only stretch the values between the lower and upper percentiles.
    Stretch,

    /// Stretch, then equalize the histogram of the frame.
    Equalize,
}

impl Default for Contrast {
    fn default() -> Self {
        Self::Equalize
    }
}

/// The sampling used when warping the thermal image on to the camera frame.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Interpolation {
    /// Nearest neighbor sampling, each thermal pixel is drawn as a solid block.
    Nearest,

    /// Bilinear sampling.
    #[serde(alias = "linear")]
    Bilinear,
}

impl Default for Interpolation {
    fn default() -> Self {
        Self::Bilinear
    }
}

impl From<Interpolation> for geometric::Interpolation {
    fn from(interpolation: Interpolation) -> Self {
        match interpolation {
            Interpolation::Nearest => geometric::Interpolation::Nearest,
            Interpolation::Bilinear => geometric::Interpolation::Bilinear,
        }
    }
}

fn default_gradient() -> colorous::Gradient {
    colorous::TURBO
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RenderSettings {
    /// The colors used for the thermal image, coldest to hottest.
    #[serde(deserialize_with = "gradient::deserialize")]
    pub(crate) gradient: colorous::Gradient,

    pub(crate) contrast: Contrast,

    /// Values at or below this percentile are drawn in the coldest color.
    pub(crate) lower_percentile: f32,

    /// Values at or above this percentile are drawn in the hottest color.
    pub(crate) upper_percentile: f32,

    pub(crate) interpolation: Interpolation,
}

impl PartialEq for RenderSettings {
    fn eq(&self, other: &Self) -> bool {
        // colorous::Gradient doesn't implement PartialEq, but its Debug output includes its name.
        format!("{:?}", self.gradient) == format!("{:?}", other.gradient)
            && self.contrast == other.contrast
            && self.lower_percentile == other.lower_percentile
            && self.upper_percentile == other.upper_percentile
            && self.interpolation == other.interpolation
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            gradient: default_gradient(),
            contrast: Contrast::default(),
            lower_percentile: 2.0,
            upper_percentile: 98.0,
            interpolation: Interpolation::default(),
        }
    }
}

/// Calibration mapping thermal image coordinates on to camera frame coordinates.
///
/// The thermal image is scaled, then rotated, then translated.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct AlignmentSettings {
    /// Counter-clockwise rotation (with the Y-axis pointing down) in degrees.
    pub(crate) rotation: f32,

    /// Horizontal and vertical scaling factors.
    pub(crate) scale: (f32, f32),

    /// Horizontal and vertical offset in camera frame pixels.
    pub(crate) translation: (f32, f32),
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            rotation: 90.0,
            scale: (36.2, 36.4),
            translation: (530.0, 170.0),
        }
    }
}
