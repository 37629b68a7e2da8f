// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::anyhow;
use image::RgbImage;
use imageproc::geometric_transformations::{warp_into, Projection};
use tracing::debug;

use crate::image_buffer::FILL_COLOR;

use super::settings::{AlignmentSettings, Interpolation};

/// Places a colorized thermal image on to the camera frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Alignment {
    projection: Projection,
    interpolation: Interpolation,
}

impl Alignment {
    /// Build the alignment from a calibration.
    ///
    /// The forward transform (thermal image to camera frame) is
    ///
    /// ```text
    /// | sx·cos θ  -sy·sin θ  tx |
    /// | sx·sin θ   sy·cos θ  ty |
    /// |    0          0       1 |
    /// ```
    ///
    /// Calibrations that cannot be inverted (a zero scale factor) are rejected.
    pub(crate) fn new(
        settings: &AlignmentSettings,
        interpolation: Interpolation,
    ) -> anyhow::Result<Self> {
        let theta = f64::from(settings.rotation).to_radians();
        let (sin, cos) = theta.sin_cos();
        let (sx, sy) = (f64::from(settings.scale.0), f64::from(settings.scale.1));
        let (tx, ty) = (
            f64::from(settings.translation.0),
            f64::from(settings.translation.1),
        );
        let matrix = [
            sx * cos,
            -sy * sin,
            tx,
            sx * sin,
            sy * cos,
            ty,
            0.0,
            0.0,
            1.0,
        ];
        let mut transform = [0f32; 9];
        for (dest, source) in transform.iter_mut().zip(matrix.iter()) {
            *dest = *source as f32;
        }
        let projection = Projection::from_matrix(transform)
            .ok_or_else(|| anyhow!("alignment calibration {:?} is not invertible", settings))?;
        debug!(?transform, "Created thermal image alignment");
        Ok(Self {
            projection,
            interpolation,
        })
    }

    /// Warp a colorized thermal image into a new image of the given size.
    ///
    /// Each output pixel is mapped back into the thermal image and sampled there. Pixels that
    /// land outside of the thermal image are [`FILL_COLOR`].
    pub(crate) fn align(&self, colors: &RgbImage, width: u32, height: u32) -> RgbImage {
        let mut aligned = RgbImage::new(width, height);
        warp_into(
            colors,
            &self.projection,
            self.interpolation.into(),
            FILL_COLOR,
            &mut aligned,
        );
        aligned
    }
}
