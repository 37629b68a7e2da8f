// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::TryFrom;

use anyhow::anyhow;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;
use tracing::trace;

use crate::image_buffer::{ScaledImage, ThermalImage};

use super::settings::{Contrast, RenderSettings};

/// Maps thermal images to colors.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Colorizer {
    gradient: colorous::Gradient,
    contrast: Contrast,
    lower_percentile: f32,
    upper_percentile: f32,
}

impl Colorizer {
    /// Scale a thermal image into `0.0..=1.0`, applying the contrast policy.
    ///
    /// If the percentile bounds are (nearly) equal, as with a frame where every pixel is the same
    /// temperature, every pixel is scaled to `0.5`.
    pub(crate) fn normalize(&self, image: &ThermalImage) -> ScaledImage {
        let mut sorted: Vec<f32> = image.iter().copied().collect();
        sorted.sort_unstable_by(f32::total_cmp);
        let (low, high) = match (
            percentile(&sorted, self.lower_percentile),
            percentile(&sorted, self.upper_percentile),
        ) {
            (Some(low), Some(high)) => (low, high),
            _ => return ScaledImage::new(image.width(), image.height()),
        };
        if high - low < f32::EPSILON {
            trace!(low, high, "Degenerate thermal image range");
            return ScaledImage::from_pixel(image.width(), image.height(), Luma([0.5]));
        }
        let stretched = rescale(image, low, high);
        match self.contrast {
            Contrast::Stretch => stretched,
            Contrast::Equalize => equalize(&stretched),
        }
    }

    /// Map a thermal image to an RGB image of the same size.
    pub(crate) fn colorize(&self, image: &ThermalImage) -> RgbImage {
        let scaled = self.normalize(image);
        let gradient = self.gradient;
        let mut colors = RgbImage::new(scaled.width(), scaled.height());
        for (source, dest) in scaled.pixels().zip(colors.pixels_mut()) {
            *dest = Rgb(gradient.eval_continuous(source[0] as f64).as_array());
        }
        trace!("mapped temperatures to colors");
        colors
    }
}

impl<'a> TryFrom<&'a RenderSettings> for Colorizer {
    type Error = anyhow::Error;

    fn try_from(settings: &'a RenderSettings) -> anyhow::Result<Self> {
        let lower = settings.lower_percentile;
        let upper = settings.upper_percentile;
        if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) || lower >= upper {
            return Err(anyhow!(
                "invalid percentile bounds {} and {}, they must be in 0-100 with the lower \
                 bound less than the upper",
                lower,
                upper
            ));
        }
        Ok(Self {
            gradient: settings.gradient,
            contrast: settings.contrast,
            lower_percentile: lower,
            upper_percentile: upper,
        })
    }
}

/// Compute a percentile from sorted values, linearly interpolating between the closest ranks.
fn percentile(sorted: &[f32], percent: f32) -> Option<f32> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (percent / 100.0) * last as f32;
    let below = rank.floor() as usize;
    let above = (rank.ceil() as usize).min(last);
    let fraction = rank - below as f32;
    Some(sorted[below] + (sorted[above] - sorted[below]) * fraction)
}

/// Linearly map `low..=high` to `0.0..=1.0`, clipping anything outside of that range.
fn rescale(image: &ThermalImage, low: f32, high: f32) -> ScaledImage {
    let range = high - low;
    let mut scaled = ScaledImage::new(image.width(), image.height());
    for (source, dest) in image.pixels().zip(scaled.pixels_mut()) {
        *dest = Luma([((source[0] - low) / range).max(0.0).min(1.0)]);
    }
    scaled
}

/// Equalize the histogram of an already scaled image.
///
/// The values are quantized to 8 bits for [`imageproc::contrast::equalize_histogram`].
fn equalize(scaled: &ScaledImage) -> ScaledImage {
    let quantized = GrayImage::from_fn(scaled.width(), scaled.height(), |x, y| {
        Luma([(scaled.get_pixel(x, y)[0] * 255.0).round() as u8])
    });
    let equalized = equalize_histogram(&quantized);
    ScaledImage::from_fn(equalized.width(), equalized.height(), |x, y| {
        Luma([equalized.get_pixel(x, y)[0] as f32 / 255.0])
    })
}
