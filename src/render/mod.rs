// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::TryFrom;

use futures::FutureExt;
use image::RgbImage;
use tokio::task::spawn_blocking;
use tracing::{instrument, trace};

use crate::sensor::ThermalFrame;
use crate::util::flatten_join_result;

mod align;
mod color_map;
mod settings;

pub(crate) use align::Alignment;
pub(crate) use color_map::Colorizer;
pub(crate) use settings::{AlignmentSettings, Contrast, Interpolation, RenderSettings};

/// Turns thermal frames into overlay images the size of the camera frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Renderer {
    colorizer: Colorizer,
    alignment: Alignment,
    width: u32,
    height: u32,
}

impl Renderer {
    pub(crate) fn new(
        render: &RenderSettings,
        alignment: &AlignmentSettings,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            colorizer: Colorizer::try_from(render)?,
            alignment: Alignment::new(alignment, render.interpolation)?,
            width,
            height,
        })
    }

    /// Colorize and align a frame on the current thread.
    pub(crate) fn render_frame(&self, frame: &ThermalFrame) -> RgbImage {
        let colors = self.colorizer.colorize(frame.image());
        let overlay = self.alignment.align(&colors, self.width, self.height);
        trace!(
            width = self.width,
            height = self.height,
            "aligned thermal image"
        );
        overlay
    }

    /// Render a frame on a blocking thread.
    #[instrument(level = "debug", skip(self, frame))]
    pub(crate) async fn render(&self, frame: ThermalFrame) -> anyhow::Result<RgbImage> {
        let renderer = *self;
        spawn_blocking(move || anyhow::Result::<RgbImage>::Ok(renderer.render_frame(&frame)))
            .map(flatten_join_result)
            .await
    }
}
