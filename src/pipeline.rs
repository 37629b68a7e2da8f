// SPDX-License-Identifier: GPL-3.0-or-later
use std::future::Future;
use std::time::Duration;

use anyhow::Context as _;
use tokio::io::AsyncRead;
use tokio::net::unix::pipe;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::capture::StillFrame;
use crate::overlay::{create_overlay, Overlay};
use crate::render::Renderer;
use crate::sensor::{open_fifo, FrameReader};
use crate::settings::Settings;

/// Repeatedly reads thermal frames, renders them, and updates the overlay.
pub(crate) struct Pipeline<R, O> {
    reader: FrameReader<R>,
    renderer: Renderer,
    overlay: O,
    period: Duration,
}

impl Pipeline<pipe::Receiver, Box<dyn Overlay>> {
    /// Open the sensor FIFO and create the overlay for a captured camera frame.
    pub(crate) fn open(settings: &Settings, still: &StillFrame) -> anyhow::Result<Self> {
        let period = settings
            .overlay
            .frame_period()
            .context("Invalid overlay frame rate")?;
        let renderer = Renderer::new(
            &settings.render,
            &settings.alignment,
            still.width(),
            still.height(),
        )
        .context("Invalid render settings")?;
        let reader = open_fifo(&settings.sensor)?;
        let overlay = create_overlay(&settings.overlay, still).context("Unable to create overlay")?;
        Ok(Self::new(reader, renderer, overlay, period))
    }
}

impl<R, O> Pipeline<R, O>
where
    R: AsyncRead + Unpin,
    O: Overlay,
{
    pub(crate) fn new(
        reader: FrameReader<R>,
        renderer: Renderer,
        overlay: O,
        period: Duration,
    ) -> Self {
        Self {
            reader,
            renderer,
            overlay,
            period,
        }
    }

    /// Run until `shutdown` completes or a frame cannot be read or shown.
    ///
    /// The overlay is removed and the sensor closed before this returns, even on error.
    pub(crate) async fn run<F>(mut self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let result = tokio::select! {
            result = self.drive() => result,
            _ = shutdown => {
                info!("Shutting down overlay");
                Ok(())
            }
        };
        let removed = self.overlay.remove().await.context("Unable to remove overlay");
        drop(self.reader);
        debug!("Closed thermal sensor");
        result.and(removed)
    }

    async fn drive(&mut self) -> anyhow::Result<()> {
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shown = 0usize;
        loop {
            interval.tick().await;
            let frame = match self.reader.latest_frame().await {
                Ok(frame) => frame,
                Err(err) if err.is_transient() => {
                    warn!("Skipping thermal frame: {}", err);
                    continue;
                }
                Err(err) => {
                    return Err(err).context("Unable to read from the thermal sensor");
                }
            };
            let (min, max) = frame.range();
            debug!("Read thermal frame, {:#.1} to {:#.1}", min, max);
            let image = self.renderer.render(frame).await?;
            self.overlay
                .update(&image)
                .await
                .context("Unable to update overlay")?;
            if shown == 0 {
                info!("Showing thermal overlay");
            }
            shown += 1;
        }
    }
}
