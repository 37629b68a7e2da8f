// SPDX-License-Identifier: GPL-3.0-or-later
use async_trait::async_trait;
use image::RgbImage;

use crate::capture::StillFrame;

mod composite;
mod file;
mod mjpeg;
mod settings;

pub(crate) use file::FileOverlay;
pub(crate) use mjpeg::MjpegOverlay;
pub(crate) use settings::{OverlayKind, OverlaySettings};

/// A destination for the aligned thermal image.
#[async_trait]
pub(crate) trait Overlay: Send {
    /// Replace the contents of the overlay. The first update makes the overlay visible.
    async fn update(&mut self, image: &RgbImage) -> anyhow::Result<()>;

    /// Stop showing the overlay and release anything held for it.
    ///
    /// Calling this more than once is not an error.
    async fn remove(&mut self) -> anyhow::Result<()>;
}

#[async_trait]
impl<O: Overlay + ?Sized> Overlay for Box<O> {
    async fn update(&mut self, image: &RgbImage) -> anyhow::Result<()> {
        (**self).update(image).await
    }

    async fn remove(&mut self) -> anyhow::Result<()> {
        (**self).remove().await
    }
}

/// Create the overlay sink described by the settings, on top of the given camera frame.
pub(crate) fn create_overlay(
    settings: &OverlaySettings,
    still: &StillFrame,
) -> anyhow::Result<Box<dyn Overlay>> {
    let overlay: Box<dyn Overlay> = match &settings.kind {
        OverlayKind::Mjpeg { address, port } => Box::new(MjpegOverlay::new(
            (*address, *port).into(),
            still.image().clone(),
            settings.alpha,
        )?),
        OverlayKind::File { path } => Box::new(FileOverlay::new(path, settings.alpha)),
    };
    Ok(overlay)
}

#[cfg(test)]
mod test {
    use image::{DynamicImage, GrayImage, RgbImage};

    use super::{create_overlay, OverlayKind, OverlaySettings};
    use crate::capture::StillFrame;

    fn still() -> StillFrame {
        StillFrame::from(DynamicImage::ImageLuma8(GrayImage::new(8, 6)))
    }

    #[tokio::test]
    async fn file_overlay() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("overlay.rgba");
        let settings = OverlaySettings {
            kind: OverlayKind::File { path: path.clone() },
            ..OverlaySettings::default()
        };
        let mut overlay = create_overlay(&settings, &still())?;
        overlay.update(&RgbImage::new(8, 6)).await?;
        assert_eq!(std::fs::metadata(&path)?.len(), 8 * 6 * 4);
        overlay.remove().await?;
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn mjpeg_overlay() -> anyhow::Result<()> {
        let settings = OverlaySettings {
            kind: OverlayKind::Mjpeg {
                address: [127, 0, 0, 1].into(),
                port: 0,
            },
            ..OverlaySettings::default()
        };
        let mut overlay = create_overlay(&settings, &still())?;
        overlay.update(&RgbImage::new(8, 6)).await?;
        overlay.remove().await?;
        Ok(())
    }
}
