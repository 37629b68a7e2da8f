// SPDX-License-Identifier: GPL-3.0-or-later
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::Context as _;
use futures::FutureExt;
use image::{DynamicImage, GrayImage};
use imageproc::contrast::equalize_histogram;
use tokio::process::Command;
use tokio::task::spawn_blocking;
use tokio::time;
use tracing::{debug, info, instrument, warn};

use crate::util::flatten_join_result;

use super::CaptureSettings;

#[derive(Debug)]
pub(crate) enum CaptureError {
    /// The capture command could not be started.
    Spawn(io::Error),

    /// The capture command did not finish in time.
    TimedOut(Duration),

    /// The capture command exited unsuccessfully.
    Failed(ExitStatus),

    /// The captured image could not be read.
    Load(PathBuf, image::ImageError),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Spawn(err) => write!(f, "unable to run capture command: {}", err),
            CaptureError::TimedOut(timeout) => {
                write!(f, "capture command did not finish within {:?}", timeout)
            }
            CaptureError::Failed(status) => write!(f, "capture command failed ({})", status),
            CaptureError::Load(path, err) => {
                write!(f, "unable to load {}: {}", path.display(), err)
            }
        }
    }
}

impl StdError for CaptureError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            CaptureError::Spawn(err) => Some(err),
            CaptureError::Load(_, err) => Some(err),
            CaptureError::TimedOut(_) | CaptureError::Failed(_) => None,
        }
    }
}

/// A grayscale camera frame with its histogram equalized.
#[derive(Clone, Debug)]
pub(crate) struct StillFrame(GrayImage);

impl StillFrame {
    /// Load and equalize a captured image.
    pub(crate) fn load(path: &Path) -> Result<Self, CaptureError> {
        let image =
            image::open(path).map_err(|err| CaptureError::Load(path.to_path_buf(), err))?;
        Ok(Self::from(image))
    }

    pub(crate) fn width(&self) -> u32 {
        self.0.width()
    }

    pub(crate) fn height(&self) -> u32 {
        self.0.height()
    }

    pub(crate) fn image(&self) -> &GrayImage {
        &self.0
    }
}

impl From<DynamicImage> for StillFrame {
    fn from(image: DynamicImage) -> Self {
        Self(equalize_histogram(&image.to_luma8()))
    }
}

/// Run the capture command and load the image it produces.
#[instrument(level = "debug", skip(settings), fields(command = %settings.command))]
pub(crate) async fn capture_still(settings: &CaptureSettings) -> anyhow::Result<StillFrame> {
    let timeout = settings.timeout().context("Invalid capture timeout")?;
    let mut command = Command::new(&settings.command);
    command
        .args(settings.arguments())
        .stdin(Stdio::null())
        .kill_on_drop(true);
    debug!(args = ?settings.arguments(), "Starting still capture");
    let status = time::timeout(timeout, command.status())
        .await
        .map_err(|_| CaptureError::TimedOut(timeout))?
        .map_err(CaptureError::Spawn)?;
    if !status.success() {
        return Err(CaptureError::Failed(status).into());
    }
    let path = settings.path.clone();
    let frame = spawn_blocking(move || StillFrame::load(&path))
        .map(flatten_join_result)
        .await?;
    if frame.width() != settings.width || frame.height() != settings.height {
        warn!(
            requested_width = settings.width,
            requested_height = settings.height,
            width = frame.width(),
            height = frame.height(),
            "Captured image is not the requested size, using the captured size"
        );
    }
    info!(
        width = frame.width(),
        height = frame.height(),
        "Captured still frame"
    );
    Ok(frame)
}
