// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Context as _;
use serde::Deserialize;
use tracing::debug;

use std::fs;

mod cli;
pub(crate) mod gradient;

use crate::capture::CaptureSettings;
use crate::overlay::OverlaySettings;
use crate::render::{AlignmentSettings, RenderSettings};
use crate::sensor::SensorSettings;
pub(crate) use cli::Args;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct Settings {
    /// Still capture settings.
    #[serde(default)]
    pub(crate) capture: CaptureSettings,

    /// Settings for the thermal sensor FIFO.
    #[serde(default)]
    pub(crate) sensor: SensorSettings,

    /// How thermal frames are turned into colors.
    #[serde(default)]
    pub(crate) render: RenderSettings,

    /// Calibration aligning the thermal image with the camera frame.
    #[serde(default)]
    pub(crate) alignment: AlignmentSettings,

    /// Where the aligned overlay is sent.
    #[serde(default)]
    pub(crate) overlay: OverlaySettings,
}

impl Settings {
    /// Build the settings from the command line arguments, reading the config file if one was
    /// given.
    pub(crate) fn load(args: &Args) -> anyhow::Result<Self> {
        let mut settings = match &args.config_path {
            Some(path) => {
                debug!(?path, "Reading configuration file");
                let config_data = fs::read_to_string(path)
                    .with_context(|| format!("Unable to read config file {}", path.display()))?;
                toml::from_str(&config_data)
                    .with_context(|| format!("Unable to parse config file {}", path.display()))?
            }
            None => {
                debug!("No configuration file given, using defaults");
                Settings::default()
            }
        };
        if let Some(frame_rate) = args.frame_rate {
            settings.overlay.frame_rate = frame_rate;
        }
        Ok(settings)
    }
}
