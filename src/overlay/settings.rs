// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::TryFrom;
use std::net;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use serde::Deserialize;

use crate::util::frame_period;

/// Where the aligned thermal image is sent.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum OverlayKind {
    /// Blend the overlay on to the still frame and serve it as an MJPEG stream over HTTP.
    Mjpeg { address: net::IpAddr, port: u16 },

    /// Write the overlay as raw RGBA bytes to a file for an external compositor.
    File { path: PathBuf },
}

impl OverlayKind {
    fn default_address() -> net::IpAddr {
        net::IpAddr::from([127u8, 0u8, 0u8, 1u8])
    }

    fn default_port() -> u16 {
        9000u16
    }
}

impl Default for OverlayKind {
    fn default() -> Self {
        Self::Mjpeg {
            address: Self::default_address(),
            port: Self::default_port(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(try_from = "RawOverlaySettings")]
pub(crate) struct OverlaySettings {
    pub(crate) kind: OverlayKind,

    /// The opacity of the overlay, from 0 (invisible) to 255 (opaque).
    pub(crate) alpha: u8,

    /// How many times a second the overlay is updated.
    pub(crate) frame_rate: f32,
}

impl OverlaySettings {
    /// The delay between overlay updates.
    pub(crate) fn frame_period(&self) -> anyhow::Result<Duration> {
        frame_period(self.frame_rate)
    }
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            kind: OverlayKind::default(),
            alpha: 90,
            frame_rate: 4.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum SinkName {
    Mjpeg,
    File,
}

/// The `[overlay]` table as written, with the sink specific keys all optional.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawOverlaySettings {
    kind: SinkName,
    address: Option<net::IpAddr>,
    port: Option<u16>,
    path: Option<PathBuf>,
    alpha: u8,
    frame_rate: f32,
}

impl Default for RawOverlaySettings {
    fn default() -> Self {
        let defaults = OverlaySettings::default();
        Self {
            kind: SinkName::Mjpeg,
            address: None,
            port: None,
            path: None,
            alpha: defaults.alpha,
            frame_rate: defaults.frame_rate,
        }
    }
}

impl TryFrom<RawOverlaySettings> for OverlaySettings {
    type Error = anyhow::Error;

    fn try_from(raw: RawOverlaySettings) -> anyhow::Result<Self> {
        let kind = match raw.kind {
            SinkName::Mjpeg => {
                if raw.path.is_some() {
                    return Err(anyhow!("'path' is only valid for file overlays"));
                }
                OverlayKind::Mjpeg {
                    address: raw.address.unwrap_or_else(OverlayKind::default_address),
                    port: raw.port.unwrap_or_else(OverlayKind::default_port),
                }
            }
            SinkName::File => {
                if raw.address.is_some() || raw.port.is_some() {
                    return Err(anyhow!(
                        "'address' and 'port' are only valid for MJPEG overlays"
                    ));
                }
                let path = raw
                    .path
                    .ok_or_else(|| anyhow!("file overlays need a 'path'"))?;
                OverlayKind::File { path }
            }
        };
        Ok(Self {
            kind,
            alpha: raw.alpha,
            frame_rate: raw.frame_rate,
        })
    }
}
