// SPDX-License-Identifier: GPL-3.0-or-later
use serde::Deserialize;

use std::path::PathBuf;
use std::time::Duration;

use crate::util::seconds;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SensorSettings {
    /// The FIFO the sensor daemon writes frames to.
    pub(crate) path: PathBuf,

    /// How long to wait for a complete frame, in seconds.
    pub(crate) timeout: f32,

    /// Skip frames that queued up in the FIFO while the previous frame was being rendered,
    /// keeping only the newest.
    pub(crate) keep_latest: bool,
}

impl SensorSettings {
    pub(crate) fn timeout(&self) -> anyhow::Result<Duration> {
        seconds(self.timeout)
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/run/mlx90620.sock"),
            timeout: 2.0,
            keep_latest: true,
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::SensorSettings;

    #[test]
    fn defaults() -> anyhow::Result<()> {
        let parsed: SensorSettings = toml::from_str("")?;
        assert_eq!(parsed, SensorSettings::default());
        assert_eq!(parsed.timeout()?, Duration::from_secs(2));
        Ok(())
    }

    #[test]
    fn custom() -> anyhow::Result<()> {
        let source = r#"
        path = "/run/thermal.fifo"
        timeout = 0.25
        keep_latest = false
        "#;
        let parsed: SensorSettings = toml::from_str(source)?;
        let expected = SensorSettings {
            path: PathBuf::from("/run/thermal.fifo"),
            timeout: 0.25,
            keep_latest: false,
        };
        assert_eq!(parsed, expected);
        Ok(())
    }

    #[test]
    fn negative_timeout_is_zero() {
        let settings = SensorSettings {
            timeout: -1.0,
            ..SensorSettings::default()
        };
        assert_eq!(settings.timeout().unwrap(), Duration::ZERO);
    }

    #[test]
    fn unusable_timeouts() -> anyhow::Result<()> {
        for source in &["timeout = inf", "timeout = nan", "timeout = 1e30"] {
            let parsed: SensorSettings = toml::from_str(source)?;
            assert!(parsed.timeout().is_err(), "Accepted {}", source);
        }
        Ok(())
    }
}
