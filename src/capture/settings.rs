// SPDX-License-Identifier: GPL-3.0-or-later
use serde::Deserialize;

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::util::seconds;

/// Settings for capturing the still frame that the overlay is aligned to.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CaptureSettings {
    /// The program used to capture a still image. It is given `-o <path> -w <width> -h <height>`
    /// followed by [`extra_args`][CaptureSettings::extra_args].
    pub(crate) command: String,

    /// Additional arguments for the capture command.
    pub(crate) extra_args: Vec<String>,

    /// Where the captured JPEG is written.
    pub(crate) path: PathBuf,

    pub(crate) width: u32,

    pub(crate) height: u32,

    /// How long to wait for the capture command to finish, in seconds.
    pub(crate) timeout: f32,
}

impl CaptureSettings {
    /// The full argument list passed to the capture command.
    pub(crate) fn arguments(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-o".into(),
            self.path.clone().into(),
            "-w".into(),
            self.width.to_string().into(),
            "-h".into(),
            self.height.to_string().into(),
        ];
        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }

    pub(crate) fn timeout(&self) -> anyhow::Result<Duration> {
        seconds(self.timeout)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            command: "raspistill".to_string(),
            // No preview window, and a 3ms delay before capturing.
            extra_args: vec!["-n".to_string(), "-t".to_string(), "3".to_string()],
            path: PathBuf::from("/home/pi/tmp.jpg"),
            width: 640,
            height: 480,
            timeout: 10.0,
        }
    }
}

#[cfg(test)]
mod test {
    use std::ffi::OsString;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::CaptureSettings;

    #[test]
    fn defaults() -> anyhow::Result<()> {
        let parsed: CaptureSettings = toml::from_str("")?;
        assert_eq!(parsed, CaptureSettings::default());
        assert_eq!(parsed.timeout()?, Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn default_arguments() {
        let expected: Vec<OsString> = [
            "-o",
            "/home/pi/tmp.jpg",
            "-w",
            "640",
            "-h",
            "480",
            "-n",
            "-t",
            "3",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        assert_eq!(CaptureSettings::default().arguments(), expected);
    }

    #[test]
    fn custom() -> anyhow::Result<()> {
        let source = r#"
        command = "libcamera-still"
        extra_args = []
        path = "/tmp/still.jpg"
        timeout = 0.5
        "#;
        let parsed: CaptureSettings = toml::from_str(source)?;
        let expected = CaptureSettings {
            command: "libcamera-still".to_string(),
            extra_args: Vec::new(),
            path: PathBuf::from("/tmp/still.jpg"),
            timeout: 0.5,
            ..CaptureSettings::default()
        };
        assert_eq!(parsed, expected);
        assert_eq!(parsed.timeout()?, Duration::from_millis(500));
        Ok(())
    }

    #[test]
    fn infinite_timeout() -> anyhow::Result<()> {
        let parsed: CaptureSettings = toml::from_str("timeout = inf")?;
        assert!(parsed.timeout().is_err());
        Ok(())
    }

    #[test]
    fn unknown_key() {
        let parsed: Result<CaptureSettings, _> = toml::from_str("resolution = 3");
        assert!(parsed.is_err(), "Accepted an unknown key");
    }
}
