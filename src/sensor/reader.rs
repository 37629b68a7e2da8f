// SPDX-License-Identifier: GPL-3.0-or-later
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

use anyhow::Context as _;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::unix::pipe;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use super::frame::{ThermalFrame, FRAME_BYTES};
use super::SensorSettings;

#[derive(Debug)]
pub(crate) enum ReadError {
    /// No data arrived before the timeout.
    Timeout(Duration),

    /// Only part of a record arrived before the timeout. The rest is read on the next attempt.
    ShortRead(usize),

    /// The stream ended cleanly on a record boundary.
    Closed,

    /// The stream ended partway through a record.
    Truncated(usize),

    Io(io::Error),
}

impl ReadError {
    /// Whether the reader can be used again after this error.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, ReadError::Timeout(_) | ReadError::ShortRead(_))
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Timeout(timeout) => {
                write!(f, "no thermal frame received within {:?}", timeout)
            }
            ReadError::ShortRead(received) => write!(
                f,
                "incomplete thermal frame ({} of {} bytes)",
                received, FRAME_BYTES
            ),
            ReadError::Closed => f.write_str("thermal frame source closed"),
            ReadError::Truncated(received) => write!(
                f,
                "thermal frame source closed after {} of {} bytes",
                received, FRAME_BYTES
            ),
            ReadError::Io(err) => err.fmt(f),
        }
    }
}

impl StdError for ReadError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ReadError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Reads fixed size records from the sensor daemon.
#[derive(Debug)]
pub(crate) struct FrameReader<R> {
    source: R,
    timeout: Duration,
    keep_latest: bool,

    /// The record being read, and how much of it has arrived. A record that is only partly
    /// read when a read gives up is finished by the next one.
    record: [u8; FRAME_BYTES],
    received: usize,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub(crate) fn new(source: R, settings: &SensorSettings) -> anyhow::Result<Self> {
        Ok(Self {
            source,
            timeout: settings.timeout().context("Invalid sensor timeout")?,
            keep_latest: settings.keep_latest,
            record: [0u8; FRAME_BYTES],
            received: 0,
        })
    }

    /// Read the next complete record, waiting at most the configured timeout for it.
    pub(crate) async fn read_frame(&mut self) -> Result<ThermalFrame, ReadError> {
        let deadline = Instant::now() + self.timeout;
        while self.received < FRAME_BYTES {
            let received = self.received;
            let read = self.source.read(&mut self.record[received..]);
            match time::timeout_at(deadline, read).await {
                Err(_) if received == 0 => return Err(ReadError::Timeout(self.timeout)),
                Err(_) => return Err(ReadError::ShortRead(received)),
                Ok(Ok(0)) if received == 0 => return Err(ReadError::Closed),
                Ok(Ok(0)) => return Err(ReadError::Truncated(received)),
                Ok(Ok(count)) => self.received += count,
                Ok(Err(err)) => return Err(err.into()),
            }
        }
        Ok(self.take_record())
    }

    /// Read the next record, then skip past any other records that are already waiting.
    ///
    /// The daemon produces frames faster than they are rendered, so without this the overlay
    /// falls further and further behind.
    pub(crate) async fn latest_frame(&mut self) -> Result<ThermalFrame, ReadError> {
        let mut frame = self.read_frame().await?;
        if !self.keep_latest {
            return Ok(frame);
        }
        let mut skipped = 0usize;
        loop {
            // Only take what is available right now. A partial record is left for the next read.
            let received = self.received;
            match self.source.read(&mut self.record[received..]).now_or_never() {
                None | Some(Ok(0)) => break,
                Some(Ok(count)) => self.received += count,
                Some(Err(err)) => {
                    warn!("Unable to skip stale thermal frames: {}", err);
                    break;
                }
            }
            if self.received == FRAME_BYTES {
                frame = self.take_record();
                skipped += 1;
            }
        }
        if skipped > 0 {
            trace!(skipped, "Skipped stale thermal frames");
        }
        Ok(frame)
    }

    /// Decode the completed record and start a new one.
    fn take_record(&mut self) -> ThermalFrame {
        self.received = 0;
        ThermalFrame::decode(&self.record)
    }
}

/// Open the sensor daemon's FIFO.
///
/// The FIFO is opened for writing as well as reading so that the read side never sees an end of
/// file when the daemon closes its end between frames.
pub(crate) fn open_fifo(settings: &SensorSettings) -> anyhow::Result<FrameReader<pipe::Receiver>> {
    let receiver = pipe::OpenOptions::new()
        .read_write(true)
        .open_receiver(&settings.path)
        .with_context(|| {
            format!(
                "Unable to open sensor FIFO {} (is the sensor daemon running?)",
                settings.path.display()
            )
        })?;
    debug!(path = ?settings.path, "Opened sensor FIFO");
    FrameReader::new(receiver, settings)
}

#[cfg(test)]
mod test {
    use std::io::Write;
    use std::process::Command;

    use tokio::io::AsyncWriteExt;

    use super::{open_fifo, FrameReader, ReadError};
    use crate::sensor::{SensorSettings, ThermalFrame, FRAME_BYTES};

    fn settings() -> SensorSettings {
        SensorSettings {
            timeout: 0.05,
            ..SensorSettings::default()
        }
    }

    fn record(fill: u16) -> [u8; FRAME_BYTES] {
        let mut record = [0u8; FRAME_BYTES];
        for pair in record.chunks_exact_mut(2) {
            pair.copy_from_slice(&fill.to_le_bytes());
        }
        record
    }

    #[tokio::test]
    async fn full_record() {
        let data = record(30000);
        let mut reader = FrameReader::new(&data[..], &settings()).unwrap();
        let frame = reader.read_frame().await.unwrap();
        assert_eq!(frame, ThermalFrame::decode(&data));
        assert!(matches!(reader.read_frame().await, Err(ReadError::Closed)));
    }

    #[tokio::test]
    async fn record_split_across_writes() {
        let data = record(29000);
        let (mut writer, source) = tokio::io::duplex(FRAME_BYTES * 4);
        let mut reader = FrameReader::new(source, &settings()).unwrap();
        writer.write_all(&data[..50]).await.unwrap();
        let read = tokio::spawn(async move { reader.read_frame().await });
        writer.write_all(&data[50..]).await.unwrap();
        let frame = read.await.unwrap().unwrap();
        assert_eq!(frame, ThermalFrame::decode(&data));
    }

    #[tokio::test]
    async fn timeout() {
        let (_writer, source) = tokio::io::duplex(FRAME_BYTES);
        let mut reader = FrameReader::new(source, &settings()).unwrap();
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, ReadError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn short_read_before_timeout() {
        let (mut writer, source) = tokio::io::duplex(FRAME_BYTES);
        let mut reader = FrameReader::new(source, &settings()).unwrap();
        writer.write_all(&[0u8; 100]).await.unwrap();
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, ReadError::ShortRead(100)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn short_read_resumes() {
        let (mut writer, source) = tokio::io::duplex(FRAME_BYTES * 4);
        let mut reader = FrameReader::new(source, &settings()).unwrap();
        let late = record(30000);
        writer.write_all(&late[..100]).await.unwrap();
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, ReadError::ShortRead(100)));
        assert!(err.is_transient());
        // The tail of the late record arrives along with the next one.
        writer.write_all(&late[100..]).await.unwrap();
        writer.write_all(&record(31000)).await.unwrap();
        assert_eq!(
            reader.read_frame().await.unwrap(),
            ThermalFrame::decode(&late)
        );
        assert_eq!(
            reader.read_frame().await.unwrap(),
            ThermalFrame::decode(&record(31000))
        );
    }

    #[tokio::test]
    async fn latest_frame_after_short_read() {
        let (mut writer, source) = tokio::io::duplex(FRAME_BYTES * 4);
        let mut reader = FrameReader::new(source, &settings()).unwrap();
        let late = record(30000);
        writer.write_all(&late[..60]).await.unwrap();
        assert!(matches!(
            reader.latest_frame().await,
            Err(ReadError::ShortRead(60))
        ));
        writer.write_all(&late[60..]).await.unwrap();
        writer.write_all(&record(31000)).await.unwrap();
        assert_eq!(
            reader.latest_frame().await.unwrap(),
            ThermalFrame::decode(&record(31000))
        );
    }

    #[tokio::test]
    async fn short_read_at_end() {
        let data = [0u8; 37];
        let mut reader = FrameReader::new(&data[..], &settings()).unwrap();
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, ReadError::Truncated(37)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn closed() {
        let data: [u8; 0] = [];
        let mut reader = FrameReader::new(&data[..], &settings()).unwrap();
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, ReadError::Closed));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn latest_frame_skips_stale() {
        let mut data = Vec::new();
        for fill in &[28000u16, 29000, 30000] {
            data.extend_from_slice(&record(*fill));
        }
        let mut reader = FrameReader::new(&data[..], &settings()).unwrap();
        let frame = reader.latest_frame().await.unwrap();
        assert_eq!(frame, ThermalFrame::decode(&record(30000)));
    }

    #[tokio::test]
    async fn latest_frame_keeps_partial_record() {
        let (mut writer, source) = tokio::io::duplex(FRAME_BYTES * 4);
        let mut reader = FrameReader::new(source, &settings()).unwrap();
        let next = record(29000);
        writer.write_all(&record(28000)).await.unwrap();
        writer.write_all(&next[..60]).await.unwrap();
        // The complete record is used, the partial one is finished by the next read.
        assert_eq!(
            reader.latest_frame().await.unwrap(),
            ThermalFrame::decode(&record(28000))
        );
        writer.write_all(&next[60..]).await.unwrap();
        assert_eq!(
            reader.latest_frame().await.unwrap(),
            ThermalFrame::decode(&next)
        );
    }

    #[test]
    fn unusable_timeout() {
        let settings = SensorSettings {
            timeout: f32::INFINITY,
            ..settings()
        };
        assert!(FrameReader::new(&[0u8; 0][..], &settings).is_err());
    }

    #[tokio::test]
    async fn latest_frame_disabled() {
        let mut data = Vec::new();
        for fill in &[28000u16, 29000] {
            data.extend_from_slice(&record(*fill));
        }
        let settings = SensorSettings {
            keep_latest: false,
            ..settings()
        };
        let mut reader = FrameReader::new(&data[..], &settings).unwrap();
        let first = reader.latest_frame().await.unwrap();
        assert_eq!(first, ThermalFrame::decode(&record(28000)));
        let second = reader.latest_frame().await.unwrap();
        assert_eq!(second, ThermalFrame::decode(&record(29000)));
    }

    #[tokio::test]
    async fn fifo() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mlx90620.sock");
        let status = Command::new("mkfifo").arg(&path).status()?;
        assert!(status.success(), "mkfifo failed");
        let settings = SensorSettings {
            path: path.clone(),
            ..settings()
        };
        let mut reader = open_fifo(&settings)?;
        // The reader holds a write handle, so opening the write side does not block.
        let data = record(31000);
        let mut daemon = std::fs::OpenOptions::new().write(true).open(&path)?;
        daemon.write_all(&data)?;
        drop(daemon);
        let frame = reader.read_frame().await?;
        assert_eq!(frame, ThermalFrame::decode(&data));
        // The daemon closing its end is not the end of the stream.
        assert!(matches!(
            reader.read_frame().await,
            Err(ReadError::Timeout(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn fifo_regular_file() -> anyhow::Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        let settings = SensorSettings {
            path: file.path().to_path_buf(),
            ..settings()
        };
        assert!(open_fifo(&settings).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn fifo_missing() {
        let settings = SensorSettings {
            path: "/nonexistent/mlx90620.sock".into(),
            ..settings()
        };
        assert!(open_fifo(&settings).is_err());
    }
}
