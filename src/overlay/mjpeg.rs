// SPDX-License-Identifier: GPL-3.0-or-later
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::future;
use futures::stream::StreamExt;
use futures::FutureExt;
use http::Response;
use hyper::Body;
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, RgbImage};
use tokio::sync::{oneshot, watch};
use tokio::task::{spawn_blocking, JoinHandle};
use tokio::time;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, info_span, trace, warn};
use tracing_futures::Instrument;
use warp::Filter;

use crate::image_buffer::EncodedFrame;
use crate::util::flatten_join_result;

use super::composite::composite;
use super::Overlay;

const BOUNDARY: &str = "thermal_overlay_boundary";

/// How long to wait for clients to disconnect when the server is shut down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Encode an image as a JPEG, framed as one part of a `multipart/x-mixed-replace` body.
fn encode_part(image: &RgbImage) -> anyhow::Result<EncodedFrame> {
    let mut jpeg_buf = BytesMut::new().writer();
    JpegEncoder::new(&mut jpeg_buf)
        .encode_image(image)
        .context("Unable to encode overlay as a JPEG")?;
    let jpeg_buf = jpeg_buf.into_inner().freeze();
    let header = Bytes::from(format!(
        "\r\n--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        jpeg_buf.len()
    ));
    let total_length = header.len() + jpeg_buf.len();
    Ok(header.chain(jpeg_buf).copy_to_bytes(total_length))
}

/// The running HTTP server.
#[derive(Debug)]
struct Server {
    frames: watch::Sender<EncodedFrame>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Serves the overlay blended on to the camera frame as an MJPEG stream at `/mjpeg`.
#[derive(Debug)]
pub(crate) struct MjpegOverlay {
    background: Arc<GrayImage>,
    alpha: u8,
    local_address: SocketAddr,
    server: Option<Server>,
}

impl MjpegOverlay {
    /// Start the HTTP server.
    ///
    /// Clients connecting before the first update wait for it.
    pub(crate) fn new(
        bind_address: SocketAddr,
        background: GrayImage,
        alpha: u8,
    ) -> anyhow::Result<Self> {
        let (frames, receiver) = watch::channel(EncodedFrame::new());
        let content_type = format!("multipart/x-mixed-replace; boundary={}", BOUNDARY);
        let route = warp::path("mjpeg").and(warp::path::end()).map(move || {
            let body_stream = WatchStream::new(receiver.clone())
                .filter(|frame: &EncodedFrame| future::ready(!frame.is_empty()))
                .map(Result::<Bytes, http::Error>::Ok);
            Response::builder()
                .status(200)
                .header("Content-Type", content_type.as_str())
                .body(Body::wrap_stream(body_stream))
        });
        let (shutdown, shutdown_signal) = oneshot::channel::<()>();
        let (local_address, server) = warp::serve(route)
            .try_bind_with_graceful_shutdown(bind_address, async move {
                // A dropped sender is also a shutdown.
                shutdown_signal.await.ok();
            })
            .with_context(|| format!("Unable to start MJPEG server on {}", bind_address))?;
        let task = tokio::spawn(server.instrument(info_span!("mjpeg_server")));
        info!(address = %local_address, "Serving overlay at /mjpeg");
        Ok(Self {
            background: Arc::new(background),
            alpha,
            local_address,
            server: Some(Server {
                frames,
                shutdown,
                task,
            }),
        })
    }
}

#[async_trait]
impl Overlay for MjpegOverlay {
    async fn update(&mut self, image: &RgbImage) -> anyhow::Result<()> {
        let server = self
            .server
            .as_ref()
            .ok_or_else(|| anyhow!("MJPEG overlay has already been removed"))?;
        let background = Arc::clone(&self.background);
        let alpha = self.alpha;
        let image = image.clone();
        let part = spawn_blocking(move || {
            let flattened = composite(&background, &image, alpha)?;
            encode_part(&flattened)
        })
        .map(flatten_join_result)
        .await?;
        trace!(bytes = part.len(), "Encoded overlay frame");
        server.frames.send_replace(part);
        Ok(())
    }

    async fn remove(&mut self) -> anyhow::Result<()> {
        let server = match self.server.take() {
            Some(server) => server,
            None => return Ok(()),
        };
        // Ending the frame channel ends every open stream, letting the connections close.
        drop(server.frames);
        server.shutdown.send(()).ok();
        match time::timeout(SHUTDOWN_TIMEOUT, server.task).await {
            Ok(join_result) => join_result.context("MJPEG server task failed")?,
            Err(_) => warn!("MJPEG server did not shut down in time"),
        }
        debug!(address = %self.local_address, "Stopped MJPEG server");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;
    use std::time::Duration;

    use image::{GenericImageView, GrayImage, Rgb, RgbImage};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time;

    use super::{encode_part, MjpegOverlay, BOUNDARY};
    use crate::overlay::Overlay;

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    }

    /// Read from the stream until `needle` shows up.
    async fn read_until(stream: &mut TcpStream, received: &mut Vec<u8>, needle: &[u8]) -> usize {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(position) = find(received, needle) {
                return position;
            }
            let count = time::timeout(Duration::from_secs(5), stream.read(&mut buf))
                .await
                .expect("timed out reading MJPEG stream")
                .unwrap();
            assert_ne!(count, 0, "MJPEG stream ended early");
            received.extend_from_slice(&buf[..count]);
        }
    }

    #[test]
    fn part_framing() -> anyhow::Result<()> {
        let part = encode_part(&RgbImage::from_pixel(16, 8, Rgb([10, 200, 30])))?;
        let header_end = find(&part, b"\r\n\r\n").unwrap() + 4;
        let header = std::str::from_utf8(&part[..header_end])?;
        assert!(header.starts_with(&format!("\r\n--{}\r\n", BOUNDARY)));
        assert!(header.contains("Content-Type: image/jpeg"));
        let jpeg = &part[header_end..];
        assert!(header.contains(&format!("Content-Length: {}", jpeg.len())));
        // JPEG start of image marker
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
        let decoded = image::load_from_memory(jpeg)?;
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
        Ok(())
    }

    #[tokio::test]
    async fn serves_updates() -> anyhow::Result<()> {
        let bind_address: SocketAddr = ([127, 0, 0, 1], 0).into();
        let mut overlay = MjpegOverlay::new(bind_address, GrayImage::new(32, 24), 90)?;
        let address = overlay.local_address;
        assert_ne!(address.port(), 0);
        overlay
            .update(&RgbImage::from_pixel(32, 24, Rgb([255, 0, 0])))
            .await?;
        let mut stream = TcpStream::connect(address).await?;
        stream
            .write_all(b"GET /mjpeg HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await?;
        let mut received = Vec::new();
        read_until(&mut stream, &mut received, b"multipart/x-mixed-replace").await;
        let first = read_until(&mut stream, &mut received, &[0xff, 0xd8]).await;
        // A second update is sent to connected clients.
        overlay
            .update(&RgbImage::from_pixel(32, 24, Rgb([0, 0, 255])))
            .await?;
        received.drain(..first + 2);
        read_until(&mut stream, &mut received, &[0xff, 0xd8]).await;
        time::timeout(Duration::from_secs(10), overlay.remove()).await??;
        // The stream is finished once the server shuts down.
        let mut rest = Vec::new();
        time::timeout(Duration::from_secs(10), stream.read_to_end(&mut rest)).await??;
        assert!(overlay.update(&RgbImage::new(32, 24)).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn wrong_size_update() -> anyhow::Result<()> {
        let bind_address: SocketAddr = ([127, 0, 0, 1], 0).into();
        let mut overlay = MjpegOverlay::new(bind_address, GrayImage::new(32, 24), 90)?;
        assert!(overlay.update(&RgbImage::new(16, 16)).await.is_err());
        overlay.remove().await?;
        // Removing twice is fine.
        overlay.remove().await?;
        Ok(())
    }

    #[tokio::test]
    async fn address_in_use() -> anyhow::Result<()> {
        let bind_address: SocketAddr = ([127, 0, 0, 1], 0).into();
        let mut first = MjpegOverlay::new(bind_address, GrayImage::new(4, 4), 90)?;
        let second = MjpegOverlay::new(first.local_address, GrayImage::new(4, 4), 90);
        assert!(second.is_err());
        first.remove().await?;
        Ok(())
    }
}
