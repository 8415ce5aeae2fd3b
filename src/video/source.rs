//! Upstream camera access. The relay only ever sees the two traits here,
//! so tests can stand in a scripted source and the HTTP camera stays a
//! swappable collaborator.

use std::pin::Pin;

use anyhow::Context;
use axum::async_trait;
use bytes::{Bytes, BytesMut};
use tokio_stream::{Stream, StreamExt};

use crate::config::CameraConfig;

/// A camera address that can be dialed any number of times.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn connect(&self) -> anyhow::Result<Box<dyn FrameStream>>;
}

/// One live upstream connection yielding encoded JPEG frames. Dropping it
/// releases the connection.
#[async_trait]
pub trait FrameStream: Send {
    async fn next_frame(&mut self) -> anyhow::Result<Bytes>;
}

/// An IP camera's MJPEG substream over HTTP.
pub struct MjpegCamera {
    url: String,
    client: reqwest::Client,
}

impl MjpegCamera {
    pub fn new(cfg: &CameraConfig) -> Self {
        Self {
            url: cfg.url.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl FrameSource for MjpegCamera {
    async fn connect(&self) -> anyhow::Result<Box<dyn FrameStream>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("open camera stream")?
            .error_for_status()
            .context("camera refused the stream")?;
        Ok(Box::new(MjpegStream {
            chunks: Box::pin(response.bytes_stream()),
            buf: BytesMut::new(),
        }))
    }
}

// A buffer larger than this without a complete frame means the upstream is
// not actually sending JPEGs.
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

struct MjpegStream {
    chunks: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buf: BytesMut,
}

#[async_trait]
impl FrameStream for MjpegStream {
    async fn next_frame(&mut self) -> anyhow::Result<Bytes> {
        loop {
            if let Some(frame) = extract_jpeg(&mut self.buf) {
                return Ok(frame);
            }
            anyhow::ensure!(
                self.buf.len() <= MAX_FRAME_BYTES,
                "no frame boundary within {MAX_FRAME_BYTES} bytes"
            );
            match self.chunks.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(e).context("camera read"),
                None => anyhow::bail!("camera stream ended"),
            }
        }
    }
}

fn find_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

/// Pull the first complete JPEG (SOI `FF D8` through EOI `FF D9`) out of
/// the buffer, discarding any multipart boundary noise before it.
fn extract_jpeg(buf: &mut BytesMut) -> Option<Bytes> {
    let soi = find_marker(buf, [0xFF, 0xD8])?;
    let eoi = soi + 2 + find_marker(&buf[soi + 2..], [0xFF, 0xD9])?;
    let _ = buf.split_to(soi);
    Some(buf.split_to(eoi - soi + 2).freeze())
}
