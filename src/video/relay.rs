//! The relay loop: one task per process dials the camera, transforms each
//! frame to the fixed output size, and fans the result out to every viewer
//! over a broadcast channel. Viewers that lag skip frames; viewers never
//! see camera errors.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ImageFormat};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::video::source::{FrameSource, FrameStream};

const BROADCAST_CAPACITY: usize = 16;
const RETRY_BASE: Duration = Duration::from_millis(250);

/// Subscription point handed to HTTP handlers.
#[derive(Clone)]
pub struct RelayHandle {
    tx: broadcast::Sender<Bytes>,
}

impl RelayHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.tx.subscribe()
    }

    /// A handle with no relay behind it; subscribers simply never receive
    /// a frame. Used by tests and tools that don't exercise video.
    pub fn disconnected() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }
}

/// Bounded exponential backoff for redialing the camera.
#[derive(Debug)]
pub struct RetryPolicy {
    base: Duration,
    max: Duration,
    next_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max: Duration) -> Self {
        let max = max.max(RETRY_BASE);
        Self {
            base: RETRY_BASE,
            max,
            next_delay: RETRY_BASE,
        }
    }

    pub fn reset(&mut self) {
        self.next_delay = self.base;
    }

    fn advance(&mut self) -> Duration {
        let delay = self.next_delay;
        self.next_delay = (delay * 2).min(self.max);
        delay
    }

    pub async fn wait(&mut self) {
        tokio::time::sleep(self.advance()).await;
    }
}

enum RelayState {
    Connected(Box<dyn FrameStream>),
    Reconnecting,
}

pub struct Relay;

impl Relay {
    /// Spawn the relay task. It runs for the life of the process and owns
    /// at most one upstream connection at a time.
    pub fn spawn(source: Arc<dyn FrameSource>, cfg: CameraConfig) -> RelayHandle {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        tokio::spawn(run(source, cfg, tx.clone()));
        RelayHandle { tx }
    }
}

async fn run(source: Arc<dyn FrameSource>, cfg: CameraConfig, tx: broadcast::Sender<Bytes>) {
    let mut retry = RetryPolicy::new(Duration::from_secs(cfg.reconnect_max_secs));
    let mut state = RelayState::Reconnecting;
    loop {
        state = match state {
            RelayState::Reconnecting => match source.connect().await {
                Ok(stream) => {
                    info!(url = %cfg.url, "camera connected");
                    RelayState::Connected(stream)
                }
                Err(e) => {
                    warn!(error = %e, "camera connect failed");
                    retry.wait().await;
                    RelayState::Reconnecting
                }
            },
            RelayState::Connected(mut stream) => match stream.next_frame().await {
                Ok(raw) => {
                    retry.reset();
                    match transform(&raw, &cfg) {
                        // No receivers just means nobody is watching.
                        Ok(jpeg) => {
                            let _ = tx.send(jpeg);
                        }
                        Err(e) => debug!(error = %e, "dropping undecodable frame"),
                    }
                    RelayState::Connected(stream)
                }
                Err(e) => {
                    warn!(error = %e, "camera read failed; reconnecting");
                    // Release the dead connection before redialing.
                    drop(stream);
                    retry.wait().await;
                    RelayState::Reconnecting
                }
            },
        };
    }
}

/// Decode, scale to the fixed output resolution, and re-encode.
pub fn transform(frame: &[u8], cfg: &CameraConfig) -> anyhow::Result<Bytes> {
    let decoded =
        image::load_from_memory_with_format(frame, ImageFormat::Jpeg).context("decode frame")?;
    let resized = decoded
        .resize_exact(cfg.frame_width, cfg.frame_height, FilterType::Triangle)
        .to_rgb8();

    let mut out = Vec::with_capacity(frame.len());
    let encoder = JpegEncoder::new_with_quality(&mut out, cfg.jpeg_quality);
    resized.write_with_encoder(encoder).context("encode frame")?;
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;

    fn test_cfg() -> CameraConfig {
        CameraConfig {
            url: "http://camera.test/stream".into(),
            frame_width: 4,
            frame_height: 4,
            jpeg_quality: 80,
            reconnect_max_secs: 1,
        }
    }

    fn sample_jpeg(width: u32, height: u32) -> Bytes {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 200, 30]));
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, 90);
        img.write_with_encoder(encoder).unwrap();
        Bytes::from(out)
    }

    /// Yields a few frames, then fails the read so the relay must redial.
    struct FlakyStream {
        frames_left: usize,
        frame: Bytes,
    }

    #[async_trait]
    impl FrameStream for FlakyStream {
        async fn next_frame(&mut self) -> anyhow::Result<Bytes> {
            if self.frames_left == 0 {
                anyhow::bail!("simulated camera dropout");
            }
            self.frames_left -= 1;
            // keep the loop from starving the test runtime
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(self.frame.clone())
        }
    }

    struct FlakySource {
        connects: AtomicUsize,
        frames_per_connection: usize,
    }

    #[async_trait]
    impl FrameSource for FlakySource {
        async fn connect(&self) -> anyhow::Result<Box<dyn FrameStream>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FlakyStream {
                frames_left: self.frames_per_connection,
                frame: sample_jpeg(16, 12),
            }))
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_ceiling_and_resets() {
        let mut retry = RetryPolicy::new(Duration::from_secs(1));
        assert_eq!(retry.advance(), Duration::from_millis(250));
        assert_eq!(retry.advance(), Duration::from_millis(500));
        assert_eq!(retry.advance(), Duration::from_millis(1000));
        assert_eq!(retry.advance(), Duration::from_millis(1000));
        retry.reset();
        assert_eq!(retry.advance(), Duration::from_millis(250));
    }

    #[test]
    fn transform_scales_to_the_configured_resolution() {
        let cfg = test_cfg();
        let out = transform(&sample_jpeg(16, 12), &cfg).unwrap();
        let decoded = image::load_from_memory_with_format(&out, ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 4);
    }

    #[test]
    fn transform_rejects_garbage() {
        assert!(transform(b"not a jpeg", &test_cfg()).is_err());
    }

    #[tokio::test]
    async fn relay_survives_camera_dropouts() {
        let source = Arc::new(FlakySource {
            connects: AtomicUsize::new(0),
            frames_per_connection: 2,
        });
        let handle = Relay::spawn(source.clone(), test_cfg());
        let mut rx = handle.subscribe();

        // More frames than one connection can serve: forces at least one
        // release-and-redial cycle while the subscription stays live.
        for _ in 0..5 {
            let frame = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("relay kept emitting")
                .expect("channel stayed open");
            assert_eq!(&frame[..2], &[0xFF, 0xD8]);
        }

        assert!(source.connects.load(Ordering::SeqCst) >= 2);
    }
}
