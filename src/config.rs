use serde::Deserialize;

// Dev-only fallback; real deployments set SESSION_SECRET.
const DEV_SESSION_SECRET: &str =
    "homewatch-dev-secret-homewatch-dev-secret-homewatch-dev-secret-!!";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub url: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub jpeg_quality: u8,
    pub reconnect_max_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub camera: CameraConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://homewatch.db".into());

        let secret =
            std::env::var("SESSION_SECRET").unwrap_or_else(|_| DEV_SESSION_SECRET.into());
        // The cookie signing key wants 64 bytes of master key material.
        anyhow::ensure!(
            secret.len() >= 64,
            "SESSION_SECRET must be at least 64 bytes, got {}",
            secret.len()
        );
        let session = SessionConfig {
            secret,
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
        };

        let camera = CameraConfig {
            url: std::env::var("CAMERA_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8554/stream.mjpg".into()),
            frame_width: std::env::var("FRAME_WIDTH")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(800),
            frame_height: std::env::var("FRAME_HEIGHT")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(600),
            jpeg_quality: std::env::var("JPEG_QUALITY")
                .ok()
                .and_then(|v| v.parse::<u8>().ok())
                .unwrap_or(80),
            reconnect_max_secs: std::env::var("RECONNECT_MAX_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5),
        };

        Ok(Self {
            database_url,
            session,
            camera,
        })
    }

    /// Fixed configuration for tests; no environment involved.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            session: SessionConfig {
                secret: DEV_SESSION_SECRET.into(),
                ttl_minutes: 30,
            },
            camera: CameraConfig {
                url: "http://127.0.0.1:1/unused".into(),
                frame_width: 80,
                frame_height: 60,
                jpeg_quality: 80,
                reconnect_max_secs: 1,
            },
        }
    }
}
