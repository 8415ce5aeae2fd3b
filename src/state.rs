use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::video::relay::{Relay, RelayHandle};
use crate::video::source::MjpegCamera;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub relay: RelayHandle,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let opts = SqliteConnectOptions::from_str(&config.database_url)
            .context("parse DATABASE_URL")?
            .create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(opts)
            .await
            .context("connect to database")?;

        // One upstream camera connection shared by every viewer.
        let camera = Arc::new(MjpegCamera::new(&config.camera));
        let relay = Relay::spawn(camera, config.camera.clone());

        Ok(Self { db, config, relay })
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>, relay: RelayHandle) -> Self {
        Self { db, config, relay }
    }
}
