use crate::state::AppState;
use axum::{routing::get, Router};

pub mod handlers;
pub mod relay;
pub mod source;

pub fn router() -> Router<AppState> {
    Router::new().route("/video_feed", get(handlers::video_feed))
}
