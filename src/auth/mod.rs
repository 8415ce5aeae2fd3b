use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod services;
pub mod session;

pub fn public_routes() -> Router<AppState> {
    handlers::public_routes()
}

pub fn protected_routes() -> Router<AppState> {
    handlers::protected_routes()
}
