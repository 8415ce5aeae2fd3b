use std::net::SocketAddr;

use anyhow::Context;
use axum::{middleware, response::Html, routing::get, Router};
use time::Duration as TimeDuration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::Key, Expiry, MemoryStore, SessionManagerLayer};

use crate::auth::session::{self, CurrentUser};
use crate::state::AppState;
use crate::{auth, readings, video, views};

pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    let session_cfg = &state.config.session;
    let key = Key::try_from(session_cfg.secret.as_bytes())
        .context("SESSION_SECRET is not usable as a signing key")?;
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(TimeDuration::minutes(
            session_cfg.ttl_minutes,
        )))
        .with_signed(key);

    let protected = Router::new()
        .route("/", get(index))
        .merge(auth::protected_routes())
        .merge(readings::router())
        .merge(video::router())
        .route_layer(middleware::from_fn(session::require_login));

    Ok(Router::new()
        .merge(auth::public_routes())
        .merge(protected)
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        ))
}

async fn index(CurrentUser(user): CurrentUser) -> Html<String> {
    views::index_page(&user.username)
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
