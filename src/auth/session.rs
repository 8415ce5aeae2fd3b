//! Session gate: every protected route sits behind [`require_login`], and
//! handlers that need the signed-in identity take it explicitly via
//! [`CurrentUser`] — there is no ambient current-user global.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tower_sessions::Session;
use tracing::error;

use crate::auth::repo::User;
use crate::state::AppState;

const USER_ID_KEY: &str = "user_id";
const FLASH_KEY: &str = "_flash";

/// Query-component escaping for the `next` path. `/` stays literal so the
/// redirect target remains readable.
pub const NEXT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'=');

pub async fn user_id(session: &Session) -> anyhow::Result<Option<i64>> {
    Ok(session.get::<i64>(USER_ID_KEY).await?)
}

/// Record the verified identity. The session id is rotated so a cookie
/// captured before login stops being useful.
pub async fn log_in(session: &Session, id: i64) -> anyhow::Result<()> {
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, id).await?;
    Ok(())
}

/// Drop the whole session; the next request starts unauthenticated.
pub async fn log_out(session: &Session) -> anyhow::Result<()> {
    session.flush().await?;
    Ok(())
}

pub async fn flash(session: &Session, message: &str) -> anyhow::Result<()> {
    session.insert(FLASH_KEY, message).await?;
    Ok(())
}

pub async fn take_flash(session: &Session) -> anyhow::Result<Option<String>> {
    Ok(session.remove::<String>(FLASH_KEY).await?)
}

/// Only same-origin relative paths may be used as a post-login redirect;
/// anything that could name another host falls back to the landing page.
pub fn safe_next_path(next: Option<&str>) -> String {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.contains("://") =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

fn login_redirect(uri: &Uri) -> String {
    let wanted = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!(
        "/login?next={}",
        utf8_percent_encode(wanted, NEXT_ENCODE_SET)
    )
}

/// Middleware guarding protected routes: unauthenticated requests are
/// bounced to the login form with the originally requested path recorded.
pub async fn require_login(session: Session, req: Request, next: Next) -> Response {
    match user_id(&session).await {
        Ok(Some(_)) => next.run(req).await,
        Ok(None) => Redirect::to(&login_redirect(req.uri())).into_response(),
        Err(e) => {
            error!(error = %e, "session load failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "session failure").into_response()
        }
    }
}

/// The signed-in user's row, loaded per request.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(status, msg)| (status, msg.to_string()))?;

        let id = user_id(&session)
            .await
            .map_err(|e| {
                error!(error = %e, "session load failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "session failure".into())
            })?
            .ok_or((StatusCode::UNAUTHORIZED, "login required".to_string()))?;

        let user = User::find_by_id(&state.db, id)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = id, "user lookup failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "user lookup failed".into())
            })?
            .ok_or((StatusCode::UNAUTHORIZED, "unknown user".to_string()))?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_urls_are_rejected() {
        assert_eq!(safe_next_path(Some("http://evil.example/steal")), "/");
        assert_eq!(safe_next_path(Some("https://evil.example")), "/");
    }

    #[test]
    fn scheme_relative_and_backslash_tricks_are_rejected() {
        assert_eq!(safe_next_path(Some("//evil.example/steal")), "/");
        assert_eq!(safe_next_path(Some("/\\evil.example")), "/");
        assert_eq!(safe_next_path(Some("javascript://alert(1)")), "/");
        assert_eq!(safe_next_path(Some("/redirect?to=https://x")), "/");
    }

    #[test]
    fn relative_paths_pass_through() {
        assert_eq!(safe_next_path(Some("/dashboard")), "/dashboard");
        assert_eq!(
            safe_next_path(Some("/temperature_data?hours=24")),
            "/temperature_data?hours=24"
        );
    }

    #[test]
    fn missing_or_bare_values_fall_back_to_the_landing_page() {
        assert_eq!(safe_next_path(None), "/");
        assert_eq!(safe_next_path(Some("")), "/");
        assert_eq!(safe_next_path(Some("dashboard")), "/");
    }

    #[test]
    fn login_redirect_keeps_path_and_query() {
        let uri: Uri = "/temperature_data?hours=24".parse().unwrap();
        assert_eq!(
            login_redirect(&uri),
            "/login?next=/temperature_data%3Fhours%3D24"
        );
    }
}
