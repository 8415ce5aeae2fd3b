use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

use crate::auth::{
    dto::{LoginForm, NextQuery, RegisterForm},
    services::{self, AuthError, RegisterError},
    session,
};
use crate::state::AppState;
use crate::views;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/logout", get(logout))
}

#[instrument(skip_all)]
async fn login_page(
    session: Session,
    Query(q): Query<NextQuery>,
) -> Result<Response, (StatusCode, String)> {
    if session::user_id(&session).await.map_err(internal)?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let flash = session::take_flash(&session).await.map_err(internal)?;
    Ok(views::login_page(flash.as_deref(), q.next.as_deref()).into_response())
}

#[instrument(skip_all, fields(username = %form.username))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Query(q): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, (StatusCode, String)> {
    if session::user_id(&session).await.map_err(internal)?.is_some() {
        return Ok(Redirect::to("/"));
    }

    match services::verify(&state.db, form.username.trim(), &form.password).await {
        Ok(user) => {
            session::log_in(&session, user.id).await.map_err(internal)?;
            info!(user_id = user.id, "user logged in");
            Ok(Redirect::to(&session::safe_next_path(q.next.as_deref())))
        }
        Err(AuthError::InvalidCredentials) => {
            warn!("login rejected");
            session::flash(&session, "Invalid username or password")
                .await
                .map_err(internal)?;
            Ok(Redirect::to("/login"))
        }
        Err(AuthError::Other(e)) => Err(internal(e)),
    }
}

#[instrument(skip_all)]
async fn register_page(session: Session) -> Result<Response, (StatusCode, String)> {
    if session::user_id(&session).await.map_err(internal)?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let flash = session::take_flash(&session).await.map_err(internal)?;
    Ok(views::register_page(flash.as_deref()).into_response())
}

#[instrument(skip_all, fields(username = %form.username))]
async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(mut form): Form<RegisterForm>,
) -> Result<Redirect, (StatusCode, String)> {
    if session::user_id(&session).await.map_err(internal)?.is_some() {
        return Ok(Redirect::to("/"));
    }

    form.email = form.email.trim().to_lowercase();
    let username = form.username.trim().to_string();

    match services::register(&state.db, &username, &form.email, &form.password).await {
        Ok(_) => Ok(Redirect::to("/login")),
        Err(
            e @ (RegisterError::UsernameTaken
            | RegisterError::EmailTaken
            | RegisterError::InvalidEmail
            | RegisterError::PasswordTooShort),
        ) => {
            session::flash(&session, &e.to_string())
                .await
                .map_err(internal)?;
            Ok(Redirect::to("/register"))
        }
        Err(RegisterError::Other(e)) => Err(internal(e)),
    }
}

#[instrument(skip_all)]
async fn logout(session: Session) -> Result<Redirect, (StatusCode, String)> {
    session::log_out(&session).await.map_err(internal)?;
    Ok(Redirect::to("/login"))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
