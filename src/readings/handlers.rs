use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use time::Duration;
use tracing::{error, info, instrument, warn};

use crate::readings::{dto::ReadingDto, repo, services};
use crate::state::AppState;

/// How far back `/temperature_data` looks, and the synthetic batch window.
const QUERY_WINDOW: Duration = Duration::hours(24);
const SAMPLE_INTERVAL: Duration = Duration::minutes(30);

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/temperature_data", get(temperature_data))
        .route("/add_temperature", post(add_temperature))
        .route("/insert_test_data", get(insert_test_data))
        .route("/generate_sample_data", get(generate_sample_data))
}

#[instrument(skip_all)]
async fn temperature_data(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReadingDto>>, (StatusCode, Json<Value>)> {
    let end = repo::now_second_precision();
    let start = end - QUERY_WINDOW;

    let rows = repo::query_range(&state.db, start, end)
        .await
        .map_err(storage_error)?;

    // A single malformed row is dropped, not the whole response.
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match row.to_external() {
            Ok(dto) => out.push(dto),
            Err(e) => warn!(id = row.id, error = %e, "skipping unrepresentable reading"),
        }
    }
    Ok(Json(out))
}

#[derive(Debug, Deserialize)]
struct AddTemperatureBody {
    temperature: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
}

#[instrument(skip_all)]
async fn add_temperature(
    State(state): State<AppState>,
    Json(body): Json<AddTemperatureBody>,
) -> Result<(StatusCode, Json<ReadingDto>), (StatusCode, Json<Value>)> {
    let Some(temperature) = body.temperature else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No temperature value provided" })),
        ));
    };

    let reading = repo::insert(&state.db, temperature, body.humidity, None)
        .await
        .map_err(storage_error)?;
    // A row we just wrote must be representable.
    let dto = reading
        .to_external()
        .map_err(|e| storage_error(anyhow::Error::new(e)))?;

    info!(id = dto.id, "reading stored");
    Ok((StatusCode::CREATED, Json(dto)))
}

#[instrument(skip_all)]
async fn insert_test_data(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let count = services::regenerate(
        &state.db,
        QUERY_WINDOW,
        SAMPLE_INTERVAL,
        services::random_climate(),
    )
    .await
    .map_err(storage_error)?;

    Ok(Json(json!({
        "message": "Test data inserted successfully",
        "count": count
    })))
}

#[instrument(skip_all)]
async fn generate_sample_data(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    services::backfill(
        &state.db,
        QUERY_WINDOW,
        SAMPLE_INTERVAL,
        services::random_temperature(),
    )
    .await
    .map_err(storage_error)?;

    Ok(Json(json!({ "message": "Sample data generated successfully" })))
}

fn storage_error(e: anyhow::Error) -> (StatusCode, Json<Value>) {
    error!(error = %e, "storage operation failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}
