//! Telemetry endpoint for field devices, authenticated by device API key.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use tracing::{debug, info};

use crate::models::Readings;
use crate::services::ingest::{self, IngestReceipt};
use crate::{AppState, ServiceError, ServiceResult};

// ---

pub const API_KEY_HEADER: &str = "x-api-key";

pub fn router() -> Router<AppState> {
    Router::new().route("/ingest", post(handler))
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(readings): Json<Readings>,
) -> ServiceResult<(StatusCode, Json<IngestReceipt>)> {
    // ---
    debug!("POST /ingest");
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized(format!("missing {} header", API_KEY_HEADER)))?;

    let receipt = ingest::ingest(&state, api_key, &readings).await?;
    info!(
        "Ingested reading for device {} ({} alert(s))",
        receipt.reading.device_id,
        receipt.alerts.len()
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}
