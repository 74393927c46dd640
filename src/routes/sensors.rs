use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::AccessToken;
use crate::models::{Alert, SensorData};
use crate::services::alerts::{self, AlertFilter};
use crate::services::sensors::{self, HistoryQuery, ParameterSummary};
use crate::{AppState, ServiceResult};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/devices/{id}/sensors/latest", get(latest))
        .route("/devices/{id}/sensors/history", get(history))
        .route("/devices/{id}/sensors/summary", get(summary))
        .route("/devices/{id}/alerts", get(list_alerts))
}

#[derive(Serialize)]
struct SummaryResponse {
    device_id: Uuid,
    hours: u32,
    readings: usize,
    parameters: Vec<ParameterSummary>,
}

/// `null` when the device has no reading or the backend is unavailable.
async fn latest(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
) -> Json<Option<SensorData>> {
    debug!("GET /devices/{}/sensors/latest", id);
    Json(sensors::get_latest_sensor_data(&state, &token, id).await)
}

async fn history(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
) -> ServiceResult<Json<Vec<SensorData>>> {
    debug!("GET /devices/{}/sensors/history {:?}", id, params);
    Ok(Json(sensors::get_sensor_history(&state, &token, id, &params).await?))
}

async fn summary(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
) -> ServiceResult<Json<SummaryResponse>> {
    // ---
    debug!("GET /devices/{}/sensors/summary {:?}", id, params);
    let rows = sensors::get_sensor_history(&state, &token, id, &params).await?;
    Ok(Json(SummaryResponse {
        device_id: id,
        hours: params.hours(),
        readings: rows.len(),
        parameters: sensors::summarize(&rows),
    }))
}

async fn list_alerts(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
    Query(filter): Query<AlertFilter>,
) -> ServiceResult<Json<Vec<Alert>>> {
    debug!("GET /devices/{}/alerts {:?}", id, filter);
    Ok(Json(alerts::list_alerts(&state, &token, id, &filter).await?))
}
