use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use tracing::debug;
use uuid::Uuid;

use super::AccessToken;
use crate::models::{SensorParameter, Threshold};
use crate::services::thresholds::{self, ThresholdBounds, ThresholdInput, ThresholdView};
use crate::{AppState, ServiceResult};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/devices/{id}/thresholds", get(list).put(replace_many))
        .route("/devices/{id}/thresholds/{parameter}", put(upsert_one))
}

async fn list(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
) -> ServiceResult<Json<Vec<ThresholdView>>> {
    debug!("GET /devices/{}/thresholds", id);
    Ok(Json(thresholds::get_thresholds(&state, &token, id).await?))
}

async fn replace_many(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
    Json(inputs): Json<Vec<ThresholdInput>>,
) -> ServiceResult<Json<Vec<Threshold>>> {
    debug!("PUT /devices/{}/thresholds ({} entries)", id, inputs.len());
    Ok(Json(thresholds::upsert_thresholds(&state, &token, id, inputs).await?))
}

async fn upsert_one(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path((id, parameter)): Path<(Uuid, SensorParameter)>,
    Json(bounds): Json<ThresholdBounds>,
) -> ServiceResult<Json<Threshold>> {
    // ---
    debug!("PUT /devices/{}/thresholds/{}", id, parameter);
    let input = bounds.for_parameter(parameter);
    Ok(Json(thresholds::upsert_threshold(&state, &token, id, input).await?))
}
