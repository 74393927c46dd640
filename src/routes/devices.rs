use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::debug;
use uuid::Uuid;

use super::AccessToken;
use crate::models::{Device, DevicePatch};
use crate::services::devices::{self, CreateDevice};
use crate::{AppState, ServiceResult};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/devices", get(list).post(create))
        .route("/devices/{id}", get(show).patch(update).delete(remove))
        .route("/devices/{id}/api-key", post(rotate_key))
}

async fn list(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
) -> ServiceResult<Json<Vec<Device>>> {
    debug!("GET /devices");
    Ok(Json(devices::list_devices(&state, &token).await?))
}

async fn create(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Json(req): Json<CreateDevice>,
) -> ServiceResult<(StatusCode, Json<Device>)> {
    debug!("POST /devices");
    let device = devices::create_device(&state, &token, &req).await?;
    Ok((StatusCode::CREATED, Json(device)))
}

async fn show(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
) -> ServiceResult<Json<Device>> {
    debug!("GET /devices/{}", id);
    Ok(Json(devices::get_device(&state, &token, id).await?))
}

async fn update(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
    Json(patch): Json<DevicePatch>,
) -> ServiceResult<Json<Device>> {
    debug!("PATCH /devices/{}", id);
    Ok(Json(devices::update_device(&state, &token, id, &patch).await?))
}

async fn remove(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
) -> ServiceResult<StatusCode> {
    debug!("DELETE /devices/{}", id);
    devices::delete_device(&state, &token, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn rotate_key(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
) -> ServiceResult<Json<Device>> {
    debug!("POST /devices/{}/api-key", id);
    Ok(Json(devices::regenerate_api_key(&state, &token, id).await?))
}
