//! Mock appliance controls. Every call resolves the caller's session first,
//! so an invalid token is rejected even though appliance state is not per user.

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::debug;

use super::AccessToken;
use crate::appliances::{Appliance, SetAppliance};
use crate::services::auth::identity;
use crate::{AppState, ServiceResult};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/appliances", get(list))
        .route("/appliances/{id}", put(set))
        .route("/appliances/{id}/toggle", post(toggle))
}

async fn list(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
) -> ServiceResult<Json<Vec<Appliance>>> {
    debug!("GET /appliances");
    identity(&state, &token).await?;
    Ok(Json(state.appliances.list().await))
}

async fn toggle(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<String>,
) -> ServiceResult<Json<Appliance>> {
    debug!("POST /appliances/{}/toggle", id);
    let user = identity(&state, &token).await?;
    debug!("Appliance {} toggled by {}", id, user.id);
    Ok(Json(state.appliances.toggle(&id).await?))
}

async fn set(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<String>,
    Json(req): Json<SetAppliance>,
) -> ServiceResult<Json<Appliance>> {
    debug!("PUT /appliances/{} is_on={}", id, req.is_on);
    identity(&state, &token).await?;
    Ok(Json(state.appliances.set(&id, req.is_on).await?))
}
