//! Auth and profile endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::debug;

use super::AccessToken;
use crate::baas::SignUpOutcome;
use crate::models::{CurrentUser, ProfileFields, Session};
use crate::services::auth::{self, Credentials, SignUpRequest};
use crate::{AppState, ServiceResult};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/refresh", post(refresh))
        .route("/auth/signout", post(sign_out))
        .route("/auth/session", get(session))
        .route("/profile", get(session).put(update_profile))
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> ServiceResult<(StatusCode, Json<SignUpOutcome>)> {
    // ---
    debug!("POST /auth/signup");
    let outcome = auth::sign_up(&state, &req).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> ServiceResult<Json<Session>> {
    debug!("POST /auth/signin");
    Ok(Json(auth::sign_in(&state, &creds).await?))
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ServiceResult<Json<Session>> {
    debug!("POST /auth/refresh");
    Ok(Json(auth::refresh(&state, &req.refresh_token).await?))
}

async fn sign_out(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
) -> ServiceResult<StatusCode> {
    debug!("POST /auth/signout");
    auth::sign_out(&state, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn session(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
) -> ServiceResult<Json<CurrentUser>> {
    debug!("GET /auth/session");
    Ok(Json(auth::get_current_user(&state, &token).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Json(fields): Json<ProfileFields>,
) -> ServiceResult<Json<CurrentUser>> {
    debug!("PUT /profile");
    Ok(Json(auth::update_profile(&state, &token, &fields).await?))
}
