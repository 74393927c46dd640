//! Liveness and upstream readiness endpoints.
//!
//! `/health` never touches the network so orchestrators can probe it cheaply.
//! `/health/upstream` checks that the backend-as-a-service answers in time.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::fallback::race;
use crate::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    demo_mode: bool,
}

#[derive(Serialize)]
struct UpstreamResponse {
    baas: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Handle `GET /health`.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        demo_mode: state.config.demo_mode,
    })
}

/// Handle `GET /health/upstream`. Answers 503 when the backend is unreachable.
async fn upstream(State(state): State<AppState>) -> (StatusCode, Json<UpstreamResponse>) {
    // ---
    match race("baas health", state.config.query_timeout(), state.baas.ping()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(UpstreamResponse {
                baas: "ok",
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(UpstreamResponse {
                baas: "unavailable",
                error: Some(e.to_string()),
            }),
        ),
    }
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/health", get(health))
        .route("/health/upstream", get(upstream))
}
