//! Weather and AI recommendation endpoints. Both always answer 200, falling
//! back to mock data when the vendors are unavailable.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::AccessToken;
use crate::llm::RecommendationSet;
use crate::services::sensors;
use crate::weather::Weather;
use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/weather", get(weather))
        .route("/devices/{id}/recommendations", get(recommendations))
}

#[derive(Debug, Default, Deserialize)]
struct LocationQuery {
    location: Option<String>,
}

#[derive(Serialize)]
struct RecommendationResponse {
    device_id: Uuid,
    weather: Weather,
    #[serde(flatten)]
    set: RecommendationSet,
}

async fn weather(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Json<Weather> {
    debug!("GET /weather {:?}", query);
    Json(state.weather.current(query.location.as_deref()).await)
}

async fn recommendations(
    State(state): State<AppState>,
    AccessToken(token): AccessToken,
    Path(id): Path<Uuid>,
    Query(query): Query<LocationQuery>,
) -> Json<RecommendationResponse> {
    // ---
    debug!("GET /devices/{}/recommendations", id);
    let (reading, weather) = tokio::join!(
        sensors::get_latest_sensor_data(&state, &token, id),
        state.weather.current(query.location.as_deref()),
    );
    let set = state.llm.recommendations(reading.as_ref(), &weather).await;
    Json(RecommendationResponse {
        device_id: id,
        weather,
        set,
    })
}
