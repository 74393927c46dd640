//! HTTP gateway: merges the per-area subrouters and owns the shared extractors.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    Router,
};

use crate::{AppState, ServiceError};

mod appliances;
mod auth;
mod devices;
mod health;
mod ingest;
mod insights;
mod sensors;
mod thresholds;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(devices::router())
        .merge(sensors::router())
        .merge(thresholds::router())
        .merge(insights::router())
        .merge(appliances::router())
        .merge(ingest::router())
        .with_state(state)
}

/// Caller's access token taken from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

impl<S> FromRequestParts<S> for AccessToken
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // ---
        let value = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".into()))?;

        let token = value
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("malformed bearer token".into()))?;

        Ok(AccessToken(token.to_string()))
    }
}
