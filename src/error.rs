//! Error type shared by the service layer and the HTTP routes.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{} timed out after {}ms", .op, .limit.as_millis())]
    Timeout { op: &'static str, limit: Duration },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),
}

impl ServiceError {
    /// The backend could not be reached or failed on its side, as opposed to
    /// refusing the request. Only these errors justify serving stale data.
    pub fn is_outage(&self) -> bool {
        // ---
        match self {
            ServiceError::Transport(_) | ServiceError::Timeout { .. } => true,
            ServiceError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        // ---
        match self {
            ServiceError::Transport(_) | ServiceError::Decode(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Upstream { status, .. } => match *status {
                401 | 403 => StatusCode::UNAUTHORIZED,
                404 => StatusCode::NOT_FOUND,
                409 => StatusCode::CONFLICT,
                400 | 422 => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_GATEWAY,
            },
            ServiceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_upstream_status_mapping() {
        let err = ServiceError::Upstream {
            status: 403,
            body: "permission denied".into(),
        };
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = ServiceError::Upstream {
            status: 500,
            body: String::new(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_timeout_message() {
        let err = ServiceError::Timeout {
            op: "latest reading",
            limit: Duration::from_millis(5000),
        };
        assert_eq!(err.to_string(), "latest reading timed out after 5000ms");
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_only_backend_failures_are_outages() {
        // ---
        let timeout = ServiceError::Timeout {
            op: "latest reading",
            limit: Duration::from_millis(100),
        };
        assert!(timeout.is_outage());
        assert!(ServiceError::Upstream {
            status: 503,
            body: String::new()
        }
        .is_outage());

        for status in [401, 403, 404] {
            let refused = ServiceError::Upstream {
                status,
                body: String::new(),
            };
            assert!(!refused.is_outage(), "{} is a refusal", status);
        }
        assert!(!ServiceError::Unauthorized("bad token".into()).is_outage());
    }

    #[test]
    fn test_policy_errors_are_client_errors() {
        assert_eq!(
            ServiceError::Conflict("one device per account".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::NotConfigured("ingestion").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
