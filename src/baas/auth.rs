//! Auth endpoints of the backend-as-a-service (`/auth/v1`).

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{send_empty, send_json, BaasClient};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{AuthUser, Session};

#[derive(Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a Value,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// Result of a sign-up: either an immediate session, or a user that still has
/// to confirm their email address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignUpOutcome {
    SignedIn { session: Session },
    PendingConfirmation { user: AuthUser },
}

/// Credential failures come back as 400/401/403; surface them as `Unauthorized`.
fn credentials_error(err: ServiceError) -> ServiceError {
    // ---
    match err {
        ServiceError::Upstream { status, body } if matches!(status, 400 | 401 | 403) => {
            ServiceError::Unauthorized(extract_message(&body))
        }
        other => other,
    }
}

fn extract_message(body: &str) -> String {
    // ---
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(String::from))
        })
        .unwrap_or_else(|| "invalid credentials".to_string())
}

impl BaasClient {
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &Value,
    ) -> ServiceResult<SignUpOutcome> {
        // ---
        tracing::debug!("BaaS sign up {}", email);
        let req = self
            .request(Method::POST, "/auth/v1/signup", self.anon_key())
            .json(&SignUpBody {
                email,
                password,
                data: metadata,
            });
        let raw: Value = send_json(req).await.map_err(credentials_error)?;

        if raw.get("access_token").is_some() {
            let session: Session = serde_json::from_value(raw)?;
            Ok(SignUpOutcome::SignedIn { session })
        } else {
            // Without a session the vendor returns the bare user, sometimes wrapped.
            let user_value = raw.get("user").cloned().unwrap_or(raw);
            let user: AuthUser = serde_json::from_value(user_value)?;
            Ok(SignUpOutcome::PendingConfirmation { user })
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<Session> {
        // ---
        tracing::debug!("BaaS sign in {}", email);
        let req = self
            .request(Method::POST, "/auth/v1/token", self.anon_key())
            .query(&[("grant_type", "password")])
            .json(&PasswordCredentials { email, password });
        send_json(req).await.map_err(credentials_error)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> ServiceResult<Session> {
        // ---
        let req = self
            .request(Method::POST, "/auth/v1/token", self.anon_key())
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshBody { refresh_token });
        send_json(req).await.map_err(credentials_error)
    }

    pub async fn sign_out(&self, access_token: &str) -> ServiceResult<()> {
        // ---
        let req = self.request(Method::POST, "/auth/v1/logout", access_token);
        send_empty(req).await.map_err(credentials_error)
    }

    /// Resolve the user behind `access_token`.
    pub async fn get_user(&self, access_token: &str) -> ServiceResult<AuthUser> {
        // ---
        let req = self.request(Method::GET, "/auth/v1/user", access_token);
        send_json(req).await.map_err(credentials_error)
    }
}
