//! Sign-up/in/out, session retrieval and the user profile.

use serde::Deserialize;
use serde_json::json;

use crate::baas::{Query, SignUpOutcome};
use crate::error::{ServiceError, ServiceResult};
use crate::fallback::race;
use crate::models::{AuthUser, CurrentUser, ProfileFields, Session, UserProfile};
use crate::AppState;

// ---

const PROFILES: &str = "user_profiles";
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

fn validate_credentials(email: &str, password: &str) -> ServiceResult<()> {
    // ---
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::Validation("a valid email is required".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub async fn sign_up(state: &AppState, req: &SignUpRequest) -> ServiceResult<SignUpOutcome> {
    // ---
    validate_credentials(&req.email, &req.password)?;
    let metadata = json!({
        "full_name": req.profile.full_name,
        "phone": req.profile.phone,
        "farm_name": req.profile.farm_name,
        "location": req.profile.location,
    });
    let outcome = race(
        "sign up",
        state.config.auth_timeout(),
        state.baas.sign_up(req.email.trim(), &req.password, &metadata),
    )
    .await?;

    // A session means we can write the profile row right away.
    if let SignUpOutcome::SignedIn { session } = &outcome {
        if let Err(e) = update_profile(state, &session.access_token, &req.profile).await {
            tracing::warn!("Signed up {} but could not store profile: {}", session.user.id, e);
        }
    }
    tracing::info!("Signed up {}", req.email.trim());
    Ok(outcome)
}

pub async fn sign_in(state: &AppState, creds: &Credentials) -> ServiceResult<Session> {
    // ---
    if creds.email.trim().is_empty() || creds.password.is_empty() {
        return Err(ServiceError::Validation("email and password are required".into()));
    }
    let session = race(
        "sign in",
        state.config.auth_timeout(),
        state.baas.sign_in(creds.email.trim(), &creds.password),
    )
    .await?;
    tracing::info!("Signed in user {}", session.user.id);
    Ok(session)
}

pub async fn refresh(state: &AppState, refresh_token: &str) -> ServiceResult<Session> {
    race(
        "refresh session",
        state.config.auth_timeout(),
        state.baas.refresh_session(refresh_token),
    )
    .await
}

pub async fn sign_out(state: &AppState, token: &str) -> ServiceResult<()> {
    race("sign out", state.config.auth_timeout(), state.baas.sign_out(token)).await
}

/// Identity behind `token`. Every user operation that needs the user id goes through here.
pub async fn identity(state: &AppState, token: &str) -> ServiceResult<AuthUser> {
    race("session lookup", state.config.auth_timeout(), state.baas.get_user(token)).await
}

/// Auth identity merged with the profile row.
///
/// A missing, failing, or slow profile query still yields the user with empty
/// profile fields.
pub async fn get_current_user(state: &AppState, token: &str) -> ServiceResult<CurrentUser> {
    // ---
    let user = identity(state, token).await?;

    let query = Query::new().select("*").eq("id", user.id).limit(1);
    let fetch = state.baas.select::<UserProfile>(token, PROFILES, &query);
    let profile = match race("profile lookup", state.config.query_timeout(), fetch).await {
        Ok(rows) => rows.into_iter().next(),
        Err(e) => {
            tracing::warn!("Profile for {} unavailable, returning bare user: {}", user.id, e);
            None
        }
    };
    Ok(CurrentUser::merge(user, profile))
}

pub async fn update_profile(
    state: &AppState,
    token: &str,
    fields: &ProfileFields,
) -> ServiceResult<CurrentUser> {
    // ---
    let user = identity(state, token).await?;
    let row = UserProfile {
        id: user.id,
        full_name: fields.full_name.clone(),
        phone: fields.phone.clone(),
        farm_name: fields.farm_name.clone(),
        location: fields.location.clone(),
    };
    let stored: Vec<UserProfile> = race(
        "profile upsert",
        state.config.query_timeout(),
        state.baas.upsert(token, PROFILES, "id", &row),
    )
    .await?;
    Ok(CurrentUser::merge(user, stored.into_iter().next().or(Some(row))))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_credentials_validation() {
        // ---
        assert!(validate_credentials("grower@farm.io", "secret1").is_ok());
        assert!(matches!(
            validate_credentials("not-an-email", "secret1"),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            validate_credentials("grower@farm.io", "123"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_sign_up_request_takes_profile_inline() {
        // ---
        let req: SignUpRequest = serde_json::from_value(json!({
            "email": "grower@farm.io",
            "password": "secret1",
            "farm_name": "Hillside",
            "phone": "+254700000000"
        }))
        .unwrap();
        assert_eq!(req.profile.farm_name.as_deref(), Some("Hillside"));
        assert!(req.profile.full_name.is_none());
    }
}
