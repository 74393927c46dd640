//! Device management. An account owns at most one device.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::baas::Query;
use crate::error::{ServiceError, ServiceResult};
use crate::fallback::race;
use crate::models::{Device, DevicePatch, NewDevice};
use crate::services::auth::identity;
use crate::AppState;

// ---

const TABLE: &str = "devices";
const MAX_NAME_LEN: usize = 100;
pub const DEVICES_PER_ACCOUNT: usize = 1;

#[derive(Debug, Deserialize)]
pub struct CreateDevice {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Serialize)]
struct ApiKeyPatch {
    api_key: String,
}

/// Fresh device key, e.g. `dev_3f2c...`.
pub fn generate_api_key() -> String {
    format!("dev_{}", Uuid::new_v4().simple())
}

fn validate_name(name: &str) -> ServiceResult<String> {
    // ---
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("device name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::Validation(format!(
            "device name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn by_id(device_id: Uuid) -> Query {
    Query::new().eq("id", device_id)
}

pub async fn list_devices(state: &AppState, token: &str) -> ServiceResult<Vec<Device>> {
    // ---
    let user = identity(state, token).await?;
    let query = Query::new()
        .select("*")
        .eq("user_id", user.id)
        .order("created_at", true);
    race(
        "device list",
        state.config.query_timeout(),
        state.baas.select(token, TABLE, &query),
    )
    .await
}

pub async fn get_device(state: &AppState, token: &str, device_id: Uuid) -> ServiceResult<Device> {
    // ---
    let query = by_id(device_id).select("*").limit(1);
    let rows: Vec<Device> = race(
        "device lookup",
        state.config.query_timeout(),
        state.baas.select(token, TABLE, &query),
    )
    .await?;
    rows.into_iter()
        .next()
        .ok_or_else(|| ServiceError::NotFound(format!("device {}", device_id)))
}

/// Register the caller's device. A second device is rejected with `Conflict`.
pub async fn create_device(
    state: &AppState,
    token: &str,
    req: &CreateDevice,
) -> ServiceResult<Device> {
    // ---
    let name = validate_name(&req.name)?;
    let user = identity(state, token).await?;

    let existing = list_devices(state, token).await?;
    if existing.len() >= DEVICES_PER_ACCOUNT {
        return Err(ServiceError::Conflict(format!(
            "account already has {} device(s); only {} allowed",
            existing.len(),
            DEVICES_PER_ACCOUNT
        )));
    }

    let row = NewDevice {
        user_id: user.id,
        name,
        location: req
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from),
        is_active: true,
        api_key: generate_api_key(),
    };
    let stored: Vec<Device> = race(
        "device insert",
        state.config.query_timeout(),
        state.baas.insert(token, TABLE, &row),
    )
    .await?;

    let device = stored
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::Upstream {
            status: 200,
            body: "insert returned no rows".into(),
        })?;
    tracing::info!("Registered device {} for user {}", device.id, user.id);
    Ok(device)
}

pub async fn update_device(
    state: &AppState,
    token: &str,
    device_id: Uuid,
    patch: &DevicePatch,
) -> ServiceResult<Device> {
    // ---
    if patch.is_empty() {
        return Err(ServiceError::Validation("nothing to update".into()));
    }
    let mut patch = patch.clone();
    if let Some(name) = &patch.name {
        patch.name = Some(validate_name(name)?);
    }

    let rows: Vec<Device> = race(
        "device update",
        state.config.query_timeout(),
        state.baas.update(token, TABLE, &by_id(device_id), &patch),
    )
    .await?;
    rows.into_iter()
        .next()
        .ok_or_else(|| ServiceError::NotFound(format!("device {}", device_id)))
}

pub async fn delete_device(state: &AppState, token: &str, device_id: Uuid) -> ServiceResult<()> {
    // ---
    // Surface a 404 rather than a silent no-op for foreign or unknown ids.
    get_device(state, token, device_id).await?;
    race(
        "device delete",
        state.config.query_timeout(),
        state.baas.delete(token, TABLE, &by_id(device_id)),
    )
    .await?;
    state.cache.forget(device_id).await;
    tracing::info!("Deleted device {}", device_id);
    Ok(())
}

/// Replace the device key. The old key stops working immediately.
pub async fn regenerate_api_key(
    state: &AppState,
    token: &str,
    device_id: Uuid,
) -> ServiceResult<Device> {
    // ---
    let body = ApiKeyPatch {
        api_key: generate_api_key(),
    };
    let rows: Vec<Device> = race(
        "device key rotation",
        state.config.query_timeout(),
        state.baas.update(token, TABLE, &by_id(device_id), &body),
    )
    .await?;
    rows.into_iter()
        .next()
        .ok_or_else(|| ServiceError::NotFound(format!("device {}", device_id)))
}

/// Device owning `api_key`, looked up with the service key.
pub async fn find_by_api_key(state: &AppState, api_key: &str) -> ServiceResult<Option<Device>> {
    // ---
    let service_key = state.baas.service_key()?;
    let query = Query::new().select("*").eq("api_key", api_key).limit(1);
    let rows: Vec<Device> = race(
        "device key lookup",
        state.config.query_timeout(),
        state.baas.select(service_key, TABLE, &query),
    )
    .await?;
    Ok(rows.into_iter().next())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_generated_keys_are_unique_and_prefixed() {
        // ---
        let a = generate_api_key();
        let b = generate_api_key();
        assert!(a.starts_with("dev_"));
        assert_eq!(a.len(), 4 + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_name() {
        // ---
        assert_eq!(validate_name("  Greenhouse 1 ").unwrap(), "Greenhouse 1");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }
}
