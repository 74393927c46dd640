//! Device telemetry ingestion and the threshold alert pipeline.
//!
//! A device posts its readings with its API key. The device's active
//! thresholds are loaded first, so a failure up to and including the reading
//! insert leaves nothing behind and the device can safely retry. Once the
//! reading is stored the request succeeds: alert storage problems are logged
//! and reported in the receipt's `warnings` instead of failing the device.

use chrono::Utc;
use serde::Serialize;

use crate::baas::Query;
use crate::error::{ServiceError, ServiceResult};
use crate::fallback::race;
use crate::models::{Alert, NewSensorData, Readings, SensorData};
use crate::notify::AlertEvent;
use crate::services::{alerts, devices, thresholds};
use crate::AppState;

// ---

#[derive(Debug, Serialize)]
pub struct IngestReceipt {
    pub reading: SensorData,
    pub alerts: Vec<Alert>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
struct LastSeen {
    last_seen: chrono::DateTime<Utc>,
}

pub async fn ingest(state: &AppState, api_key: &str, readings: &Readings) -> ServiceResult<IngestReceipt> {
    // ---
    let service_key = state.baas.service_key()?;

    if let Some(parameter) = readings.first_non_finite() {
        return Err(ServiceError::Validation(format!("{} is not a finite number", parameter)));
    }

    // Step 1: Authenticate the device
    let device = devices::find_by_api_key(state, api_key)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("unknown device key".into()))?;
    if !device.is_active {
        return Err(ServiceError::Unauthorized(format!("device {} is disabled", device.id)));
    }

    // Step 2: Load thresholds while nothing is written yet
    let active = thresholds::load(state, service_key, device.id, true).await?;

    // Step 3: Store the reading
    let row = NewSensorData {
        device_id: device.id,
        readings,
    };
    let stored: Vec<SensorData> = race(
        "reading insert",
        state.config.query_timeout(),
        state.baas.insert(service_key, "sensor_data", &row),
    )
    .await?;
    let reading = stored.into_iter().next().ok_or_else(|| ServiceError::Upstream {
        status: 200,
        body: "insert returned no rows".into(),
    })?;
    state.cache.remember(device.user_id, &reading).await;

    let seen = LastSeen { last_seen: Utc::now() };
    let this_device = Query::new().eq("id", device.id);
    let touch = state
        .baas
        .update::<_, serde_json::Value>(service_key, "devices", &this_device, &seen);
    if let Err(e) = race("device last_seen", state.config.query_timeout(), touch).await {
        tracing::warn!("Could not update last_seen of {}: {}", device.id, e);
    }

    let mut receipt = IngestReceipt {
        reading,
        alerts: Vec::new(),
        warnings: Vec::new(),
    };

    // Step 4: Evaluate and record alerts
    let violations = thresholds::evaluate(&receipt.reading.readings, &active);
    tracing::debug!(
        "Device {}: {} active threshold(s), {} violation(s)",
        device.id,
        active.len(),
        violations.len()
    );
    if violations.is_empty() {
        return Ok(receipt);
    }

    let pending: Vec<Alert> = violations
        .into_iter()
        .map(|v| v.into_alert(device.id))
        .collect();
    let notify = match alerts::insert_alerts(state, service_key, &pending).await {
        Ok(created) => {
            tracing::info!("Device {} raised {} alert(s)", device.id, created.len());
            receipt.alerts = created.clone();
            created
        }
        Err(e) => {
            // The reading is stored; failing now would make the device resend it.
            tracing::error!(
                "Device {} raised {} alert(s) that could not be stored: {}",
                device.id,
                pending.len(),
                e
            );
            receipt
                .warnings
                .push(format!("{} alert(s) not stored: {}", pending.len(), e));
            pending
        }
    };

    // Step 5: Notify without holding up the device
    state.notifier.dispatch(AlertEvent::new(&device, notify));

    Ok(receipt)
}
