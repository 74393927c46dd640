//! Per-device, per-parameter alert thresholds and their evaluation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::baas::Query;
use crate::error::{ServiceError, ServiceResult};
use crate::fallback::race;
use crate::models::{Alert, Readings, SensorParameter, Severity, Threshold};
use crate::services::devices;
use crate::AppState;

// ---

const TABLE: &str = "thresholds";
const ON_CONFLICT: &str = "device_id,parameter";

/// Fraction of the range width beyond a bound at which a violation turns critical.
const CRITICAL_FRACTION: f64 = 0.2;

/// A threshold as shown to the dashboard. `is_default` marks a parameter
/// that has no stored row yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdView {
    #[serde(flatten)]
    pub threshold: Threshold,
    pub is_default: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdInput {
    pub parameter: SensorParameter,
    pub min_value: f64,
    pub max_value: f64,
    #[serde(default = "active")]
    pub is_active: bool,
}

/// Body of `PUT /devices/{id}/thresholds/{parameter}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdBounds {
    pub min_value: f64,
    pub max_value: f64,
    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

impl ThresholdBounds {
    pub fn for_parameter(self, parameter: SensorParameter) -> ThresholdInput {
        ThresholdInput {
            parameter,
            min_value: self.min_value,
            max_value: self.max_value,
            is_active: self.is_active,
        }
    }
}

impl ThresholdInput {
    fn validate(&self) -> ServiceResult<()> {
        // ---
        if !self.min_value.is_finite() || !self.max_value.is_finite() {
            return Err(ServiceError::Validation(format!(
                "{} bounds must be finite numbers",
                self.parameter
            )));
        }
        if self.min_value > self.max_value {
            return Err(ServiceError::Validation(format!(
                "{} minimum {} exceeds maximum {}",
                self.parameter, self.min_value, self.max_value
            )));
        }
        Ok(())
    }

    fn into_row(self, device_id: Uuid) -> Threshold {
        Threshold {
            id: None,
            device_id,
            parameter: self.parameter,
            min_value: self.min_value,
            max_value: self.max_value,
            is_active: self.is_active,
            updated_at: None,
        }
    }
}

/// Stored thresholds of `device_id`, completed with defaults, in parameter order.
///
/// Unknown devices and devices the caller cannot see are `NotFound`.
pub async fn get_thresholds(
    state: &AppState,
    token: &str,
    device_id: Uuid,
) -> ServiceResult<Vec<ThresholdView>> {
    // ---
    devices::get_device(state, token, device_id).await?;
    let stored = load(state, token, device_id, false).await?;
    Ok(with_defaults(device_id, stored))
}

fn with_defaults(device_id: Uuid, stored: Vec<Threshold>) -> Vec<ThresholdView> {
    // ---
    SensorParameter::ALL
        .into_iter()
        .map(|parameter| match stored.iter().find(|t| t.parameter == parameter) {
            Some(t) => ThresholdView {
                threshold: t.clone(),
                is_default: false,
            },
            None => ThresholdView {
                threshold: Threshold::default_for(device_id, parameter),
                is_default: true,
            },
        })
        .collect()
}

/// Thresholds of `device_id`, optionally only the active ones.
pub async fn load(
    state: &AppState,
    token: &str,
    device_id: Uuid,
    active_only: bool,
) -> ServiceResult<Vec<Threshold>> {
    // ---
    let mut query = Query::new().select("*").eq("device_id", device_id);
    if active_only {
        query = query.eq("is_active", true);
    }
    race(
        "threshold lookup",
        state.config.query_timeout(),
        state.baas.select(token, TABLE, &query),
    )
    .await
}

pub async fn upsert_threshold(
    state: &AppState,
    token: &str,
    device_id: Uuid,
    input: ThresholdInput,
) -> ServiceResult<Threshold> {
    // ---
    let parameter = input.parameter;
    let mut stored = upsert_thresholds(state, token, device_id, vec![input]).await?;
    stored
        .pop()
        .ok_or_else(|| ServiceError::NotFound(format!("{} threshold", parameter)))
}

/// Validate every input, then upsert them in one request.
pub async fn upsert_thresholds(
    state: &AppState,
    token: &str,
    device_id: Uuid,
    inputs: Vec<ThresholdInput>,
) -> ServiceResult<Vec<Threshold>> {
    // ---
    validate_batch(&inputs)?;

    let rows: Vec<Threshold> = inputs.into_iter().map(|i| i.into_row(device_id)).collect();
    let stored: Vec<Threshold> = race(
        "threshold upsert",
        state.config.query_timeout(),
        state.baas.upsert(token, TABLE, ON_CONFLICT, &rows),
    )
    .await?;
    tracing::info!("Stored {} threshold(s) for device {}", stored.len(), device_id);
    Ok(stored)
}

/// Non-empty, every entry valid, each parameter at most once.
fn validate_batch(inputs: &[ThresholdInput]) -> ServiceResult<()> {
    // ---
    if inputs.is_empty() {
        return Err(ServiceError::Validation("no thresholds given".into()));
    }
    let mut seen = HashSet::new();
    for input in inputs {
        input.validate()?;
        if !seen.insert(input.parameter) {
            return Err(ServiceError::Validation(format!(
                "{} given more than once",
                input.parameter
            )));
        }
    }
    Ok(())
}

/// One reading outside its threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub parameter: SensorParameter,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub severity: Severity,
}

impl Violation {
    pub fn message(&self) -> String {
        // ---
        let unit = self.parameter.unit();
        let (direction, bound) = if self.value < self.min {
            ("below minimum", self.min)
        } else {
            ("above maximum", self.max)
        };
        format!(
            "{} is {}: {} {} (limit {} {})",
            self.parameter.label(),
            direction,
            self.value,
            unit,
            bound,
            unit
        )
    }

    pub fn into_alert(self, device_id: Uuid) -> Alert {
        // ---
        Alert {
            id: None,
            device_id,
            message: self.message(),
            parameter: self.parameter,
            value: self.value,
            threshold_min: self.min,
            threshold_max: self.max,
            severity: self.severity,
            created_at: None,
        }
    }
}

/// Check `readings` against every active threshold. Bounds are inclusive.
pub fn evaluate(readings: &Readings, thresholds: &[Threshold]) -> Vec<Violation> {
    // ---
    thresholds
        .iter()
        .filter(|t| t.is_active)
        .filter_map(|t| {
            let value = readings.value(t.parameter);
            let overshoot = if value < t.min_value {
                t.min_value - value
            } else if value > t.max_value {
                value - t.max_value
            } else {
                return None;
            };
            let width = t.max_value - t.min_value;
            let severity = if overshoot > width * CRITICAL_FRACTION {
                Severity::Critical
            } else {
                Severity::Warning
            };
            Some(Violation {
                parameter: t.parameter,
                value,
                min: t.min_value,
                max: t.max_value,
                severity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::demo;
    use chrono::{TimeZone, Utc};

    fn readings() -> Readings {
        // ---
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).unwrap();
        let mut r = demo::reading_at(Uuid::nil(), at).readings;
        r.temperature = 25.0;
        r.soil_moisture = 50.0;
        r.ph = 6.5;
        r
    }

    fn threshold(parameter: SensorParameter, min: f64, max: f64, active: bool) -> Threshold {
        // ---
        Threshold {
            id: None,
            device_id: Uuid::nil(),
            parameter,
            min_value: min,
            max_value: max,
            is_active: active,
            updated_at: None,
        }
    }

    #[test]
    fn test_in_range_has_no_violations() {
        // ---
        let t = vec![
            threshold(SensorParameter::Temperature, 15.0, 35.0, true),
            threshold(SensorParameter::Ph, 5.5, 7.5, true),
        ];
        assert!(evaluate(&readings(), &t).is_empty());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        // ---
        let t = vec![
            threshold(SensorParameter::Temperature, 25.0, 30.0, true),
            threshold(SensorParameter::SoilMoisture, 40.0, 50.0, true),
        ];
        assert!(evaluate(&readings(), &t).is_empty());
    }

    #[test]
    fn test_inactive_thresholds_are_ignored() {
        let t = vec![threshold(SensorParameter::Temperature, 0.0, 10.0, false)];
        assert!(evaluate(&readings(), &t).is_empty());
    }

    #[test]
    fn test_warning_and_critical() {
        // ---
        // Range width 10: 1 over is a warning, 5 over is critical.
        let t = vec![
            threshold(SensorParameter::Temperature, 14.0, 24.0, true),
            threshold(SensorParameter::SoilMoisture, 55.0, 65.0, true),
        ];
        let v = evaluate(&readings(), &t);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].parameter, SensorParameter::Temperature);
        assert_eq!(v[0].severity, Severity::Warning);
        assert_eq!(v[1].parameter, SensorParameter::SoilMoisture);
        assert_eq!(v[1].severity, Severity::Critical);
    }

    #[test]
    fn test_violation_becomes_alert() {
        // ---
        let t = vec![threshold(SensorParameter::Ph, 7.0, 8.0, true)];
        let device = Uuid::new_v4();
        let alert = evaluate(&readings(), &t).remove(0).into_alert(device);
        assert_eq!(alert.device_id, device);
        assert_eq!(alert.value, 6.5);
        assert_eq!(alert.threshold_min, 7.0);
        assert_eq!(alert.message, "Soil pH is below minimum: 6.5 pH (limit 7 pH)");
    }

    fn input(parameter: SensorParameter, min: f64, max: f64) -> ThresholdInput {
        ThresholdInput {
            parameter,
            min_value: min,
            max_value: max,
            is_active: true,
        }
    }

    #[test]
    fn test_batch_validation() {
        // ---
        assert!(validate_batch(&[
            input(SensorParameter::Temperature, 15.0, 30.0),
            input(SensorParameter::Ph, 6.0, 7.0),
        ])
        .is_ok());

        assert!(matches!(validate_batch(&[]), Err(ServiceError::Validation(_))));

        let twice = validate_batch(&[
            input(SensorParameter::Ph, 6.0, 7.0),
            input(SensorParameter::Ph, 5.5, 7.5),
        ]);
        assert!(matches!(twice, Err(ServiceError::Validation(msg)) if msg.contains("more than once")));

        let inverted = validate_batch(&[input(SensorParameter::Humidity, 80.0, 40.0)]);
        assert!(matches!(inverted, Err(ServiceError::Validation(_))));

        let nan = validate_batch(&[input(SensorParameter::Ec, f64::NAN, 1.0)]);
        assert!(matches!(nan, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_defaults_fill_missing_parameters() {
        // ---
        let device = Uuid::new_v4();
        let stored = vec![threshold(SensorParameter::Ph, 6.0, 7.0, true)];
        let views = with_defaults(device, stored);
        assert_eq!(views.len(), SensorParameter::ALL.len());

        let ph = views
            .iter()
            .find(|v| v.threshold.parameter == SensorParameter::Ph)
            .unwrap();
        assert!(!ph.is_default);
        assert_eq!(ph.threshold.min_value, 6.0);

        let temp = &views[0];
        assert!(temp.is_default);
        assert!(!temp.threshold.is_active);
        assert_eq!(temp.threshold.device_id, device);
    }

    #[test]
    fn test_input_validation() {
        // ---
        let ok = ThresholdInput {
            parameter: SensorParameter::Humidity,
            min_value: 40.0,
            max_value: 40.0,
            is_active: true,
        };
        assert!(ok.validate().is_ok());

        let inverted = ThresholdInput {
            min_value: 50.0,
            ..ok.clone()
        };
        assert!(inverted.validate().is_err());

        let nan = ThresholdInput {
            max_value: f64::NAN,
            ..ok
        };
        assert!(nan.validate().is_err());
    }
}
