//! Data models mirrored from the backend schema.
//!
//! Rows are owned by the backend. The gateway only holds transient copies,
//! so most types here are plain serde records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// One of the ten environmental readings a device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorParameter {
    Temperature,
    Humidity,
    LightIntensity,
    Ec,
    SoilTemperature,
    SoilMoisture,
    Nitrogen,
    Phosphorus,
    Potassium,
    Ph,
}

impl SensorParameter {
    pub const ALL: [SensorParameter; 10] = [
        SensorParameter::Temperature,
        SensorParameter::Humidity,
        SensorParameter::LightIntensity,
        SensorParameter::Ec,
        SensorParameter::SoilTemperature,
        SensorParameter::SoilMoisture,
        SensorParameter::Nitrogen,
        SensorParameter::Phosphorus,
        SensorParameter::Potassium,
        SensorParameter::Ph,
    ];

    /// Column name in `sensor_data` and value stored in `thresholds.parameter`.
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            SensorParameter::Temperature => "temperature",
            SensorParameter::Humidity => "humidity",
            SensorParameter::LightIntensity => "light_intensity",
            SensorParameter::Ec => "ec",
            SensorParameter::SoilTemperature => "soil_temperature",
            SensorParameter::SoilMoisture => "soil_moisture",
            SensorParameter::Nitrogen => "nitrogen",
            SensorParameter::Phosphorus => "phosphorus",
            SensorParameter::Potassium => "potassium",
            SensorParameter::Ph => "ph",
        }
    }

    pub fn label(&self) -> &'static str {
        // ---
        match self {
            SensorParameter::Temperature => "Air temperature",
            SensorParameter::Humidity => "Air humidity",
            SensorParameter::LightIntensity => "Light intensity",
            SensorParameter::Ec => "Electrical conductivity",
            SensorParameter::SoilTemperature => "Soil temperature",
            SensorParameter::SoilMoisture => "Soil moisture",
            SensorParameter::Nitrogen => "Nitrogen",
            SensorParameter::Phosphorus => "Phosphorus",
            SensorParameter::Potassium => "Potassium",
            SensorParameter::Ph => "Soil pH",
        }
    }

    pub fn unit(&self) -> &'static str {
        // ---
        match self {
            SensorParameter::Temperature | SensorParameter::SoilTemperature => "°C",
            SensorParameter::Humidity | SensorParameter::SoilMoisture => "%",
            SensorParameter::LightIntensity => "lux",
            SensorParameter::Ec => "µS/cm",
            SensorParameter::Nitrogen | SensorParameter::Phosphorus | SensorParameter::Potassium => {
                "mg/kg"
            }
            SensorParameter::Ph => "pH",
        }
    }

    /// Acceptable range used when a device has no stored threshold.
    pub fn default_range(&self) -> (f64, f64) {
        // ---
        match self {
            SensorParameter::Temperature => (15.0, 35.0),
            SensorParameter::Humidity => (40.0, 80.0),
            SensorParameter::LightIntensity => (200.0, 1000.0),
            SensorParameter::Ec => (200.0, 2000.0),
            SensorParameter::SoilTemperature => (12.0, 30.0),
            SensorParameter::SoilMoisture => (30.0, 70.0),
            SensorParameter::Nitrogen => (20.0, 60.0),
            SensorParameter::Phosphorus => (10.0, 40.0),
            SensorParameter::Potassium => (100.0, 250.0),
            SensorParameter::Ph => (5.5, 7.5),
        }
    }
}

impl fmt::Display for SensorParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ten readings of one telemetry snapshot.
///
/// This is also the body an ESP32 posts to `/ingest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    pub temperature: f64,
    pub humidity: f64,
    pub light_intensity: f64,
    pub ec: f64,
    pub soil_temperature: f64,
    pub soil_moisture: f64,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub ph: f64,
}

impl Readings {
    pub fn value(&self, parameter: SensorParameter) -> f64 {
        // ---
        match parameter {
            SensorParameter::Temperature => self.temperature,
            SensorParameter::Humidity => self.humidity,
            SensorParameter::LightIntensity => self.light_intensity,
            SensorParameter::Ec => self.ec,
            SensorParameter::SoilTemperature => self.soil_temperature,
            SensorParameter::SoilMoisture => self.soil_moisture,
            SensorParameter::Nitrogen => self.nitrogen,
            SensorParameter::Phosphorus => self.phosphorus,
            SensorParameter::Potassium => self.potassium,
            SensorParameter::Ph => self.ph,
        }
    }

    /// First parameter whose value is NaN or infinite, if any.
    pub fn first_non_finite(&self) -> Option<SensorParameter> {
        SensorParameter::ALL
            .into_iter()
            .find(|p| !self.value(*p).is_finite())
    }
}

/// Timestamped row of `sensor_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub device_id: Uuid,
    #[serde(flatten)]
    pub readings: Readings,
    pub created_at: DateTime<Utc>,
}

/// Insert body for `sensor_data`; `id` and `created_at` are assigned by the backend.
#[derive(Debug, Serialize)]
pub struct NewSensorData<'a> {
    pub device_id: Uuid,
    #[serde(flatten)]
    pub readings: &'a Readings,
}

/// Row of `devices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    // ---
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    pub api_key: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct NewDevice {
    pub user_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub is_active: bool,
    pub api_key: String,
}

/// Partial update of a device. Absent fields are left untouched.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DevicePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl DevicePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.location.is_none() && self.is_active.is_none()
    }
}

/// Row of `thresholds`, unique on `(device_id, parameter)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub device_id: Uuid,
    pub parameter: SensorParameter,
    pub min_value: f64,
    pub max_value: f64,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Threshold {
    /// Inactive threshold carrying the parameter's default range.
    pub fn default_for(device_id: Uuid, parameter: SensorParameter) -> Self {
        // ---
        let (min_value, max_value) = parameter.default_range();
        Threshold {
            id: None,
            device_id,
            parameter,
            min_value,
            max_value,
            is_active: false,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// Row of `alerts`. Created by the ingestion pipeline, read-only for users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub device_id: Uuid,
    pub parameter: SensorParameter,
    pub value: f64,
    pub threshold_min: f64,
    pub threshold_max: f64,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Identity returned by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Session issued by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub user: AuthUser,
}

fn bearer() -> String {
    "bearer".to_string()
}

/// Row of `user_profiles`, keyed by the auth user id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub farm_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub farm_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Auth identity merged with the optional profile row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub farm_name: Option<String>,
    pub location: Option<String>,
}

impl CurrentUser {
    pub fn merge(user: AuthUser, profile: Option<UserProfile>) -> Self {
        // ---
        let profile = profile.unwrap_or_default();
        CurrentUser {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
            full_name: profile.full_name,
            phone: profile.phone,
            farm_name: profile.farm_name,
            location: profile.location,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_row() -> serde_json::Value {
        // ---
        json!({
            "id": 42,
            "device_id": "6f1c0b7e-52a3-4d5e-9a51-0b9d1c2e3f40",
            "temperature": 24.5,
            "humidity": 61.0,
            "light_intensity": 540.0,
            "ec": 1100.0,
            "soil_temperature": 21.3,
            "soil_moisture": 44.0,
            "nitrogen": 35.0,
            "phosphorus": 18.0,
            "potassium": 160.0,
            "ph": 6.4,
            "created_at": "2025-03-26T18:45:00Z"
        })
    }

    #[test]
    fn test_sensor_row_flattens_readings() {
        // ---
        let row: SensorData = serde_json::from_value(sample_row()).unwrap();
        assert_eq!(row.id, Some(42));
        assert_eq!(row.readings.value(SensorParameter::Ph), 6.4);
        assert_eq!(row.readings.value(SensorParameter::Potassium), 160.0);
        assert_eq!(
            row.created_at,
            Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap()
        );
    }

    #[test]
    fn test_new_sensor_data_has_no_id_or_timestamp() {
        // ---
        let row: SensorData = serde_json::from_value(sample_row()).unwrap();
        let body = serde_json::to_value(NewSensorData {
            device_id: row.device_id,
            readings: &row.readings,
        })
        .unwrap();
        assert!(body.get("id").is_none());
        assert!(body.get("created_at").is_none());
        assert_eq!(body["soil_moisture"], 44.0);
    }

    #[test]
    fn test_parameter_names_match_columns() {
        // ---
        for p in SensorParameter::ALL {
            let encoded = serde_json::to_value(p).unwrap();
            assert_eq!(encoded, json!(p.as_str()));
            assert!(sample_row().get(p.as_str()).is_some(), "missing column {}", p);
        }
    }

    #[test]
    fn test_default_ranges_are_ordered() {
        // ---
        for p in SensorParameter::ALL {
            let (min, max) = p.default_range();
            assert!(min < max, "{} default range is inverted", p);
        }
    }

    #[test]
    fn test_non_finite_detection() {
        // ---
        let mut row: SensorData = serde_json::from_value(sample_row()).unwrap();
        assert_eq!(row.readings.first_non_finite(), None);
        row.readings.ec = f64::NAN;
        assert_eq!(row.readings.first_non_finite(), Some(SensorParameter::Ec));
    }

    #[test]
    fn test_merge_without_profile_keeps_identity() {
        // ---
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some("farmer@example.com".into()),
            created_at: None,
        };
        let merged = CurrentUser::merge(user.clone(), None);
        assert_eq!(merged.id, user.id);
        assert_eq!(merged.email.as_deref(), Some("farmer@example.com"));
        assert!(merged.farm_name.is_none());
    }

    #[test]
    fn test_merge_with_profile() {
        // ---
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some("farmer@example.com".into()),
            created_at: None,
        };
        let profile = UserProfile {
            id: user.id,
            full_name: Some("Amina Otieno".into()),
            farm_name: Some("Green Acres".into()),
            ..Default::default()
        };
        let merged = CurrentUser::merge(user, Some(profile));
        assert_eq!(merged.full_name.as_deref(), Some("Amina Otieno"));
        assert_eq!(merged.farm_name.as_deref(), Some("Green Acres"));
        assert!(merged.phone.is_none());
    }

    #[test]
    fn test_device_patch_skips_absent_fields() {
        // ---
        let patch = DevicePatch {
            is_active: Some(false),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "is_active": false })
        );
        assert!(DevicePatch::default().is_empty());
    }
}
