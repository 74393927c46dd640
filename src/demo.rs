//! Synthetic readings served in demo mode.
//!
//! Values follow a daily cycle derived from the timestamp alone, so the same
//! instant always produces the same reading and every value stays inside its
//! parameter's default range.

use std::f64::consts::TAU;

use chrono::{DateTime, Duration, Timelike, Utc};
use uuid::Uuid;

use crate::models::{Readings, SensorData, SensorParameter};

// ---

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Value of `parameter` at `at`, oscillating between 15% and 85% of its range.
fn cycle_value(parameter: SensorParameter, at: DateTime<Utc>) -> f64 {
    // ---
    let (min, max) = parameter.default_range();
    let day_fraction = at.num_seconds_from_midnight() as f64 / SECONDS_PER_DAY;
    // Spread the parameters so they don't peak together.
    let offset = SensorParameter::ALL
        .iter()
        .position(|p| *p == parameter)
        .unwrap_or(0) as f64
        / SensorParameter::ALL.len() as f64;
    let wave = (TAU * (day_fraction + offset)).sin();
    let value = min + (max - min) * (0.5 + 0.35 * wave);
    (value * 100.0).round() / 100.0
}

pub fn reading_at(device_id: Uuid, at: DateTime<Utc>) -> SensorData {
    // ---
    let v = |p| cycle_value(p, at);
    SensorData {
        id: None,
        device_id,
        readings: Readings {
            temperature: v(SensorParameter::Temperature),
            humidity: v(SensorParameter::Humidity),
            light_intensity: v(SensorParameter::LightIntensity),
            ec: v(SensorParameter::Ec),
            soil_temperature: v(SensorParameter::SoilTemperature),
            soil_moisture: v(SensorParameter::SoilMoisture),
            nitrogen: v(SensorParameter::Nitrogen),
            phosphorus: v(SensorParameter::Phosphorus),
            potassium: v(SensorParameter::Potassium),
            ph: v(SensorParameter::Ph),
        },
        created_at: at,
    }
}

/// Readings every `step_minutes` over the `hours` ending at `end`, oldest first.
pub fn history(device_id: Uuid, end: DateTime<Utc>, hours: u32, step_minutes: u32) -> Vec<SensorData> {
    // ---
    let step = step_minutes.max(1) as i64;
    let points = (hours as i64 * 60) / step;
    (0..=points)
        .rev()
        .map(|i| reading_at(device_id, end - Duration::minutes(i * step)))
        .collect()
}
