//! Sensor readings: latest snapshot, history window and per-parameter summary.

use chrono::{Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::baas::Query;
use crate::demo;
use crate::error::ServiceResult;
use crate::fallback::race;
use crate::models::{SensorData, SensorParameter};
use crate::AppState;

// ---

const TABLE: &str = "sensor_data";
const DEFAULT_HOURS: u32 = 24;
const MAX_HOURS: u32 = 168;
const DEFAULT_LIMIT: u32 = 500;
const MAX_LIMIT: u32 = 5_000;
const DEMO_STEP_MINUTES: u32 = 15;

/// Query parameters for the history window.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<u32>,
    pub limit: Option<u32>,
}

impl HistoryQuery {
    pub fn hours(&self) -> u32 {
        self.hours.unwrap_or(DEFAULT_HOURS).clamp(1, MAX_HOURS)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Aggregate of one parameter over a history window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSummary {
    pub parameter: SensorParameter,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

/// Newest reading of `device_id`, or `None`.
///
/// Never fails. When the backend is unreachable or times out, the last reading
/// this caller was allowed to see is served instead. A refused request (bad
/// token, no access) yields `None`, never cached data.
pub async fn get_latest_sensor_data(
    state: &AppState,
    token: &str,
    device_id: Uuid,
) -> Option<SensorData> {
    // ---
    if state.config.demo_mode {
        return Some(demo::reading_at(device_id, Utc::now()));
    }

    let query = Query::new()
        .select("*")
        .eq("device_id", device_id)
        .order("created_at", false)
        .limit(1);
    let limit = state.config.query_timeout();
    let (rows, caller) = tokio::join!(
        race("latest sensor reading", limit, state.baas.select::<SensorData>(token, TABLE, &query)),
        race("session lookup", limit, state.baas.get_user(token)),
    );

    let e = match rows {
        Ok(rows) => {
            let latest = rows.into_iter().next();
            if let (Some(reading), Ok(user)) = (&latest, &caller) {
                state.cache.remember(user.id, reading).await;
            }
            return latest;
        }
        Err(e) => e,
    };

    if !e.is_outage() {
        tracing::debug!("Latest reading for {} refused: {}", device_id, e);
        return None;
    }
    let user = match caller {
        Ok(user) => user,
        Err(auth_err) => {
            tracing::warn!(
                "Latest reading for {} unavailable ({}) and caller unknown ({}), serving nothing",
                device_id,
                e,
                auth_err
            );
            return None;
        }
    };

    let cached = state.cache.latest(user.id, device_id).await;
    tracing::warn!(
        "Latest reading for {} unavailable ({}), serving {}",
        device_id,
        e,
        if cached.is_some() { "cached value" } else { "nothing" }
    );
    cached
}

/// Readings of `device_id` in the requested window, oldest first.
pub async fn get_sensor_history(
    state: &AppState,
    token: &str,
    device_id: Uuid,
    params: &HistoryQuery,
) -> ServiceResult<Vec<SensorData>> {
    // ---
    let hours = params.hours();
    let limit = params.limit() as usize;

    if state.config.demo_mode {
        let mut points = demo::history(device_id, Utc::now(), hours, DEMO_STEP_MINUTES);
        let excess = points.len().saturating_sub(limit);
        points.drain(..excess);
        return Ok(points);
    }

    let since = (Utc::now() - Duration::hours(hours as i64)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let query = Query::new()
        .select("*")
        .eq("device_id", device_id)
        .gte("created_at", since)
        .order("created_at", true)
        .limit(limit as u32);

    let rows: Vec<SensorData> = race(
        "sensor history",
        state.config.query_timeout(),
        state.baas.select(token, TABLE, &query),
    )
    .await?;

    tracing::debug!("History for {} over {}h: {} rows", device_id, hours, rows.len());
    Ok(rows)
}

/// Min/max/avg per parameter. Empty history gives an empty summary.
pub fn summarize(history: &[SensorData]) -> Vec<ParameterSummary> {
    // ---
    if history.is_empty() {
        return Vec::new();
    }

    SensorParameter::ALL
        .into_iter()
        .map(|parameter| {
            let values = history.iter().map(|r| r.readings.value(parameter));
            let (min, max, sum) = values.fold(
                (f64::INFINITY, f64::NEG_INFINITY, 0.0),
                |(min, max, sum), v| (min.min(v), max.max(v), sum + v),
            );
            ParameterSummary {
                parameter,
                unit: parameter.unit(),
                min,
                max,
                avg: sum / history.len() as f64,
                count: history.len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_history_query_clamps() {
        // ---
        let q = HistoryQuery::default();
        assert_eq!(q.hours(), 24);
        assert_eq!(q.limit(), 500);

        let q = HistoryQuery {
            hours: Some(10_000),
            limit: Some(0),
        };
        assert_eq!(q.hours(), 168);
        assert_eq!(q.limit(), 1);
    }

    #[test]
    fn test_summarize() {
        // ---
        let device = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut a = demo::reading_at(device, at);
        let mut b = demo::reading_at(device, at + Duration::minutes(5));
        a.readings.temperature = 20.0;
        b.readings.temperature = 30.0;

        let summary = summarize(&[a, b]);
        assert_eq!(summary.len(), SensorParameter::ALL.len());

        let temp = summary
            .iter()
            .find(|s| s.parameter == SensorParameter::Temperature)
            .unwrap();
        assert_eq!(temp.min, 20.0);
        assert_eq!(temp.max, 30.0);
        assert_eq!(temp.avg, 25.0);
        assert_eq!(temp.count, 2);
        assert_eq!(temp.unit, "°C");
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&[]).is_empty());
    }
}
