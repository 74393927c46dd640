//! Alerts raised by the ingestion pipeline. Read-only for dashboard users.

use serde::Deserialize;
use uuid::Uuid;

use crate::baas::Query;
use crate::error::ServiceResult;
use crate::fallback::race;
use crate::models::{Alert, SensorParameter};
use crate::AppState;

const TABLE: &str = "alerts";
const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct AlertFilter {
    pub parameter: Option<SensorParameter>,
    pub limit: Option<u32>,
}

impl AlertFilter {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    fn to_query(&self, device_id: Uuid) -> Query {
        // ---
        let mut query = Query::new().select("*").eq("device_id", device_id);
        if let Some(parameter) = self.parameter {
            query = query.eq("parameter", parameter);
        }
        query.order("created_at", false).limit(self.limit())
    }
}

/// Newest alerts of `device_id` first.
pub async fn list_alerts(
    state: &AppState,
    token: &str,
    device_id: Uuid,
    filter: &AlertFilter,
) -> ServiceResult<Vec<Alert>> {
    // ---
    race(
        "alert list",
        state.config.query_timeout(),
        state.baas.select(token, TABLE, &filter.to_query(device_id)),
    )
    .await
}

/// Store alerts produced by the ingestion pipeline (service key only).
pub(crate) async fn insert_alerts(
    state: &AppState,
    service_key: &str,
    alerts: &[Alert],
) -> ServiceResult<Vec<Alert>> {
    // ---
    race(
        "alert insert",
        state.config.query_timeout(),
        state.baas.insert(service_key, TABLE, alerts),
    )
    .await
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_filter_query() {
        // ---
        let device = Uuid::nil();
        let filter = AlertFilter {
            parameter: Some(SensorParameter::SoilMoisture),
            limit: Some(10_000),
        };
        let params = filter.to_query(device).params().to_vec();
        assert!(params.contains(&("parameter".into(), "eq.soil_moisture".into())));
        assert!(params.contains(&("order".into(), "created_at.desc".into())));
        assert!(params.contains(&("limit".into(), "500".into())));
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(AlertFilter::default().limit(), 50);
    }
}
