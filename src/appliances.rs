//! Mock farm appliances the dashboard can switch on and off.
//!
//! State lives in memory only and resets on restart; nothing is sent to
//! real hardware.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{ServiceError, ServiceResult};

// ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appliance {
    pub id: &'static str,
    pub name: &'static str,
    pub is_on: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SetAppliance {
    pub is_on: bool,
}

const CATALOGUE: [(&str, &str); 5] = [
    ("water_pump", "Water pump"),
    ("irrigation_valve", "Irrigation valve"),
    ("ventilation_fan", "Ventilation fan"),
    ("grow_lights", "Grow lights"),
    ("heater", "Heater"),
];

#[derive(Debug, Clone)]
pub struct Appliances {
    inner: Arc<RwLock<BTreeMap<&'static str, Appliance>>>,
}

impl Default for Appliances {
    fn default() -> Self {
        Self::new()
    }
}

impl Appliances {
    /// Every catalogued appliance, switched off.
    pub fn new() -> Self {
        // ---
        let now = Utc::now();
        let map = CATALOGUE
            .iter()
            .map(|&(id, name)| {
                (
                    id,
                    Appliance {
                        id,
                        name,
                        is_on: false,
                        updated_at: now,
                    },
                )
            })
            .collect();
        Appliances {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn list(&self) -> Vec<Appliance> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn toggle(&self, id: &str) -> ServiceResult<Appliance> {
        // ---
        let mut map = self.inner.write().await;
        let appliance = map
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(format!("appliance {}", id)))?;
        appliance.is_on = !appliance.is_on;
        appliance.updated_at = Utc::now();
        tracing::info!(
            "{} switched {}",
            appliance.name,
            if appliance.is_on { "on" } else { "off" }
        );
        Ok(appliance.clone())
    }

    pub async fn set(&self, id: &str, is_on: bool) -> ServiceResult<Appliance> {
        // ---
        let mut map = self.inner.write().await;
        let appliance = map
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(format!("appliance {}", id)))?;
        if appliance.is_on != is_on {
            appliance.is_on = is_on;
            appliance.updated_at = Utc::now();
            tracing::info!("{} switched {}", appliance.name, if is_on { "on" } else { "off" });
        }
        Ok(appliance.clone())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test]
    async fn test_all_start_off() {
        // ---
        let appliances = Appliances::new();
        let list = appliances.list().await;
        assert_eq!(list.len(), CATALOGUE.len());
        assert!(list.iter().all(|a| !a.is_on));
    }

    #[tokio::test]
    async fn test_toggle_flips_state() {
        // ---
        let appliances = Appliances::new();
        assert!(appliances.toggle("water_pump").await.unwrap().is_on);
        assert!(!appliances.toggle("water_pump").await.unwrap().is_on);
    }

    #[tokio::test]
    async fn test_set_is_idempotent() {
        // ---
        let appliances = Appliances::new();
        let first = appliances.set("heater", true).await.unwrap();
        let second = appliances.set("heater", true).await.unwrap();
        assert!(second.is_on);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn test_unknown_appliance() {
        let appliances = Appliances::new();
        assert!(matches!(
            appliances.toggle("tractor").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
