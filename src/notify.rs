//! Outbound webhook for threshold alerts.
//!
//! Delivery makes a fixed number of attempts with exponential backoff.
//! Transport failures and 5xx answers are retried; a 4xx answer ends
//! delivery immediately since resending the same body cannot succeed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Alert, Device};

// ---

pub const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body posted to the webhook.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub event: &'static str,
    pub device_id: Uuid,
    pub device_name: String,
    pub alerts: Vec<Alert>,
    pub sent_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(device: &Device, alerts: Vec<Alert>) -> Self {
        // ---
        AlertEvent {
            event: "threshold_alert",
            device_id: device.id,
            device_name: device.name.clone(),
            alerts,
            sent_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    // ---
    http: reqwest::Client,
    url: Option<String>,
    base_delay: Duration,
}

impl Notifier {
    pub fn new(http: reqwest::Client, url: Option<String>) -> Self {
        Notifier {
            http,
            url,
            base_delay: BASE_DELAY,
        }
    }

    /// Shorten the backoff; used where waiting seconds would only slow things down.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Deliver `event` in the background. No-op without a webhook URL.
    pub fn dispatch(&self, event: AlertEvent) {
        // ---
        if !self.is_enabled() {
            tracing::debug!("No webhook configured, dropping {} alert(s)", event.alerts.len());
            return;
        }
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(&event).await {
                tracing::error!("Alert webhook for device {} failed: {}", event.device_id, e);
            }
        });
    }

    /// Post `event`, retrying as described in the module docs.
    ///
    /// Returns the number of attempts it took.
    pub async fn deliver(&self, event: &AlertEvent) -> ServiceResult<u32> {
        // ---
        let url = self
            .url
            .as_deref()
            .ok_or(ServiceError::NotConfigured("ALERT_WEBHOOK_URL"))?;

        let mut delay = self.base_delay;
        let mut attempt = 1;
        loop {
            let result = self
                .http
                .post(url)
                .timeout(REQUEST_TIMEOUT)
                .json(event)
                .send()
                .await;

            let err = match result {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(
                        "Delivered {} alert(s) for device {} on attempt {}",
                        event.alerts.len(),
                        event.device_id,
                        attempt
                    );
                    return Ok(attempt);
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    let err = ServiceError::Upstream { status, body };
                    if (400..500).contains(&status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => ServiceError::Transport(e),
            };

            if attempt >= MAX_ATTEMPTS {
                return Err(err);
            }
            tracing::warn!(
                "Webhook attempt {}/{} failed: {}; retrying in {}ms",
                attempt,
                MAX_ATTEMPTS,
                err,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }
}
