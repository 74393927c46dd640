//! Timeout races and the last-known-good reading cache.
//!
//! Dashboard reads prefer stale or synthetic data over an error page, so every
//! outbound request is raced against a timer and read paths fall back to the
//! values held here.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::SensorData;

// ---

/// Race `fut` against `limit`. The timer winning yields [`ServiceError::Timeout`].
pub async fn race<T, F>(op: &'static str, limit: Duration, fut: F) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>>,
{
    // ---
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} did not finish within {}ms", op, limit.as_millis());
            Err(ServiceError::Timeout { op, limit })
        }
    }
}

/// Latest successfully observed reading per `(user, device)` pair.
///
/// Entries are only stored for a user who was able to read the device, so a
/// cached reading is never handed to someone the backend would have refused.
#[derive(Debug, Clone, Default)]
pub struct ReadingCache {
    inner: Arc<RwLock<HashMap<(Uuid, Uuid), SensorData>>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `reading` for `user` unless a newer one is already cached.
    pub async fn remember(&self, user: Uuid, reading: &SensorData) {
        // ---
        let mut map = self.inner.write().await;
        match map.get(&(user, reading.device_id)) {
            Some(existing) if existing.created_at > reading.created_at => {}
            _ => {
                map.insert((user, reading.device_id), reading.clone());
            }
        }
    }

    pub async fn latest(&self, user: Uuid, device_id: Uuid) -> Option<SensorData> {
        self.inner.read().await.get(&(user, device_id)).cloned()
    }

    /// Drop every entry of `device_id`, whoever cached it.
    pub async fn forget(&self, device_id: Uuid) {
        self.inner
            .write()
            .await
            .retain(|(_, device), _| *device != device_id);
    }
}
