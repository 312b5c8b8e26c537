// src/background/bridge.rs
//! Buffer of fixes captured while the app is backgrounded

use super::store::KeyValueStore;
use crate::{error::Result, tracking::state::TrackPoint};
use std::sync::Arc;
use tokio::sync::Mutex;

const KEY_PREFIX: &str = "run-tracker:buffer:";

/// Append-only point buffer keyed by run id.
///
/// Producers call [`BackgroundBridge::deliver`], the controller calls
/// [`BackgroundBridge::drain`]. Delivery is at-least-once: a crash between
/// reading and removing an entry can lose or repeat points.
#[derive(Clone)]
pub struct BackgroundBridge {
    store: Arc<dyn KeyValueStore>,
    // Serializes read-modify-write cycles within this process
    lock: Arc<Mutex<()>>,
}

impl BackgroundBridge {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn key_for(run_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, run_id)
    }

    /// Append a batch of background fixes for `run_id`
    pub async fn deliver(&self, run_id: &str, points: &[TrackPoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock.lock().await;
        let key = Self::key_for(run_id);

        let mut buffered = self.read(&key).await?;
        buffered.extend_from_slice(points);
        self.store.set(&key, serde_json::to_string(&buffered)?).await?;

        log::debug!("Buffered {} background points for run {}", points.len(), run_id);
        Ok(buffered.len())
    }

    /// Take every buffered fix for `run_id`, leaving the buffer empty.
    ///
    /// Storage failures and corrupt entries yield an empty batch.
    pub async fn drain(&self, run_id: &str) -> Vec<TrackPoint> {
        let _guard = self.lock.lock().await;
        let key = Self::key_for(run_id);

        let points = match self.read(&key).await {
            Ok(points) => points,
            Err(e) => {
                log::warn!("Failed to read background buffer for run {}: {}", run_id, e);
                return Vec::new();
            }
        };

        if let Err(e) = self.store.remove(&key).await {
            log::warn!("Failed to clear background buffer for run {}: {}", run_id, e);
        }

        points
    }

    /// Number of fixes waiting for `run_id`
    pub async fn pending(&self, run_id: &str) -> usize {
        let _guard = self.lock.lock().await;
        self.read(&Self::key_for(run_id)).await.map_or(0, |points| points.len())
    }

    /// Load the buffered array; unparseable content is deleted and treated as empty
    async fn read(&self, key: &str) -> Result<Vec<TrackPoint>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<TrackPoint>>(&raw) {
            Ok(points) => Ok(points),
            Err(e) => {
                log::warn!("Discarding corrupt background buffer {}: {}", key, e);
                self.store.remove(key).await?;
                Ok(Vec::new())
            }
        }
    }
}

impl std::fmt::Debug for BackgroundBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundBridge").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::store::MemoryStore;

    fn bridge() -> (BackgroundBridge, MemoryStore) {
        let store = MemoryStore::new();
        (BackgroundBridge::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_deliver_then_drain_in_order() {
        let (bridge, _) = bridge();
        let a = TrackPoint::new(1.0, 1.0, 1000);
        let b = TrackPoint::new(1.0, 1.1, 2000);
        let c = TrackPoint::new(1.0, 1.2, 3000);

        bridge.deliver("run-1", &[a, b]).await.unwrap();
        assert_eq!(bridge.deliver("run-1", &[c]).await.unwrap(), 3);

        assert_eq!(bridge.drain("run-1").await, vec![a, b, c]);
        assert!(bridge.drain("run-1").await.is_empty());
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let (bridge, _) = bridge();
        bridge.deliver("run-1", &[TrackPoint::new(1.0, 1.0, 0)]).await.unwrap();

        assert!(bridge.drain("run-2").await.is_empty());
        assert_eq!(bridge.pending("run-1").await, 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_discarded_and_deleted() {
        let (bridge, store) = bridge();
        let key = BackgroundBridge::key_for("run-1");
        store.set(&key, "{not json".to_string()).await.unwrap();

        assert!(bridge.drain("run-1").await.is_empty());
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_deliver_over_corrupt_entry_starts_fresh() {
        let (bridge, store) = bridge();
        store.set(&BackgroundBridge::key_for("run-1"), "garbage".to_string()).await.unwrap();

        let point = TrackPoint::new(2.0, 2.0, 5);
        assert_eq!(bridge.deliver("run-1", &[point]).await.unwrap(), 1);
        assert_eq!(bridge.drain("run-1").await, vec![point]);
    }
}
