// src/background/task.rs
//! Background task capability

use super::bridge::BackgroundBridge;
use crate::{error::BackgroundError, tracking::state::TrackPoint};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};

pub type BackgroundResult<T> = std::result::Result<T, BackgroundError>;

/// Task name the controller registers its delivery handler under
pub const LOCATION_TASK_NAME: &str = "run-tracker-background-location";

/// Platform scheduler that keeps collecting fixes while the app is backgrounded.
///
/// Deliveries for the active run are written into the bridge handed to
/// [`BackgroundTask::register_task`].
#[async_trait]
pub trait BackgroundTask: Send + Sync {
    async fn register_task(&self, name: &str, on_delivery: BackgroundBridge);
    async fn start_tracking(&self, run_id: &str) -> BackgroundResult<()>;
    async fn stop_tracking(&self);
    async fn has_active_tracking(&self) -> bool;
}

/// No background support; the controller runs foreground-only
#[derive(Debug, Clone, Copy, Default)]
pub struct ForegroundOnly;

#[async_trait]
impl BackgroundTask for ForegroundOnly {
    async fn register_task(&self, _name: &str, _on_delivery: BackgroundBridge) {}

    async fn start_tracking(&self, _run_id: &str) -> BackgroundResult<()> {
        Err(BackgroundError::Unsupported)
    }

    async fn stop_tracking(&self) {}

    async fn has_active_tracking(&self) -> bool {
        false
    }
}

/// Producer handle for [`ChannelBackgroundTask`]
#[derive(Debug, Clone)]
pub struct BackgroundFeed {
    tx: mpsc::UnboundedSender<Vec<TrackPoint>>,
}

impl BackgroundFeed {
    /// Push a batch of fixes; returns false once the task is gone
    pub fn push(&self, points: Vec<TrackPoint>) -> bool {
        self.tx.send(points).is_ok()
    }
}

#[derive(Default)]
struct ChannelState {
    name: Option<String>,
    bridge: Option<BackgroundBridge>,
    active_run: Option<String>,
    pump: Option<JoinHandle<()>>,
}

/// Background task fed by an embedding platform layer through a
/// [`BackgroundFeed`]. Batches pushed while no run is active are dropped.
pub struct ChannelBackgroundTask {
    state: Arc<Mutex<ChannelState>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<TrackPoint>>>>,
}

impl ChannelBackgroundTask {
    pub fn new() -> (Self, BackgroundFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = Self {
            state: Arc::new(Mutex::new(ChannelState::default())),
            rx: Mutex::new(Some(rx)),
        };
        (task, BackgroundFeed { tx })
    }

    pub async fn registered_name(&self) -> Option<String> {
        self.state.lock().await.name.clone()
    }

    fn spawn_pump(
        state: Arc<Mutex<ChannelState>>,
        mut rx: mpsc::UnboundedReceiver<Vec<TrackPoint>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                let target = {
                    let guard = state.lock().await;
                    guard.active_run.clone().zip(guard.bridge.clone())
                };

                match target {
                    Some((run_id, bridge)) => {
                        if let Err(e) = bridge.deliver(&run_id, &batch).await {
                            log::warn!("Failed to buffer background points: {}", e);
                        }
                    }
                    None => log::debug!("Dropping {} background points, no active run", batch.len()),
                }
            }
        })
    }
}

#[async_trait]
impl BackgroundTask for ChannelBackgroundTask {
    async fn register_task(&self, name: &str, on_delivery: BackgroundBridge) {
        let mut state = self.state.lock().await;
        state.name = Some(name.to_string());
        state.bridge = Some(on_delivery);
    }

    async fn start_tracking(&self, run_id: &str) -> BackgroundResult<()> {
        let mut state = self.state.lock().await;
        if state.bridge.is_none() {
            return Err(BackgroundError::Failed("no task registered".to_string()));
        }

        if state.pump.is_none() {
            let rx = self
                .rx
                .lock()
                .await
                .take()
                .ok_or_else(|| BackgroundError::Failed("feed already consumed".to_string()))?;
            state.pump = Some(Self::spawn_pump(Arc::clone(&self.state), rx));
        }

        state.active_run = Some(run_id.to_string());
        Ok(())
    }

    async fn stop_tracking(&self) {
        self.state.lock().await.active_run = None;
    }

    async fn has_active_tracking(&self) -> bool {
        self.state.lock().await.active_run.is_some()
    }
}

impl Drop for ChannelBackgroundTask {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_lock() {
            if let Some(pump) = state.pump.take() {
                pump.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::store::MemoryStore;
    use std::time::Duration;

    #[tokio::test]
    async fn test_foreground_only_refuses() {
        let task = ForegroundOnly;
        assert_eq!(
            task.start_tracking("run").await,
            Err(BackgroundError::Unsupported)
        );
        assert!(!task.has_active_tracking().await);
    }

    #[tokio::test]
    async fn test_start_requires_registration() {
        let (task, _feed) = ChannelBackgroundTask::new();
        assert!(task.start_tracking("run").await.is_err());
    }

    #[tokio::test]
    async fn test_feed_reaches_bridge_for_active_run() {
        let bridge = BackgroundBridge::new(Arc::new(MemoryStore::new()));
        let (task, feed) = ChannelBackgroundTask::new();
        task.register_task(LOCATION_TASK_NAME, bridge.clone()).await;
        assert_eq!(task.registered_name().await.as_deref(), Some(LOCATION_TASK_NAME));

        task.start_tracking("run-1").await.unwrap();
        assert!(task.has_active_tracking().await);

        let point = TrackPoint::new(1.0, 2.0, 3);
        assert!(feed.push(vec![point]));

        let mut drained = Vec::new();
        for _ in 0..50 {
            drained = bridge.drain("run-1").await;
            if !drained.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(drained, vec![point]);

        task.stop_tracking().await;
        assert!(!task.has_active_tracking().await);
    }
}
