// src/gps/provider.rs
//! Position provider capability

use crate::{error::ProviderError, tracking::state::TrackPoint};
use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Source of live position fixes.
///
/// Implementations push fixes into the sender handed to
/// [`PositionProvider::watch_position`]; the controller is the only reader.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Short label for logs and the dashboard
    fn name(&self) -> &str;

    async fn request_foreground_permission(&self) -> ProviderResult<()>;

    /// Optional; providers without a background mode refuse
    async fn request_background_permission(&self) -> ProviderResult<()> {
        Err(ProviderError::PermissionDenied)
    }

    async fn current_position(&self) -> ProviderResult<TrackPoint>;

    async fn watch_position(
        &self,
        updates: mpsc::UnboundedSender<TrackPoint>,
    ) -> ProviderResult<PositionWatch>;
}

/// Subscription handle for a live watch.
///
/// Cancelling (or dropping) the handle stops the reader task.
#[derive(Debug)]
pub struct PositionWatch {
    task: Option<JoinHandle<()>>,
}

impl PositionWatch {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A watch with no background task, for providers that push from elsewhere
    pub fn detached() -> Self {
        Self { task: None }
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for PositionWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}
