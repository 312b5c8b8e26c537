// src/background/mod.rs
//! Background delivery: the persisted point buffer and the task capability

pub mod bridge;
pub mod store;
pub mod task;

pub use bridge::BackgroundBridge;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use task::{
    BackgroundFeed, BackgroundTask, ChannelBackgroundTask, ForegroundOnly, LOCATION_TASK_NAME,
};
