// src/lib.rs
//! Run Tracker Library
//!
//! Turns a stream of position fixes into distance, pace, calories and
//! per-kilometer splits, with speed-based auto-pause and buffering of fixes
//! captured in the background.

pub mod background;
pub mod config;
pub mod display;
pub mod error;
pub mod geo;
pub mod gps;
pub mod tracking;

// Re-export main types for convenience
pub use config::TrackerConfig;
pub use error::{BackgroundError, ProviderError, Result, TrackerError};
pub use tracking::{
    LiveStatus, RunController, RunSummary, Split, TrackPoint, TrackerSettings, TrackerState, TrackerStatus,
};
