// src/tracking/mod.rs
//! Run tracking: state, accumulation, auto-pause, splits and the lifecycle controller

pub mod accumulator;
pub mod auto_pause;
pub mod controller;
pub mod simulation;
pub mod splits;
pub mod state;

pub use controller::{RunController, TrackerEvent, TrackerSettings};
pub use state::{LiveStatus, RunSummary, Split, TrackPoint, TrackerState, TrackerStatus};
