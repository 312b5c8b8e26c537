// src/tracking/state.rs
//! Run state structures shared between the controller and its consumers

use crate::geo::NO_PACE;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single reported position with a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: i64,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
        }
    }

    /// Create a point stamped with the current wall-clock time
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, Utc::now().timestamp_millis())
    }

    /// Timestamp as a UTC date-time, if it is representable
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Finished,
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrackerStatus::Idle => "Idle",
            TrackerStatus::Running => "Running",
            TrackerStatus::Paused => "Paused",
            TrackerStatus::Finished => "Finished",
        };
        f.write_str(label)
    }
}

/// Performance summary for one completed kilometer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Split {
    pub km: u32,
    pub pace_sec: u64,
    pub avg_heart_rate_bpm: Option<f64>,
}

/// Everything a consumer needs to render a run in progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    pub status: TrackerStatus,
    pub elapsed_sec: u64,
    pub distance_km: f64,
    pub pace_label: String,
    pub calories: u32,
    pub heart_rate_bpm: f64, // simulated
    pub path: Vec<TrackPoint>,
    pub last_milestone_km: u32,
    pub is_auto_paused: bool,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerState {
    pub fn new() -> Self {
        Self {
            status: TrackerStatus::Idle,
            elapsed_sec: 0,
            distance_km: 0.0,
            pace_label: NO_PACE.to_string(),
            calories: 0,
            heart_rate_bpm: 0.0,
            path: Vec::new(),
            last_milestone_km: 0,
            is_auto_paused: false,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TrackerStatus::Running | TrackerStatus::Paused)
    }

    pub fn last_point(&self) -> Option<&TrackPoint> {
        self.path.last()
    }

    /// Format elapsed time for display
    pub fn format_elapsed(&self) -> String {
        format_elapsed(self.elapsed_sec)
    }
}

fn format_elapsed(elapsed_sec: u64) -> String {
    let hours = elapsed_sec / 3600;
    let minutes = (elapsed_sec % 3600) / 60;
    let seconds = elapsed_sec % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// What subscribers receive on every change: the run state with the path
/// reduced to its length and newest point. The full path comes from
/// [`RunController::snapshot`].
///
/// [`RunController::snapshot`]: super::RunController::snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub status: TrackerStatus,
    pub elapsed_sec: u64,
    pub distance_km: f64,
    pub pace_label: String,
    pub calories: u32,
    pub heart_rate_bpm: f64,
    pub last_milestone_km: u32,
    pub is_auto_paused: bool,
    pub points: usize,
    pub last_point: Option<TrackPoint>,
}

impl LiveStatus {
    pub fn format_elapsed(&self) -> String {
        format_elapsed(self.elapsed_sec)
    }
}

impl From<&TrackerState> for LiveStatus {
    fn from(state: &TrackerState) -> Self {
        Self {
            status: state.status,
            elapsed_sec: state.elapsed_sec,
            distance_km: state.distance_km,
            pace_label: state.pace_label.clone(),
            calories: state.calories,
            heart_rate_bpm: state.heart_rate_bpm,
            last_milestone_km: state.last_milestone_km,
            is_auto_paused: state.is_auto_paused,
            points: state.path.len(),
            last_point: state.last_point().copied(),
        }
    }
}

/// Compact end-of-run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub status: TrackerStatus,
    pub elapsed_sec: u64,
    pub distance_km: f64,
    pub pace_label: String,
    pub calories: u32,
    pub points: usize,
    pub simulated: bool,
    pub splits: Vec<Split>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_idle_and_zeroed() {
        let state = TrackerState::new();
        assert_eq!(state.status, TrackerStatus::Idle);
        assert_eq!(state.elapsed_sec, 0);
        assert_eq!(state.distance_km, 0.0);
        assert_eq!(state.pace_label, "--:--");
        assert!(state.path.is_empty());
        assert!(!state.is_active());
    }

    #[test]
    fn test_format_elapsed() {
        let mut state = TrackerState::new();
        state.elapsed_sec = 65;
        assert_eq!(state.format_elapsed(), "01:05");
        state.elapsed_sec = 3725;
        assert_eq!(state.format_elapsed(), "1:02:05");
    }

    #[test]
    fn test_live_status_keeps_only_path_tail() {
        let mut state = TrackerState::new();
        state.status = TrackerStatus::Running;
        state.elapsed_sec = 65;
        state.path.push(TrackPoint::new(1.0, 1.0, 0));
        state.path.push(TrackPoint::new(2.0, 2.0, 1000));

        let live = LiveStatus::from(&state);
        assert_eq!(live.points, 2);
        assert_eq!(live.last_point, Some(TrackPoint::new(2.0, 2.0, 1000)));
        assert_eq!(live.format_elapsed(), "01:05");
        assert_eq!(live.status, TrackerStatus::Running);
    }

    #[test]
    fn test_track_point_json_shape() {
        let point = TrackPoint::new(48.1, 11.5, 1_700_000_000_000);
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(
            json,
            r#"{"latitude":48.1,"longitude":11.5,"timestampMs":1700000000000}"#
        );
        assert!(point.time().is_some());
    }
}
