// src/tracking/auto_pause.rs
//! Speed-based auto-pause with hysteresis

use super::state::{TrackPoint, TrackerStatus};
use crate::geo::distance_km;

/// Below this speed (m/s) the runner is considered stopped
pub const STOPPED_SPEED_MS: f64 = 0.6;
/// Above this speed (m/s) the runner is considered moving
pub const MOVING_SPEED_MS: f64 = 1.2;
/// Low speed must persist longer than this before pausing
pub const PAUSE_AFTER_MS: i64 = 6000;
/// High speed must persist longer than this before resuming
pub const RESUME_AFTER_MS: i64 = 3000;
/// Floor for the time delta between fixes
pub const MIN_DT_SEC: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Pause,
    Resume,
}

/// Hysteresis state between consecutive fixes.
///
/// `now` is always the timestamp of the fix being evaluated, so replays of
/// recorded or buffered points behave the same as live ones.
#[derive(Debug, Clone)]
pub struct AutoPause {
    enabled: bool,
    below_since: Option<i64>,
    above_since: Option<i64>,
    manually_paused: bool,
    last_fix: Option<TrackPoint>,
}

impl AutoPause {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            below_since: None,
            above_since: None,
            manually_paused: false,
            last_fix: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.enabled);
    }

    /// Forget both hysteresis timers but keep the last fix
    pub fn clear_timers(&mut self) {
        self.below_since = None;
        self.above_since = None;
    }

    pub fn set_manually_paused(&mut self, paused: bool) {
        self.manually_paused = paused;
    }

    /// Instantaneous speed in m/s between two fixes
    pub fn speed_ms(prev: &TrackPoint, next: &TrackPoint) -> f64 {
        let dt_sec = ((next.timestamp_ms - prev.timestamp_ms) as f64 / 1000.0).max(MIN_DT_SEC);
        distance_km(prev, next) * 1000.0 / dt_sec
    }

    /// Feed the next fix and decide whether the tracker should change state.
    pub fn evaluate(
        &mut self,
        point: &TrackPoint,
        status: TrackerStatus,
        is_auto_paused: bool,
    ) -> Option<Transition> {
        let prev = self.last_fix.replace(*point);
        if !self.enabled {
            return None;
        }
        let prev = prev?;

        let speed = Self::speed_ms(&prev, point);
        let now = point.timestamp_ms;

        if speed < STOPPED_SPEED_MS {
            self.below_since.get_or_insert(now);
            self.above_since = None;
        } else if speed > MOVING_SPEED_MS {
            self.above_since.get_or_insert(now);
            self.below_since = None;
        }

        match status {
            TrackerStatus::Running if !self.manually_paused => {
                let stopped_for = self.below_since.map(|since| now - since);
                if stopped_for.is_some_and(|ms| ms > PAUSE_AFTER_MS) {
                    log::debug!("Stopped for {:?} ms at {:.2} m/s", stopped_for, speed);
                    return Some(Transition::Pause);
                }
            }
            TrackerStatus::Paused if is_auto_paused && !self.manually_paused => {
                let moving_for = self.above_since.map(|since| now - since);
                if moving_for.is_some_and(|ms| ms > RESUME_AFTER_MS) {
                    log::debug!("Moving for {:?} ms at {:.2} m/s", moving_for, speed);
                    return Some(Transition::Resume);
                }
            }
            _ => {}
        }

        None
    }
}

impl Default for AutoPause {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Meters per degree of latitude on a 6371 km sphere
    const M_PER_DEG: f64 = 111_194.93;

    /// Points along a meridian moving at `speed` m/s, one per second
    fn walk(start_m: f64, start_ms: i64, speed: f64, count: usize) -> Vec<TrackPoint> {
        (0..count)
            .map(|i| {
                let meters = start_m + speed * i as f64;
                TrackPoint::new(meters / M_PER_DEG, 0.0, start_ms + i as i64 * 1000)
            })
            .collect()
    }

    fn feed(
        auto: &mut AutoPause,
        points: &[TrackPoint],
        status: TrackerStatus,
        auto_paused: bool,
    ) -> Option<(usize, Transition)> {
        points
            .iter()
            .enumerate()
            .find_map(|(i, p)| auto.evaluate(p, status, auto_paused).map(|t| (i, t)))
    }

    #[test]
    fn test_sustained_slow_speed_pauses() {
        let mut auto = AutoPause::new(true);
        let points = walk(0.0, 0, 0.3, 12);

        // below_since is set at t=1000; pause once now - 1000 > 6000
        let (index, transition) = feed(&mut auto, &points, TrackerStatus::Running, false).unwrap();
        assert_eq!(transition, Transition::Pause);
        assert_eq!(points[index].timestamp_ms, 8000);
    }

    #[test]
    fn test_short_stop_does_not_pause() {
        let mut auto = AutoPause::new(true);
        let mut points = walk(0.0, 0, 3.0, 5);
        points.extend(walk(12.0, 5000, 0.0, 5));
        points.extend(walk(12.0, 10_000, 3.0, 5));

        assert!(feed(&mut auto, &points, TrackerStatus::Running, false).is_none());
    }

    #[test]
    fn test_sustained_fast_speed_resumes_after_auto_pause() {
        let mut auto = AutoPause::new(true);
        let points = walk(0.0, 0, 3.0, 8);

        // above_since is set at t=1000; resume once now - 1000 > 3000
        let (index, transition) = feed(&mut auto, &points, TrackerStatus::Paused, true).unwrap();
        assert_eq!(transition, Transition::Resume);
        assert_eq!(points[index].timestamp_ms, 5000);
    }

    #[test]
    fn test_manual_pause_never_auto_resumes() {
        let mut auto = AutoPause::new(true);
        auto.set_manually_paused(true);
        let points = walk(0.0, 0, 3.0, 20);

        assert!(feed(&mut auto, &points, TrackerStatus::Paused, false).is_none());
    }

    #[test]
    fn test_neutral_speed_keeps_timers() {
        let mut auto = AutoPause::new(true);
        // Slow for 4 s, neutral for 2 s, slow again: below_since survives
        let mut points = walk(0.0, 0, 0.2, 5);
        points.extend(walk(0.8 + 0.9, 5000, 0.9, 2));
        points.extend(walk(2.7, 7000, 0.1, 4));

        let (index, transition) = feed(&mut auto, &points, TrackerStatus::Running, false).unwrap();
        assert_eq!(transition, Transition::Pause);
        assert!(points[index].timestamp_ms > 7000);
    }

    #[test]
    fn test_duplicate_timestamps_are_clamped() {
        let prev = TrackPoint::new(0.0, 0.0, 1000);
        let next = TrackPoint::new(1.0 / M_PER_DEG, 0.0, 1000);
        // 1 m over the 0.5 s floor
        assert!((AutoPause::speed_ms(&prev, &next) - 2.0).abs() < 1e-3);

        let backwards = TrackPoint::new(1.0 / M_PER_DEG, 0.0, 0);
        assert!(AutoPause::speed_ms(&prev, &backwards).is_finite());
    }

    #[test]
    fn test_disabled_never_transitions() {
        let mut auto = AutoPause::new(false);
        let points = walk(0.0, 0, 0.0, 30);
        assert!(feed(&mut auto, &points, TrackerStatus::Running, false).is_none());
    }
}
