// src/tracking/accumulator.rs
//! Folds fixes into cumulative distance, pace and calories

use super::state::{TrackPoint, TrackerState};
use crate::geo::{distance_km, format_pace};

/// kcal burned per kg of body weight per km of running
pub const KCAL_PER_KG_KM: f64 = 1.036;

pub const DEFAULT_WEIGHT_KG: f64 = 70.0;

/// Result of folding one point into the run totals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Increment {
    pub increment_km: f64,
    pub previous_km: f64,
    pub distance_km: f64,
}

#[derive(Debug, Clone)]
pub struct Accumulator {
    assumed_weight_kg: f64,
}

impl Accumulator {
    pub fn new(assumed_weight_kg: f64) -> Self {
        Self { assumed_weight_kg }
    }

    pub fn calories(&self, distance_km: f64) -> u32 {
        (KCAL_PER_KG_KM * self.assumed_weight_kg * distance_km)
            .round()
            .max(0.0) as u32
    }

    /// Add the leg from `previous` to `point` to the running totals.
    ///
    /// Returns the previous and new cumulative distance so the caller can
    /// hand them to the split aggregator.
    pub fn apply(
        &self,
        state: &mut TrackerState,
        previous: Option<&TrackPoint>,
        point: &TrackPoint,
    ) -> Increment {
        let increment_km = previous.map_or(0.0, |prev| distance_km(prev, point));
        let previous_km = state.distance_km;

        state.distance_km += increment_km;
        self.refresh(state);

        Increment {
            increment_km,
            previous_km,
            distance_km: state.distance_km,
        }
    }

    /// Recompute the derived labels after distance or elapsed time changed
    pub fn refresh(&self, state: &mut TrackerState) {
        state.pace_label = format_pace(state.distance_km, state.elapsed_sec as f64);
        state.calories = self.calories(state.distance_km);
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT_KG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calorie_formula() {
        let acc = Accumulator::new(70.0);
        assert_eq!(acc.calories(5.0), 363);
        assert_eq!(acc.calories(0.0), 0);
    }

    #[test]
    fn test_first_point_adds_nothing() {
        let acc = Accumulator::default();
        let mut state = TrackerState::new();
        let point = TrackPoint::new(48.0, 11.0, 0);

        let inc = acc.apply(&mut state, None, &point);
        assert_eq!(inc.increment_km, 0.0);
        assert_eq!(state.distance_km, 0.0);
        assert_eq!(state.pace_label, "--:--");
    }

    #[test]
    fn test_apply_accumulates_distance_pace_and_calories() {
        let acc = Accumulator::new(70.0);
        let mut state = TrackerState::new();
        state.elapsed_sec = 330;

        let a = TrackPoint::new(0.0, 0.0, 0);
        // ~1 km north
        let b = TrackPoint::new(1.0 / 111.195, 0.0, 330_000);

        let inc = acc.apply(&mut state, Some(&a), &b);
        assert!((inc.increment_km - 1.0).abs() < 1e-3);
        assert_eq!(inc.previous_km, 0.0);
        assert_eq!(state.pace_label, "5:30");
        assert_eq!(state.calories, 73);
    }

    #[test]
    fn test_duplicate_point_adds_zero() {
        let acc = Accumulator::default();
        let mut state = TrackerState::new();
        let a = TrackPoint::new(48.0, 11.0, 1000);

        let inc = acc.apply(&mut state, Some(&a), &a);
        assert_eq!(inc.increment_km, 0.0);
    }
}
