// src/tracking/simulation.rs
//! Deterministic synthetic path used when no real position source is available

use super::state::TrackPoint;
use crate::geo::EARTH_RADIUS_KM;

/// Default simulated speed, roughly a 5:33 min/km jog
pub const SIMULATED_SPEED_MS: f64 = 3.0;
/// Heading change per tick in radians
const HEADING_DRIFT_RAD: f64 = 0.015;

#[derive(Debug, Clone)]
pub struct Simulation {
    position: TrackPoint,
    heading_rad: f64,
    speed_ms: f64,
    step: u64,
}

impl Simulation {
    pub fn new(origin: TrackPoint) -> Self {
        Self {
            position: origin,
            heading_rad: 0.0,
            speed_ms: SIMULATED_SPEED_MS,
            step: 0,
        }
    }

    pub fn position(&self) -> TrackPoint {
        self.position
    }

    /// Move forward to `timestamp_ms` and return the new fix.
    pub fn advance(&mut self, timestamp_ms: i64) -> TrackPoint {
        let dt_sec = ((timestamp_ms - self.position.timestamp_ms) as f64 / 1000.0).max(0.0);
        let meters = self.speed_ms * dt_sec;
        let angular = meters / (EARTH_RADIUS_KM * 1000.0);

        let lat = self.position.latitude.to_radians();
        let d_lat = angular * self.heading_rad.cos();
        let d_lon = angular * self.heading_rad.sin() / lat.cos().max(1e-6);

        self.step += 1;
        // Slow sinusoidal wander so the path curves instead of running straight
        self.heading_rad += HEADING_DRIFT_RAD * (self.step as f64 / 40.0).sin();

        self.position = TrackPoint::new(
            self.position.latitude + d_lat.to_degrees(),
            self.position.longitude + d_lon.to_degrees(),
            timestamp_ms,
        );
        self.position
    }
}

/// Synthetic heart rate: a warm-up ramp towards ~155 bpm with a little wobble
pub fn simulated_heart_rate(elapsed_sec: u64) -> f64 {
    let t = elapsed_sec as f64;
    let ramp = 35.0 * (1.0 - (-t / 120.0).exp());
    120.0 + ramp + 4.0 * (t / 17.0).sin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance_km;

    #[test]
    fn test_advance_moves_at_configured_speed() {
        let mut sim = Simulation::new(TrackPoint::new(52.52, 13.405, 0));
        let start = sim.position();
        let next = sim.advance(1000);

        let meters = distance_km(&start, &next) * 1000.0;
        assert!((meters - SIMULATED_SPEED_MS).abs() < 0.01, "moved {} m", meters);
        assert_eq!(next.timestamp_ms, 1000);
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let origin = TrackPoint::new(52.52, 13.405, 0);
        let mut a = Simulation::new(origin);
        let mut b = Simulation::new(origin);
        for i in 1..=100 {
            assert_eq!(a.advance(i * 1000), b.advance(i * 1000));
        }
    }

    #[test]
    fn test_heart_rate_is_plausible() {
        for t in [0, 60, 600, 3600] {
            let bpm = simulated_heart_rate(t);
            assert!((100.0..200.0).contains(&bpm));
        }
    }
}
