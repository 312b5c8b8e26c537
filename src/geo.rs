// src/geo.rs
//! Great-circle distance and pace formatting

use crate::tracking::state::TrackPoint;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Placeholder shown while there is no distance to derive a pace from
pub const NO_PACE: &str = "--:--";

/// Haversine distance between two fixes in kilometers
pub fn distance_km(a: &TrackPoint, b: &TrackPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    (EARTH_RADIUS_KM * c).max(0.0)
}

/// Format a pace as `m:ss` per kilometer.
///
/// Seconds are rounded, not truncated; a rounded 60 carries into the
/// minute so `5:59.6` renders as `6:00`.
pub fn format_pace(distance_km: f64, elapsed_sec: f64) -> String {
    if distance_km <= 0.0 || !distance_km.is_finite() || !elapsed_sec.is_finite() {
        return NO_PACE.to_string();
    }

    let sec_per_km = elapsed_sec.max(0.0) / distance_km;
    let mut minutes = (sec_per_km / 60.0).floor() as u64;
    let mut seconds = (sec_per_km - minutes as f64 * 60.0).round() as u64;
    if seconds >= 60 {
        minutes += 1;
        seconds -= 60;
    }

    format!("{}:{:02}", minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> TrackPoint {
        TrackPoint::new(latitude, longitude, 0)
    }

    #[test]
    fn test_distance_identical_points() {
        let a = point(48.117, 11.517);
        assert_eq!(distance_km(&a, &a), 0.0);
    }

    #[test]
    fn test_distance_symmetric() {
        let pairs = [
            (point(48.117, 11.517), point(48.120, 11.530)),
            (point(-33.86, 151.21), point(51.5, -0.12)),
            (point(0.0, 179.9), point(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_km(&a, &b), distance_km(&b, &a));
        }
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        // One degree of latitude is ~111.19 km on a 6371 km sphere
        let d = distance_km(&point(0.0, 0.0), &point(1.0, 0.0));
        assert!((d - 111.195).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_format_pace_no_distance() {
        assert_eq!(format_pace(0.0, 120.0), NO_PACE);
        assert_eq!(format_pace(-1.0, 120.0), NO_PACE);
        assert_eq!(format_pace(0.0, 0.0), NO_PACE);
    }

    #[test]
    fn test_format_pace_basic() {
        assert_eq!(format_pace(1.0, 330.0), "5:30");
        assert_eq!(format_pace(2.0, 600.0), "5:00");
        assert_eq!(format_pace(1.0, 65.0), "1:05");
    }

    #[test]
    fn test_format_pace_rounds_and_carries() {
        // 59.6 s/km rounds up into a full minute
        assert_eq!(format_pace(1.0, 59.6), "1:00");
        assert_eq!(format_pace(1.0, 359.6), "6:00");
        // 330.4 s/km rounds down
        assert_eq!(format_pace(1.0, 330.4), "5:30");
    }

    #[test]
    fn test_format_pace_zero_elapsed() {
        assert_eq!(format_pace(1.0, 0.0), "0:00");
    }
}
