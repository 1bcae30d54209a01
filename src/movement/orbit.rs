//! Orbit/loiter movement.
//!
//! Flies a clockwise circular pattern around a center point. Used when
//! fixed-wing aircraft reach a destination or intercept target and must
//! keep flying.

use chrono::{DateTime, Utc};

use super::geodesy::offset_to_degrees;
use super::{MovementState, MovementStrategy};

/// Default orbit radius, ~3 km.
pub const DEFAULT_ORBIT_RADIUS_M: f64 = 3000.0;

/// Orbit advance rate: ~2 minutes per full circle.
const ORBIT_RATE_DEG_S: f64 = 3.0;

/// Fly a circular orbit pattern around a fixed point.
pub struct OrbitMovement {
    center_lat: f64,
    center_lon: f64,
    alt_m: f64,
    speed_knots: f64,
    radius_m: f64,
    orbit_angle: f64,
    last_sim_time: Option<DateTime<Utc>>,
}

impl OrbitMovement {
    pub fn new(
        center_lat: f64,
        center_lon: f64,
        altitude_m: f64,
        speed_knots: f64,
        orbit_radius_m: f64,
        initial_heading: f64,
    ) -> Self {
        Self {
            center_lat,
            center_lon,
            alt_m: altitude_m,
            speed_knots,
            radius_m: orbit_radius_m,
            orbit_angle: initial_heading,
            last_sim_time: None,
        }
    }
}

impl MovementStrategy for OrbitMovement {
    fn state(&mut self, sim_time: DateTime<Utc>) -> MovementState {
        let dt_s = self
            .last_sim_time
            .map_or(0.0, |last| (sim_time - last).num_milliseconds() as f64 / 1000.0);

        // Advance position angle clockwise.
        self.orbit_angle = (self.orbit_angle + ORBIT_RATE_DEG_S * dt_s).rem_euclid(360.0);

        let angle_rad = self.orbit_angle.to_radians();
        let (dlat, dlon) = offset_to_degrees(
            self.center_lat,
            self.radius_m * angle_rad.cos(),
            self.radius_m * angle_rad.sin(),
        );

        // Course is tangent to the orbit circle.
        let course = (self.orbit_angle + 90.0) % 360.0;

        self.last_sim_time = Some(sim_time);

        MovementState {
            lat: self.center_lat + dlat,
            lon: self.center_lon + dlon,
            alt_m: self.alt_m,
            heading_deg: course,
            speed_knots: self.speed_knots,
            course_deg: course,
            metadata_overrides: None,
        }
    }

    fn is_complete(&self, _sim_time: DateTime<Utc>) -> bool {
        // Orbits never complete; the aircraft circles indefinitely.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::geodesy::distance_m;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 15, 8, 0, 0).unwrap()
    }

    #[test]
    fn stays_on_orbit_radius() {
        let mut orbit = OrbitMovement::new(5.0, 118.0, 3000.0, 120.0, 3000.0, 0.0);
        for i in 0..10 {
            let s = orbit.state(start() + Duration::seconds(i * 10));
            let d = distance_m(5.0, 118.0, s.lat, s.lon);
            assert!((d - 3000.0).abs() < 50.0, "d = {d}");
        }
    }

    #[test]
    fn advances_three_degrees_per_second() {
        let mut orbit = OrbitMovement::new(5.0, 118.0, 3000.0, 120.0, 3000.0, 0.0);
        let first = orbit.state(start());
        let second = orbit.state(start() + Duration::seconds(10));
        // 10 s at 3 deg/s: course swings 30 degrees.
        let delta = (second.course_deg - first.course_deg + 360.0) % 360.0;
        assert!((delta - 30.0).abs() < 0.01, "delta = {delta}");
    }

    #[test]
    fn course_is_tangent() {
        let mut orbit = OrbitMovement::new(5.0, 118.0, 3000.0, 120.0, 3000.0, 45.0);
        let s = orbit.state(start());
        assert!((s.course_deg - 135.0).abs() < 0.01);
        assert_eq!(s.heading_deg, s.course_deg);
    }

    #[test]
    fn never_completes() {
        let orbit = OrbitMovement::new(5.0, 118.0, 3000.0, 120.0, 3000.0, 0.0);
        assert!(!orbit.is_complete(start() + Duration::days(10)));
    }
}
