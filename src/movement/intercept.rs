//! Pursuit intercept course calculation.
//!
//! Closes on a moving target entity resolved through the entity store each
//! tick. Lead pursuit aims ahead of the target along its current course
//! rather than tail-chasing. Fixed-wing pursuers (non-zero minimum speed)
//! cannot stop: on intercept, or when the target disappears, they
//! transition into an orbit and never report complete.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::geodesy::{distance_m, initial_bearing, offset_to_degrees, project, KNOTS_TO_MS};
use super::orbit::{OrbitMovement, DEFAULT_ORBIT_RADIUS_M};
use super::{MovementState, MovementStrategy};
use crate::core::EntityStore;

pub const DEFAULT_INTERCEPT_RADIUS_M: f64 = 500.0;

/// Pursue and intercept a moving target entity.
pub struct InterceptMovement {
    speed_knots: f64,
    target_id: String,
    store: Arc<EntityStore>,
    intercept_radius_m: f64,
    lead_pursuit: bool,
    pursuer_id: Option<String>,
    /// Non-zero marks a fixed-wing pursuer that must keep flying.
    min_speed_knots: f64,
    intercepted: bool,
    last_heading: f64,
    last_pos: Option<(f64, f64, f64)>,
    last_sim_time: Option<DateTime<Utc>>,
    orbit: Option<OrbitMovement>,
}

impl InterceptMovement {
    pub fn new(
        entity_speed_knots: f64,
        target_id: impl Into<String>,
        store: Arc<EntityStore>,
        pursuer_id: Option<String>,
    ) -> Self {
        Self {
            speed_knots: entity_speed_knots,
            target_id: target_id.into(),
            store,
            intercept_radius_m: DEFAULT_INTERCEPT_RADIUS_M,
            lead_pursuit: true,
            pursuer_id,
            min_speed_knots: 0.0,
            intercepted: false,
            last_heading: 0.0,
            last_pos: None,
            last_sim_time: None,
            orbit: None,
        }
    }

    pub fn with_intercept_radius(mut self, radius_m: f64) -> Self {
        self.intercept_radius_m = radius_m;
        self
    }

    pub fn with_lead_pursuit(mut self, lead: bool) -> Self {
        self.lead_pursuit = lead;
        self
    }

    /// Mark the pursuer as fixed-wing with the given minimum speed.
    pub fn with_min_speed(mut self, min_speed_knots: f64) -> Self {
        self.min_speed_knots = min_speed_knots;
        self
    }

    pub fn is_intercepted(&self) -> bool {
        self.intercepted
    }

    fn is_fixed_wing(&self) -> bool {
        self.min_speed_knots > 0.0
    }

    fn enter_orbit(&mut self, lat: f64, lon: f64, alt_m: f64) {
        if self.orbit.is_none() {
            let speed = self.speed_knots.max(self.min_speed_knots);
            self.orbit = Some(OrbitMovement::new(
                lat,
                lon,
                alt_m,
                speed,
                DEFAULT_ORBIT_RADIUS_M,
                self.last_heading,
            ));
        }
    }

    /// Lead-pursuit aim point: project the target along its course by the
    /// estimated time to intercept. The closing-speed estimate discounts
    /// half the target speed and floors at 1 kt so a faster target cannot
    /// invert the geometry.
    fn aim_point(&self, t_lat: f64, t_lon: f64, t_speed: f64, t_course: f64, dist_m: f64) -> (f64, f64) {
        if !self.lead_pursuit || t_speed <= 0.0 {
            return (t_lat, t_lon);
        }

        let closing_knots = (self.speed_knots - t_speed * 0.5).max(1.0);
        let time_to_intercept_s = dist_m / (closing_knots * KNOTS_TO_MS);

        let target_speed_ms = t_speed * KNOTS_TO_MS;
        let course_rad = t_course.to_radians();
        let de = target_speed_ms * time_to_intercept_s * course_rad.sin();
        let dn = target_speed_ms * time_to_intercept_s * course_rad.cos();

        let (dlat, dlon) = offset_to_degrees(t_lat, dn, de);
        (t_lat + dlat, t_lon + dlon)
    }
}

impl MovementStrategy for InterceptMovement {
    fn state(&mut self, sim_time: DateTime<Utc>) -> MovementState {
        let dt_s = self
            .last_sim_time
            .map_or(0.0, |last| (sim_time - last).num_milliseconds() as f64 / 1000.0);
        self.last_sim_time = Some(sim_time);

        // Resolve the pursuer's own position: prefer the live store entry,
        // fall back to the last position this strategy produced.
        let pursuer = self
            .pursuer_id
            .as_deref()
            .and_then(|id| self.store.get(id));
        let (p_lat, p_lon, p_alt) = match (&pursuer, self.last_pos) {
            (Some(p), _) => (
                p.position.latitude,
                p.position.longitude,
                p.position.altitude_m,
            ),
            (None, Some(last)) => last,
            (None, None) => {
                return MovementState::fixed(0.0, 0.0, 0.0, 0.0);
            }
        };

        let target = self.store.get(&self.target_id);

        let Some(target) = target else {
            // Target removed. Fixed-wing latches an orbit at the last known
            // pursuer position; everything else holds station.
            if self.is_fixed_wing() {
                self.enter_orbit(p_lat, p_lon, p_alt);
                if let Some(orbit) = self.orbit.as_mut() {
                    return orbit.state(sim_time);
                }
            }
            self.last_pos = Some((p_lat, p_lon, p_alt));
            return MovementState::fixed(p_lat, p_lon, p_alt, self.last_heading);
        };

        let t_lat = target.position.latitude;
        let t_lon = target.position.longitude;
        let dist = distance_m(p_lat, p_lon, t_lat, t_lon);

        if dist <= self.intercept_radius_m {
            self.intercepted = true;

            if self.is_fixed_wing() {
                // Orbit around the target.
                self.enter_orbit(t_lat, t_lon, p_alt);
                if let Some(orbit) = self.orbit.as_mut() {
                    return orbit.state(sim_time);
                }
            }

            let heading = initial_bearing(p_lat, p_lon, t_lat, t_lon);
            self.last_heading = heading;
            self.last_pos = Some((p_lat, p_lon, p_alt));
            return MovementState::fixed(p_lat, p_lon, p_alt, heading);
        }

        let (aim_lat, aim_lon) =
            self.aim_point(t_lat, t_lon, target.speed_knots, target.course_deg, dist);

        let heading = initial_bearing(p_lat, p_lon, aim_lat, aim_lon);
        self.last_heading = heading;

        // Advance along the pursuit heading, capped at the remaining
        // distance to avoid overshooting through the target.
        let advance_m = (self.speed_knots * KNOTS_TO_MS * dt_s).min(dist);
        let (new_lat, new_lon) = if advance_m > 0.0 {
            project(p_lat, p_lon, heading, advance_m)
        } else {
            (p_lat, p_lon)
        };

        self.last_pos = Some((new_lat, new_lon, p_alt));

        MovementState {
            lat: new_lat,
            lon: new_lon,
            alt_m: p_alt,
            heading_deg: heading,
            speed_knots: self.speed_knots,
            course_deg: heading,
            metadata_overrides: None,
        }
    }

    fn is_complete(&self, _sim_time: DateTime<Utc>) -> bool {
        // Fixed-wing pursuers orbit after intercept and never complete.
        self.intercepted && !self.is_fixed_wing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Agency, Domain, Entity, EntityStatus, Position};
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 15, 8, 0, 0).unwrap()
    }

    fn vessel(id: &str, lat: f64, lon: f64, speed: f64, course: f64) -> Entity {
        Entity {
            entity_id: id.to_string(),
            entity_type: "SUSPECT_VESSEL".to_string(),
            domain: Domain::Maritime,
            agency: Agency::Civilian,
            callsign: id.to_string(),
            position: Position::new(lat, lon, 0.0),
            heading_deg: course,
            speed_knots: speed,
            course_deg: course,
            timestamp: start(),
            status: EntityStatus::Active,
            sidc: String::new(),
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn heads_toward_stationary_target() {
        let store = Arc::new(EntityStore::new());
        store.upsert(vessel("P", 5.0, 118.0, 25.0, 0.0));
        store.upsert(vessel("T", 5.0, 119.0, 0.0, 0.0));

        let mut m = InterceptMovement::new(25.0, "T", Arc::clone(&store), Some("P".to_string()));
        let s = m.state(start());
        // Target due east.
        assert!((s.heading_deg - 90.0).abs() < 1.0, "hdg = {}", s.heading_deg);
        assert_eq!(s.speed_knots, 25.0);
    }

    #[test]
    fn stationary_target_same_sim_time_is_stable() {
        let store = Arc::new(EntityStore::new());
        store.upsert(vessel("P", 5.0, 118.0, 25.0, 0.0));
        store.upsert(vessel("T", 5.0, 119.0, 0.0, 0.0));

        let mut m = InterceptMovement::new(25.0, "T", Arc::clone(&store), Some("P".to_string()));
        let a = m.state(start());
        let b = m.state(start());
        assert_eq!(a.lat, b.lat);
        assert_eq!(a.lon, b.lon);
        assert_eq!(a.heading_deg, b.heading_deg);
    }

    #[test]
    fn converges_on_moving_target() {
        let store = Arc::new(EntityStore::new());
        store.upsert(vessel("P", 5.0, 118.0, 25.0, 0.0));
        // ~8 km ahead, fleeing east at 10 kt; a 25 kt pursuer closes this
        // comfortably inside 30 simulated minutes.
        store.upsert(vessel("T", 5.05, 118.05, 10.0, 90.0));

        let mut m = InterceptMovement::new(25.0, "T", Arc::clone(&store), Some("P".to_string()));

        let mut intercept_tick = None;
        for tick in 0..180 {
            let now = start() + Duration::seconds(tick * 10);

            // Advance the target eastward at 10 kt between ticks.
            let mut target = store.get("T").unwrap();
            let t_advance = 10.0 * KNOTS_TO_MS * 10.0;
            let (nlat, nlon) =
                project(target.position.latitude, target.position.longitude, 90.0, t_advance);
            target.update_position(nlat, nlon, 0.0, 90.0, 10.0, 90.0, now);
            store.upsert(target);

            let s = m.state(now);
            let mut pursuer = store.get("P").unwrap();
            pursuer.update_position(s.lat, s.lon, s.alt_m, s.heading_deg, s.speed_knots, s.course_deg, now);
            store.upsert(pursuer);

            if m.is_intercepted() {
                intercept_tick = Some(tick);
                break;
            }
        }

        let tick = intercept_tick.expect("pursuer never intercepted target");
        // Within 30 simulated minutes.
        assert!(tick * 10 <= 1800, "intercept took {}s", tick * 10);
        assert!(m.is_complete(start() + Duration::hours(1)));

        let pursuer = store.get("P").unwrap();
        let target = store.get("T").unwrap();
        let d = distance_m(
            pursuer.position.latitude,
            pursuer.position.longitude,
            target.position.latitude,
            target.position.longitude,
        );
        assert!(d <= 2.0 * DEFAULT_INTERCEPT_RADIUS_M, "d = {d}");
    }

    #[test]
    fn surface_pursuer_holds_when_target_removed() {
        let store = Arc::new(EntityStore::new());
        store.upsert(vessel("P", 5.0, 118.0, 25.0, 0.0));

        let mut m = InterceptMovement::new(25.0, "GONE", Arc::clone(&store), Some("P".to_string()));
        let s = m.state(start());
        assert_eq!(s.lat, 5.0);
        assert_eq!(s.lon, 118.0);
        assert_eq!(s.speed_knots, 0.0);
        assert!(!m.is_complete(start()));
    }

    #[test]
    fn fixed_wing_orbits_when_target_removed() {
        let store = Arc::new(EntityStore::new());
        store.upsert(vessel("P", 5.0, 118.0, 250.0, 0.0));

        let mut m = InterceptMovement::new(250.0, "GONE", Arc::clone(&store), Some("P".to_string()))
            .with_min_speed(200.0);

        let first = m.state(start());
        assert!(first.speed_knots > 0.0);
        // Orbit latched at last known pursuer position; never completes.
        let s = m.state(start() + Duration::seconds(30));
        let d = distance_m(5.0, 118.0, s.lat, s.lon);
        assert!((d - DEFAULT_ORBIT_RADIUS_M).abs() < 100.0, "d = {d}");
        assert!(!m.is_complete(start() + Duration::hours(2)));
    }

    #[test]
    fn fixed_wing_orbits_target_after_intercept() {
        let store = Arc::new(EntityStore::new());
        store.upsert(vessel("P", 5.0, 118.0, 250.0, 0.0));
        // Target within intercept radius already.
        store.upsert(vessel("T", 5.001, 118.0, 0.0, 0.0));

        let mut m = InterceptMovement::new(250.0, "T", Arc::clone(&store), Some("P".to_string()))
            .with_min_speed(200.0);

        let s = m.state(start());
        assert!(m.is_intercepted());
        assert!(s.speed_knots > 0.0, "fixed-wing must keep flying");
        assert!(!m.is_complete(start()));
    }

    #[test]
    fn surface_pursuer_stops_on_intercept() {
        let store = Arc::new(EntityStore::new());
        store.upsert(vessel("P", 5.0, 118.0, 25.0, 0.0));
        store.upsert(vessel("T", 5.001, 118.0, 0.0, 0.0));

        let mut m = InterceptMovement::new(25.0, "T", Arc::clone(&store), Some("P".to_string()));
        let s = m.state(start());
        assert!(m.is_intercepted());
        assert_eq!(s.speed_knots, 0.0);
        assert!(m.is_complete(start()));
    }
}
