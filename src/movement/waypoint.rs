//! Waypoint movement with great-circle interpolation.
//!
//! Given a list of time-stamped waypoints, interpolates the entity's
//! position at any simulation time. Before the first waypoint and after
//! the last the entity is frozen at speed zero; zero-duration segments
//! jump instantly to the segment end.

use chrono::{DateTime, Duration, Utc};

use super::geodesy::{initial_bearing, interpolate_great_circle};
use super::{MovementError, MovementState, MovementStrategy, Waypoint};

/// Moves an entity along a series of time-stamped waypoints.
pub struct WaypointMovement {
    waypoints: Vec<Waypoint>,
    scenario_start: DateTime<Utc>,
}

impl WaypointMovement {
    /// Waypoints are sorted by time offset on construction.
    pub fn new(
        mut waypoints: Vec<Waypoint>,
        scenario_start: DateTime<Utc>,
    ) -> Result<Self, MovementError> {
        if waypoints.is_empty() {
            return Err(MovementError::EmptyWaypointList);
        }
        waypoints.sort_by_key(|w| w.time_offset);
        Ok(Self {
            waypoints,
            scenario_start,
        })
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Time from first to last waypoint.
    pub fn total_duration(&self) -> Duration {
        let wps = &self.waypoints;
        wps[wps.len() - 1].time_offset - wps[0].time_offset
    }

    fn frozen_at_first(&self) -> MovementState {
        let wps = &self.waypoints;
        let wp = &wps[0];
        let heading = if wps.len() > 1 {
            initial_bearing(wp.lat, wp.lon, wps[1].lat, wps[1].lon)
        } else {
            0.0
        };
        MovementState {
            lat: wp.lat,
            lon: wp.lon,
            alt_m: wp.alt_m,
            heading_deg: heading,
            speed_knots: 0.0,
            course_deg: heading,
            metadata_overrides: wp.metadata_overrides.clone(),
        }
    }

    fn frozen_at_last(&self) -> MovementState {
        let wps = &self.waypoints;
        let wp = &wps[wps.len() - 1];
        let heading = if wps.len() > 1 {
            let prev = &wps[wps.len() - 2];
            initial_bearing(prev.lat, prev.lon, wp.lat, wp.lon)
        } else {
            0.0
        };
        MovementState {
            lat: wp.lat,
            lon: wp.lon,
            alt_m: wp.alt_m,
            heading_deg: heading,
            speed_knots: 0.0,
            course_deg: heading,
            metadata_overrides: wp.metadata_overrides.clone(),
        }
    }
}

impl MovementStrategy for WaypointMovement {
    fn state(&mut self, sim_time: DateTime<Utc>) -> MovementState {
        let elapsed = sim_time - self.scenario_start;
        let wps = &self.waypoints;

        if elapsed <= wps[0].time_offset {
            return self.frozen_at_first();
        }
        if elapsed >= wps[wps.len() - 1].time_offset {
            return self.frozen_at_last();
        }

        for i in 0..wps.len() - 1 {
            let wp_a = &wps[i];
            let wp_b = &wps[i + 1];
            if !(wp_a.time_offset <= elapsed && elapsed <= wp_b.time_offset) {
                continue;
            }

            let seg_ms = (wp_b.time_offset - wp_a.time_offset).num_milliseconds();
            if seg_ms <= 0 {
                // Instant jump to the segment end.
                let course = initial_bearing(wp_a.lat, wp_a.lon, wp_b.lat, wp_b.lon);
                return MovementState {
                    lat: wp_b.lat,
                    lon: wp_b.lon,
                    alt_m: wp_b.alt_m,
                    heading_deg: course,
                    speed_knots: wp_b.speed_knots,
                    course_deg: course,
                    metadata_overrides: None,
                };
            }

            let fraction =
                (elapsed - wp_a.time_offset).num_milliseconds() as f64 / seg_ms as f64;
            let (lat, lon) =
                interpolate_great_circle(wp_a.lat, wp_a.lon, wp_b.lat, wp_b.lon, fraction);

            let alt = wp_a.alt_m + (wp_b.alt_m - wp_a.alt_m) * fraction;
            let speed = wp_a.speed_knots + (wp_b.speed_knots - wp_a.speed_knots) * fraction;

            // Heading tracks the next waypoint from the interpolated point;
            // course is the segment's overall bearing.
            let heading = initial_bearing(lat, lon, wp_b.lat, wp_b.lon);
            let course = initial_bearing(wp_a.lat, wp_a.lon, wp_b.lat, wp_b.lon);

            return MovementState {
                lat,
                lon,
                alt_m: alt,
                heading_deg: heading,
                speed_knots: speed,
                course_deg: course,
                metadata_overrides: wp_a.metadata_overrides.clone(),
            };
        }

        self.frozen_at_last()
    }

    fn is_complete(&self, sim_time: DateTime<Utc>) -> bool {
        let elapsed = sim_time - self.scenario_start;
        elapsed >= self.waypoints[self.waypoints.len() - 1].time_offset
    }
}
