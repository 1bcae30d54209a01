//! Random patrol within a polygon boundary.
//!
//! Generates batches of random waypoints inside the polygon via rejection
//! sampling, rejecting sharp turns, and interleaving dwell stops so the
//! movement reads as a natural patrol rather than a random scribble.
//! Delegates interpolation to [`WaypointMovement`]; when a batch runs out
//! a fresh one is generated, so a patrol never completes.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use geo::{BoundingRect, Contains, Point, Polygon};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::geodesy::{distance_nm, initial_bearing};
use super::terrain::TerrainIndex;
use super::waypoint::WaypointMovement;
use super::{MovementState, MovementStrategy, Waypoint};
use crate::types::Domain;

/// Default dwell at each patrol point, in seconds.
pub const DEFAULT_DWELL_RANGE_S: (i64, i64) = (30, 120);

/// Patrol randomly within a polygon boundary.
pub struct PatrolMovement {
    polygon: Polygon<f64>,
    speed_range_knots: (f64, f64),
    dwell_range_s: (i64, i64),
    rng: StdRng,
    scenario_start: DateTime<Utc>,
    domain: Option<Domain>,
    terrain: Option<Arc<TerrainIndex>>,
    inner: WaypointMovement,
    last_offset: Duration,
}

impl PatrolMovement {
    pub fn new(
        polygon: Polygon<f64>,
        speed_range_knots: (f64, f64),
        dwell_range_s: (i64, i64),
        seed: u64,
        scenario_start: DateTime<Utc>,
        domain: Option<Domain>,
        terrain: Option<Arc<TerrainIndex>>,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let (inner, last_offset) = generate_batch(
            &polygon,
            speed_range_knots,
            dwell_range_s,
            &mut rng,
            scenario_start,
            domain,
            terrain.as_deref(),
            Duration::zero(),
        );
        Self {
            polygon,
            speed_range_knots,
            dwell_range_s,
            rng,
            scenario_start,
            domain,
            terrain,
            inner,
            last_offset,
        }
    }

    /// Planned waypoints of the current batch (for COP route display).
    pub fn waypoints(&self) -> &[Waypoint] {
        self.inner.waypoints()
    }
}

impl MovementStrategy for PatrolMovement {
    fn state(&mut self, sim_time: DateTime<Utc>) -> MovementState {
        if self.inner.is_complete(sim_time) {
            let (inner, last_offset) = generate_batch(
                &self.polygon,
                self.speed_range_knots,
                self.dwell_range_s,
                &mut self.rng,
                self.scenario_start,
                self.domain,
                self.terrain.as_deref(),
                self.last_offset,
            );
            self.inner = inner;
            self.last_offset = last_offset;
        }
        self.inner.state(sim_time)
    }

    fn is_complete(&self, _sim_time: DateTime<Utc>) -> bool {
        // Patrols regenerate forever.
        false
    }
}

/// Random point inside the polygon via rejection sampling; terrain-checked
/// when a domain and mask are available. Falls back to unchecked sampling
/// and finally the polygon centroid.
fn random_point_in_polygon(
    polygon: &Polygon<f64>,
    rng: &mut StdRng,
    domain: Option<Domain>,
    terrain: Option<&TerrainIndex>,
) -> (f64, f64) {
    use geo::Centroid;

    let Some(bounds) = polygon.bounding_rect() else {
        return (0.0, 0.0);
    };
    let (min_x, min_y) = (bounds.min().x, bounds.min().y);
    let (max_x, max_y) = (bounds.max().x, bounds.max().y);

    for _ in 0..1000 {
        let lat = rng.gen_range(min_y..=max_y);
        let lon = rng.gen_range(min_x..=max_x);
        if !polygon.contains(&Point::new(lon, lat)) {
            continue;
        }
        if let (Some(domain), Some(terrain)) = (domain, terrain) {
            if !terrain.validate(lat, lon, domain) {
                continue;
            }
        }
        return (lat, lon);
    }

    // Terrain may be unsatisfiable inside this polygon; retry without it.
    for _ in 0..100 {
        let lat = rng.gen_range(min_y..=max_y);
        let lon = rng.gen_range(min_x..=max_x);
        if polygon.contains(&Point::new(lon, lat)) {
            return (lat, lon);
        }
    }

    polygon
        .centroid()
        .map_or((0.0, 0.0), |c| (c.y(), c.x()))
}

/// Generate 5-8 patrol waypoints starting at `start_offset`, rejecting
/// turns sharper than 90 degrees and interleaving dwell stops.
#[allow(clippy::too_many_arguments)]
fn generate_batch(
    polygon: &Polygon<f64>,
    speed_range: (f64, f64),
    dwell_range_s: (i64, i64),
    rng: &mut StdRng,
    scenario_start: DateTime<Utc>,
    domain: Option<Domain>,
    terrain: Option<&TerrainIndex>,
    start_offset: Duration,
) -> (WaypointMovement, Duration) {
    let count = rng.gen_range(5..=8);
    let mut waypoints: Vec<Waypoint> = Vec::with_capacity(count * 2);
    let mut current_offset = start_offset;
    let mut prev: Option<(f64, f64)> = None;

    for i in 0..count {
        let (mut lat, mut lon) = random_point_in_polygon(polygon, rng, domain, terrain);

        // Reject sharp course changes, retrying a handful of times.
        if waypoints.len() >= 2 {
            let last = &waypoints[waypoints.len() - 1];
            let before_last = &waypoints[waypoints.len() - 2];
            let prev_bearing =
                initial_bearing(before_last.lat, before_last.lon, last.lat, last.lon);
            for _ in 0..5 {
                let new_bearing = initial_bearing(last.lat, last.lon, lat, lon);
                if turn_angle(prev_bearing, new_bearing) <= 90.0 {
                    break;
                }
                let retry = random_point_in_polygon(polygon, rng, domain, terrain);
                lat = retry.0;
                lon = retry.1;
            }
        }

        let speed = rng.gen_range(speed_range.0..=speed_range.1);

        // Dwell at the previous point before moving on.
        if i > 0 {
            if let Some(last) = waypoints.last() {
                let dwell_s = rng.gen_range(dwell_range_s.0..=dwell_range_s.1);
                let dwell = Waypoint::new(
                    last.lat,
                    last.lon,
                    0.0,
                    current_offset + Duration::seconds(dwell_s),
                );
                current_offset = dwell.time_offset;
                waypoints.push(dwell);
            }
        }

        // Travel time from geodesic distance at the sampled speed.
        current_offset = current_offset
            + match prev {
                Some((plat, plon)) if speed > 0.0 => {
                    let nm = distance_nm(plat, plon, lat, lon);
                    Duration::seconds((nm / speed * 3600.0) as i64)
                }
                _ => Duration::seconds(1),
            };

        waypoints.push(Waypoint::new(lat, lon, speed, current_offset));
        prev = Some((lat, lon));
    }

    let last_offset = current_offset;
    // The batch always contains at least five waypoints, so this cannot
    // fail; freeze at a sampled point if it somehow does.
    let movement = match WaypointMovement::new(waypoints, scenario_start) {
        Ok(movement) => movement,
        Err(_) => {
            let (lat, lon) = random_point_in_polygon(polygon, rng, domain, terrain);
            #[allow(clippy::unwrap_used)]
            let single = WaypointMovement::new(
                vec![Waypoint::new(lat, lon, 0.0, start_offset)],
                scenario_start,
            )
            .unwrap();
            single
        }
    };

    (movement, last_offset)
}

fn turn_angle(a: f64, b: f64) -> f64 {
    let mut turn = (b - a).abs();
    if turn > 180.0 {
        turn = 360.0 - turn;
    }
    turn
}
