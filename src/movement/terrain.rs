//! Terrain validation: keeps entities on their correct surface.
//!
//! Maritime entities must stay on water, ground vehicles and personnel on
//! land; aircraft are unconstrained. Classification runs against a land
//! polygon mask built from the scenario geodata. Without a mask the
//! validator is permissive, so scenarios without terrain data still run.

use geo::{Contains, MultiPolygon, Point};

use super::Waypoint;
use crate::types::Domain;

/// Default search radius for nearest-valid-point recovery, in degrees.
pub const DEFAULT_SEARCH_RADIUS_DEG: f64 = 0.05;

/// Points per ring in the concentric search pattern.
const RING_STEPS: usize = 8;

/// Land/water classifier over a polygon mask.
pub struct TerrainIndex {
    land: MultiPolygon<f64>,
    has_data: bool,
}

impl TerrainIndex {
    pub fn new(land: MultiPolygon<f64>) -> Self {
        let has_data = !land.0.is_empty();
        Self { land, has_data }
    }

    /// Permissive index: every position validates.
    pub fn empty() -> Self {
        Self {
            land: MultiPolygon(vec![]),
            has_data: false,
        }
    }

    pub fn has_data(&self) -> bool {
        self.has_data
    }

    pub fn is_land(&self, lat: f64, lon: f64) -> bool {
        self.land.contains(&Point::new(lon, lat))
    }

    pub fn is_water(&self, lat: f64, lon: f64) -> bool {
        !self.is_land(lat, lon)
    }

    /// Whether a position is on valid terrain for the domain.
    /// AIR is always valid; with no mask loaded, everything is.
    pub fn validate(&self, lat: f64, lon: f64, domain: Domain) -> bool {
        if !self.has_data {
            return true;
        }
        match domain {
            Domain::Air => true,
            Domain::Maritime => self.is_water(lat, lon),
            Domain::GroundVehicle | Domain::Personnel => self.is_land(lat, lon),
        }
    }

    /// Search concentric rings around an invalid point for the nearest
    /// valid position. Five rings, `8 * ring` points each, out to
    /// `search_radius_deg`.
    pub fn nearest_valid(
        &self,
        lat: f64,
        lon: f64,
        domain: Domain,
        search_radius_deg: f64,
    ) -> Option<(f64, f64)> {
        for ring in 1..=5_usize {
            let radius = search_radius_deg * ring as f64 / 5.0;
            let steps = RING_STEPS * ring;
            for i in 0..steps {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / steps as f64;
                let test_lat = lat + radius * angle.sin();
                let test_lon = lon + radius * angle.cos();
                if self.validate(test_lat, test_lon, domain) {
                    return Some((test_lat, test_lon));
                }
            }
        }
        None
    }

    /// Move any waypoint sitting on wrong terrain to the nearest valid
    /// point. Returns the number of fixes applied.
    pub fn fix_waypoints(&self, waypoints: &mut [Waypoint], domain: Domain) -> usize {
        if domain == Domain::Air || !self.has_data {
            return 0;
        }

        let mut fixed = 0;
        for wp in waypoints.iter_mut() {
            if self.validate(wp.lat, wp.lon, domain) {
                continue;
            }
            match self.nearest_valid(wp.lat, wp.lon, domain, DEFAULT_SEARCH_RADIUS_DEG) {
                Some((lat, lon)) => {
                    tracing::info!(
                        "Terrain fix: ({:.4}, {:.4}) -> ({:.4}, {:.4}) [{}]",
                        wp.lat,
                        wp.lon,
                        lat,
                        lon,
                        domain.as_str()
                    );
                    wp.lat = lat;
                    wp.lon = lon;
                    fixed += 1;
                }
                None => {
                    tracing::warn!(
                        "Terrain fix failed: ({:.4}, {:.4}) has no valid {} point in range",
                        wp.lat,
                        wp.lon,
                        domain.as_str()
                    );
                }
            }
        }
        fixed
    }
}
