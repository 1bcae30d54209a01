//! Spherical geodesy helpers.
//!
//! Bearings and great-circle interpolation are computed on the sphere, not
//! on a projected plane. Distances use the haversine formulation from the
//! `geo` crate; interpolation and forward projection are implemented here
//! because `geo` exposes no slerp over time-parameterised fractions.

use geo::{HaversineDistance, Point};

/// Metres per degree of latitude (and of longitude at the equator).
pub const M_PER_DEG: f64 = 111_111.0;

pub const KNOTS_TO_MS: f64 = 0.514_444;

pub const M_PER_NM: f64 = 1852.0;

pub const FT_PER_M: f64 = 3.280_84;

/// Geodesic distance in metres.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Point::new(lon1, lat1).haversine_distance(&Point::new(lon2, lat2))
}

/// Geodesic distance in nautical miles.
pub fn distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance_m(lat1, lon1, lat2, lon2) / M_PER_NM
}

/// Initial bearing (forward azimuth) between two points, degrees [0, 360).
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let dlon_r = (lon2 - lon1).to_radians();

    let x = dlon_r.sin() * lat2_r.cos();
    let y = lat1_r.cos() * lat2_r.sin() - lat1_r.sin() * lat2_r.cos() * dlon_r.cos();

    (x.atan2(y).to_degrees() + 360.0) % 360.0
}

/// Interpolate along the great circle between two points.
///
/// `fraction` 0.0 = start, 1.0 = end. Spherical slerp: convert both points
/// to 3-D unit vectors and blend with `sin((1-f)d)/sin d` and
/// `sin(fd)/sin d`. Degenerate separations (`d < 1e-12`) return the start.
pub fn interpolate_great_circle(
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
    fraction: f64,
) -> (f64, f64) {
    if fraction <= 0.0 {
        return (lat1, lon1);
    }
    if fraction >= 1.0 {
        return (lat2, lon2);
    }

    let lat1_r = lat1.to_radians();
    let lon1_r = lon1.to_radians();
    let lat2_r = lat2.to_radians();
    let lon2_r = lon2.to_radians();

    // Angular distance (haversine form).
    let d = 2.0
        * (((lat2_r - lat1_r) / 2.0).sin().powi(2)
            + lat1_r.cos() * lat2_r.cos() * ((lon2_r - lon1_r) / 2.0).sin().powi(2))
        .sqrt()
        .asin();

    if d < 1e-12 {
        return (lat1, lon1);
    }

    let a = ((1.0 - fraction) * d).sin() / d.sin();
    let b = (fraction * d).sin() / d.sin();

    let x = a * lat1_r.cos() * lon1_r.cos() + b * lat2_r.cos() * lon2_r.cos();
    let y = a * lat1_r.cos() * lon1_r.sin() + b * lat2_r.cos() * lon2_r.sin();
    let z = a * lat1_r.sin() + b * lat2_r.sin();

    let lat = z.atan2((x * x + y * y).sqrt());
    let lon = y.atan2(x);

    (lat.to_degrees(), lon.to_degrees())
}

/// Project a point forward along a bearing by a distance in metres
/// (spherical forward solution).
pub fn project(lat: f64, lon: f64, bearing_deg: f64, distance_m: f64) -> (f64, f64) {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let lat_r = lat.to_radians();
    let lon_r = lon.to_radians();

    let lat2 = (lat_r.sin() * delta.cos() + lat_r.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon_r
        + (theta.sin() * delta.sin() * lat_r.cos()).atan2(delta.cos() - lat_r.sin() * lat2.sin());

    (lat2.to_degrees(), lon2.to_degrees())
}

/// Convert north/east metre offsets to lat/lon deltas at a latitude.
pub fn offset_to_degrees(lat: f64, north_m: f64, east_m: f64) -> (f64, f64) {
    let dlat = north_m / M_PER_DEG;
    let dlon = east_m / (M_PER_DEG * lat.to_radians().cos());
    (dlat, dlon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearing_cardinal_directions() {
        // Due north and due east along a meridian/parallel near the equator.
        assert!((initial_bearing(0.0, 118.0, 1.0, 118.0) - 0.0).abs() < 0.01);
        assert!((initial_bearing(0.0, 118.0, 0.0, 119.0) - 90.0).abs() < 0.01);
        assert!((initial_bearing(1.0, 118.0, 0.0, 118.0) - 180.0).abs() < 0.01);
    }

    #[test]
    fn interpolation_endpoints_are_exact() {
        let (lat, lon) = interpolate_great_circle(5.0, 118.0, 6.0, 119.0, 0.0);
        assert_eq!((lat, lon), (5.0, 118.0));
        let (lat, lon) = interpolate_great_circle(5.0, 118.0, 6.0, 119.0, 1.0);
        assert_eq!((lat, lon), (6.0, 119.0));
    }

    #[test]
    fn interpolation_midpoint_is_between() {
        let (lat, lon) = interpolate_great_circle(5.0, 118.0, 6.0, 119.0, 0.5);
        assert!((lat - 5.5).abs() < 0.01);
        assert!((lon - 118.5).abs() < 0.01);
    }

    #[test]
    fn degenerate_separation_returns_start() {
        let (lat, lon) = interpolate_great_circle(5.0, 118.0, 5.0, 118.0, 0.5);
        assert_eq!((lat, lon), (5.0, 118.0));
    }

    #[test]
    fn project_moves_expected_distance() {
        let (lat, lon) = project(5.0, 118.0, 90.0, 10_000.0);
        let d = distance_m(5.0, 118.0, lat, lon);
        assert!((d - 10_000.0).abs() < 10.0, "d = {d}");
        assert!(lon > 118.0);
    }

    #[test]
    fn distance_degree_of_latitude() {
        let d = distance_m(5.0, 118.0, 6.0, 118.0);
        // One degree of latitude is ~111 km.
        assert!((d - 111_000.0).abs() < 1_000.0, "d = {d}");
    }
}
