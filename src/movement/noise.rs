//! Sensor-realistic position and movement noise.
//!
//! Without noise, entities move on perfect mathematical curves that look
//! artificial on a COP display. This module perturbs positions, speeds,
//! and headings with correlated (random-walk) offsets that decay back
//! toward zero, so tracks wander plausibly instead of jittering.
//!
//! One instance per entity: sharing an instance would synchronise offsets
//! across the fleet.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use super::geodesy::offset_to_degrees;
use super::MovementState;
use crate::types::Domain;

/// Fraction of sigma added per step; smaller is smoother.
const WALK_STEP: f64 = 0.3;

/// Per-step pullback toward zero offset.
const DECAY: f64 = 0.93;

/// Correlated random-walk noise over movement states.
pub struct PositionNoise {
    pos_sigma_m: f64,
    speed_pct: f64,
    heading_sigma_deg: f64,
    rng: StdRng,

    offset_north_m: f64,
    offset_east_m: f64,
    speed_offset: f64,
    heading_offset: f64,
}

impl PositionNoise {
    pub fn new(
        position_noise_m: f64,
        speed_noise_pct: f64,
        heading_noise_deg: f64,
        seed: u64,
    ) -> Self {
        Self {
            pos_sigma_m: position_noise_m,
            speed_pct: speed_noise_pct,
            heading_sigma_deg: heading_noise_deg,
            rng: StdRng::seed_from_u64(seed),
            offset_north_m: 0.0,
            offset_east_m: 0.0,
            speed_offset: 0.0,
            heading_offset: 0.0,
        }
    }

    /// Domain-appropriate noise levels: (position m, speed fraction,
    /// heading degrees).
    pub fn for_domain(domain: Domain, seed: u64) -> Self {
        let (pos, spd, hdg) = match domain {
            Domain::Maritime => (15.0, 0.02, 2.0),
            Domain::Air => (50.0, 0.01, 1.0),
            Domain::GroundVehicle => (5.0, 0.03, 1.0),
            Domain::Personnel => (3.0, 0.05, 5.0),
        };
        Self::new(pos, spd, hdg, seed)
    }

    fn gauss(&mut self, sigma: f64) -> f64 {
        // sigma is always positive here; Normal::new only fails on NaN.
        Normal::new(0.0, sigma)
            .map(|n| n.sample(&mut self.rng))
            .unwrap_or(0.0)
    }

    /// Apply noise to a movement state, advancing the random walk.
    pub fn apply(&mut self, state: &MovementState) -> MovementState {
        // Position offsets: step, clamp to 3 sigma, decay toward zero.
        let max_offset = 3.0 * self.pos_sigma_m;
        self.offset_north_m += self.gauss(self.pos_sigma_m * WALK_STEP);
        self.offset_east_m += self.gauss(self.pos_sigma_m * WALK_STEP);
        self.offset_north_m = self.offset_north_m.clamp(-max_offset, max_offset) * DECAY;
        self.offset_east_m = self.offset_east_m.clamp(-max_offset, max_offset) * DECAY;

        let (dlat, dlon) = offset_to_degrees(state.lat, self.offset_north_m, self.offset_east_m);

        // Speed offset as a fraction of commanded speed.
        let max_speed_offset = 3.0 * self.speed_pct;
        self.speed_offset += self.gauss(self.speed_pct * WALK_STEP);
        self.speed_offset = self.speed_offset.clamp(-max_speed_offset, max_speed_offset) * DECAY;
        let noisy_speed = (state.speed_knots * (1.0 + self.speed_offset)).max(0.0);

        // Heading offset; course follows at half amplitude.
        let max_heading_offset = 3.0 * self.heading_sigma_deg;
        self.heading_offset += self.gauss(self.heading_sigma_deg * WALK_STEP);
        self.heading_offset =
            self.heading_offset.clamp(-max_heading_offset, max_heading_offset) * DECAY;
        let noisy_heading = (state.heading_deg + self.heading_offset).rem_euclid(360.0);
        let noisy_course = (state.course_deg + self.heading_offset * 0.5).rem_euclid(360.0);

        MovementState {
            lat: state.lat + dlat,
            lon: state.lon + dlon,
            alt_m: state.alt_m,
            heading_deg: noisy_heading,
            speed_knots: noisy_speed,
            course_deg: noisy_course,
            metadata_overrides: state.metadata_overrides.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::geodesy::distance_m;

    fn base_state() -> MovementState {
        MovementState {
            lat: 5.0,
            lon: 118.0,
            alt_m: 0.0,
            heading_deg: 90.0,
            speed_knots: 12.0,
            course_deg: 90.0,
            metadata_overrides: None,
        }
    }

    #[test]
    fn position_offset_stays_bounded() {
        let mut noise = PositionNoise::for_domain(Domain::Maritime, 7);
        let state = base_state();
        for _ in 0..500 {
            let noisy = noise.apply(&state);
            let d = distance_m(state.lat, state.lon, noisy.lat, noisy.lon);
            // 3 sigma on each axis: diagonal bound is 3*15*sqrt(2).
            assert!(d <= 3.0 * 15.0 * std::f64::consts::SQRT_2 + 1.0, "d = {d}");
        }
    }

    #[test]
    fn speed_never_goes_negative() {
        let mut noise = PositionNoise::new(3.0, 0.5, 5.0, 11);
        let mut state = base_state();
        state.speed_knots = 0.5;
        for _ in 0..500 {
            let noisy = noise.apply(&state);
            assert!(noisy.speed_knots >= 0.0);
        }
    }

    #[test]
    fn heading_stays_in_range() {
        let mut noise = PositionNoise::for_domain(Domain::Personnel, 3);
        let mut state = base_state();
        state.heading_deg = 359.5;
        for _ in 0..200 {
            let noisy = noise.apply(&state);
            assert!((0.0..360.0).contains(&noisy.heading_deg));
        }
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let mut a = PositionNoise::for_domain(Domain::Air, 42);
        let mut b = PositionNoise::for_domain(Domain::Air, 42);
        let state = base_state();
        for _ in 0..20 {
            let sa = a.apply(&state);
            let sb = b.apply(&state);
            assert_eq!(sa.lat, sb.lat);
            assert_eq!(sa.speed_knots, sb.speed_knots);
        }
    }

    #[test]
    fn separate_instances_diverge() {
        let mut a = PositionNoise::for_domain(Domain::Maritime, 1);
        let mut b = PositionNoise::for_domain(Domain::Maritime, 2);
        let state = base_state();
        let sa = a.apply(&state);
        let sb = b.apply(&state);
        assert_ne!((sa.lat, sa.lon), (sb.lat, sb.lon));
    }

    #[test]
    fn offsets_decay_toward_zero() {
        let mut noise = PositionNoise::new(15.0, 0.02, 2.0, 99);
        noise.offset_north_m = 45.0;
        noise.offset_east_m = -45.0;
        // With the walk step silenced by decay dominance, repeated
        // application pulls large offsets back toward the mean.
        let state = base_state();
        for _ in 0..100 {
            noise.apply(&state);
        }
        assert!(noise.offset_north_m.abs() < 45.0);
        assert!(noise.offset_east_m.abs() < 45.0);
    }
}
