//! Personnel domain simulator.
//!
//! Troops and officers move at walking pace and travel as units: one
//! tracked entity with per-member positions spread around it according to
//! the unit's formation (cordon ring, single-file patrol, or a Gaussian
//! cluster for checkpoints and standby).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde_json::{json, Value};

use super::DomainProcessor;
use super::ground::KTS_TO_KMH;
use crate::core::EntityStore;
use crate::movement::geodesy::offset_to_degrees;
use crate::types::{Domain, Entity};

/// Hard speed ceiling: ~8 km/h, a sustained run.
pub const MAX_SPEED_KNOTS: f64 = 4.3;

/// Formation spread radius in metres.
fn formation_radius_m(formation: &str) -> f64 {
    match formation {
        "patrol" => 5.0,
        "checkpoint" => 20.0,
        "cordon" => 50.0,
        "standby" => 5.0,
        _ => 10.0,
    }
}

/// Personnel post-processor: speed clamp and formation member spread.
pub struct PersonnelSimulator {
    store: Arc<EntityStore>,
    rng: StdRng,
}

impl PersonnelSimulator {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self {
            store,
            rng: StdRng::seed_from_u64(42),
        }
    }

    fn member_positions(&mut self, entity: &Entity, formation: &str, unit_size: usize) -> Value {
        let center_lat = entity.position.latitude;
        let center_lon = entity.position.longitude;
        let radius = formation_radius_m(formation);

        let mut positions = Vec::with_capacity(unit_size);
        for i in 0..unit_size {
            let (offset_n, offset_e) = match formation {
                "cordon" => {
                    // Ring: members evenly spaced on the circle.
                    let angle = 2.0 * std::f64::consts::PI * i as f64 / unit_size as f64;
                    (radius * angle.cos(), radius * angle.sin())
                }
                "patrol" => {
                    // Single file trailing behind the heading.
                    let heading_rad = entity.heading_deg.to_radians();
                    let spacing = radius * i as f64;
                    (-spacing * heading_rad.cos(), -spacing * heading_rad.sin())
                }
                _ => {
                    // Gaussian cluster for checkpoint/standby.
                    let spread = Normal::new(0.0, radius / 2.0)
                        .map(|n| {
                            (n.sample(&mut self.rng), n.sample(&mut self.rng))
                        })
                        .unwrap_or((0.0, 0.0));
                    spread
                }
            };

            let (dlat, dlon) = offset_to_degrees(center_lat, offset_n, offset_e);
            positions.push(json!({
                "lat": ((center_lat + dlat) * 1e7).round() / 1e7,
                "lon": ((center_lon + dlon) * 1e7).round() / 1e7,
            }));
        }

        Value::Array(positions)
    }
}

impl DomainProcessor for PersonnelSimulator {
    fn name(&self) -> &'static str {
        "personnel"
    }

    fn tick(&mut self, _sim_time: DateTime<Utc>) {
        for mut entity in self.store.by_domain(Domain::Personnel) {
            let formation = entity
                .meta_str("formation")
                .unwrap_or("standby")
                .to_string();
            let unit_size = entity.meta_f64("unit_size").unwrap_or(1.0) as usize;

            entity.set_meta("formation", json!(formation));

            if unit_size > 1 {
                let members = self.member_positions(&entity, &formation, unit_size);
                entity.set_meta("member_positions", members);
            }

            if entity.speed_knots > MAX_SPEED_KNOTS {
                entity.speed_knots = MAX_SPEED_KNOTS;
            }
            let kmh = (entity.speed_knots * KTS_TO_KMH * 10.0).round() / 10.0;
            entity.set_meta("speed_kmh", json!(kmh));

            self.store.upsert(entity);
        }
    }
}
