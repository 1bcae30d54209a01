//! Ground vehicle domain simulator.
//!
//! Vehicles follow waypoint routes like everything else; this pass keeps
//! their metadata honest: km/h speed conversion, altitude pinned to
//! ground level, and the emergency flag tied to responding status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::DomainProcessor;
use crate::core::EntityStore;
use crate::types::{Domain, EntityStatus};

/// Knots to km/h.
pub const KTS_TO_KMH: f64 = 1.852;

/// Ground vehicle post-processor.
pub struct GroundVehicleSimulator {
    store: Arc<EntityStore>,
}

impl GroundVehicleSimulator {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }
}

impl DomainProcessor for GroundVehicleSimulator {
    fn name(&self) -> &'static str {
        "ground"
    }

    fn tick(&mut self, _sim_time: DateTime<Utc>) {
        for mut entity in self.store.by_domain(Domain::GroundVehicle) {
            let kmh = (entity.speed_knots * KTS_TO_KMH * 10.0).round() / 10.0;
            entity.set_meta("speed_kmh", json!(kmh));

            if entity.position.altitude_m != 0.0 {
                entity.position.altitude_m = 0.0;
            }

            entity.set_meta(
                "emergency_mode",
                json!(entity.status == EntityStatus::Responding),
            );

            self.store.upsert(entity);
        }
    }
}
