//! Aviation domain simulator.
//!
//! Drives a flight-phase state machine over each aircraft: parked,
//! takeoff, climb, cruise, descent, landed, and helicopter hover.
//! Altitude integrates the vertical rate against sim-time deltas;
//! scrambled military aircraft climb 30% over their book rate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;

use super::DomainProcessor;
use crate::core::EntityStore;
use crate::movement::geodesy::FT_PER_M;
use crate::signals::AdsbEncoder;
use crate::types::{Domain, Entity, EntityStatus};

/// Climb rate envelopes by aircraft type (feet per minute).
fn climb_rates(entity_type: &str) -> (f64, f64) {
    match entity_type {
        "RMAF_TRANSPORT" => (1500.0, 2500.0),
        "RMAF_HELICOPTER" => (500.0, 1500.0),
        "RMAF_FIGHTER" => (5000.0, 15000.0),
        "CIVILIAN_LIGHT" => (500.0, 1000.0),
        "MIL_TRANSPORT" => (1000.0, 2000.0),
        _ => (1000.0, 2000.0),
    }
}

/// Cruise altitudes by type (feet).
fn cruise_altitude_ft(entity_type: &str) -> f64 {
    match entity_type {
        "RMAF_TRANSPORT" => 15000.0,
        "RMAF_HELICOPTER" => 3000.0,
        "RMAF_FIGHTER" => 25000.0,
        "CIVILIAN_LIGHT" => 5000.0,
        "MIL_TRANSPORT" => 20000.0,
        _ => 10000.0,
    }
}

/// Field elevation for coastal air bases (feet).
const FIELD_ELEVATION_FT: f64 = 50.0;

/// Altitude capture window around the target (feet).
const CAPTURE_WINDOW_FT: f64 = 100.0;

/// Helicopter hover threshold (knots).
const HOVER_SPEED_KNOTS: f64 = 5.0;

/// Aviation post-processor: flight profiles and ADS-B generation.
pub struct AviationSimulator {
    store: Arc<EntityStore>,
    encoder: AdsbEncoder,
    last_tick: Option<DateTime<Utc>>,
    sbs: Vec<String>,
    adsb_json: Vec<Value>,
}

impl AviationSimulator {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self {
            store,
            encoder: AdsbEncoder::new(),
            last_tick: None,
            sbs: Vec::new(),
            adsb_json: Vec::new(),
        }
    }

    /// SBS messages from the last tick.
    pub fn recent_sbs(&self) -> &[String] {
        &self.sbs
    }

    pub fn recent_json(&self) -> &[Value] {
        &self.adsb_json
    }

    fn update_flight_profile(entity: &mut Entity, dt_s: f64) {
        let on_ground = entity.meta_bool("on_ground").unwrap_or(true);

        if dt_s <= 0.0 {
            // First tick: stamp the phase for parked aircraft.
            if entity.status == EntityStatus::Idle && on_ground {
                entity.set_meta("flight_phase", json!("parked"));
                entity.set_meta("vertical_rate_fpm", json!(0.0));
            }
            return;
        }

        let etype = entity.entity_type.clone();
        let (climb_min, climb_max) = climb_rates(&etype);
        let current_alt_ft = entity.position.altitude_m * FT_PER_M;
        let target_alt_ft = entity
            .meta_f64("target_altitude_ft")
            .unwrap_or_else(|| cruise_altitude_ft(&etype));
        let mut on_ground = on_ground;

        if entity.status == EntityStatus::Idle && on_ground {
            entity.set_meta("flight_phase", json!("parked"));
            entity.set_meta("vertical_rate_fpm", json!(0.0));
            return;
        }

        if matches!(
            entity.status,
            EntityStatus::Active | EntityStatus::Responding | EntityStatus::Intercepting
        ) {
            if on_ground && entity.speed_knots > 0.0 {
                entity.set_meta("on_ground", json!(false));
                entity.set_meta("flight_phase", json!("takeoff"));
                on_ground = false;
            }

            if !on_ground {
                let alt_diff = target_alt_ft - current_alt_ft;

                if alt_diff.abs() < CAPTURE_WINDOW_FT {
                    entity.set_meta("flight_phase", json!("cruise"));
                    entity.set_meta("vertical_rate_fpm", json!(0.0));
                } else if alt_diff > 0.0 {
                    // Climb fast when responding, faster when scrambled.
                    let mut climb_fpm = if entity.status == EntityStatus::Responding {
                        climb_max
                    } else {
                        climb_min
                    };
                    if entity.meta_bool("scramble").unwrap_or(false) {
                        climb_fpm = climb_max * 1.3;
                    }

                    let alt_change_ft = (climb_fpm * dt_s / 60.0).min(alt_diff);
                    entity.position.altitude_m = (current_alt_ft + alt_change_ft) / FT_PER_M;
                    entity.set_meta("flight_phase", json!("climb"));
                    entity.set_meta("vertical_rate_fpm", json!(climb_fpm));
                } else {
                    // Descend at the low end of the climb envelope.
                    let descent_fpm = climb_min;
                    let alt_change_ft = (descent_fpm * dt_s / 60.0).min(alt_diff.abs());
                    let new_alt_ft = current_alt_ft - alt_change_ft;

                    if new_alt_ft <= FIELD_ELEVATION_FT {
                        entity.position.altitude_m = FIELD_ELEVATION_FT / FT_PER_M;
                        entity.set_meta("on_ground", json!(true));
                        entity.set_meta("flight_phase", json!("landed"));
                        on_ground = true;
                    } else {
                        entity.position.altitude_m = new_alt_ft / FT_PER_M;
                        entity.set_meta("flight_phase", json!("descent"));
                    }
                    entity.set_meta("vertical_rate_fpm", json!(-descent_fpm));
                }
            }
        }

        // Helicopter hover: airborne but nearly stationary.
        let upper = etype.to_uppercase();
        if (upper.contains("HELICOPTER") || upper.contains("HELI"))
            && entity.speed_knots < HOVER_SPEED_KNOTS
            && !on_ground
        {
            entity.set_meta("flight_phase", json!("hover"));
            entity.set_meta("vertical_rate_fpm", json!(0.0));
        }
    }

    fn generate_adsb(&mut self, entity: &Entity) {
        self.sbs.push(self.encoder.encode_position(entity));
        self.sbs.push(self.encoder.encode_velocity(entity));
        self.sbs.push(self.encoder.encode_identification(entity));
        self.adsb_json.push(self.encoder.encode_to_json(entity));
    }
}

impl DomainProcessor for AviationSimulator {
    fn name(&self) -> &'static str {
        "aviation"
    }

    fn reset(&mut self) {
        self.last_tick = None;
    }

    fn tick(&mut self, sim_time: DateTime<Utc>) {
        self.sbs.clear();
        self.adsb_json.clear();

        let dt_s = self
            .last_tick
            .map_or(0.0, |last| (sim_time - last).num_milliseconds() as f64 / 1000.0);
        self.last_tick = Some(sim_time);

        for mut entity in self.store.by_domain(Domain::Air) {
            Self::update_flight_profile(&mut entity, dt_s);

            if entity.meta_bool("adsb_active").unwrap_or(true) {
                self.generate_adsb(&entity);
            } else {
                debug!("{} ADS-B off", entity.entity_id);
            }

            self.store.upsert(entity);
        }
    }
}
