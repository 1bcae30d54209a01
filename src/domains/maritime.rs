//! Maritime domain simulator.
//!
//! Adds vessel-specific behavior on top of the base movement engine:
//! AIS navigation status, IMO-cadenced position reports, periodic Type 5
//! static data, and dark-target handling for vessels running without AIS.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;

use super::DomainProcessor;
use crate::core::EntityStore;
use crate::signals::AisEncoder;
use crate::types::{Domain, Entity, EntityStatus};

/// Type 5 static data interval, seconds.
const TYPE5_INTERVAL_S: f64 = 360.0;

/// Course change threshold for the fast reporting cadence, degrees.
const COURSE_CHANGE_DEG: f64 = 2.0;

/// AIS position-report interval per IMO requirements.
fn ais_interval_s(speed_knots: f64, nav_status: u32, course_changing: bool) -> f64 {
    if nav_status == 1 || nav_status == 5 {
        return 180.0; // at anchor or moored
    }
    if course_changing {
        return 3.3;
    }
    if speed_knots > 23.0 {
        2.0
    } else if speed_knots > 14.0 {
        6.0
    } else if speed_knots > 0.0 {
        10.0
    } else {
        180.0
    }
}

/// AIS navigation status from entity state.
fn nav_status(entity: &Entity) -> u32 {
    if entity.status == EntityStatus::Idle {
        return 1; // at anchor
    }
    if entity.speed_knots < 0.5 {
        return if entity.meta_bool("at_port").unwrap_or(false) {
            5 // moored
        } else {
            1
        };
    }
    if entity.entity_type.to_lowercase().contains("fishing") && entity.speed_knots < 3.0 {
        return 7; // engaged in fishing
    }
    if !entity.meta_bool("ais_active").unwrap_or(true) {
        return 15; // undefined: dark target
    }
    0 // under way using engine
}

/// Maritime post-processor: nav status and AIS generation.
pub struct MaritimeSimulator {
    store: Arc<EntityStore>,
    encoder: AisEncoder,
    last_ais: HashMap<String, DateTime<Utc>>,
    last_type5: HashMap<String, DateTime<Utc>>,
    last_heading: HashMap<String, f64>,
    nmea: Vec<String>,
    ais_json: Vec<Value>,
}

impl MaritimeSimulator {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self {
            store,
            encoder: AisEncoder::new(),
            last_ais: HashMap::new(),
            last_type5: HashMap::new(),
            last_heading: HashMap::new(),
            nmea: Vec::new(),
            ais_json: Vec::new(),
        }
    }

    /// NMEA sentences generated in the last tick.
    pub fn recent_nmea(&self) -> &[String] {
        &self.nmea
    }

    /// JSON AIS reports generated in the last tick.
    pub fn recent_json(&self) -> &[Value] {
        &self.ais_json
    }

    fn maybe_generate_ais(&mut self, entity: &Entity, sim_time: DateTime<Utc>, status: u32) {
        let eid = entity.entity_id.clone();

        let prev_heading = self.last_heading.get(&eid).copied().unwrap_or(entity.heading_deg);
        let mut heading_change = (entity.heading_deg - prev_heading).abs();
        if heading_change > 180.0 {
            heading_change = 360.0 - heading_change;
        }
        let course_changing = heading_change > COURSE_CHANGE_DEG;

        let interval = ais_interval_s(entity.speed_knots, status, course_changing);

        let due = self
            .last_ais
            .get(&eid)
            .is_none_or(|last| (sim_time - *last).num_milliseconds() as f64 / 1000.0 >= interval);
        if due {
            self.nmea.extend(self.encoder.encode_position_report(entity));
            self.ais_json.push(self.encoder.encode_to_json(entity));
            self.last_ais.insert(eid.clone(), sim_time);
        }

        let type5_due = self
            .last_type5
            .get(&eid)
            .is_none_or(|last| {
                (sim_time - *last).num_milliseconds() as f64 / 1000.0 >= TYPE5_INTERVAL_S
            });
        if type5_due {
            self.nmea.extend(self.encoder.encode_static_data(entity));
            self.last_type5.insert(eid, sim_time);
        }
    }

}

impl DomainProcessor for MaritimeSimulator {
    fn name(&self) -> &'static str {
        "maritime"
    }

    fn reset(&mut self) {
        self.last_ais.clear();
        self.last_type5.clear();
        self.last_heading.clear();
    }

    fn tick(&mut self, sim_time: DateTime<Utc>) {
        self.nmea.clear();
        self.ais_json.clear();

        for mut entity in self.store.by_domain(Domain::Maritime) {
            let status = nav_status(&entity);
            entity.set_meta("nav_status", json!(status));

            if entity.meta_bool("ais_active").unwrap_or(true) {
                self.maybe_generate_ais(&entity, sim_time, status);
                entity.set_meta("last_ais_time", json!(sim_time.to_rfc3339()));
            } else {
                entity.set_meta("last_ais_time", Value::Null);
                debug!("{} running dark, no AIS", entity.entity_id);
            }

            self.last_heading
                .insert(entity.entity_id.clone(), entity.heading_deg);
            self.store.upsert(entity);
        }
    }
}
