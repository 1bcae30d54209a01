//! Shared entity and event types.
//!
//! Every simulated object (vessel, aircraft, vehicle, person) shares the
//! [`Entity`] base model. Domain-specific fields extend via the metadata map.

pub mod catalog;
pub mod event;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use catalog::{lookup_type, EntityTypeDef};
pub use event::ScenarioEvent;

/// Security agencies and the civilian designation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Agency {
    /// Royal Malaysia Police
    Rmp,
    /// Malaysian Maritime Enforcement Agency
    Mmea,
    /// Customs and Immigration
    Ci,
    /// Royal Malaysian Air Force
    Rmaf,
    /// Malaysian Armed Forces
    Mil,
    Civilian,
}

impl Agency {
    /// Wire-format string, as carried in scenario files and transports.
    pub fn as_str(self) -> &'static str {
        match self {
            Agency::Rmp => "RMP",
            Agency::Mmea => "MMEA",
            Agency::Ci => "CI",
            Agency::Rmaf => "RMAF",
            Agency::Mil => "MIL",
            Agency::Civilian => "CIVILIAN",
        }
    }
}

/// Operational domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Domain {
    Maritime,
    Air,
    GroundVehicle,
    Personnel,
}

impl Domain {
    /// Wire-format string used in logs and terrain diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Maritime => "MARITIME",
            Domain::Air => "AIR",
            Domain::GroundVehicle => "GROUND_VEHICLE",
            Domain::Personnel => "PERSONNEL",
        }
    }
}

/// Entity operational status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityStatus {
    #[default]
    Active,
    Idle,
    Responding,
    Intercepting,
    /// Return to base
    Rtb,
}

impl EntityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityStatus::Active => "ACTIVE",
            EntityStatus::Idle => "IDLE",
            EntityStatus::Responding => "RESPONDING",
            EntityStatus::Intercepting => "INTERCEPTING",
            EntityStatus::Rtb => "RTB",
        }
    }
}

/// WGS84 geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude_m: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, altitude_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m,
        }
    }
}

/// Base entity model for all simulated objects.
///
/// Covers maritime vessels, aircraft, ground vehicles, and personnel.
/// Domain-specific flags (`ais_active`, `on_ground`, `unit_size`, ...)
/// live in the metadata map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub entity_type: String,
    pub domain: Domain,
    pub agency: Agency,
    pub callsign: String,
    pub position: Position,
    #[serde(default)]
    pub heading_deg: f64,
    #[serde(default)]
    pub speed_knots: f64,
    #[serde(default)]
    pub course_deg: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: EntityStatus,
    #[serde(default)]
    pub sidc: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Entity {
    /// Update kinematics in one shot. Stamps the entity with `timestamp`
    /// (the simulation time of the tick that produced the update).
    #[allow(clippy::too_many_arguments)]
    pub fn update_position(
        &mut self,
        latitude: f64,
        longitude: f64,
        altitude_m: f64,
        heading_deg: f64,
        speed_knots: f64,
        course_deg: f64,
        timestamp: DateTime<Utc>,
    ) {
        self.position = Position::new(latitude, longitude, altitude_m);
        self.heading_deg = heading_deg;
        self.speed_knots = speed_knots;
        self.course_deg = course_deg;
        self.timestamp = timestamp;
    }

    pub fn meta_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(Value::as_bool)
    }

    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn set_meta(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }
}

/// FNV-1a hash for deterministic per-entity identifiers (MMSI, ICAO hex,
/// patrol seeds). Stable across runs and platforms.
pub fn stable_hash(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entity() -> Entity {
        Entity {
            entity_id: "MMEA-001".to_string(),
            entity_type: "MMEA_PATROL".to_string(),
            domain: Domain::Maritime,
            agency: Agency::Mmea,
            callsign: "KM Pekan".to_string(),
            position: Position::new(5.0, 118.0, 0.0),
            heading_deg: 90.0,
            speed_knots: 12.0,
            course_deg: 90.0,
            timestamp: Utc::now(),
            status: EntityStatus::Active,
            sidc: "SFSP------".to_string(),
            metadata: Map::new(),
        }
    }

    #[test]
    fn update_position_stamps_timestamp() {
        let mut e = sample_entity();
        let t = Utc::now();
        e.update_position(5.5, 118.5, 10.0, 45.0, 20.0, 44.0, t);
        assert_eq!(e.position.latitude, 5.5);
        assert_eq!(e.position.longitude, 118.5);
        assert_eq!(e.heading_deg, 45.0);
        assert_eq!(e.speed_knots, 20.0);
        assert_eq!(e.timestamp, t);
    }

    #[test]
    fn serde_round_trip_preserves_fields() {
        let mut e = sample_entity();
        e.set_meta("ais_active", Value::Bool(false));
        let json = serde_json::to_string(&e).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entity_id, e.entity_id);
        assert_eq!(back.domain, Domain::Maritime);
        assert_eq!(back.agency, Agency::Mmea);
        assert_eq!(back.position.latitude, e.position.latitude);
        assert_eq!(back.status, EntityStatus::Active);
        assert_eq!(back.meta_bool("ais_active"), Some(false));
    }

    #[test]
    fn stable_hash_is_deterministic() {
        assert_eq!(stable_hash("SUSPECT-01"), stable_hash("SUSPECT-01"));
        assert_ne!(stable_hash("SUSPECT-01"), stable_hash("SUSPECT-02"));
    }
}
