//! ADS-B message generator in SBS (BaseStation) format.
//!
//! Emits the comma-separated SBS text lines a real receiver feed would
//! produce: MSG,1 identification, MSG,3 airborne position, and MSG,4
//! airborne velocity. This is the format consumed by dump1090-style
//! aviation tracking software.

use serde_json::{json, Value};

use crate::movement::geodesy::FT_PER_M;
use crate::types::{stable_hash, Entity};

/// ICAO 24-bit address ranges by country.
const ICAO_RANGES: &[(&str, (u32, u32))] = &[
    ("MYS", (0x750000, 0x75FFFF)),
    ("VNM", (0x888000, 0x88FFFF)),
    ("PHL", (0x758000, 0x75FFFF)),
    ("IDN", (0x8A0000, 0x8AFFFF)),
    ("SGP", (0x768000, 0x76FFFF)),
];

/// Generates SBS-format ADS-B messages from entity state.
#[derive(Default)]
pub struct AdsbEncoder;

impl AdsbEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic ICAO hex address from the entity id, inside the
    /// country's allocated range.
    pub fn generate_icao_hex(entity_id: &str, country: &str) -> String {
        let (base, top) = ICAO_RANGES
            .iter()
            .find(|(code, _)| *code == country)
            .map_or((0x750000, 0x75FFFF), |(_, range)| *range);
        let icao = base + (stable_hash(entity_id) % u64::from(top - base)) as u32;
        format!("{icao:06X}")
    }

    fn icao_for(entity: &Entity) -> String {
        entity
            .meta_str("icao_hex")
            .map(str::to_string)
            .unwrap_or_else(|| {
                let country = entity.meta_str("country").unwrap_or("MYS");
                Self::generate_icao_hex(&entity.entity_id, country)
            })
    }

    fn timestamps(entity: &Entity) -> (String, String) {
        (
            entity.timestamp.format("%Y/%m/%d").to_string(),
            entity.timestamp.format("%H:%M:%S%.3f").to_string(),
        )
    }

    /// SBS MSG Type 1, aircraft identification.
    pub fn encode_identification(&self, entity: &Entity) -> String {
        let icao = Self::icao_for(entity);
        let callsign: String = entity.callsign.chars().take(8).collect();
        let (date, time) = Self::timestamps(entity);
        format!("MSG,1,1,1,{icao},1,{date},{time},{date},{time},{callsign},,,,,,,,,,")
    }

    /// SBS MSG Type 3, airborne position.
    pub fn encode_position(&self, entity: &Entity) -> String {
        let icao = Self::icao_for(entity);
        let (date, time) = Self::timestamps(entity);
        let alt_ft = entity.position.altitude_m * FT_PER_M;
        let on_ground = if entity.meta_bool("on_ground").unwrap_or(false) {
            -1
        } else {
            0
        };
        format!(
            "MSG,3,1,1,{icao},1,{date},{time},{date},{time},,{alt_ft:.0},,,{:.6},{:.6},,,,,,{on_ground}",
            entity.position.latitude, entity.position.longitude
        )
    }

    /// SBS MSG Type 4, airborne velocity.
    pub fn encode_velocity(&self, entity: &Entity) -> String {
        let icao = Self::icao_for(entity);
        let (date, time) = Self::timestamps(entity);
        let vrate = entity.meta_f64("vertical_rate_fpm").unwrap_or(0.0);
        format!(
            "MSG,4,1,1,{icao},1,{date},{time},{date},{time},,{:.0},,{:.1},,,{vrate:.0},,,,",
            entity.speed_knots, entity.heading_deg
        )
    }

    /// Transponder squawk code by entity type.
    pub fn generate_squawk(entity_type: &str) -> &'static str {
        let et = entity_type.to_lowercase();
        if et.contains("emergency") {
            "7700"
        } else if et.contains("military") || et.contains("fighter") || et.contains("rmaf") {
            "0000"
        } else {
            "1200" // VFR
        }
    }

    /// Structured ADS-B data for non-SBS consumers.
    pub fn encode_to_json(&self, entity: &Entity) -> Value {
        json!({
            "icao_hex": Self::icao_for(entity),
            "callsign": entity.callsign,
            "latitude": (entity.position.latitude * 1e6).round() / 1e6,
            "longitude": (entity.position.longitude * 1e6).round() / 1e6,
            "altitude_ft": (entity.position.altitude_m * FT_PER_M).round(),
            "speed_knots": (entity.speed_knots * 10.0).round() / 10.0,
            "heading_deg": (entity.heading_deg * 10.0).round() / 10.0,
            "vertical_rate_fpm": entity.meta_f64("vertical_rate_fpm").unwrap_or(0.0),
            "on_ground": entity.meta_bool("on_ground").unwrap_or(false),
            "squawk": Self::generate_squawk(&entity.entity_type),
            "timestamp": entity.timestamp.to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Agency, Domain, EntityStatus, Position};
    use chrono::{TimeZone, Utc};

    fn aircraft() -> Entity {
        let mut metadata = serde_json::Map::new();
        metadata.insert("on_ground".to_string(), json!(false));
        metadata.insert("vertical_rate_fpm".to_string(), json!(1500.0));
        Entity {
            entity_id: "RMAF-H01".to_string(),
            entity_type: "RMAF_HELICOPTER".to_string(),
            domain: Domain::Air,
            agency: Agency::Rmaf,
            callsign: "HELANG 21".to_string(),
            position: Position::new(5.9, 118.06, 914.4),
            heading_deg: 180.0,
            speed_knots: 110.0,
            course_deg: 180.0,
            timestamp: Utc.with_ymd_and_hms(2026, 4, 15, 8, 30, 0).unwrap(),
            status: EntityStatus::Active,
            sidc: String::new(),
            metadata,
        }
    }

    #[test]
    fn icao_is_deterministic_and_in_range() {
        let a = AdsbEncoder::generate_icao_hex("RMAF-H01", "MYS");
        let b = AdsbEncoder::generate_icao_hex("RMAF-H01", "MYS");
        assert_eq!(a, b);
        let value = u32::from_str_radix(&a, 16).unwrap();
        assert!((0x750000..=0x75FFFF).contains(&value));
    }

    #[test]
    fn position_message_layout() {
        let msg = AdsbEncoder::new().encode_position(&aircraft());
        let fields: Vec<&str> = msg.split(',').collect();
        assert_eq!(fields[0], "MSG");
        assert_eq!(fields[1], "3");
        // Altitude field: 914.4 m = 3000 ft.
        assert_eq!(fields[11], "3000");
        assert_eq!(fields[14], "5.900000");
        assert_eq!(fields[15], "118.060000");
        // Airborne.
        assert_eq!(*fields.last().unwrap(), "0");
    }

    #[test]
    fn velocity_message_carries_vertical_rate() {
        let msg = AdsbEncoder::new().encode_velocity(&aircraft());
        let fields: Vec<&str> = msg.split(',').collect();
        assert_eq!(fields[1], "4");
        assert_eq!(fields[11], "110");
        assert_eq!(fields[13], "180.0");
        assert_eq!(fields[16], "1500");
    }

    #[test]
    fn identification_truncates_callsign() {
        let msg = AdsbEncoder::new().encode_identification(&aircraft());
        assert!(msg.contains("HELANG 2"), "{msg}");
        assert!(!msg.contains("HELANG 21"));
    }

    #[test]
    fn squawk_by_type() {
        assert_eq!(AdsbEncoder::generate_squawk("RMAF_FIGHTER"), "0000");
        assert_eq!(AdsbEncoder::generate_squawk("CIVILIAN_LIGHT"), "1200");
    }

    #[test]
    fn grounded_aircraft_flagged() {
        let mut e = aircraft();
        e.set_meta("on_ground", json!(true));
        let msg = AdsbEncoder::new().encode_position(&e);
        assert!(msg.ends_with(",-1"));
    }

    #[test]
    fn json_shape() {
        let out = AdsbEncoder::new().encode_to_json(&aircraft());
        assert_eq!(out["altitude_ft"], 3000.0);
        assert_eq!(out["squawk"], "0000");
        assert_eq!(out["on_ground"], false);
    }
}
