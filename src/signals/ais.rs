//! AIS AIVDM sentence generator.
//!
//! Encodes entity state as Type 1 position reports and Type 5 static and
//! voyage data, 6-bit packed and NMEA-armored per ITU-R M.1371. Type 5
//! payloads exceed a single sentence and are split into a two-part group.

use serde_json::{json, Value};

use crate::types::{stable_hash, Entity};

/// Country MID codes for MMSI generation.
const COUNTRY_MIDS: &[(&str, &str)] = &[
    ("MYS", "533"),
    ("VNM", "574"),
    ("PHL", "548"),
    ("IDN", "525"),
    ("SGP", "563"),
    ("BRN", "508"),
    ("CHN", "412"),
    ("TWN", "416"),
    ("JPN", "431"),
    ("KOR", "440"),
];

/// AIS vessel type codes (subset).
const VESSEL_TYPE_CODES: &[(&str, u32)] = &[
    ("cargo", 70),
    ("tanker", 80),
    ("fishing", 30),
    ("tug", 52),
    ("passenger", 60),
    ("military", 35),
    ("patrol", 55),
    ("sar", 51),
    ("pilot", 50),
    ("pleasure", 37),
];

/// Maximum 6-bit payload characters per sentence before splitting.
const MAX_PAYLOAD_CHARS: usize = 60;

/// Bit accumulator for AIS payload construction.
#[derive(Default)]
struct BitField {
    bits: Vec<bool>,
}

impl BitField {
    fn push_u32(&mut self, value: u32, width: usize) {
        for i in (0..width).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
    }

    /// Two's-complement signed field.
    fn push_i32(&mut self, value: i32, width: usize) {
        self.push_u32(value as u32 & ((1u64 << width) - 1) as u32, width);
    }

    /// AIS 6-bit text: '@' = 0, 'A'-'Z' = 1-26, ' ' = 32, digits 48-57.
    fn push_text(&mut self, text: &str, chars: usize) {
        let padded: Vec<char> = text
            .to_uppercase()
            .chars()
            .chain(std::iter::repeat(' '))
            .take(chars)
            .collect();
        for ch in padded {
            let code = ch as u32;
            let sixbit = if (64..=95).contains(&code) {
                code - 64
            } else if (32..=63).contains(&code) {
                code
            } else {
                32 // unmappable -> space
            };
            self.push_u32(sixbit, 6);
        }
    }

    /// Armor into the AIVDM payload alphabet. Returns (payload, fill bits).
    fn armor(&self) -> (String, u32) {
        let fill = (6 - self.bits.len() % 6) % 6;
        let mut payload = String::with_capacity(self.bits.len() / 6 + 1);
        let mut padded = self.bits.clone();
        padded.extend(std::iter::repeat(false).take(fill));

        for chunk in padded.chunks(6) {
            let mut v = 0u8;
            for bit in chunk {
                v = (v << 1) | u8::from(*bit);
            }
            let ch = if v > 39 { v + 56 } else { v + 48 };
            payload.push(ch as char);
        }
        (payload, fill as u32)
    }
}

/// NMEA checksum: XOR of all bytes between '!' and '*'.
fn nmea_checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

fn wrap_sentences(payload: &str, fill: u32) -> Vec<String> {
    let chunks: Vec<&str> = payload
        .as_bytes()
        .chunks(MAX_PAYLOAD_CHARS)
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .collect();
    let total = chunks.len();
    let seq = if total > 1 { "1" } else { "" };

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            // Fill bits apply to the final fragment only.
            let frag_fill = if i + 1 == total { fill } else { 0 };
            let body = format!(
                "AIVDM,{total},{},{seq},A,{chunk},{frag_fill}",
                i + 1
            );
            format!("!{body}*{:02X}", nmea_checksum(&body))
        })
        .collect()
}

/// Generates AIS sentences and JSON from entity state.
#[derive(Default)]
pub struct AisEncoder;

impl AisEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic MMSI: country MID + 6 digits hashed from entity id.
    pub fn generate_mmsi(entity_id: &str, flag: &str) -> u32 {
        let mid = COUNTRY_MIDS
            .iter()
            .find(|(code, _)| *code == flag)
            .map_or("533", |(_, mid)| *mid);
        let suffix = stable_hash(entity_id) % 1_000_000;
        // MID is always three digits, so this fits in nine total.
        format!("{mid}{suffix:06}").parse().unwrap_or(533_000_000)
    }

    fn mmsi_for(entity: &Entity) -> u32 {
        entity
            .meta_f64("mmsi")
            .map(|m| m as u32)
            .unwrap_or_else(|| {
                let flag = entity.meta_str("flag").unwrap_or("MYS");
                Self::generate_mmsi(&entity.entity_id, flag)
            })
    }

    /// AIS Type 1 position report.
    pub fn encode_position_report(&self, entity: &Entity) -> Vec<String> {
        let mmsi = Self::mmsi_for(entity);
        let nav_status = entity.meta_f64("nav_status").unwrap_or(0.0) as u32;

        let mut bits = BitField::default();
        bits.push_u32(1, 6); // message type
        bits.push_u32(0, 2); // repeat indicator
        bits.push_u32(mmsi, 30);
        bits.push_u32(nav_status.min(15), 4);
        bits.push_i32(0, 8); // rate of turn: not turning
        bits.push_u32(((entity.speed_knots * 10.0) as u32).min(1022), 10);
        bits.push_u32(0, 1); // position accuracy
        bits.push_i32((entity.position.longitude * 600_000.0) as i32, 28);
        bits.push_i32((entity.position.latitude * 600_000.0) as i32, 27);
        bits.push_u32(((entity.course_deg * 10.0) as u32) % 3600, 12);
        bits.push_u32((entity.heading_deg as u32) % 360, 9);
        bits.push_u32(entity.timestamp.timestamp().rem_euclid(60) as u32, 6);
        bits.push_u32(0, 2); // maneuver indicator
        bits.push_u32(0, 3); // spare
        bits.push_u32(0, 1); // RAIM
        bits.push_u32(0, 19); // radio status

        let (payload, fill) = bits.armor();
        wrap_sentences(&payload, fill)
    }

    /// AIS Type 5 static and voyage data.
    pub fn encode_static_data(&self, entity: &Entity) -> Vec<String> {
        let mmsi = Self::mmsi_for(entity);
        let vessel_name = entity
            .meta_str("vessel_name")
            .unwrap_or(&entity.callsign)
            .to_string();
        let radio_callsign = entity
            .meta_str("callsign_radio")
            .unwrap_or(&entity.callsign)
            .to_string();
        let destination = entity.meta_str("destination").unwrap_or("").to_string();

        let shiptype = Self::ship_type_code(entity);
        // Deterministic IMO number from the entity id.
        let imo = 1_000_000 + (stable_hash(&entity.entity_id) % 9_000_000) as u32;

        let mut bits = BitField::default();
        bits.push_u32(5, 6); // message type
        bits.push_u32(0, 2); // repeat indicator
        bits.push_u32(mmsi, 30);
        bits.push_u32(0, 2); // AIS version
        bits.push_u32(imo, 30);
        bits.push_text(&radio_callsign, 7);
        bits.push_text(&vessel_name, 20);
        bits.push_u32(shiptype, 8);
        bits.push_u32(30, 9); // to bow
        bits.push_u32(20, 9); // to stern
        bits.push_u32(5, 6); // to port
        bits.push_u32(5, 6); // to starboard
        bits.push_u32(1, 4); // EPFD: GPS
        bits.push_u32(4, 4); // ETA month
        bits.push_u32(15, 5); // ETA day
        bits.push_u32(8, 5); // ETA hour
        bits.push_u32(0, 6); // ETA minute
        bits.push_u32(50, 8); // draught, 5.0 m
        bits.push_text(&destination, 20);
        bits.push_u32(0, 1); // DTE
        bits.push_u32(0, 1); // spare

        let (payload, fill) = bits.armor();
        wrap_sentences(&payload, fill)
    }

    fn ship_type_code(entity: &Entity) -> u32 {
        let vessel_type = entity
            .meta_str("vessel_type")
            .unwrap_or("")
            .to_lowercase();
        for (key, code) in VESSEL_TYPE_CODES {
            if vessel_type.contains(key) {
                return *code;
            }
        }
        let etype = entity.entity_type.to_lowercase();
        if etype.contains("patrol") {
            55
        } else if etype.contains("fishing") {
            30
        } else {
            0
        }
    }

    /// Structured AIS data for non-NMEA consumers.
    pub fn encode_to_json(&self, entity: &Entity) -> Value {
        json!({
            "mmsi": Self::mmsi_for(entity),
            "msg_type": 1,
            "latitude": round6(entity.position.latitude),
            "longitude": round6(entity.position.longitude),
            "speed_knots": (entity.speed_knots * 10.0).round() / 10.0,
            "course_deg": (entity.course_deg * 10.0).round() / 10.0,
            "heading_deg": (entity.heading_deg as u32) % 360,
            "nav_status": entity.meta_f64("nav_status").unwrap_or(0.0) as u32,
            "vessel_name": entity.meta_str("vessel_name").unwrap_or(&entity.callsign),
            "flag": entity.meta_str("flag").unwrap_or("MYS"),
            "timestamp": entity.timestamp.to_rfc3339(),
        })
    }
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}
