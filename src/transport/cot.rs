//! Cursor on Target (CoT) transport adapter.
//!
//! Serialises entities to CoT XML events and writes them to a TAK server
//! over one TCP connection, so ATAK/WinTAK clients display the simulated
//! picture alongside live data. The connection is opened lazily and
//! reopened on the next send after a failure.

use chrono::{DateTime, Duration, Utc};
use async_trait::async_trait;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Writer;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{TransportAdapter, TransportError};
use crate::movement::geodesy::KNOTS_TO_MS;
use crate::types::Entity;

/// CoT type strings by entity type. Unlisted types fall back on affiliation
/// inferred from the SIDC prefix.
fn cot_type(entity: &Entity) -> String {
    let mapped = match entity.entity_type.as_str() {
        "MMEA_PATROL" | "MMEA_FAST_INTERCEPT" => "a-f-S-X-N",
        "MIL_NAVAL" | "MIL_NAVAL_FIC" => "a-f-S-C",
        "SUSPECT_VESSEL" | "HOSTILE_VESSEL" => "a-h-S-X",
        "CIVILIAN_CARGO" | "CIVILIAN_TANKER" | "CIVILIAN_PASSENGER" => "a-n-S-C-M",
        "CIVILIAN_FISHING" => "a-n-S-C-F",
        "CIVILIAN_BOAT" => "a-n-S-C",
        "RMAF_FIGHTER" => "a-f-A-M-F",
        "RMAF_HELICOPTER" => "a-f-A-M-H",
        "RMAF_TRANSPORT" | "RMAF_MPA" => "a-f-A-M-C",
        "CIVILIAN_LIGHT" => "a-n-A-C",
        "RMP_PATROL_CAR" => "a-f-G-E-V-C-P",
        "RMP_TACTICAL_TEAM" | "MIL_INFANTRY_SQUAD" | "MIL_INFANTRY" => "a-f-G-U-C-I",
        "MIL_APC" => "a-f-G-E-V-A",
        "MIL_VEHICLE" => "a-f-G-E-V",
        "CI_OFFICER" | "CI_IMMIGRATION_TEAM" | "RMP_OFFICER" => "a-f-G-U-C-I",
        "HOSTILE_PERSONNEL" => "a-h-G",
        _ => "",
    };
    if !mapped.is_empty() {
        return mapped.to_string();
    }
    // SIDC second character carries affiliation (F/H/N).
    match entity.sidc.chars().nth(1) {
        Some('H') => "a-h-G".to_string(),
        Some('N') => "a-n-G".to_string(),
        _ => "a-f-G".to_string(),
    }
}

fn format_cot_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// CoT XML adapter for the TAK ecosystem.
pub struct CotAdapter {
    host: String,
    port: u16,
    stale_seconds: i64,
    connection: Mutex<Option<TcpStream>>,
}

impl CotAdapter {
    pub fn new(host: impl Into<String>, port: u16, stale_seconds: i64) -> Self {
        Self {
            host: host.into(),
            port,
            stale_seconds,
            connection: Mutex::new(None),
        }
    }

    /// Generate a CoT event XML document for an entity.
    pub fn entity_to_cot(&self, entity: &Entity) -> Result<String, TransportError> {
        let now = entity.timestamp;
        let stale = now + Duration::seconds(self.stale_seconds);

        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;

        let mut event = BytesStart::new("event");
        event.push_attribute(("version", "2.0"));
        event.push_attribute(("uid", entity.entity_id.as_str()));
        event.push_attribute(("type", cot_type(entity).as_str()));
        event.push_attribute(("time", format_cot_time(now).as_str()));
        event.push_attribute(("start", format_cot_time(now).as_str()));
        event.push_attribute(("stale", format_cot_time(stale).as_str()));
        event.push_attribute(("how", "m-g"));
        writer.write_event(Event::Start(event)).map_err(xml_err)?;

        let mut point = BytesStart::new("point");
        point.push_attribute(("lat", format!("{:.6}", entity.position.latitude).as_str()));
        point.push_attribute(("lon", format!("{:.6}", entity.position.longitude).as_str()));
        point.push_attribute(("hae", format!("{:.1}", entity.position.altitude_m).as_str()));
        point.push_attribute(("ce", "10.0"));
        point.push_attribute(("le", "10.0"));
        writer.write_event(Event::Empty(point)).map_err(xml_err)?;

        let detail = BytesStart::new("detail");
        writer.write_event(Event::Start(detail)).map_err(xml_err)?;

        let mut contact = BytesStart::new("contact");
        contact.push_attribute(("callsign", entity.callsign.as_str()));
        writer.write_event(Event::Empty(contact)).map_err(xml_err)?;

        let mut track = BytesStart::new("track");
        track.push_attribute(("course", format!("{:.1}", entity.course_deg).as_str()));
        track.push_attribute((
            "speed",
            format!("{:.2}", entity.speed_knots * KNOTS_TO_MS).as_str(),
        ));
        writer.write_event(Event::Empty(track)).map_err(xml_err)?;

        writer
            .write_event(Event::End(BytesStart::new("detail").to_end()))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesStart::new("event").to_end()))
            .map_err(xml_err)?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| TransportError::Send(format!("CoT encoding: {e}")))
    }

    /// Generate a CoT GeoChat-style alert for a scenario event.
    pub fn event_to_cot(&self, event: &Value) -> Result<String, TransportError> {
        let now = Utc::now();
        let stale = now + Duration::seconds(self.stale_seconds.max(300));
        let description = event
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("Operational event");
        let event_type = event
            .get("event_type")
            .and_then(Value::as_str)
            .unwrap_or("EVENT");
        let uid = format!("copsim-event-{}", now.timestamp_millis());

        let (lat, lon) = event
            .get("position")
            .map(|p| {
                (
                    p.get("lat").and_then(Value::as_f64).unwrap_or(0.0),
                    p.get("lon").and_then(Value::as_f64).unwrap_or(0.0),
                )
            })
            .unwrap_or((0.0, 0.0));

        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;

        let mut root = BytesStart::new("event");
        root.push_attribute(("version", "2.0"));
        root.push_attribute(("uid", uid.as_str()));
        root.push_attribute(("type", "b-a-o-tbl"));
        root.push_attribute(("time", format_cot_time(now).as_str()));
        root.push_attribute(("start", format_cot_time(now).as_str()));
        root.push_attribute(("stale", format_cot_time(stale).as_str()));
        root.push_attribute(("how", "h-g-i-g-o"));
        writer.write_event(Event::Start(root)).map_err(xml_err)?;

        let mut point = BytesStart::new("point");
        point.push_attribute(("lat", format!("{lat:.6}").as_str()));
        point.push_attribute(("lon", format!("{lon:.6}").as_str()));
        point.push_attribute(("hae", "0.0"));
        point.push_attribute(("ce", "9999999.0"));
        point.push_attribute(("le", "9999999.0"));
        writer.write_event(Event::Empty(point)).map_err(xml_err)?;

        writer
            .write_event(Event::Start(BytesStart::new("detail")))
            .map_err(xml_err)?;
        let mut remarks = BytesStart::new("remarks");
        remarks.push_attribute(("source", "copsim"));
        writer.write_event(Event::Start(remarks)).map_err(xml_err)?;
        writer
            .write_event(Event::Text(quick_xml::events::BytesText::new(&format!(
                "[{event_type}] {description}"
            ))))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesStart::new("remarks").to_end()))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesStart::new("detail").to_end()))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesStart::new("event").to_end()))
            .map_err(xml_err)?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| TransportError::Send(format!("CoT encoding: {e}")))
    }

    async fn send_xml(&self, xml: &str) -> Result<(), TransportError> {
        let mut connection = self.connection.lock().await;

        // Lazy reconnect: a missing or broken connection is reopened here.
        if connection.is_none() {
            match TcpStream::connect((self.host.as_str(), self.port)).await {
                Ok(stream) => {
                    info!("CoT adapter connected to {}:{}", self.host, self.port);
                    *connection = Some(stream);
                }
                Err(e) => {
                    return Err(TransportError::Send(format!(
                        "CoT connect {}:{}: {e}",
                        self.host, self.port
                    )));
                }
            }
        }

        if let Some(stream) = connection.as_mut() {
            let mut framed = xml.to_string();
            framed.push('\n');
            if let Err(e) = stream.write_all(framed.as_bytes()).await {
                // Drop the connection; the next send retries.
                *connection = None;
                return Err(TransportError::Send(format!("CoT write: {e}")));
            }
        }
        Ok(())
    }
}

fn xml_err<E: std::fmt::Display>(e: E) -> TransportError {
    TransportError::Send(format!("CoT XML: {e}"))
}

#[async_trait]
impl TransportAdapter for CotAdapter {
    fn name(&self) -> &'static str {
        "cot"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let mut connection = self.connection.lock().await;
        match TcpStream::connect((self.host.as_str(), self.port)).await {
            Ok(stream) => {
                *connection = Some(stream);
                info!("CoT adapter connected to {}:{}", self.host, self.port);
                Ok(())
            }
            Err(e) => {
                // Connect failures are soft; sends reconnect lazily.
                warn!("CoT connection failed: {e}");
                Ok(())
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut connection = self.connection.lock().await;
        if let Some(mut stream) = connection.take() {
            let _ = stream.shutdown().await;
        }
        info!("CoT adapter disconnected");
        Ok(())
    }

    async fn push_entity_update(&self, entity: &Entity) -> Result<(), TransportError> {
        let xml = self.entity_to_cot(entity)?;
        self.send_xml(&xml).await
    }

    async fn push_bulk_update(&self, entities: &[Entity]) -> Result<(), TransportError> {
        for entity in entities {
            self.push_entity_update(entity).await?;
        }
        Ok(())
    }

    async fn push_event(&self, event: &Value) -> Result<(), TransportError> {
        let xml = self.event_to_cot(event)?;
        self.send_xml(&xml).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Agency, Domain, EntityStatus, Position};
    use chrono::TimeZone;

    fn vessel(etype: &str) -> Entity {
        Entity {
            entity_id: "KM-PEKAN".to_string(),
            entity_type: etype.to_string(),
            domain: Domain::Maritime,
            agency: Agency::Mmea,
            callsign: "KM Pekan".to_string(),
            position: Position::new(5.5, 118.5, 0.0),
            heading_deg: 90.0,
            speed_knots: 10.0,
            course_deg: 90.0,
            timestamp: Utc.with_ymd_and_hms(2026, 4, 15, 8, 30, 0).unwrap(),
            status: EntityStatus::Active,
            sidc: "SFSP------".to_string(),
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn entity_xml_carries_identity_and_position() {
        let adapter = CotAdapter::new("localhost", 8087, 30);
        let xml = adapter.entity_to_cot(&vessel("MMEA_PATROL")).unwrap();

        assert!(xml.contains(r#"uid="KM-PEKAN""#));
        assert!(xml.contains(r#"type="a-f-S-X-N""#));
        assert!(xml.contains(r#"lat="5.500000""#));
        assert!(xml.contains(r#"lon="118.500000""#));
        assert!(xml.contains(r#"callsign="KM Pekan""#));
        // 10 kt in m/s.
        assert!(xml.contains(r#"speed="5.14""#));
        assert!(xml.contains(r#"time="2026-04-15T08:30:00.000Z""#));
    }

    #[test]
    fn hostile_types_map_to_hostile_affiliation() {
        let adapter = CotAdapter::new("localhost", 8087, 30);
        let xml = adapter.entity_to_cot(&vessel("SUSPECT_VESSEL")).unwrap();
        assert!(xml.contains(r#"type="a-h-S-X""#));
    }

    #[test]
    fn unmapped_type_falls_back_to_sidc_affiliation() {
        let adapter = CotAdapter::new("localhost", 8087, 30);
        let mut e = vessel("SOMETHING_NEW");
        e.sidc = "SHSP------".to_string();
        let xml = adapter.entity_to_cot(&e).unwrap();
        assert!(xml.contains(r#"type="a-h-G""#));
    }

    #[test]
    fn event_xml_embeds_description() {
        let adapter = CotAdapter::new("localhost", 8087, 30);
        let xml = adapter
            .event_to_cot(&serde_json::json!({
                "event_type": "ALERT",
                "description": "Dark vessel detected",
                "position": {"lat": 5.2, "lon": 118.3},
            }))
            .unwrap();
        assert!(xml.contains("[ALERT] Dark vessel detected"));
        assert!(xml.contains(r#"lat="5.200000""#));
    }

    #[test]
    fn stale_window_follows_config() {
        let adapter = CotAdapter::new("localhost", 8087, 60);
        let xml = adapter.entity_to_cot(&vessel("MMEA_PATROL")).unwrap();
        assert!(xml.contains(r#"stale="2026-04-15T08:31:00.000Z""#));
    }
}
