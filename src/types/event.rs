//! Scenario event timeline types.

use chrono::Duration;
use serde_json::{json, Map, Value};

/// A timed event in the scenario timeline.
///
/// Fired by the event engine when simulation time reaches `time_offset`.
/// The action determines how the target entities' movement bindings and
/// status are rewritten.
#[derive(Debug, Clone)]
pub struct ScenarioEvent {
    /// Offset from scenario start.
    pub time_offset: Duration,
    pub event_type: String,
    pub description: String,
    pub severity: String,
    pub target: Option<String>,
    pub targets: Vec<String>,
    pub action: Option<String>,
    pub intercept_target: Option<String>,
    /// Destination for deploy/respond actions.
    pub destination: Option<(f64, f64)>,
    pub area: Option<String>,
    pub position: Option<(f64, f64)>,
    pub alert_agencies: Vec<String>,
    /// Unrecognised scenario keys carried through verbatim
    /// (e.g. `reclassify` blocks).
    pub metadata: Map<String, Value>,
}

impl ScenarioEvent {
    /// All target entity ids, `target` first.
    pub fn target_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::with_capacity(1 + self.targets.len());
        if let Some(ref t) = self.target {
            ids.push(t);
        }
        ids.extend(self.targets.iter().map(String::as_str));
        ids
    }

    /// Wire representation pushed through transport adapters.
    pub fn to_json(&self) -> Value {
        json!({
            "time_offset_s": self.time_offset.num_milliseconds() as f64 / 1000.0,
            "event_type": self.event_type,
            "description": self.description,
            "severity": self.severity,
            "target": self.target,
            "targets": self.targets,
            "action": self.action,
            "intercept_target": self.intercept_target,
            "destination": self.destination.map(|(lat, lon)| json!({"lat": lat, "lon": lon})),
            "area": self.area,
            "position": self.position.map(|(lat, lon)| json!({"lat": lat, "lon": lon})),
            "alert_agencies": self.alert_agencies,
        })
    }
}

impl Default for ScenarioEvent {
    fn default() -> Self {
        Self {
            time_offset: Duration::zero(),
            event_type: "INFO".to_string(),
            description: String::new(),
            severity: "INFO".to_string(),
            target: None,
            targets: Vec::new(),
            action: None,
            intercept_target: None,
            destination: None,
            area: None,
            position: None,
            alert_agencies: Vec::new(),
            metadata: Map::new(),
        }
    }
}
