//! YAML scenario parser.
//!
//! Reads a scenario file, validates it against the entity type catalog,
//! creates entities with movement plans, and returns a [`ScenarioState`]
//! ready for the simulation engine. Movement plans are kept alongside the
//! instantiated strategies so a restart can rebuild every strategy from
//! scratch and restore initial positions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use geo::{Centroid, LineInterpolatePoint, Polygon};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use super::geodata::GeodataIndex;
use crate::movement::geodesy::distance_nm;
use crate::movement::patrol::DEFAULT_DWELL_RANGE_S;
use crate::movement::{
    MovementStrategy, PatrolMovement, TerrainIndex, Waypoint, WaypointMovement,
};
use crate::types::catalog::{lookup_type, speed_range};
use crate::types::{stable_hash, Agency, Domain, Entity, EntityStatus, Position, ScenarioEvent};

/// Default scenario start time.
pub fn default_start() -> DateTime<Utc> {
    // LocalResult is always single for a concrete UTC timestamp.
    Utc.with_ymd_and_hms(2026, 4, 15, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("scenario YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),
}

// ============================================================================
// YAML schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    scenario: ScenarioDoc,
}

#[derive(Debug, Deserialize)]
struct ScenarioDoc {
    name: String,
    #[serde(default)]
    description: String,
    duration_minutes: f64,
    center: LatLon,
    #[serde(default = "default_zoom")]
    zoom: u32,
    #[serde(default)]
    scenario_entities: Vec<EntityEntry>,
    #[serde(default)]
    background_entities: Vec<BackgroundEntry>,
    #[serde(default)]
    events: Vec<EventEntry>,
}

fn default_zoom() -> u32 {
    9
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct EntityEntry {
    id: String,
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default)]
    callsign: Option<String>,
    #[serde(default)]
    agency: Option<String>,
    #[serde(default)]
    behavior: Option<String>,
    #[serde(default)]
    initial_position: Option<InitialPosition>,
    #[serde(default)]
    waypoints: Vec<WaypointEntry>,
    #[serde(default)]
    patrol_area: Option<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct InitialPosition {
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    alt_m: f64,
}

#[derive(Debug, Deserialize)]
struct WaypointEntry {
    lat: f64,
    lon: f64,
    #[serde(default)]
    alt_m: f64,
    #[serde(default)]
    speed: f64,
    time: String,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct BackgroundEntry {
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default = "default_count")]
    count: usize,
    #[serde(default)]
    area: Option<String>,
    #[serde(default)]
    route: Option<String>,
    #[serde(default = "default_speed_variation")]
    speed_variation: f64,
    #[serde(default)]
    metadata: Map<String, Value>,
}

fn default_count() -> usize {
    1
}

fn default_speed_variation() -> f64 {
    0.1
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    time: String,
    #[serde(rename = "type", default)]
    event_type: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    intercept_target: Option<String>,
    #[serde(default)]
    destination: Option<LatLon>,
    #[serde(default)]
    area: Option<String>,
    #[serde(default)]
    position: Option<LatLon>,
    #[serde(default)]
    alert_agencies: Vec<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

// ============================================================================
// Movement plans
// ============================================================================

/// Recipe for building a movement strategy. Kept in the scenario state so
/// restart can reinstantiate every strategy at its initial conditions.
#[derive(Clone)]
pub enum MovementPlan {
    Waypoints(Vec<Waypoint>),
    Patrol {
        polygon: Polygon<f64>,
        speed_range: (f64, f64),
        dwell_range_s: (i64, i64),
        seed: u64,
        domain: Option<Domain>,
    },
}

impl MovementPlan {
    pub fn instantiate(
        &self,
        scenario_start: DateTime<Utc>,
        terrain: &Arc<TerrainIndex>,
    ) -> Option<Box<dyn MovementStrategy>> {
        match self {
            MovementPlan::Waypoints(waypoints) => {
                WaypointMovement::new(waypoints.clone(), scenario_start)
                    .ok()
                    .map(|m| Box::new(m) as Box<dyn MovementStrategy>)
            }
            MovementPlan::Patrol {
                polygon,
                speed_range,
                dwell_range_s,
                seed,
                domain,
            } => Some(Box::new(PatrolMovement::new(
                polygon.clone(),
                *speed_range,
                *dwell_range_s,
                *seed,
                scenario_start,
                *domain,
                Some(Arc::clone(terrain)),
            ))),
        }
    }

    /// Planned route points for COP display, when the plan has a fixed path.
    pub fn route_points(&self) -> Option<Vec<(f64, f64, f64)>> {
        match self {
            MovementPlan::Waypoints(wps) => {
                Some(wps.iter().map(|w| (w.lat, w.lon, w.alt_m)).collect())
            }
            MovementPlan::Patrol { .. } => None,
        }
    }
}

/// Complete parsed scenario ready for simulation.
pub struct ScenarioState {
    pub name: String,
    pub description: String,
    pub duration: Duration,
    pub center: (f64, f64),
    pub zoom: u32,
    /// Initial entity states, reapplied on restart.
    pub entities: HashMap<String, Entity>,
    /// Movement recipes keyed by entity id.
    pub plans: HashMap<String, MovementPlan>,
    pub events: Vec<ScenarioEvent>,
    pub start_time: DateTime<Utc>,
}

impl ScenarioState {
    /// Instantiate every movement plan. Used at startup and on restart.
    pub fn build_movements(
        &self,
        terrain: &Arc<TerrainIndex>,
    ) -> crate::movement::MovementMap {
        let mut movements = crate::movement::MovementMap::new();
        for (id, plan) in &self.plans {
            if let Some(strategy) = plan.instantiate(self.start_time, terrain) {
                movements.insert(id.clone(), strategy);
            }
        }
        movements
    }

    /// Planned routes for COP display, keyed by entity id.
    pub fn routes(&self) -> HashMap<String, Vec<(f64, f64, f64)>> {
        self.plans
            .iter()
            .filter_map(|(id, plan)| plan.route_points().map(|pts| (id.clone(), pts)))
            .collect()
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Callsign pools for background traffic.
const CARGO_NAMES: &[&str] = &[
    "Bintang Laut",
    "Seri Sabah",
    "Kota Makmur",
    "Lautan Mas",
    "Samudera Jaya",
    "Pelita Nusantara",
    "Borneo Star",
    "Mutiara Timur",
];
const TANKER_NAMES: &[&str] = &["Miri Crude", "Kerteh", "Labuan Palm", "Bintulu Gas"];

/// Loads and validates scenario YAML files against indexed geodata.
pub struct ScenarioLoader {
    geodata: GeodataIndex,
    sidc_overrides: HashMap<String, String>,
}

impl ScenarioLoader {
    pub fn new(geodata_path: &Path) -> Self {
        Self {
            geodata: GeodataIndex::load(geodata_path),
            sidc_overrides: load_sidc_overrides(&sidc_overrides_path()),
        }
    }

    pub fn with_geodata(geodata: GeodataIndex) -> Self {
        Self {
            geodata,
            sidc_overrides: HashMap::new(),
        }
    }

    pub fn geodata(&self) -> &GeodataIndex {
        &self.geodata
    }

    /// Parse a scenario file into a complete [`ScenarioState`].
    pub fn load(
        &self,
        path: &Path,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<ScenarioState, ScenarioError> {
        let raw = std::fs::read_to_string(path)?;
        let file: ScenarioFile = serde_yaml::from_str(&raw)?;
        let doc = file.scenario;
        let start = start_time.unwrap_or_else(default_start);

        let mut entities = HashMap::new();
        let mut plans = HashMap::new();

        for entry in &doc.scenario_entities {
            let (entity, plan) = self.parse_scenario_entity(entry, start)?;
            if let Some(plan) = plan {
                plans.insert(entity.entity_id.clone(), plan);
            }
            entities.insert(entity.entity_id.clone(), entity);
        }

        for bg in &doc.background_entities {
            for (entity, plan) in self.create_background_entities(bg, start) {
                if let Some(plan) = plan {
                    plans.insert(entity.entity_id.clone(), plan);
                }
                entities.insert(entity.entity_id.clone(), entity);
            }
        }

        let events = parse_events(&doc.events)?;

        info!(
            "Loaded scenario '{}': {} entities, {} events over {:.0} minutes",
            doc.name,
            entities.len(),
            events.len(),
            doc.duration_minutes
        );

        Ok(ScenarioState {
            name: doc.name,
            description: doc.description,
            duration: Duration::seconds((doc.duration_minutes * 60.0) as i64),
            center: (doc.center.lat, doc.center.lon),
            zoom: doc.zoom,
            entities,
            plans,
            events,
            start_time: start,
        })
    }

    fn parse_scenario_entity(
        &self,
        entry: &EntityEntry,
        start: DateTime<Utc>,
    ) -> Result<(Entity, Option<MovementPlan>), ScenarioError> {
        let type_def = lookup_type(&entry.entity_type);
        let domain = type_def.map_or(Domain::Maritime, |d| d.domain);
        let default_agency = type_def.map_or(Agency::Civilian, |d| d.agency);

        let agency = match entry.agency.as_deref() {
            Some(raw) => parse_agency(raw).ok_or_else(|| {
                ScenarioError::Invalid(format!("unknown agency '{raw}' for {}", entry.id))
            })?,
            None => default_agency,
        };

        let pos = entry.initial_position.unwrap_or(InitialPosition {
            lat: 0.0,
            lon: 0.0,
            alt_m: 0.0,
        });

        let mut metadata = entry.metadata.clone();
        metadata.insert(
            "entity_type_name".to_string(),
            Value::String(entry.entity_type.clone()),
        );

        let status = if entry.behavior.as_deref() == Some("standby") {
            EntityStatus::Idle
        } else {
            EntityStatus::Active
        };

        let mut entity = Entity {
            entity_id: entry.id.clone(),
            entity_type: entry.entity_type.clone(),
            domain,
            agency,
            callsign: entry.callsign.clone().unwrap_or_else(|| entry.id.clone()),
            position: Position::new(pos.lat, pos.lon, pos.alt_m),
            heading_deg: 0.0,
            speed_knots: 0.0,
            course_deg: 0.0,
            timestamp: start,
            status,
            sidc: self.resolve_sidc(&entry.entity_type),
            metadata,
        };

        // Waypoint list wins over a declared behavior.
        if !entry.waypoints.is_empty() {
            let mut waypoints = Vec::with_capacity(entry.waypoints.len());
            for wp in &entry.waypoints {
                waypoints.push(Waypoint {
                    lat: wp.lat,
                    lon: wp.lon,
                    alt_m: wp.alt_m,
                    speed_knots: wp.speed,
                    time_offset: parse_time_offset(&wp.time).map_err(|e| {
                        ScenarioError::Invalid(format!("entity {}: {e}", entry.id))
                    })?,
                    metadata_overrides: wp.metadata.clone(),
                });
            }
            entity.speed_knots = waypoints.first().map_or(0.0, |w| w.speed_knots);
            return Ok((entity, Some(MovementPlan::Waypoints(waypoints))));
        }

        if entry.behavior.as_deref() == Some("patrol") {
            if let Some(area_id) = entry.patrol_area.as_deref() {
                if let Some(polygon) = self.geodata.zone_polygon(area_id) {
                    let range = speed_range(&entry.entity_type);
                    entity.speed_knots = (range.0 + range.1) / 2.0;
                    return Ok((
                        entity,
                        Some(MovementPlan::Patrol {
                            polygon: polygon.clone(),
                            speed_range: range,
                            dwell_range_s: DEFAULT_DWELL_RANGE_S,
                            seed: stable_hash(&entry.id),
                            domain: Some(domain),
                        }),
                    ));
                }
                warn!(
                    "Patrol area '{area_id}' not found for {}. Available: {:?}",
                    entry.id,
                    self.geodata.zone_ids()
                );
            }
        }

        // standby or no movement: entity stays in place.
        Ok((entity, None))
    }

    fn create_background_entities(
        &self,
        config: &BackgroundEntry,
        start: DateTime<Utc>,
    ) -> Vec<(Entity, Option<MovementPlan>)> {
        let type_def = lookup_type(&config.entity_type);
        let range = speed_range(&config.entity_type);
        let domain = type_def.map_or(Domain::Maritime, |d| d.domain);
        let agency = type_def.map_or(Agency::Civilian, |d| d.agency);

        let mut metadata = config.metadata.clone();
        metadata.insert("background".to_string(), Value::Bool(true));
        metadata.insert(
            "entity_type_name".to_string(),
            Value::String(config.entity_type.clone()),
        );

        let mut rng = StdRng::seed_from_u64(stable_hash(&config.entity_type));
        let mut results = Vec::new();

        for i in 0..config.count {
            let eid = format!("BG-{}-{:03}", config.entity_type, i + 1);
            let callsign = generate_callsign(&config.entity_type, i, &mut rng);
            let mut speed = rng.gen_range(range.0..=range.1);
            speed *= 1.0 + rng.gen_range(-config.speed_variation..=config.speed_variation);

            let base_entity = |position: Position, speed: f64| Entity {
                entity_id: eid.clone(),
                entity_type: config.entity_type.clone(),
                domain,
                agency,
                callsign: callsign.clone(),
                position,
                heading_deg: 0.0,
                speed_knots: speed,
                course_deg: 0.0,
                timestamp: start,
                status: EntityStatus::Active,
                sidc: self.resolve_sidc(&config.entity_type),
                metadata: metadata.clone(),
            };

            if let Some(area_id) = config.area.as_deref() {
                let Some(polygon) = self.geodata.zone_polygon(area_id) else {
                    warn!("Area '{area_id}' not found for background {}", config.entity_type);
                    continue;
                };
                // Initial position at the area centroid; the patrol takes
                // over from the first tick.
                let centroid = polygon
                    .centroid()
                    .map_or((0.0, 0.0), |c| (c.y(), c.x()));
                results.push((
                    base_entity(Position::new(centroid.0, centroid.1, 0.0), speed),
                    Some(MovementPlan::Patrol {
                        polygon: polygon.clone(),
                        speed_range: range,
                        dwell_range_s: DEFAULT_DWELL_RANGE_S,
                        seed: stable_hash(&eid),
                        domain: Some(domain),
                    }),
                ));
            } else if let Some(route_id) = config.route.as_deref() {
                let Some(route) = self.geodata.route(route_id) else {
                    warn!("Route '{route_id}' not found for background {}", config.entity_type);
                    continue;
                };
                let coords: Vec<(f64, f64)> =
                    route.coords().map(|c| (c.y, c.x)).collect();
                if coords.len() < 2 {
                    continue;
                }

                // Distribute entities along the route, each walking the
                // remainder of the lane from its offset.
                let frac = i as f64 / (config.count.max(2) - 1) as f64;
                let start_point = route
                    .line_interpolate_point(frac)
                    .map_or(coords[0], |p| (p.y(), p.x()));

                let start_idx = (frac * (coords.len() - 1) as f64) as usize;
                let mut waypoints = Vec::new();
                let mut cumulative = Duration::zero();
                for (j, (lat, lon)) in coords[start_idx..].iter().enumerate() {
                    if j > 0 {
                        let (plat, plon) = coords[start_idx + j - 1];
                        if speed > 0.0 {
                            let nm = distance_nm(plat, plon, *lat, *lon);
                            cumulative =
                                cumulative + Duration::seconds((nm / speed * 3600.0) as i64);
                        }
                    }
                    waypoints.push(Waypoint::new(*lat, *lon, speed, cumulative));
                }

                let plan = (!waypoints.is_empty()).then_some(MovementPlan::Waypoints(waypoints));
                results.push((
                    base_entity(Position::new(start_point.0, start_point.1, 0.0), speed),
                    plan,
                ));
            }
        }

        results
    }

    fn resolve_sidc(&self, entity_type: &str) -> String {
        self.sidc_overrides
            .get(entity_type)
            .cloned()
            .unwrap_or_else(|| {
                lookup_type(entity_type).map_or(String::new(), |d| d.sidc.to_string())
            })
    }

    /// Validate a scenario file without loading it. Returns all problems
    /// found; an empty list means the scenario is runnable.
    pub fn validate(&self, path: &Path) -> Vec<String> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => return vec![format!("File not found: {e}")],
        };
        let file: ScenarioFile = match serde_yaml::from_str(&raw) {
            Ok(file) => file,
            Err(e) => return vec![format!("YAML syntax error: {e}")],
        };
        let doc = file.scenario;
        let mut errors = Vec::new();

        if doc.name.is_empty() {
            errors.push("Scenario name is empty".to_string());
        }
        if doc.duration_minutes <= 0.0 {
            errors.push("duration_minutes must be positive".to_string());
        }

        let mut entity_ids = std::collections::HashSet::new();
        for entry in &doc.scenario_entities {
            if entry.id.is_empty() {
                errors.push("Scenario entity missing 'id'".to_string());
                continue;
            }
            if !entity_ids.insert(entry.id.clone()) {
                errors.push(format!("Duplicate entity ID: {}", entry.id));
            }
            if lookup_type(&entry.entity_type).is_none() {
                errors.push(format!(
                    "Unknown entity type '{}' for {}",
                    entry.entity_type, entry.id
                ));
            }
            for (j, wp) in entry.waypoints.iter().enumerate() {
                if !(-90.0..=90.0).contains(&wp.lat) {
                    errors.push(format!(
                        "Entity {} waypoint {j}: lat {} out of range",
                        entry.id, wp.lat
                    ));
                }
                if !(-180.0..=180.0).contains(&wp.lon) {
                    errors.push(format!(
                        "Entity {} waypoint {j}: lon {} out of range",
                        entry.id, wp.lon
                    ));
                }
                if parse_time_offset(&wp.time).is_err() {
                    errors.push(format!(
                        "Entity {} waypoint {j}: invalid time '{}'",
                        entry.id, wp.time
                    ));
                }
            }
            if let Some(area) = entry.patrol_area.as_deref() {
                if !self.geodata.has_zone(area) {
                    errors.push(format!(
                        "Entity {}: area '{area}' not found. Available: {:?}",
                        entry.id,
                        self.geodata.zone_ids()
                    ));
                }
            }
        }

        for bg in &doc.background_entities {
            if lookup_type(&bg.entity_type).is_none() {
                errors.push(format!("Unknown background entity type: {}", bg.entity_type));
            }
            if let Some(area) = bg.area.as_deref() {
                if !self.geodata.has_zone(area) {
                    errors.push(format!("Background area '{area}' not found"));
                }
            }
            if let Some(route) = bg.route.as_deref() {
                if !self.geodata.has_route(route) {
                    errors.push(format!("Background route '{route}' not found"));
                }
            }
        }

        let mut prev_time = Duration::zero();
        for (i, evt) in doc.events.iter().enumerate() {
            let t = match parse_time_offset(&evt.time) {
                Ok(t) => t,
                Err(e) => {
                    errors.push(format!("Event {i}: {e}"));
                    continue;
                }
            };
            if t < prev_time {
                errors.push(format!(
                    "Event at {} is out of chronological order",
                    evt.time
                ));
            }
            prev_time = t;

            for target in evt.target.iter().chain(evt.targets.iter()) {
                if !entity_ids.contains(target) {
                    errors.push(format!(
                        "Event at {} references entity '{target}' which is not in scenario_entities",
                        evt.time
                    ));
                }
            }
        }

        errors
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse `HH:MM` or `HH:MM:SS` into an offset from scenario start.
pub fn parse_time_offset(time_str: &str) -> Result<Duration, ScenarioError> {
    let parts: Vec<&str> = time_str.split(':').collect();
    let parse = |s: &str| -> Result<i64, ScenarioError> {
        s.parse::<i64>()
            .map_err(|_| ScenarioError::Invalid(format!("invalid time format: {time_str}")))
    };
    match parts.as_slice() {
        [h, m] => Ok(Duration::hours(parse(h)?) + Duration::minutes(parse(m)?)),
        [h, m, s] => Ok(Duration::hours(parse(h)?)
            + Duration::minutes(parse(m)?)
            + Duration::seconds(parse(s)?)),
        _ => Err(ScenarioError::Invalid(format!(
            "invalid time format: {time_str}"
        ))),
    }
}

fn parse_agency(raw: &str) -> Option<Agency> {
    match raw {
        "RMP" => Some(Agency::Rmp),
        "MMEA" => Some(Agency::Mmea),
        "CI" => Some(Agency::Ci),
        "RMAF" => Some(Agency::Rmaf),
        "MIL" => Some(Agency::Mil),
        "CIVILIAN" => Some(Agency::Civilian),
        _ => None,
    }
}

fn parse_events(entries: &[EventEntry]) -> Result<Vec<ScenarioEvent>, ScenarioError> {
    let mut events = Vec::with_capacity(entries.len());
    for entry in entries {
        events.push(ScenarioEvent {
            time_offset: parse_time_offset(&entry.time)?,
            event_type: entry.event_type.clone().unwrap_or_else(|| "INFO".to_string()),
            description: entry.description.clone(),
            severity: entry.severity.clone().unwrap_or_else(|| "INFO".to_string()),
            target: entry.target.clone(),
            targets: entry.targets.clone(),
            action: entry.action.clone(),
            intercept_target: entry.intercept_target.clone(),
            destination: entry.destination.map(|d| (d.lat, d.lon)),
            area: entry.area.clone(),
            position: entry.position.map(|p| (p.lat, p.lon)),
            alert_agencies: entry.alert_agencies.clone(),
            metadata: entry.extra.clone(),
        });
    }
    events.sort_by_key(|e| e.time_offset);
    Ok(events)
}

fn generate_callsign(entity_type: &str, index: usize, rng: &mut StdRng) -> String {
    if entity_type.contains("CARGO") {
        format!("MV {}", CARGO_NAMES[rng.gen_range(0..CARGO_NAMES.len())])
    } else if entity_type.contains("FISHING") {
        format!("Nelayan {}", rng.gen_range(100..1000))
    } else if entity_type.contains("TANKER") {
        format!("MT {}", TANKER_NAMES[rng.gen_range(0..TANKER_NAMES.len())])
    } else if entity_type.contains("LIGHT") {
        let letters: Vec<char> = "ABCDEFG".chars().collect();
        format!(
            "9M-{}{}{}",
            letters[rng.gen_range(0..letters.len())],
            letters[rng.gen_range(0..letters.len())],
            letters[rng.gen_range(0..letters.len())]
        )
    } else {
        format!("BG-{:03}", index + 1)
    }
}

/// SIDC override persistence.
pub fn sidc_overrides_path() -> PathBuf {
    PathBuf::from("config/sidc_overrides.json")
}

pub fn load_sidc_overrides(path: &Path) -> HashMap<String, String> {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return HashMap::new();
    };
    serde_json::from_str(&raw).unwrap_or_default()
}

pub fn save_sidc_overrides(
    path: &Path,
    overrides: &HashMap<String, String>,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(overrides).unwrap_or_else(|_| "{}".to_string());
    std::fs::write(path, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_SCENARIO: &str = r#"
scenario:
  name: "Test Incursion"
  description: "Small two-entity drill"
  duration_minutes: 60
  center: { lat: 5.5, lon: 118.5 }
  zoom: 9
  scenario_entities:
    - id: SUSPECT-01
      type: SUSPECT_VESSEL
      callsign: "Unknown Contact"
      behavior: waypoint
      initial_position: { lat: 5.0, lon: 118.0 }
      waypoints:
        - { lat: 5.0, lon: 118.0, speed: 12, time: "00:00" }
        - { lat: 5.5, lon: 118.5, speed: 12, time: "00:30" }
    - id: MMEA-01
      type: MMEA_FAST_INTERCEPT
      callsign: "Penggalang 7"
      behavior: standby
      initial_position: { lat: 5.8, lon: 118.1 }
  events:
    - time: "00:05"
      type: ORDER
      description: "Intercept suspect vessel"
      severity: WARNING
      target: MMEA-01
      action: intercept
      intercept_target: SUSPECT-01
"#;

    fn write_scenario(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        (dir, path)
    }

    fn loader() -> ScenarioLoader {
        ScenarioLoader::with_geodata(GeodataIndex::default())
    }

    #[test]
    fn loads_minimal_scenario() {
        let (_dir, path) = write_scenario(MINIMAL_SCENARIO);
        let state = loader().load(&path, None).unwrap();

        assert_eq!(state.name, "Test Incursion");
        assert_eq!(state.entities.len(), 2);
        assert_eq!(state.events.len(), 1);
        assert_eq!(state.duration, Duration::minutes(60));

        let suspect = &state.entities["SUSPECT-01"];
        assert_eq!(suspect.entity_type, "SUSPECT_VESSEL");
        assert_eq!(suspect.status, EntityStatus::Active);
        assert_eq!(suspect.speed_knots, 12.0);
        assert!(state.plans.contains_key("SUSPECT-01"));

        let patrol = &state.entities["MMEA-01"];
        assert_eq!(patrol.status, EntityStatus::Idle);
        assert!(!state.plans.contains_key("MMEA-01"));
    }

    #[test]
    fn movements_are_rebuildable() {
        let (_dir, path) = write_scenario(MINIMAL_SCENARIO);
        let state = loader().load(&path, None).unwrap();
        let terrain = Arc::new(TerrainIndex::empty());
        let first = state.build_movements(&terrain);
        let second = state.build_movements(&terrain);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn routes_expose_waypoint_plans() {
        let (_dir, path) = write_scenario(MINIMAL_SCENARIO);
        let state = loader().load(&path, None).unwrap();
        let routes = state.routes();
        assert_eq!(routes["SUSPECT-01"].len(), 2);
    }

    #[test]
    fn validate_passes_clean_scenario() {
        let (_dir, path) = write_scenario(MINIMAL_SCENARIO);
        assert!(loader().validate(&path).is_empty());
    }

    #[test]
    fn validate_flags_unknown_type_and_bad_ref() {
        let (_dir, path) = write_scenario(
            r#"
scenario:
  name: "Broken"
  duration_minutes: 10
  center: { lat: 5.0, lon: 118.0 }
  scenario_entities:
    - id: X-01
      type: NOT_A_TYPE
      initial_position: { lat: 95.0, lon: 118.0 }
      waypoints:
        - { lat: 95.0, lon: 118.0, speed: 5, time: "00:00" }
  events:
    - time: "00:10"
      target: MISSING-01
      action: activate
    - time: "00:05"
      description: "out of order"
"#,
        );
        let errors = loader().validate(&path);
        assert!(errors.iter().any(|e| e.contains("Unknown entity type")));
        assert!(errors.iter().any(|e| e.contains("lat 95 out of range")));
        assert!(errors.iter().any(|e| e.contains("MISSING-01")));
        assert!(errors.iter().any(|e| e.contains("chronological")));
    }

    #[test]
    fn validate_reports_yaml_syntax_error() {
        let (_dir, path) = write_scenario("scenario: [not: valid");
        let errors = loader().validate(&path);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("YAML syntax error"));
    }

    #[test]
    fn parse_time_offset_forms() {
        assert_eq!(parse_time_offset("00:05").unwrap(), Duration::minutes(5));
        assert_eq!(
            parse_time_offset("01:30:15").unwrap(),
            Duration::minutes(90) + Duration::seconds(15)
        );
        assert!(parse_time_offset("nope").is_err());
        assert!(parse_time_offset("1:2:3:4").is_err());
    }

    #[test]
    fn events_are_sorted_by_time() {
        let (_dir, path) = write_scenario(
            r#"
scenario:
  name: "Ordering"
  duration_minutes: 30
  center: { lat: 5.0, lon: 118.0 }
  events:
    - time: "00:20"
      description: "second"
    - time: "00:10"
      description: "first"
"#,
        );
        let state = loader().load(&path, None).unwrap();
        assert_eq!(state.events[0].description, "first");
        assert_eq!(state.events[1].description, "second");
    }

    #[test]
    fn sidc_overrides_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        let mut overrides = HashMap::new();
        overrides.insert(
            "SUSPECT_VESSEL".to_string(),
            "SHSPXXXXXXXXXXXXXXXX".to_string(),
        );
        save_sidc_overrides(&path, &overrides).unwrap();
        let loaded = load_sidc_overrides(&path);
        assert_eq!(loaded, overrides);
    }
}
