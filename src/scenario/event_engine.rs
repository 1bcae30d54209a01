//! Timed event processor.
//!
//! Scans the scenario event timeline each simulation tick. When an event's
//! time arrives it fires exactly once per reset epoch: entity status
//! changes and the movement binding for the target entities is rewritten
//! (intercept orders swap in a pursuit strategy, deployments build fresh
//! waypoint routes, lockdowns delete the binding).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::core::EntityStore;
use crate::movement::geodesy::distance_nm;
use crate::movement::{InterceptMovement, MovementMap, Waypoint, WaypointMovement};
use crate::types::catalog::{lookup_type, max_speed};
use crate::types::{Entity, EntityStatus, ScenarioEvent};

/// Escort destination: Sandakan port.
const ESCORT_PORT: (f64, f64) = (5.84, 118.105);

/// Deploy speed for personnel and other slow movers; they are transported
/// by boat or vehicle rather than walking to the objective.
const TRANSPORTED_DEPLOY_SPEED: f64 = 25.0;

/// Processes timed scenario events and modifies entity behavior.
pub struct EventEngine {
    events: Vec<ScenarioEvent>,
    store: Arc<EntityStore>,
    scenario_start: DateTime<Utc>,
    fired_set: HashSet<usize>,
    fired_order: Vec<usize>,
}

impl EventEngine {
    pub fn new(
        mut events: Vec<ScenarioEvent>,
        store: Arc<EntityStore>,
        scenario_start: DateTime<Utc>,
    ) -> Self {
        events.sort_by_key(|e| e.time_offset);
        Self {
            events,
            store,
            scenario_start,
            fired_set: HashSet::new(),
            fired_order: Vec::new(),
        }
    }

    /// Check and fire events whose time has arrived. Returns newly fired
    /// events in timeline order.
    pub fn tick(&mut self, sim_time: DateTime<Utc>, movements: &mut MovementMap) -> Vec<ScenarioEvent> {
        let elapsed = sim_time - self.scenario_start;
        let mut newly_fired = Vec::new();

        for i in 0..self.events.len() {
            if self.fired_set.contains(&i) {
                continue;
            }
            if self.events[i].time_offset <= elapsed {
                let event = self.events[i].clone();
                self.fire_event(&event, sim_time, movements);
                self.fired_set.insert(i);
                self.fired_order.push(i);
                info!("[{}] {}", event.event_type, event.description);
                newly_fired.push(event);
            }
        }

        newly_fired
    }

    fn fire_event(
        &self,
        event: &ScenarioEvent,
        sim_time: DateTime<Utc>,
        movements: &mut MovementMap,
    ) {
        if event.action.is_none() && !event.metadata.contains_key("reclassify") {
            return;
        }

        self.apply_reclassify(event);

        if event.action.is_none() {
            return;
        }

        for target_id in event.target_ids() {
            let Some(entity) = self.store.get(target_id) else {
                warn!("Event target '{target_id}' not found in store");
                continue;
            };
            self.apply_action(event, entity, target_id, sim_time, movements);
        }
    }

    fn apply_action(
        &self,
        event: &ScenarioEvent,
        mut entity: Entity,
        target_id: &str,
        sim_time: DateTime<Utc>,
        movements: &mut MovementMap,
    ) {
        let action = event.action.as_deref().unwrap_or_default();

        match action {
            "intercept" | "pursue" => {
                let Some(intercept_target) = event.intercept_target.as_deref() else {
                    warn!("Intercept event for {target_id} missing intercept_target");
                    return;
                };

                let top_speed = max_speed(&entity.entity_type);
                let min_speed = lookup_type(&entity.entity_type)
                    .filter(|def| def.domain == crate::types::Domain::Air)
                    .map_or(0.0, |def| def.speed_range.0);

                let movement = InterceptMovement::new(
                    top_speed,
                    intercept_target,
                    Arc::clone(&self.store),
                    Some(target_id.to_string()),
                )
                .with_min_speed(min_speed);

                movements.insert(target_id.to_string(), Box::new(movement));
                entity.status = EntityStatus::Intercepting;
                entity.speed_knots = top_speed;
            }

            "deploy" | "respond" => {
                entity.status = EntityStatus::Responding;

                if let Some((dest_lat, dest_lon)) = event.destination {
                    let top_speed = max_speed(&entity.entity_type);
                    let deploy_speed = if top_speed <= 6.0 {
                        TRANSPORTED_DEPLOY_SPEED
                    } else {
                        top_speed * 0.9
                    };

                    if let Some(movement) = direct_route(
                        &entity,
                        (dest_lat, dest_lon),
                        deploy_speed,
                        sim_time,
                    ) {
                        movements.insert(target_id.to_string(), Box::new(movement));
                        entity.speed_knots = deploy_speed;
                    }
                }
            }

            "escort_to_port" => {
                entity.status = EntityStatus::Active;
                let escort_speed = max_speed(&entity.entity_type) * 0.5;
                if let Some(movement) =
                    direct_route(&entity, ESCORT_PORT, escort_speed, sim_time)
                {
                    movements.insert(target_id.to_string(), Box::new(movement));
                    entity.speed_knots = escort_speed;
                }
            }

            "lockdown" | "secure" => {
                entity.status = EntityStatus::Active;
                entity.speed_knots = 0.0;
                movements.remove(target_id);
            }

            "search_area" | "patrol" | "activate" => {
                // Keep the existing strategy; only the status changes.
                entity.status = EntityStatus::Active;
            }

            other => {
                debug!("Unhandled action '{other}' for {target_id}");
                entity.status = EntityStatus::Active;
            }
        }

        self.store.upsert(entity);
    }

    /// `reclassify` blocks rewrite entity type and symbology for a list of
    /// targets (e.g. a suspect vessel confirmed hostile).
    fn apply_reclassify(&self, event: &ScenarioEvent) {
        let Some(block) = event.metadata.get("reclassify") else {
            return;
        };
        let Some(new_type) = block.get("new_type").and_then(|v| v.as_str()) else {
            warn!("reclassify block missing new_type");
            return;
        };
        let Some(targets) = block.get("targets").and_then(|v| v.as_array()) else {
            warn!("reclassify block missing targets");
            return;
        };

        for target in targets.iter().filter_map(|v| v.as_str()) {
            let Some(mut entity) = self.store.get(target) else {
                warn!("Reclassify target '{target}' not found in store");
                continue;
            };
            entity.entity_type = new_type.to_string();
            if let Some(def) = lookup_type(new_type) {
                entity.sidc = def.sidc.to_string();
                entity.domain = def.domain;
            }
            entity.set_meta("entity_type_name", serde_json::Value::String(new_type.to_string()));
            info!("Reclassified {target} as {new_type}");
            self.store.upsert(entity);
        }
    }

    /// Reset all fired events so the timeline can replay after a restart.
    pub fn reset(&mut self) {
        self.fired_set.clear();
        self.fired_order.clear();
    }

    /// Events fired so far, in firing order.
    pub fn fired_events(&self) -> Vec<&ScenarioEvent> {
        self.fired_order
            .iter()
            .filter_map(|&i| self.events.get(i))
            .collect()
    }

    pub fn fired_count(&self) -> usize {
        self.fired_set.len()
    }

    pub fn total_events(&self) -> usize {
        self.events.len()
    }

    pub fn is_complete(&self) -> bool {
        self.fired_set.len() == self.events.len()
    }
}

/// Two-waypoint route from the entity's current position to a destination,
/// with duration derived from geodesic distance at the given speed.
fn direct_route(
    entity: &Entity,
    destination: (f64, f64),
    speed_knots: f64,
    sim_time: DateTime<Utc>,
) -> Option<WaypointMovement> {
    let from = (entity.position.latitude, entity.position.longitude);
    let dist_nm = distance_nm(from.0, from.1, destination.0, destination.1);

    let travel = if speed_knots > 0.0 && dist_nm > 0.0 {
        Duration::seconds((dist_nm / speed_knots * 3600.0) as i64)
    } else {
        Duration::minutes(30)
    };

    WaypointMovement::new(
        vec![
            Waypoint::new(from.0, from.1, speed_knots, Duration::zero()),
            Waypoint::new(destination.0, destination.1, 0.0, travel),
        ],
        sim_time,
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Agency, Domain, Position};
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 15, 8, 0, 0).unwrap()
    }

    fn make_entity(id: &str, etype: &str) -> Entity {
        let def = lookup_type(etype);
        Entity {
            entity_id: id.to_string(),
            entity_type: etype.to_string(),
            domain: def.map_or(Domain::Maritime, |d| d.domain),
            agency: def.map_or(Agency::Civilian, |d| d.agency),
            callsign: id.to_string(),
            position: Position::new(5.0, 118.0, 0.0),
            heading_deg: 0.0,
            speed_knots: 0.0,
            course_deg: 0.0,
            timestamp: start(),
            status: EntityStatus::Idle,
            sidc: String::new(),
            metadata: serde_json::Map::new(),
        }
    }

    fn alert(offset_min: i64) -> ScenarioEvent {
        ScenarioEvent {
            time_offset: Duration::minutes(offset_min),
            event_type: "ALERT".to_string(),
            description: format!("alert at {offset_min}"),
            ..Default::default()
        }
    }

    #[test]
    fn events_fire_at_their_offset() {
        let store = Arc::new(EntityStore::new());
        let mut engine = EventEngine::new(vec![alert(5), alert(10)], Arc::clone(&store), start());
        let mut movements = MovementMap::new();

        assert!(engine.tick(start() + Duration::minutes(3), &mut movements).is_empty());

        let fired = engine.tick(start() + Duration::minutes(5), &mut movements);
        assert_eq!(fired.len(), 1);
        assert_eq!(engine.fired_count(), 1);

        let fired = engine.tick(start() + Duration::minutes(10), &mut movements);
        assert_eq!(fired.len(), 1);
        assert!(engine.is_complete());
    }

    #[test]
    fn events_fire_exactly_once() {
        let store = Arc::new(EntityStore::new());
        let mut engine = EventEngine::new(vec![alert(5)], Arc::clone(&store), start());
        let mut movements = MovementMap::new();

        assert_eq!(engine.tick(start() + Duration::minutes(5), &mut movements).len(), 1);
        assert_eq!(engine.tick(start() + Duration::minutes(6), &mut movements).len(), 0);
        assert_eq!(engine.fired_count(), 1);
    }

    #[test]
    fn late_tick_fires_all_due_events_in_order() {
        let store = Arc::new(EntityStore::new());
        let mut engine =
            EventEngine::new(vec![alert(10), alert(5), alert(15)], Arc::clone(&store), start());
        let mut movements = MovementMap::new();

        let fired = engine.tick(start() + Duration::minutes(20), &mut movements);
        assert_eq!(fired.len(), 3);
        assert_eq!(fired[0].time_offset, Duration::minutes(5));
        assert_eq!(fired[2].time_offset, Duration::minutes(15));
    }

    #[test]
    fn intercept_swaps_movement_and_status() {
        let store = Arc::new(EntityStore::new());
        store.upsert(make_entity("MMEA-01", "MMEA_FAST_INTERCEPT"));
        store.upsert(make_entity("SUSPECT-01", "SUSPECT_VESSEL"));

        let event = ScenarioEvent {
            time_offset: Duration::minutes(5),
            event_type: "ORDER".to_string(),
            action: Some("intercept".to_string()),
            target: Some("MMEA-01".to_string()),
            intercept_target: Some("SUSPECT-01".to_string()),
            ..Default::default()
        };

        let mut engine = EventEngine::new(vec![event], Arc::clone(&store), start());
        let mut movements = MovementMap::new();
        engine.tick(start() + Duration::minutes(5), &mut movements);

        assert!(movements.contains_key("MMEA-01"));
        let entity = store.get("MMEA-01").unwrap();
        assert_eq!(entity.status, EntityStatus::Intercepting);
        // Type max for MMEA_FAST_INTERCEPT.
        assert_eq!(entity.speed_knots, 35.0);
    }

    #[test]
    fn deploy_builds_route_to_destination() {
        let store = Arc::new(EntityStore::new());
        store.upsert(make_entity("NAVY-01", "MIL_NAVAL"));

        let event = ScenarioEvent {
            time_offset: Duration::minutes(1),
            action: Some("deploy".to_string()),
            target: Some("NAVY-01".to_string()),
            destination: Some((5.5, 118.8)),
            ..Default::default()
        };

        let mut engine = EventEngine::new(vec![event], Arc::clone(&store), start());
        let mut movements = MovementMap::new();
        engine.tick(start() + Duration::minutes(1), &mut movements);

        assert!(movements.contains_key("NAVY-01"));
        let entity = store.get("NAVY-01").unwrap();
        assert_eq!(entity.status, EntityStatus::Responding);
        // 90% of the 35 kt type max.
        assert!((entity.speed_knots - 31.5).abs() < 1e-9);
    }

    #[test]
    fn deploy_transports_slow_movers() {
        let store = Arc::new(EntityStore::new());
        store.upsert(make_entity("TEAM-01", "RMP_TACTICAL_TEAM"));

        let event = ScenarioEvent {
            time_offset: Duration::zero(),
            action: Some("respond".to_string()),
            target: Some("TEAM-01".to_string()),
            destination: Some((5.2, 118.2)),
            ..Default::default()
        };

        let mut engine = EventEngine::new(vec![event], Arc::clone(&store), start());
        let mut movements = MovementMap::new();
        engine.tick(start(), &mut movements);

        let entity = store.get("TEAM-01").unwrap();
        assert_eq!(entity.speed_knots, TRANSPORTED_DEPLOY_SPEED);
    }

    #[test]
    fn lockdown_removes_movement_and_stops_entity() {
        let store = Arc::new(EntityStore::new());
        store.upsert(make_entity("GATE-01", "RMP_PATROL_CAR"));

        let mut movements = MovementMap::new();
        movements.insert(
            "GATE-01".to_string(),
            Box::new(
                WaypointMovement::new(
                    vec![Waypoint::new(5.0, 118.0, 10.0, Duration::zero())],
                    start(),
                )
                .unwrap(),
            ),
        );

        let event = ScenarioEvent {
            time_offset: Duration::zero(),
            action: Some("lockdown".to_string()),
            target: Some("GATE-01".to_string()),
            ..Default::default()
        };

        let mut engine = EventEngine::new(vec![event], Arc::clone(&store), start());
        engine.tick(start(), &mut movements);

        assert!(!movements.contains_key("GATE-01"));
        let entity = store.get("GATE-01").unwrap();
        assert_eq!(entity.status, EntityStatus::Active);
        assert_eq!(entity.speed_knots, 0.0);
    }

    #[test]
    fn unknown_target_is_skipped_but_event_fires() {
        let store = Arc::new(EntityStore::new());
        let event = ScenarioEvent {
            time_offset: Duration::zero(),
            action: Some("activate".to_string()),
            target: Some("GHOST-01".to_string()),
            ..Default::default()
        };

        let mut engine = EventEngine::new(vec![event], Arc::clone(&store), start());
        let mut movements = MovementMap::new();
        let fired = engine.tick(start(), &mut movements);
        assert_eq!(fired.len(), 1);
        assert_eq!(engine.fired_count(), 1);
    }

    #[test]
    fn reclassify_rewrites_type_and_sidc() {
        let store = Arc::new(EntityStore::new());
        store.upsert(make_entity("FV-01", "CIVILIAN_FISHING"));

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "reclassify".to_string(),
            serde_json::json!({
                "new_type": "HOSTILE_VESSEL",
                "targets": ["FV-01"],
            }),
        );
        let event = ScenarioEvent {
            time_offset: Duration::zero(),
            event_type: "INTEL".to_string(),
            metadata,
            ..Default::default()
        };

        let mut engine = EventEngine::new(vec![event], Arc::clone(&store), start());
        let mut movements = MovementMap::new();
        engine.tick(start(), &mut movements);

        let entity = store.get("FV-01").unwrap();
        assert_eq!(entity.entity_type, "HOSTILE_VESSEL");
        assert_eq!(entity.sidc, "SHSP------");
    }

    #[test]
    fn reset_allows_events_to_refire() {
        let store = Arc::new(EntityStore::new());
        let mut engine = EventEngine::new(vec![alert(5), alert(10)], Arc::clone(&store), start());
        let mut movements = MovementMap::new();

        engine.tick(start() + Duration::minutes(15), &mut movements);
        assert!(engine.is_complete());
        assert_eq!(engine.fired_count(), 2);

        engine.reset();
        assert!(!engine.is_complete());
        assert_eq!(engine.fired_count(), 0);

        let fired = engine.tick(start() + Duration::minutes(15), &mut movements);
        assert_eq!(fired.len(), 2);
        assert!(engine.is_complete());
    }

    #[test]
    fn escort_routes_to_sandakan() {
        let store = Arc::new(EntityStore::new());
        store.upsert(make_entity("MMEA-02", "MMEA_PATROL"));

        let event = ScenarioEvent {
            time_offset: Duration::zero(),
            action: Some("escort_to_port".to_string()),
            target: Some("MMEA-02".to_string()),
            ..Default::default()
        };

        let mut engine = EventEngine::new(vec![event], Arc::clone(&store), start());
        let mut movements = MovementMap::new();
        engine.tick(start(), &mut movements);

        let entity = store.get("MMEA-02").unwrap();
        // Half of the 22 kt type max.
        assert!((entity.speed_knots - 11.0).abs() < 1e-9);
        assert!(movements.contains_key("MMEA-02"));
    }
}
