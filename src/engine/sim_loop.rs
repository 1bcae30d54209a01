//! The tick orchestrator.
//!
//! One logical task owns the world: each tick it queries every movement
//! strategy at the current sim time, applies sensor noise and terrain
//! correction, writes the store, runs the domain post-processors, fires
//! due events, and fans the results out through the transport registry.
//! Commands from transports arrive over a channel and are applied between
//! ticks, so the movements map and event engine are never touched from
//! another task.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{SimCommand, SimStatus};
use crate::core::{EntityStore, SimulationClock};
use crate::domains::DomainProcessor;
use crate::movement::{MovementMap, PositionNoise, TerrainIndex};
use crate::scenario::loader::{save_sidc_overrides, sidc_overrides_path};
use crate::scenario::{EventEngine, ScenarioState};
use crate::transport::TransportRegistry;
use crate::types::{stable_hash, Domain, ScenarioEvent};

/// Idle poll interval while the clock is paused.
const IDLE_SLEEP_MS: u64 = 100;

/// Progress log cadence in ticks.
const PROGRESS_LOG_TICKS: u64 = 30;

/// Minimum ticks before the completion check may end the run.
const MIN_TICKS_BEFORE_COMPLETE: u64 = 10;

/// Mutable world state owned by the tick loop. Rebuilt in place on
/// restart; the loop always reads the current bindings through this
/// struct rather than captured copies.
struct SimWorld {
    movements: MovementMap,
    event_engine: EventEngine,
}

/// The per-tick driver.
pub struct SimulationLoop {
    scenario: ScenarioState,
    world: SimWorld,
    clock: Arc<SimulationClock>,
    store: Arc<EntityStore>,
    registry: Arc<TransportRegistry>,
    terrain: Arc<TerrainIndex>,
    processors: Vec<Box<dyn DomainProcessor>>,
    noise: HashMap<String, PositionNoise>,
    commands: mpsc::Receiver<SimCommand>,
    status: Arc<ArcSwap<SimStatus>>,
    tick_interval: std::time::Duration,
    tick_count: u64,
}

impl SimulationLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scenario: ScenarioState,
        clock: Arc<SimulationClock>,
        store: Arc<EntityStore>,
        registry: Arc<TransportRegistry>,
        terrain: Arc<TerrainIndex>,
        processors: Vec<Box<dyn DomainProcessor>>,
        commands: mpsc::Receiver<SimCommand>,
        status: Arc<ArcSwap<SimStatus>>,
        tick_rate_hz: f64,
    ) -> Self {
        let movements = scenario.build_movements(&terrain);
        let event_engine = EventEngine::new(
            scenario.events.clone(),
            Arc::clone(&store),
            scenario.start_time,
        );

        Self {
            scenario,
            world: SimWorld {
                movements,
                event_engine,
            },
            clock,
            store,
            registry,
            terrain,
            processors,
            noise: HashMap::new(),
            commands,
            status,
            tick_interval: std::time::Duration::from_secs_f64(1.0 / tick_rate_hz.max(0.01)),
            tick_count: 0,
        }
    }

    /// Populate the store from the scenario's initial entity states.
    pub fn seed_store(&self) {
        for entity in self.scenario.entities.values() {
            self.store.upsert(entity.clone());
        }
    }

    /// Run until the scenario completes or the cancel token fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                info!("Shutdown signal received, stopping tick loop");
                break;
            }

            self.apply_pending_commands().await;

            if !self.clock.is_running() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(std::time::Duration::from_millis(IDLE_SLEEP_MS)) => {}
                }
                continue;
            }

            let now = self.clock.sim_time();
            let fired = self.tick_once(now).await;

            if self.scenario_complete(now, &fired) {
                info!("Scenario complete: all events fired and movements finished");
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        }

        self.clock.pause();
    }

    /// One full tick at the given sim time. Exposed for deterministic
    /// integration tests; `run` calls this on the wall cadence.
    pub async fn tick_once(&mut self, now: DateTime<Utc>) -> Vec<ScenarioEvent> {
        // Movement pass: strategy -> noise -> terrain -> store.
        let ids: Vec<String> = self.world.movements.keys().cloned().collect();
        for id in ids {
            let Some(mut entity) = self.store.get(&id) else {
                continue;
            };
            let Some(movement) = self.world.movements.get_mut(&id) else {
                continue;
            };

            let raw = movement.state(now);

            let noise = self.noise.entry(id.clone()).or_insert_with(|| {
                PositionNoise::for_domain(entity.domain, stable_hash(&id))
            });
            let noisy = noise.apply(&raw);

            let (mut lat, mut lon) = (noisy.lat, noisy.lon);
            let needs_terrain = matches!(
                entity.domain,
                Domain::Maritime | Domain::GroundVehicle | Domain::Personnel
            ) && !entity.meta_bool("skip_terrain_check").unwrap_or(false);
            if needs_terrain && !self.terrain.validate(lat, lon, entity.domain) {
                match self.terrain.nearest_valid(
                    lat,
                    lon,
                    entity.domain,
                    crate::movement::terrain::DEFAULT_SEARCH_RADIUS_DEG,
                ) {
                    Some(fixed) => (lat, lon) = fixed,
                    None => warn!(
                        "No valid {} terrain near ({lat:.4}, {lon:.4}) for {id}, keeping point",
                        entity.domain.as_str()
                    ),
                }
            }

            entity.update_position(
                lat,
                lon,
                noisy.alt_m,
                noisy.heading_deg,
                noisy.speed_knots,
                noisy.course_deg,
                now,
            );
            if let Some(overrides) = noisy.metadata_overrides {
                for (key, value) in overrides {
                    entity.metadata.insert(key, value);
                }
            }
            self.store.upsert(entity);
        }

        // Domain post-processors, fixed order.
        for processor in &mut self.processors {
            processor.tick(now);
        }

        // Event pass: fire due events and push them out.
        let fired = self.world.event_engine.tick(now, &mut self.world.movements);
        for event in &fired {
            self.registry.push_event(&event.to_json()).await;
        }

        // Bulk snapshot to every transport.
        let snapshot = self.store.all();
        if !snapshot.is_empty() {
            self.registry.push_bulk_update(&snapshot).await;
        }

        self.tick_count += 1;
        self.publish_status();

        if self.tick_count % PROGRESS_LOG_TICKS == 0 {
            let elapsed_min = self.clock.elapsed().num_milliseconds() as f64 / 60_000.0;
            info!(
                "Tick {} | Sim time: +{elapsed_min:.1}m | Entities: {} | Events: {}/{}",
                self.tick_count,
                self.store.count(),
                self.world.event_engine.fired_count(),
                self.world.event_engine.total_events(),
            );
        }

        fired
    }

    fn scenario_complete(&self, now: DateTime<Utc>, _fired: &[ScenarioEvent]) -> bool {
        if !self.world.event_engine.is_complete() {
            return false;
        }
        if self.tick_count <= MIN_TICKS_BEFORE_COMPLETE {
            return false;
        }
        self.world
            .movements
            .values()
            .all(|movement| movement.is_complete(now))
    }

    /// Apply any commands enqueued by transports since the last tick.
    /// `run` calls this at the top of every iteration.
    pub async fn apply_pending_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                SimCommand::Restart => self.restart().await,
                SimCommand::UpdateSidc { entity_type, sidc } => {
                    self.update_sidc(&entity_type, &sidc);
                }
            }
        }
    }

    /// Restart: reset the clock and world to scenario start. Strategies
    /// are rebuilt from their plans so every entity resumes from its
    /// initial position, and the event engine starts a fresh epoch.
    async fn restart(&mut self) {
        info!("Restarting scenario '{}'", self.scenario.name);
        self.clock.pause();
        self.clock.reset();

        self.registry.clear_history().await;

        for entity in self.scenario.entities.values() {
            self.store.upsert(entity.clone());
        }

        self.world.movements = self.scenario.build_movements(&self.terrain);
        self.world.event_engine.reset();
        for processor in &mut self.processors {
            processor.reset();
        }
        self.noise.clear();
        self.tick_count = 0;
        self.publish_status();

        self.clock.start();
    }

    fn update_sidc(&self, entity_type: &str, sidc: &str) {
        let mut updated = 0;
        for mut entity in self.store.all() {
            if entity.entity_type == entity_type {
                entity.sidc = sidc.to_string();
                self.store.upsert(entity);
                updated += 1;
            }
        }
        info!("SIDC update: {entity_type} -> {sidc} ({updated} entities)");

        let path = sidc_overrides_path();
        let mut overrides = crate::scenario::loader::load_sidc_overrides(&path);
        overrides.insert(entity_type.to_string(), sidc.to_string());
        match save_sidc_overrides(&path, &overrides) {
            Ok(()) => info!("SIDC overrides saved to {}", path.display()),
            Err(e) => warn!("Failed to save SIDC overrides: {e}"),
        }
    }

    fn publish_status(&self) {
        let elapsed_s = self.clock.elapsed().num_milliseconds() as f64 / 1000.0;
        let duration_s = self.scenario.duration.num_milliseconds() as f64 / 1000.0;
        let progress = if duration_s > 0.0 {
            (elapsed_s / duration_s).clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.status.store(Arc::new(SimStatus {
            scenario: self.scenario.name.clone(),
            tick: self.tick_count,
            entities: self.store.count(),
            events_fired: self.world.event_engine.fired_count(),
            events_total: self.world.event_engine.total_events(),
            running: self.clock.is_running(),
            speed: self.clock.speed(),
            elapsed_s,
            scenario_progress: progress,
            started_at: self.scenario.start_time,
        }));
    }

    /// Direct restart entry point for tests and embedders.
    pub async fn force_restart(&mut self) {
        self.restart().await;
    }

    pub fn fired_count(&self) -> usize {
        self.world.event_engine.fired_count()
    }

    pub fn events_complete(&self) -> bool {
        self.world.event_engine.is_complete()
    }

    pub fn has_movement(&self, entity_id: &str) -> bool {
        self.world.movements.contains_key(entity_id)
    }
}
