//! Simulation engine: the tick orchestrator and its shared surfaces.
//!
//! Admin commands arriving from transports are enqueued into the tick
//! loop over a channel rather than mutating shared state directly; the
//! loop applies them between ticks, so the movements map and event engine
//! are only ever touched from the tick task.

pub mod sim_loop;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use sim_loop::SimulationLoop;

/// Commands enqueued into the tick loop by transport adapters.
#[derive(Debug, Clone)]
pub enum SimCommand {
    /// Reset the clock and world to scenario start and run again.
    Restart,
    /// Rewrite the SIDC for every entity of a type and persist the
    /// override for future loads.
    UpdateSidc { entity_type: String, sidc: String },
}

/// Lock-free per-tick status snapshot, published through `ArcSwap` and
/// read by the health endpoint and the WS clock broadcaster.
#[derive(Debug, Clone, Serialize)]
pub struct SimStatus {
    pub scenario: String,
    pub tick: u64,
    pub entities: usize,
    pub events_fired: usize,
    pub events_total: usize,
    pub running: bool,
    pub speed: f64,
    pub elapsed_s: f64,
    /// Fraction of the scenario duration elapsed, [0, 1].
    pub scenario_progress: f64,
    pub started_at: DateTime<Utc>,
}

impl SimStatus {
    pub fn initial(scenario: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            scenario: scenario.to_string(),
            tick: 0,
            entities: 0,
            events_fired: 0,
            events_total: 0,
            running: false,
            speed: 1.0,
            elapsed_s: 0.0,
            scenario_progress: 0.0,
            started_at,
        }
    }
}
